//! Application services layer.

pub mod accounts;
pub mod admin;
pub mod error;
pub mod follows;
pub mod media;
pub mod pagination;
pub mod posts;
pub mod repos;
