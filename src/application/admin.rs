//! Administrative lifecycle actions driven from the command line.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::media::MediaStore;
use crate::application::repos::{
    CreateGroupParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};
use crate::domain::slug::{SlugError, derive_slug, validate_slug};
use crate::domain::types::PostId;

const MAX_GROUP_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("group slug `{0}` is already in use")]
    SlugTaken(String),
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    posts_writer: Arc<dyn PostsWriteRepo>,
    media: Arc<dyn MediaStore>,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        posts_writer: Arc<dyn PostsWriteRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            posts_writer,
            media,
        }
    }

    pub async fn create_group(&self, command: CreateGroupCommand) -> Result<GroupRecord, AdminError> {
        let title = command.title.trim();
        if title.is_empty() || title.chars().count() > MAX_GROUP_TITLE_CHARS {
            return Err(AdminError::ConstraintViolation("title"));
        }

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => validate_slug(explicit)?,
            _ => derive_slug(title)?,
        };

        let params = CreateGroupParams {
            title: title.to_string(),
            slug: slug.clone(),
            description: command.description.trim().to_string(),
        };
        let group = match self.groups.create_group(params).await {
            Ok(group) => group,
            Err(RepoError::Duplicate { .. }) => return Err(AdminError::SlugTaken(slug)),
            Err(err) => return Err(err.into()),
        };

        info!(target = "yatube::admin", group_id = %group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    /// Delete a group; its posts survive with no group.
    pub async fn delete_group(&self, slug: &str) -> Result<GroupRecord, AdminError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AdminError::NotFound {
                entity: "group",
                key: slug.to_string(),
            })?;
        self.groups.delete_group(group.id).await?;
        info!(target = "yatube::admin", slug = %group.slug, "group deleted");
        Ok(group)
    }

    /// Delete a user together with their posts, comments, follows and sessions.
    pub async fn delete_user(&self, username: &str) -> Result<UserRecord, AdminError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AdminError::NotFound {
                entity: "user",
                key: username.to_string(),
            })?;
        let images = self.posts.list_author_images(user.id).await?;
        self.users.delete_user(user.id).await?;
        for image in &images {
            self.remove_image(image).await;
        }
        info!(
            target = "yatube::admin",
            username = %user.username,
            images = images.len(),
            "user deleted"
        );
        Ok(user)
    }

    pub async fn delete_post(&self, id: PostId) -> Result<PostRecord, AdminError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or_else(|| AdminError::NotFound {
                entity: "post",
                key: id.to_string(),
            })?;
        self.posts_writer.delete_post(id).await?;

        if let Some(image) = post.image.as_deref() {
            self.remove_image(image).await;
        }

        info!(target = "yatube::admin", post_id = %id, "post deleted");
        Ok(post)
    }

    /// The rows are already gone; a leftover file is only logged.
    async fn remove_image(&self, path: &str) {
        if let Err(err) = self.media.remove(path).await {
            warn!(target = "yatube::admin", path, error = %err, "failed to remove post image");
        }
    }
}
