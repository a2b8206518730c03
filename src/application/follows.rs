//! The follow graph and the subscription feed built on it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::pagination::{PageRequest, Paginated};
use crate::application::posts::PostService;
use crate::application::repos::{FollowsRepo, PostScope, RepoError, UsersRepo};
use crate::domain::entities::{PostRecord, UserRecord, UserSummary};
use crate::domain::follows::FollowEdge;
use crate::domain::types::UserId;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author `{0}` not found")]
    AuthorNotFound(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    /// Following yourself is refused without touching the store.
    SelfFollowIgnored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
    posts: PostService,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>, posts: PostService) -> Self {
        Self {
            follows,
            users,
            posts,
        }
    }

    pub async fn follow(
        &self,
        follower: &UserSummary,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.find_author(author_username).await?;
        let Ok(edge) = FollowEdge::new(follower.id, author.id) else {
            debug!(target = "yatube::follows", user = %follower.username, "ignored self-follow");
            return Ok(FollowOutcome::SelfFollowIgnored);
        };

        if self.follows.follow(edge).await? {
            info!(
                target = "yatube::follows",
                follower = %follower.username,
                author = %author.username,
                "follow edge created"
            );
            Ok(FollowOutcome::Followed)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    pub async fn unfollow(
        &self,
        follower: &UserSummary,
        author_username: &str,
    ) -> Result<UnfollowOutcome, FollowError> {
        let author = self.find_author(author_username).await?;
        if self.follows.unfollow(follower.id, author.id).await? {
            info!(
                target = "yatube::follows",
                follower = %follower.username,
                author = %author.username,
                "follow edge removed"
            );
            Ok(UnfollowOutcome::Unfollowed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    /// Whether `viewer` follows `author`; anonymous viewers follow nobody.
    pub async fn is_following(
        &self,
        viewer: Option<UserId>,
        author: UserId,
    ) -> Result<bool, FollowError> {
        match viewer {
            Some(viewer) if viewer != author => {
                Ok(self.follows.is_following(viewer, author).await?)
            }
            _ => Ok(false),
        }
    }

    pub async fn following(&self, follower: UserId) -> Result<Vec<UserSummary>, FollowError> {
        Ok(self.follows.list_following(follower).await?)
    }

    pub async fn follower_count(&self, author: UserId) -> Result<u64, FollowError> {
        Ok(self.follows.count_followers(author).await?)
    }

    /// Posts by everyone `user` follows, newest first.
    pub async fn feed(
        &self,
        user: UserId,
        request: PageRequest,
    ) -> Result<Paginated<PostRecord>, FollowError> {
        Ok(self.posts.list(PostScope::FollowedBy(user), request).await?)
    }

    async fn find_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::AuthorNotFound(username.to_string()))
    }
}
