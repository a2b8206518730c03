//! Post listings, detail pages, authoring and comments.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::media::{ImageUpload, MediaError, MediaStore};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostScope, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserSummary};
use crate::domain::error::DomainError;
use crate::domain::posts::{normalize_comment_text, normalize_post_text};
use crate::domain::types::{GroupId, PostId};
use crate::domain::uploads::{POST_IMAGE_PREFIX, inspect_image};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("post not found")]
    PostNotFound,
    #[error("group `{0}` not found")]
    GroupNotFound(String),
    #[error("author `{0}` not found")]
    AuthorNotFound(String),
    #[error("post {0} may only be edited by its author")]
    NotAuthor(PostId),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Form payload shared by create and edit.
#[derive(Debug, Clone, Default)]
pub struct PostCommand {
    pub text: String,
    pub group_id: Option<GroupId>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub posts: Paginated<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct AuthorListing {
    pub author: UserSummary,
    pub posts: Paginated<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<dyn MediaStore>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            users,
            comments,
            media,
        }
    }

    /// Count, clamp and fetch one page of a scope.
    pub async fn list(
        &self,
        scope: PostScope,
        request: PageRequest,
    ) -> Result<Paginated<PostRecord>, RepoError> {
        let total = self.reader.count_posts(scope).await?;
        let window = request.resolve(total);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.reader.list_posts(scope, window).await?
        };
        Ok(window.with_items(items))
    }

    pub async fn index(&self, request: PageRequest) -> Result<Paginated<PostRecord>, PostError> {
        Ok(self.list(PostScope::All, request).await?)
    }

    pub async fn group_posts(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<GroupListing, PostError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| PostError::GroupNotFound(slug.to_string()))?;
        let posts = self.list(PostScope::Group(group.id), request).await?;
        Ok(GroupListing { group, posts })
    }

    pub async fn author_posts(
        &self,
        username: &str,
        request: PageRequest,
    ) -> Result<AuthorListing, PostError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| PostError::AuthorNotFound(username.to_string()))?;
        let posts = self.list(PostScope::Author(author.id), request).await?;
        Ok(AuthorListing {
            author: author.summary(),
            posts,
        })
    }

    pub async fn post_detail(&self, id: PostId) -> Result<PostDetail, PostError> {
        let post = self.find(id).await?;
        let comments = self.comments.list_comments(id).await?;
        let author_post_count = self
            .reader
            .count_posts(PostScope::Author(post.author.id))
            .await?;
        Ok(PostDetail {
            post,
            comments,
            author_post_count,
        })
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create_post(
        &self,
        author: &UserSummary,
        command: PostCommand,
    ) -> Result<PostRecord, PostError> {
        let text = normalize_post_text(&command.text)?;
        self.ensure_group(command.group_id).await?;
        let image = self.store_image(command.image).await?;

        let created = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text,
                group_id: command.group_id,
                image: image.clone(),
            })
            .await;

        match created {
            Ok(post) => {
                info!(
                    target = "yatube::posts",
                    post_id = %post.id,
                    author = %author.username,
                    group = ?post.group.as_ref().map(|group| group.slug.as_str()),
                    "post created"
                );
                Ok(post)
            }
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                Err(err.into())
            }
        }
    }

    /// Load a post for editing, refusing anyone but its author.
    pub async fn editable_post(
        &self,
        actor: &UserSummary,
        id: PostId,
    ) -> Result<PostRecord, PostError> {
        let post = self.find(id).await?;
        if !post.is_authored_by(actor.id) {
            return Err(PostError::NotAuthor(id));
        }
        Ok(post)
    }

    pub async fn update_post(
        &self,
        actor: &UserSummary,
        id: PostId,
        command: PostCommand,
    ) -> Result<PostRecord, PostError> {
        let current = self.editable_post(actor, id).await?;
        let text = normalize_post_text(&command.text)?;
        self.ensure_group(command.group_id).await?;

        let replacement = self.store_image(command.image).await?;
        let image = replacement.clone().or_else(|| current.image.clone());

        let updated = match self
            .writer
            .update_post(UpdatePostParams {
                id,
                text,
                group_id: command.group_id,
                image,
            })
            .await
        {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(replacement.as_deref()).await;
                return Err(err.into());
            }
        };

        if replacement.is_some() {
            self.discard_image(current.image.as_deref()).await;
        }

        info!(target = "yatube::posts", post_id = %id, author = %actor.username, "post updated");
        Ok(updated)
    }

    pub async fn add_comment(
        &self,
        actor: &UserSummary,
        post_id: PostId,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self.find(post_id).await?;
        let text = normalize_comment_text(text)?;
        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: actor.id,
                text,
            })
            .await?;
        info!(
            target = "yatube::posts",
            post_id = %post.id,
            comment_id = %comment.id,
            author = %actor.username,
            "comment added"
        );
        Ok(comment)
    }

    async fn find(&self, id: PostId) -> Result<PostRecord, PostError> {
        self.reader
            .find_post(id)
            .await?
            .ok_or(PostError::PostNotFound)
    }

    async fn ensure_group(&self, group_id: Option<GroupId>) -> Result<(), PostError> {
        let Some(group_id) = group_id else {
            return Ok(());
        };
        match self.groups.find_group(group_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::validation(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            )
            .into()),
        }
    }

    async fn store_image(&self, upload: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        inspect_image(&upload.data)?;
        let path = self
            .media
            .save(POST_IMAGE_PREFIX, &upload.file_name, upload.data)
            .await?;
        Ok(Some(path))
    }

    async fn discard_image(&self, path: Option<&str>) {
        if let Some(path) = path
            && let Err(err) = self.media.remove(path).await
        {
            warn!(target = "yatube::posts", path, error = %err, "failed to remove stored image");
        }
    }
}
