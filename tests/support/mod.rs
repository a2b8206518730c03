//! In-memory repositories and a router harness for HTTP tests.

#![allow(dead_code)]

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use yatube::{
    application::{
        accounts::{AccountService, SignupCommand},
        follows::FollowService,
        media::MediaStore,
        pagination::PageWindow,
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, PostScope, PostsRepo,
            PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    cache::{PageCache, PageCacheConfig},
    domain::{
        entities::{
            CommentRecord, GroupRecord, GroupSummary, PostRecord, SessionRecord, UserRecord,
            UserSummary,
        },
        follows::FollowEdge,
        types::{CommentId, GroupId, PostId, UserId},
    },
    infra::{
        http::{HttpState, SessionCookie, build_router},
        uploads::UploadStorage,
    },
};

pub const SESSION_COOKIE: &str = "yatube_session";
pub const PASSWORD: &str = "s3cret-passphrase";

/// 1x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x21, 0xf9,
    0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
    0x00, 0x02, 0x01, 0x00, 0x00,
];

#[derive(Debug, Clone)]
struct StoredPost {
    id: PostId,
    text: String,
    image: Option<String>,
    author_id: UserId,
    group_id: Option<GroupId>,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: CommentId,
    post_id: PostId,
    author_id: UserId,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: BTreeSet<(UserId, UserId)>,
    sessions: Vec<SessionRecord>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_summary(&self, id: UserId) -> Option<UserSummary> {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(UserRecord::summary)
    }

    fn project(&self, post: &StoredPost) -> Option<PostRecord> {
        let group = post.group_id.and_then(|id| {
            self.groups
                .iter()
                .find(|group| group.id == id)
                .map(|group| GroupSummary {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        Some(PostRecord {
            id: post.id,
            text: post.text.clone(),
            image: post.image.clone(),
            author: self.user_summary(post.author_id)?,
            group,
            created_at: post.created_at,
        })
    }

    fn in_scope(&self, post: &StoredPost, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(group) => post.group_id == Some(group),
            PostScope::Author(author) => post.author_id == author,
            PostScope::FollowedBy(user) => self.follows.contains(&(user, post.author_id)),
        }
    }

    /// Newest first, mirroring `created_at DESC, id DESC`.
    fn scoped(&self, scope: PostScope) -> Vec<PostRecord> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| self.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts.into_iter().filter_map(|post| self.project(post)).collect()
    }

    /// Relational cascades: posts, comments, follows and sessions go with the user.
    fn delete_user(&mut self, id: UserId) {
        self.users.retain(|user| user.id != id);
        let removed: Vec<PostId> = self
            .posts
            .iter()
            .filter(|post| post.author_id == id)
            .map(|post| post.id)
            .collect();
        self.posts.retain(|post| post.author_id != id);
        self.comments
            .retain(|comment| comment.author_id != id && !removed.contains(&comment.post_id));
        self.follows
            .retain(|(follower, author)| *follower != id && *author != id);
        self.sessions.retain(|session| session.user_id != id);
    }
}

/// Every repository trait over one shared in-memory state.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub async fn insert_user(&self, username: &str) -> UserSummary {
        let mut state = self.state.lock().await;
        let id = UserId(state.next_id());
        let user = UserRecord {
            id,
            username: username.to_string(),
            password_hash: String::new(),
            joined_at: OffsetDateTime::now_utc(),
        };
        let summary = user.summary();
        state.users.push(user);
        summary
    }

    pub async fn insert_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut state = self.state.lock().await;
        let group = GroupRecord {
            id: GroupId(state.next_id()),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        state.groups.push(group.clone());
        group
    }

    /// Insert a post directly; `age` pushes `created_at` into the past.
    pub async fn insert_post(
        &self,
        author: &UserSummary,
        text: &str,
        group: Option<GroupId>,
        age: Duration,
    ) -> PostId {
        let mut state = self.state.lock().await;
        let id = PostId(state.next_id());
        state.posts.push(StoredPost {
            id,
            text: text.to_string(),
            image: None,
            author_id: author.id,
            group_id: group,
            created_at: OffsetDateTime::now_utc() - age,
        });
        id
    }

    pub async fn post(&self, id: PostId) -> Option<PostRecord> {
        let state = self.state.lock().await;
        let post = state.posts.iter().find(|post| post.id == id)?;
        state.project(post)
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.state.lock().await.scoped(PostScope::All).into_iter().next()
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    pub async fn comment_count(&self, post: PostId) -> usize {
        self.state
            .lock()
            .await
            .comments
            .iter()
            .filter(|comment| comment.post_id == post)
            .count()
    }

    pub async fn follow_count(&self) -> usize {
        self.state.lock().await.follows.len()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".into(),
            });
        }
        let user = UserRecord {
            id: UserId(state.next_id()),
            username: params.username,
            password_hash: params.password_hash,
            joined_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        if !state.users.iter().any(|user| user.id == id) {
            return Err(RepoError::NotFound);
        }
        state.delete_user(id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".into(),
            });
        }
        let group = GroupRecord {
            id: GroupId(state.next_id()),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut groups = state.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.groups.len();
        state.groups.retain(|group| group.id != id);
        if state.groups.len() == before {
            return Err(RepoError::NotFound);
        }
        for post in state.posts.iter_mut().filter(|post| post.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .filter(|post| state.in_scope(post, scope))
            .count() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .scoped(scope)
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
            .collect())
    }

    async fn find_post(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| state.project(post)))
    }

    async fn list_author_images(&self, author: UserId) -> Result<Vec<String>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .filter(|post| post.author_id == author)
            .filter_map(|post| post.image.clone())
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = StoredPost {
            id: PostId(state.next_id()),
            text: params.text,
            image: params.image,
            author_id: params.author_id,
            group_id: params.group_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.posts.push(post.clone());
        state.project(&post).ok_or(RepoError::Integrity {
            message: "post author does not exist".into(),
        })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        state.project(&post).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.posts.len();
        state.posts.retain(|post| post.id != id);
        if state.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        state.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments(&self, post_id: PostId) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .filter_map(|comment| {
                Some(CommentRecord {
                    id: comment.id,
                    post_id: comment.post_id,
                    author: state.user_summary(comment.author_id)?,
                    text: comment.text.clone(),
                    created_at: comment.created_at,
                })
            })
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let author = state
            .user_summary(params.author_id)
            .ok_or(RepoError::Integrity {
                message: "comment author does not exist".into(),
            })?;
        let comment = StoredComment {
            id: CommentId(state.next_id()),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.push(comment.clone());
        Ok(CommentRecord {
            id: comment.id,
            post_id: comment.post_id,
            author,
            text: comment.text,
            created_at: comment.created_at,
        })
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn follow(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        Ok(state.follows.insert((edge.follower(), edge.author())))
    }

    async fn unfollow(&self, follower: UserId, author: UserId) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        Ok(state.follows.remove(&(follower, author)))
    }

    async fn is_following(&self, follower: UserId, author: UserId) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state.follows.contains(&(follower, author)))
    }

    async fn list_following(&self, follower: UserId) -> Result<Vec<UserSummary>, RepoError> {
        let state = self.state.lock().await;
        let mut authors: Vec<UserSummary> = state
            .follows
            .iter()
            .filter(|(from, _)| *from == follower)
            .filter_map(|(_, author)| state.user_summary(*author))
            .collect();
        authors.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(authors)
    }

    async fn count_followers(&self, author: UserId) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.follows.iter().filter(|(_, to)| *to == author).count() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let session = SessionRecord {
            id: state.next_id(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.sessions.retain(|session| session.id != id);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|session| session.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

/// A fully wired router over [`MemoryStore`] and a temporary media root.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cache: PageCache,
    pub accounts: Arc<AccountService>,
    _media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(PageCacheConfig::default())
    }

    pub fn with_cache(config: PageCacheConfig) -> Self {
        let media_dir = tempfile::tempdir().expect("media tempdir");
        let storage =
            Arc::new(UploadStorage::new(media_dir.path().to_path_buf()).expect("upload storage"));
        let store = Arc::new(MemoryStore::default());
        let media: Arc<dyn MediaStore> = storage.clone();

        let posts = PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            media,
        );
        let follows = FollowService::new(store.clone(), store.clone(), posts.clone());
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            time::Duration::hours(1),
        ));
        let cache = PageCache::new(config);

        let state = HttpState {
            posts: Arc::new(posts),
            follows: Arc::new(follows),
            accounts: accounts.clone(),
            media: storage,
            cache: cache.clone(),
            session_cookie: SessionCookie::new(SESSION_COOKIE, false),
            body_limit: 2 * 1024 * 1024,
        };

        Self {
            router: build_router(state),
            store,
            cache,
            accounts,
            _media: media_dir,
        }
    }

    /// Register a user and return it together with a ready `Cookie` header value.
    pub async fn signup(&self, username: &str) -> (UserSummary, String) {
        let session = self
            .accounts
            .signup(SignupCommand {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                password_confirmation: PASSWORD.to_string(),
            })
            .await
            .expect("signup");
        let cookie = format!("{SESSION_COOKIE}={}", session.token);
        (session.user, cookie)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        form: MultipartBody,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.finish())).expect("request"))
            .await
    }
}

const BOUNDARY: &str = "yatube-test-boundary";

/// Hand-assembled `multipart/form-data` payload.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}
