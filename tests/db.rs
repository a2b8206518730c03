//! Postgres adapter behaviour: cascades, ordering and follow constraints.

use std::collections::HashSet;

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use yatube::application::{
    pagination::{POSTS_PER_PAGE, PageRequest},
    repos::{
        CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
        CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, PostScope, PostsRepo,
        PostsWriteRepo, RepoError, SessionsRepo, UsersRepo,
    },
};
use yatube::domain::{
    entities::UserRecord,
    follows::FollowEdge,
    types::{PostId, UserId},
};
use yatube::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            password_hash: "$argon2id$test".to_string(),
        })
        .await
        .expect("create user")
}

async fn post(repos: &PostgresRepositories, author: UserId, text: &str) -> PostId {
    repos
        .create_post(CreatePostParams {
            author_id: author,
            text: text.to_string(),
            group_id: None,
            image: None,
        })
        .await
        .expect("create post")
        .id
}

#[sqlx::test(migrations = "./migrations")]
async fn usernames_are_unique(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    user(&repos, "leo").await;

    let err = repos
        .create_user(CreateUserParams {
            username: "leo".into(),
            password_hash: "x".into(),
        })
        .await
        .expect_err("duplicate username");
    assert!(matches!(err, RepoError::Duplicate { .. }), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_group_keeps_posts_ungrouped(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Cats".into(),
            slug: "cats".into(),
            description: String::new(),
        })
        .await
        .expect("create group");
    let created = repos
        .create_post(CreatePostParams {
            author_id: leo.id,
            text: "in a group".into(),
            group_id: Some(group.id),
            image: None,
        })
        .await
        .expect("create post");
    assert_eq!(created.group.as_ref().map(|g| g.slug.as_str()), Some("cats"));

    repos.delete_group(group.id).await.expect("delete group");

    let post = repos
        .find_post(created.id)
        .await
        .expect("find post")
        .expect("post survives");
    assert!(post.group.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_user_cascades(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    let leo_post = post(&repos, leo.id, "by leo").await;
    let anna_post = post(&repos, anna.id, "by anna").await;

    repos
        .create_comment(CreateCommentParams {
            post_id: anna_post,
            author_id: leo.id,
            text: "leo was here".into(),
        })
        .await
        .expect("comment");
    repos
        .follow(FollowEdge::new(leo.id, anna.id).expect("edge"))
        .await
        .expect("follow");
    repos
        .create_session(CreateSessionParams {
            user_id: leo.id,
            prefix: "0123456789ab".into(),
            hashed_secret: vec![0; 32],
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        })
        .await
        .expect("session");

    repos.delete_user(leo.id).await.expect("delete user");

    assert!(repos.find_post(leo_post).await.expect("find").is_none());
    assert!(repos.list_comments(anna_post).await.expect("comments").is_empty());
    assert_eq!(repos.count_followers(anna.id).await.expect("count"), 0);
    assert!(
        repos
            .find_by_prefix("0123456789ab")
            .await
            .expect("session lookup")
            .is_none()
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn author_images_are_listed(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    post(&repos, leo.id, "no picture").await;
    for (author, image) in [(leo.id, "posts/leo.gif"), (anna.id, "posts/anna.gif")] {
        repos
            .create_post(CreatePostParams {
                author_id: author,
                text: "with a picture".into(),
                group_id: None,
                image: Some(image.into()),
            })
            .await
            .expect("create post");
    }

    let images = repos.list_author_images(leo.id).await.expect("images");
    assert_eq!(images, vec!["posts/leo.gif".to_string()]);
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_edges_are_unique(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    let edge = FollowEdge::new(leo.id, anna.id).expect("edge");

    assert!(repos.follow(edge).await.expect("first follow"));
    assert!(!repos.follow(edge).await.expect("repeat follow"));
    assert!(repos.is_following(leo.id, anna.id).await.expect("lookup"));
    assert!(!repos.is_following(anna.id, leo.id).await.expect("reverse lookup"));
    assert_eq!(repos.count_followers(anna.id).await.expect("count"), 1);

    assert!(repos.unfollow(leo.id, anna.id).await.expect("unfollow"));
    assert!(!repos.unfollow(leo.id, anna.id).await.expect("repeat unfollow"));
}

#[sqlx::test(migrations = "./migrations")]
async fn self_follow_violates_check(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let leo = user(&repos, "leo").await;

    let result = sqlx::query("INSERT INTO follows (follower_id, author_id) VALUES ($1, $1)")
        .bind(leo.id)
        .execute(&pool)
        .await;
    assert!(result.is_err());
}

#[sqlx::test(migrations = "./migrations")]
async fn feed_scope_covers_followed_authors_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    let kate = user(&repos, "kate").await;

    post(&repos, anna.id, "anna one").await;
    post(&repos, kate.id, "kate one").await;
    post(&repos, anna.id, "anna two").await;
    repos
        .follow(FollowEdge::new(leo.id, anna.id).expect("edge"))
        .await
        .expect("follow");

    let scope = PostScope::FollowedBy(leo.id);
    let total = repos.count_posts(scope).await.expect("count");
    assert_eq!(total, 2);

    let window = PageRequest::first(POSTS_PER_PAGE).resolve(total);
    let texts: Vec<String> = repos
        .list_posts(scope, window)
        .await
        .expect("list")
        .into_iter()
        .map(|post| post.text)
        .collect();
    assert_eq!(texts, vec!["anna two".to_string(), "anna one".to_string()]);
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_sessions_are_purged(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let now = OffsetDateTime::now_utc();

    for (prefix, offset) in [("aaaaaaaaaaaa", -1), ("bbbbbbbbbbbb", 1)] {
        repos
            .create_session(CreateSessionParams {
                user_id: leo.id,
                prefix: prefix.into(),
                hashed_secret: vec![1; 32],
                expires_at: now + Duration::hours(offset),
            })
            .await
            .expect("session");
    }

    assert_eq!(repos.delete_expired(now).await.expect("purge"), 1);
    let remaining: HashSet<String> = sqlx::query_scalar("SELECT prefix FROM sessions")
        .fetch_all(repos.pool())
        .await
        .expect("prefixes")
        .into_iter()
        .collect();
    assert_eq!(remaining, HashSet::from(["bbbbbbbbbbbb".to_string()]));
}
