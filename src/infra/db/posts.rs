use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::{
        pagination::PageWindow,
        repos::{
            CreatePostParams, PostScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
        },
    },
    domain::{
        entities::{GroupSummary, PostRecord, UserSummary},
        types::{GroupId, PostId, UserId},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

/// Columns every post query projects. Expects the post relation aliased `p`.
const POST_PROJECTION: &str = "SELECT p.id, p.text, p.image, p.created_at, \
    u.id AS author_id, u.username AS author_username, \
    g.id AS group_id, g.slug AS group_slug, g.title AS group_title";

const POST_JOINS: &str = " INNER JOIN users u ON u.id = p.author_id \
    LEFT JOIN groups g ON g.id = p.group_id";

const POST_ORDER: &str = " ORDER BY p.created_at DESC, p.id DESC";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: PostId,
    text: String,
    image: Option<String>,
    created_at: OffsetDateTime,
    author_id: UserId,
    author_username: String,
    group_id: Option<GroupId>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupSummary { id, slug, title }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            image: row.image,
            author: UserSummary {
                id: row.author_id,
                username: row.author_username,
            },
            group,
            created_at: row.created_at,
        }
    }
}

fn push_post_select(qb: &mut QueryBuilder<'_, Postgres>, source: &str) {
    qb.push(POST_PROJECTION);
    qb.push(" FROM ");
    qb.push(source);
    qb.push(POST_JOINS);
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE TRUE");
        Self::apply_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_post_select(&mut qb, "posts p");
        qb.push(" WHERE TRUE");
        Self::apply_scope_conditions(&mut qb, scope);
        qb.push(POST_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(window.limit());
        qb.push(" OFFSET ");
        qb.push_bind(window.offset());

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_post(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("");
        push_post_select(&mut qb, "posts p");
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_author_images(&self, author: UserId) -> Result<Vec<String>, RepoError> {
        sqlx::query_scalar::<_, String>(
            "SELECT image FROM posts WHERE author_id = $1 AND image IS NOT NULL",
        )
        .bind(author)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "WITH p AS (INSERT INTO posts (author_id, text, group_id, image) VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(params.author_id);
        values.push_bind(params.text);
        values.push_bind(params.group_id);
        values.push_bind(params.image);
        qb.push(") RETURNING *) ");
        push_post_select(&mut qb, "p");

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("WITH p AS (UPDATE posts SET text = ");
        qb.push_bind(params.text);
        qb.push(", group_id = ");
        qb.push_bind(params.group_id);
        qb.push(", image = ");
        qb.push_bind(params.image);
        qb.push(" WHERE id = ");
        qb.push_bind(params.id);
        qb.push(" RETURNING *) ");
        push_post_select(&mut qb, "p");

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
