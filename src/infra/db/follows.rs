use async_trait::async_trait;

use crate::{
    application::repos::{FollowsRepo, RepoError},
    domain::{entities::UserSummary, follows::FollowEdge, types::UserId},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: UserId,
    username: String,
}

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn follow(&self, edge: FollowEdge) -> Result<bool, RepoError> {
        // Concurrent duplicates are absorbed by the unique constraint.
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, author_id) DO NOTHING
            "#,
        )
        .bind(edge.follower())
        .bind(edge.author())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower: UserId, author: UserId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND author_id = $2")
            .bind(follower)
            .bind(author)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower: UserId, author: UserId) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND author_id = $2)",
        )
        .bind(follower)
        .bind(author)
        .fetch_one(self.pool())
        .await
        .map_err(RepoError::from_persistence)
    }

    async fn list_following(&self, follower: UserId) -> Result<Vec<UserSummary>, RepoError> {
        let rows = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT u.id, u.username
            FROM follows f
            INNER JOIN users u ON u.id = f.author_id
            WHERE f.follower_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(follower)
        .fetch_all(self.pool())
        .await
        .map_err(RepoError::from_persistence)?;

        Ok(rows
            .into_iter()
            .map(|row| UserSummary {
                id: row.id,
                username: row.username,
            })
            .collect())
    }

    async fn count_followers(&self, author: UserId) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE author_id = $1")
            .bind(author)
            .fetch_one(self.pool())
            .await
            .map_err(RepoError::from_persistence)?;

        Self::convert_count(count)
    }
}
