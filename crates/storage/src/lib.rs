use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, QueryBuilder, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Rating, VoteId, VoteTally};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Append-only store of like/dislike votes keyed by country display name.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn record_vote(&self, country_name: &str, rating: Rating) -> Result<VoteId>;

    /// Returns exactly one tally per distinct requested name. Names without
    /// votes map to an all-zero tally.
    async fn tally(&self, country_names: &[String]) -> Result<HashMap<String, VoteTally>>;

    async fn health_check(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[doc(hidden)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVote {
    pub vote_id: VoteId,
    pub country_name: String,
    pub rating: Rating,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open database '{database_url}'"))?;
        let storage = Self { pool };
        storage.ensure_ratings_table().await?;
        Ok(storage)
    }

    #[doc(hidden)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn ensure_ratings_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ratings (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                country_name TEXT NOT NULL,
                rating       BOOLEAN NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure ratings table exists")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ratings_country_name ON ratings (country_name)")
            .execute(&self.pool)
            .await
            .context("failed to ensure ratings index exists")?;

        Ok(())
    }

    #[doc(hidden)]
    pub async fn list_votes_for_country(&self, country_name: &str) -> Result<Vec<StoredVote>> {
        let rows = sqlx::query(
            "SELECT id, country_name, rating FROM ratings WHERE country_name = ? ORDER BY id ASC",
        )
        .bind(country_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let liked: bool = row.try_get("rating")?;
                Ok(StoredVote {
                    vote_id: VoteId(row.try_get("id")?),
                    country_name: row.try_get("country_name")?,
                    rating: if liked { Rating::Like } else { Rating::Dislike },
                })
            })
            .collect()
    }

    #[doc(hidden)]
    pub async fn count_votes(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count_to_u64(count))
    }
}

#[async_trait]
impl VoteStore for Storage {
    async fn record_vote(&self, country_name: &str, rating: Rating) -> Result<VoteId> {
        let rec = sqlx::query("INSERT INTO ratings (country_name, rating) VALUES (?, ?) RETURNING id")
            .bind(country_name)
            .bind(rating.is_like())
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to record vote for '{country_name}'"))?;
        Ok(VoteId(rec.get::<i64, _>(0)))
    }

    async fn tally(&self, country_names: &[String]) -> Result<HashMap<String, VoteTally>> {
        let mut tallies: HashMap<String, VoteTally> = country_names
            .iter()
            .map(|name| (name.clone(), VoteTally::default()))
            .collect();
        if tallies.is_empty() {
            return Ok(tallies);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT country_name, \
                    SUM(CASE WHEN rating = 1 THEN 1 ELSE 0 END) AS likes, \
                    SUM(CASE WHEN rating = 0 THEN 1 ELSE 0 END) AS dislikes \
             FROM ratings WHERE country_name IN (",
        );
        let mut names = query.separated(", ");
        for name in tallies.keys() {
            names.push_bind(name.clone());
        }
        names.push_unseparated(") GROUP BY country_name");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to tally votes")?;

        for row in rows {
            let name: String = row.try_get("country_name")?;
            let likes: Option<i64> = row.try_get("likes")?;
            let dislikes: Option<i64> = row.try_get("dislikes")?;
            if let Some(tally) = tallies.get_mut(&name) {
                tally.likes = count_to_u64(likes.unwrap_or(0));
                tally.dislikes = count_to_u64(dislikes.unwrap_or(0));
            }
        }

        Ok(tallies)
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path == ":memory:" {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
