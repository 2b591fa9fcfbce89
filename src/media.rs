//! Media record persistence (Postgres).
//!
//! One record per published card. Records are created on publish and
//! deleted when superseded, never updated in place; the `author_ver` tag
//! tells later runs whether a card is still current.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("database connection failed: {0}")]
    Connect(sqlx::Error),
    #[error("query: {0}")]
    Query(sqlx::Error),
}

#[derive(Clone, Debug)]
pub struct MediaRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_ver: String,
    pub resource_id: String,
    pub product_id: String,
    pub url: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

pub struct MediaStore {
    pool: PgPool,
    author_id: Uuid,
    author_ver: String,
}

impl MediaStore {
    pub async fn connect(
        database_url: &str,
        author_id: Uuid,
        author_ver: String,
    ) -> Result<Self, MediaError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .map_err(MediaError::Connect)?;
        Ok(Self {
            pool,
            author_id,
            author_ver,
        })
    }

    pub fn author_id(&self) -> Uuid {
        self.author_id
    }

    pub fn author_ver(&self) -> &str {
        &self.author_ver
    }

    /// Every recorded author version tag for this identity under our
    /// author id, stale ones included.
    pub async fn author_versions(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Option<String>>, MediaError> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT author_ver FROM media WHERE author_id = $1 AND resource_id = $2",
        )
        .bind(self.author_id)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(MediaError::Query)
    }

    /// True iff at least one record exists and all of them carry the
    /// running author version.
    pub async fn is_current(&self, resource_id: &str) -> Result<bool, MediaError> {
        let versions = self.author_versions(resource_id).await?;
        Ok(all_current(&versions, &self.author_ver))
    }

    /// Remove the prior record for this (identity, filename), if any, so
    /// at most one live record exists per identity under our author.
    pub async fn delete(&self, resource_id: &str, name: &str) -> Result<(), MediaError> {
        sqlx::query("DELETE FROM media WHERE author_id = $1 AND resource_id = $2 AND name = $3")
            .bind(self.author_id)
            .bind(resource_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(MediaError::Query)?;
        Ok(())
    }

    pub async fn create(&self, record: &MediaRecord) -> Result<(), MediaError> {
        sqlx::query(
            "INSERT INTO media (id, author_id, author_ver, resource_id, product_id, url, name, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(record.author_id)
        .bind(&record.author_ver)
        .bind(&record.resource_id)
        .bind(&record.product_id)
        .bind(&record.url)
        .bind(&record.name)
        .bind(&record.description)
        .execute(&self.pool)
        .await
        .map_err(MediaError::Query)?;
        Ok(())
    }
}

/// Staleness rule: regenerate unless some records exist and every one of
/// them is tagged with the running version.
pub(crate) fn all_current(versions: &[Option<String>], current: &str) -> bool {
    !versions.is_empty()
        && versions
            .iter()
            .all(|v| v.as_deref() == Some(current))
}

#[cfg(test)]
mod tests {
    use super::all_current;

    fn tags(v: &[&str]) -> Vec<Option<String>> {
        v.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn no_records_means_not_current() {
        assert!(!all_current(&[], "1.2.0"));
    }

    #[test]
    fn single_matching_record_is_current() {
        assert!(all_current(&tags(&["1.2.0"]), "1.2.0"));
    }

    #[test]
    fn any_stale_record_forces_regeneration() {
        assert!(!all_current(&tags(&["1.2.0", "1.1.0"]), "1.2.0"));
    }

    #[test]
    fn untagged_record_counts_as_stale() {
        assert!(!all_current(&[None, Some("1.2.0".into())], "1.2.0"));
    }
}
