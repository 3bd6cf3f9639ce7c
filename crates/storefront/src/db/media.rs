//! Media library repository.

use sqlx::PgPool;

use gerinmah_core::MediaId;

use super::{RepositoryError, map_constraint};
use crate::models::MediaItem;

const MEDIA_COLUMNS: &str =
    "id, filename, original_name, mime_type, size_bytes, url, alt_text, created_at";

/// Metadata for a stored upload.
#[derive(Debug, Clone)]
pub struct NewMedia<'s> {
    pub filename: &'s str,
    pub original_name: &'s str,
    pub mime_type: &'s str,
    pub size_bytes: i64,
    pub url: &'s str,
    pub alt_text: Option<&'s str>,
}

pub struct MediaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MediaRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<MediaItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, MediaItem>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_library ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the stored filename is already tracked.
    pub async fn create(&self, media: &NewMedia<'_>) -> Result<MediaItem, RepositoryError> {
        sqlx::query_as::<_, MediaItem>(&format!(
            "INSERT INTO media_library (filename, original_name, mime_type, size_bytes, url, alt_text)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(media.filename)
        .bind(media.original_name)
        .bind(media.mime_type)
        .bind(media.size_bytes)
        .bind(media.url)
        .bind(media.alt_text)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "media file"))
    }

    /// Remove the row and return it so the caller can delete the files.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn delete(&self, id: MediaId) -> Result<MediaItem, RepositoryError> {
        sqlx::query_as::<_, MediaItem>(&format!(
            "DELETE FROM media_library WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
