//! Site content, settings and footer repository.

use sqlx::PgPool;

use gerinmah_core::SiteContentId;

use super::RepositoryError;
use crate::models::{FooterSettings, FooterSettingsInput, SiteContent, SiteContentInput, SiteSetting};

const CONTENT_COLUMNS: &str =
    "id, section, key, value_mn, value_ru, value_en, created_at, updated_at";

const FOOTER_COLUMNS: &str = "about_mn, about_ru, about_en, phone, email, address, facebook_url, \
    instagram_url, copyright, updated_at";

/// Repository for CMS text blocks and settings.
pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List content blocks, optionally for one section.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, section: Option<&str>) -> Result<Vec<SiteContent>, RepositoryError> {
        let rows = sqlx::query_as::<_, SiteContent>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM site_content
             WHERE ($1::TEXT IS NULL OR section = $1)
             ORDER BY section, key"
        ))
        .bind(section)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert or replace the block at `(section, key)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, input: &SiteContentInput) -> Result<SiteContent, RepositoryError> {
        let row = sqlx::query_as::<_, SiteContent>(&format!(
            "INSERT INTO site_content (section, key, value_mn, value_ru, value_en)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (section, key) DO UPDATE
             SET value_mn = EXCLUDED.value_mn, value_ru = EXCLUDED.value_ru,
                 value_en = EXCLUDED.value_en, updated_at = NOW()
             RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(&input.section)
        .bind(&input.key)
        .bind(&input.value_mn)
        .bind(input.value_ru.as_deref())
        .bind(input.value_en.as_deref())
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the block does not exist.
    pub async fn delete(&self, id: SiteContentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM site_content WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_settings(&self) -> Result<Vec<SiteSetting>, RepositoryError> {
        let rows = sqlx::query_as::<_, SiteSetting>(
            "SELECT key, value, updated_at FROM site_settings ORDER BY key",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert or replace a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_setting(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<SiteSetting, RepositoryError> {
        let row = sqlx::query_as::<_, SiteSetting>(
            "INSERT INTO site_settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
             RETURNING key, value, updated_at",
        )
        .bind(key)
        .bind(value)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// The footer, if it has been saved at least once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn footer(&self) -> Result<Option<FooterSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, FooterSettings>(&format!(
            "SELECT {FOOTER_COLUMNS} FROM footer_settings WHERE id = 1"
        ))
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_footer(
        &self,
        input: &FooterSettingsInput,
    ) -> Result<FooterSettings, RepositoryError> {
        let row = sqlx::query_as::<_, FooterSettings>(&format!(
            "INSERT INTO footer_settings (id, about_mn, about_ru, about_en, phone, email, address,
                                          facebook_url, instagram_url, copyright)
             VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE
             SET about_mn = EXCLUDED.about_mn, about_ru = EXCLUDED.about_ru,
                 about_en = EXCLUDED.about_en, phone = EXCLUDED.phone, email = EXCLUDED.email,
                 address = EXCLUDED.address, facebook_url = EXCLUDED.facebook_url,
                 instagram_url = EXCLUDED.instagram_url, copyright = EXCLUDED.copyright,
                 updated_at = NOW()
             RETURNING {FOOTER_COLUMNS}"
        ))
        .bind(&input.about_mn)
        .bind(input.about_ru.as_deref())
        .bind(input.about_en.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(input.address.as_deref())
        .bind(input.facebook_url.as_deref())
        .bind(input.instagram_url.as_deref())
        .bind(input.copyright.as_deref())
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }
}
