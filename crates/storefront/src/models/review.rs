//! Product review types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gerinmah_core::{ProductId, ReviewId, UserId};

use super::non_blank;

/// Longest accepted review comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 2_000;

/// A product review.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: Option<UserId>,
    pub author_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Review submission. The author comes from the session.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i16,
    pub comment: Option<String>,
}

impl ReviewInput {
    /// # Errors
    ///
    /// Returns a message if the rating is outside 1..=5 or the comment is too long.
    pub fn normalize(mut self) -> Result<Self, String> {
        if !(1..=5).contains(&self.rating) {
            return Err("rating must be between 1 and 5".to_string());
        }
        self.comment = non_blank(self.comment);
        if self
            .comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
        {
            return Err(format!("comment must be at most {MAX_COMMENT_CHARS} characters"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_input_bounds() {
        let ok = ReviewInput {
            rating: 5,
            comment: Some(" Маш шинэхэн мах ".to_string()),
        };
        assert_eq!(ok.normalize().map(|r| r.comment), Ok(Some("Маш шинэхэн мах".to_string())));

        assert!(ReviewInput { rating: 0, comment: None }.normalize().is_err());
        assert!(ReviewInput { rating: 6, comment: None }.normalize().is_err());
        assert!(
            ReviewInput {
                rating: 3,
                comment: Some("я".repeat(MAX_COMMENT_CHARS + 1)),
            }
            .normalize()
            .is_err()
        );
    }
}
