//! Delivery calendar types and pricing rules.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gerinmah_core::NonDeliveryDayId;

use super::non_blank;

/// Ulaanbaatar is UTC+8 all year.
const SHOP_UTC_OFFSET_SECS: i32 = 8 * 60 * 60;

/// Singleton delivery settings row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySettings {
    pub delivery_fee: Decimal,
    pub free_delivery_threshold: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub cutoff_hour: i16,
    pub updated_at: DateTime<Utc>,
}

/// Why a delivery date or basket was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryRejection {
    DateInPast,
    PastCutoff,
    BelowMinimum(Decimal),
}

impl DeliverySettings {
    /// Delivery fee for a basket subtotal.
    #[must_use]
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_delivery_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.delivery_fee,
        }
    }

    /// Order total including delivery.
    ///
    /// # Errors
    ///
    /// Rejects subtotals below the minimum order amount.
    pub fn total_for(&self, subtotal: Decimal) -> Result<Decimal, DeliveryRejection> {
        if subtotal < self.min_order_amount {
            return Err(DeliveryRejection::BelowMinimum(self.min_order_amount));
        }
        Ok(subtotal + self.fee_for(subtotal))
    }

    /// Check a requested delivery date against the clock.
    ///
    /// Same-day delivery is only accepted before the cutoff hour, shop time.
    ///
    /// # Errors
    ///
    /// Returns the reason the date cannot be served.
    pub fn check_date(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<(), DeliveryRejection> {
        let local = now.with_timezone(&shop_offset());
        let today = local.date_naive();
        if date < today {
            return Err(DeliveryRejection::DateInPast);
        }
        if date == today && i64::from(local.hour()) >= i64::from(self.cutoff_hour) {
            return Err(DeliveryRejection::PastCutoff);
        }
        Ok(())
    }
}

fn shop_offset() -> FixedOffset {
    FixedOffset::east_opt(SHOP_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Update payload for the delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySettingsInput {
    pub delivery_fee: Decimal,
    pub free_delivery_threshold: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub cutoff_hour: i16,
}

impl DeliverySettingsInput {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.delivery_fee.is_sign_negative() || self.min_order_amount.is_sign_negative() {
            return Err("amounts must not be negative".to_string());
        }
        if self
            .free_delivery_threshold
            .is_some_and(|t| t.is_sign_negative())
        {
            return Err("freeDeliveryThreshold must not be negative".to_string());
        }
        if !(0..=23).contains(&self.cutoff_hour) {
            return Err("cutoffHour must be between 0 and 23".to_string());
        }
        Ok(())
    }
}

/// A date on which no deliveries are made.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NonDeliveryDay {
    pub id: NonDeliveryDayId,
    pub day: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonDeliveryDayInput {
    pub day: NaiveDate,
    pub reason: Option<String>,
}

impl NonDeliveryDayInput {
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.reason = non_blank(self.reason);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn settings() -> DeliverySettings {
        DeliverySettings {
            delivery_fee: Decimal::new(5000, 0),
            free_delivery_threshold: Some(Decimal::new(100_000, 0)),
            min_order_amount: Decimal::new(20_000, 0),
            cutoff_hour: 14,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fee_waived_above_threshold() {
        let s = settings();
        assert_eq!(s.fee_for(Decimal::new(99_999, 0)), Decimal::new(5000, 0));
        assert_eq!(s.fee_for(Decimal::new(100_000, 0)), Decimal::ZERO);
    }

    #[test]
    fn test_total_enforces_minimum() {
        let s = settings();
        assert_eq!(
            s.total_for(Decimal::new(19_999, 0)),
            Err(DeliveryRejection::BelowMinimum(Decimal::new(20_000, 0)))
        );
        assert_eq!(
            s.total_for(Decimal::new(30_000, 0)).unwrap(),
            Decimal::new(35_000, 0)
        );
    }

    #[test]
    fn test_check_date_uses_shop_time_cutoff() {
        let s = settings();
        // 05:00 UTC is 13:00 in Ulaanbaatar
        let before_cutoff = Utc.with_ymd_and_hms(2026, 11, 2, 5, 0, 0).unwrap();
        // 07:00 UTC is 15:00 in Ulaanbaatar
        let after_cutoff = Utc.with_ymd_and_hms(2026, 11, 2, 7, 0, 0).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();

        assert!(s.check_date(today, before_cutoff).is_ok());
        assert_eq!(s.check_date(today, after_cutoff), Err(DeliveryRejection::PastCutoff));
        assert!(s.check_date(tomorrow, after_cutoff).is_ok());
        assert_eq!(s.check_date(yesterday, before_cutoff), Err(DeliveryRejection::DateInPast));
    }

    #[test]
    fn test_check_date_rolls_over_at_local_midnight() {
        let s = settings();
        // 17:00 UTC on the 1st is already 01:00 on the 2nd in Ulaanbaatar
        let now = Utc.with_ymd_and_hms(2026, 11, 1, 17, 0, 0).unwrap();
        let first = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        assert_eq!(s.check_date(first, now), Err(DeliveryRejection::DateInPast));
    }

    #[test]
    fn test_settings_input_validate() {
        let input = DeliverySettingsInput {
            delivery_fee: Decimal::new(3000, 0),
            free_delivery_threshold: None,
            min_order_amount: Decimal::ZERO,
            cutoff_hour: 24,
        };
        assert!(input.validate().is_err());
    }
}
