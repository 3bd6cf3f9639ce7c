//! Bank account repository.
//!
//! While any account exists exactly one of them is the default. The partial
//! unique index `bank_accounts_single_default_idx` guarantees at most one;
//! the methods here keep it at least one.

use sqlx::{PgPool, Postgres, Transaction};

use gerinmah_core::BankAccountId;

use super::RepositoryError;
use crate::models::{BankAccount, BankAccountInput};

const ACCOUNT_COLUMNS: &str =
    "id, bank_name, account_number, account_holder, is_default, created_at";

pub struct BankAccountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BankAccountRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Default account first, then oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<BankAccount>, RepositoryError> {
        let rows = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bank_accounts ORDER BY is_default DESC, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The account shown for bank transfers, if any account exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_default(&self) -> Result<Option<BankAccount>, RepositoryError> {
        let row = sqlx::query_as::<_, BankAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE is_default"
        ))
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Add an account. The first account always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(&self, input: &BankAccountInput) -> Result<BankAccount, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_accounts(&mut tx).await?;

        let has_default: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM bank_accounts WHERE is_default)")
                .fetch_one(&mut *tx)
                .await?;
        let make_default = input.is_default || !has_default;
        if make_default {
            clear_default(&mut tx).await?;
        }

        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "INSERT INTO bank_accounts (bank_name, account_number, account_holder, is_default)
             VALUES ($1, $2, $3, $4)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&input.bank_name)
        .bind(&input.account_number)
        .bind(&input.account_holder)
        .bind(make_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Edit an account's details.
    ///
    /// `is_default = true` makes it the default. `false` is ignored for the
    /// current default; pick another account as default instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    pub async fn update(
        &self,
        id: BankAccountId,
        input: &BankAccountInput,
    ) -> Result<BankAccount, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_accounts(&mut tx).await?;

        if input.is_default {
            clear_default(&mut tx).await?;
        }

        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "UPDATE bank_accounts
             SET bank_name = $2, account_number = $3, account_holder = $4,
                 is_default = is_default OR $5
             WHERE id = $1
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.bank_name)
        .bind(&input.account_number)
        .bind(&input.account_holder)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        ensure_default(&mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Make one account the default, unsetting the previous default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist;
    /// the previous default is kept in that case.
    pub async fn set_default(&self, id: BankAccountId) -> Result<BankAccount, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_accounts(&mut tx).await?;

        clear_default(&mut tx).await?;
        let account = sqlx::query_as::<_, BankAccount>(&format!(
            "UPDATE bank_accounts SET is_default = TRUE WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(account)
    }

    /// Delete an account. If it was the default the oldest remaining account
    /// takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    pub async fn delete(&self, id: BankAccountId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_accounts(&mut tx).await?;

        let result = sqlx::query("DELETE FROM bank_accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        ensure_default(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Serialize default changes so two admins cannot race each other.
async fn lock_accounts(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("LOCK TABLE bank_accounts IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn clear_default(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE bank_accounts SET is_default = FALSE WHERE is_default")
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Promote the oldest account if none is the default.
async fn ensure_default(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE bank_accounts SET is_default = TRUE
         WHERE id = (SELECT MIN(id) FROM bank_accounts)
           AND NOT EXISTS (SELECT 1 FROM bank_accounts WHERE is_default)",
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}
