// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use sqlx::{query, query_as};

use crate::auth::token::TokenPurpose;
use crate::db::errors::TokenStorageError;
use crate::db::{to_db_timestamp, SqlStore};
use crate::scrolls::UserId;

/// Methods to interact with the `tokens` table in the database.
impl SqlStore {
    /// Inserts a single-use token. Only the hash of the plain token is stored.
    pub async fn insert_token(
        &self,
        user_id: &UserId,
        token_hash: &str,
        purpose: TokenPurpose,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), TokenStorageError> {
        query(
            "
            INSERT INTO
                tokens (
                    id,
                    user_id,
                    token,
                    token_type,
                    created_at,
                    expires_at
                )
            VALUES
                ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id.as_str())
        .bind(token_hash)
        .bind(purpose.as_str())
        .bind(to_db_timestamp(&created_at))
        .bind(to_db_timestamp(&expires_at))
        .execute(&self.pool)
        .await
        .map_err(|err| TokenStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Atomically consumes a valid token and returns the owning user id.
    ///
    /// The conditional UPDATE is the single-use guarantee: whichever request marks `used_at`
    /// first wins, every later attempt affects zero rows and gets `None`.
    pub async fn consume_token(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, TokenStorageError> {
        let now = to_db_timestamp(&now);

        let row = query_as::<_, (String, String)>(
            "
            SELECT
                id,
                user_id
            FROM
                tokens
            WHERE
                token = $1
                    AND token_type = $2
                    AND expires_at > $3
                    AND used_at IS NULL
            ",
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .bind(&now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| TokenStorageError::TransactionFailed(err.to_string()))?;

        let (id, user_id) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let result = query("UPDATE tokens SET used_at = $1 WHERE id = $2 AND used_at IS NULL")
            .bind(&now)
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|err| TokenStorageError::TransactionFailed(err.to_string()))?;

        if result.rows_affected() == 1 {
            Ok(Some(UserId::from(user_id)))
        } else {
            Ok(None)
        }
    }

    /// Invalidates all outstanding tokens of one purpose for a user.
    pub async fn invalidate_tokens(
        &self,
        user_id: &UserId,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<(), TokenStorageError> {
        query(
            "
            UPDATE
                tokens
            SET
                used_at = $1
            WHERE
                user_id = $2
                    AND token_type = $3
                    AND used_at IS NULL
            ",
        )
        .bind(to_db_timestamp(&now))
        .bind(user_id.as_str())
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| TokenStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }
}
