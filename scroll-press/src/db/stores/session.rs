// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryInto;

use chrono::{DateTime, Utc};
use sqlx::{query, query_as};

use crate::auth::types::{Session, User};
use crate::db::errors::SessionStorageError;
use crate::db::models::{SessionRow, UserRow};
use crate::db::{to_db_timestamp, SqlStore};
use crate::scrolls::UserId;

/// Methods to interact with the `sessions` table in the database.
impl SqlStore {
    /// Inserts a new login session.
    pub async fn insert_session(
        &self,
        session_id: &str,
        user_id: &UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionStorageError> {
        query(
            "
            INSERT INTO
                sessions (
                    session_id,
                    user_id,
                    created_at,
                    expires_at
                )
            VALUES
                ($1, $2, $3, $4)
            ",
        )
        .bind(session_id)
        .bind(user_id.as_str())
        .bind(to_db_timestamp(&created_at))
        .bind(to_db_timestamp(&expires_at))
        .execute(&self.pool)
        .await
        .map_err(|err| SessionStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Resolves a session token to its user.
    ///
    /// Expired sessions are treated as absent and removed on the way, the table does not need a
    /// separate cleanup job for interactive traffic.
    pub async fn get_user_by_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, SessionStorageError> {
        let row = query_as::<_, SessionRow>(
            "
            SELECT
                session_id,
                user_id,
                created_at,
                expires_at
            FROM
                sessions
            WHERE
                session_id = $1
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| SessionStorageError::TransactionFailed(err.to_string()))?;

        let session: Session = match row {
            Some(row) => row
                .try_into()
                .map_err(SessionStorageError::InvalidColumn)?,
            None => return Ok(None),
        };

        if session.is_expired(now) {
            self.delete_session(session_id).await?;
            return Ok(None);
        }

        let user_row = query_as::<_, UserRow>(
            "
            SELECT
                id,
                email,
                password_hash,
                display_name,
                email_verified,
                created_at,
                updated_at
            FROM
                users
            WHERE
                id = $1
            ",
        )
        .bind(session.user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| SessionStorageError::TransactionFailed(err.to_string()))?;

        user_row
            .map(|row| row.try_into().map_err(SessionStorageError::InvalidColumn))
            .transpose()
    }

    /// Deletes a single session.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionStorageError> {
        query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|err| SessionStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Deletes all sessions of a user, for example after a password reset.
    pub async fn delete_user_sessions(&self, user_id: &UserId) -> Result<(), SessionStorageError> {
        query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| SessionStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }
}
