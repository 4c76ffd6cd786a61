// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryInto;

use chrono::Utc;
use sqlx::{query, query_as};

use crate::auth::types::User;
use crate::db::errors::UserStorageError;
use crate::db::models::UserRow;
use crate::db::{is_unique_violation, to_db_timestamp, SqlStore};
use crate::scrolls::UserId;

const USER_COLUMNS: &str = "
    id,
    email,
    password_hash,
    display_name,
    email_verified,
    created_at,
    updated_at
";

fn into_user(row: UserRow) -> Result<User, UserStorageError> {
    row.try_into().map_err(UserStorageError::InvalidColumn)
}

/// Methods to interact with the `users` table in the database.
impl SqlStore {
    /// Registers a new account.
    ///
    /// The email address is lowercased before storage so `USER@x.com` and `user@x.com` hit the
    /// same unique constraint. Duplicate registrations surface as
    /// [`UserStorageError::DuplicateEmail`].
    pub async fn insert_user(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<User, UserStorageError> {
        let id = UserId::new();
        let email = email.trim().to_lowercase();
        let now = to_db_timestamp(&Utc::now());

        let result = query(
            "
            INSERT INTO
                users (
                    id,
                    email,
                    password_hash,
                    display_name,
                    email_verified,
                    created_at,
                    updated_at
                )
            VALUES
                ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(id.as_str())
        .bind(&email)
        .bind(password_hash)
        .bind(display_name)
        .bind(false)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => (),
            Err(err) if is_unique_violation(&err) => {
                return Err(UserStorageError::DuplicateEmail)
            }
            Err(err) => return Err(UserStorageError::TransactionFailed(err.to_string())),
        }

        self.get_user(&id)
            .await?
            .ok_or_else(|| UserStorageError::TransactionFailed("user insert lost".into()))
    }

    /// Returns a user by id.
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, UserStorageError> {
        let row = query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_user).transpose()
    }

    /// Returns a user by email address, matched case-insensitively.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, UserStorageError> {
        let row = query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_user).transpose()
    }

    /// Marks a user's email address as verified.
    pub async fn set_email_verified(&self, id: &UserId) -> Result<(), UserStorageError> {
        query("UPDATE users SET email_verified = $1, updated_at = $2 WHERE id = $3")
            .bind(true)
            .bind(to_db_timestamp(&Utc::now()))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Replaces a user's password hash.
    pub async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<(), UserStorageError> {
        query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(to_db_timestamp(&Utc::now()))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Deletes an account while preserving published scrolls for the scholarly record.
    ///
    /// Sessions and the user row go away, the user's scrolls merely lose their owner
    /// reference.
    pub async fn delete_user(&self, id: &UserId) -> Result<(), UserStorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        query("DELETE FROM sessions WHERE user_id = $1")
            .bind(id.as_str())
            .execute(&mut tx)
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        query("DELETE FROM tokens WHERE user_id = $1")
            .bind(id.as_str())
            .execute(&mut tx)
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        query("UPDATE scrolls SET user_id = NULL WHERE user_id = $1")
            .bind(id.as_str())
            .execute(&mut tx)
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        query("DELETE FROM users WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut tx)
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        tx.commit()
            .await
            .map_err(|err| UserStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::db::errors::UserStorageError;
    use crate::test_utils::{add_subject, add_user, test_draft, test_runner, TestPress};

    #[test]
    fn email_uniqueness_is_case_insensitive() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;

            store
                .insert_user("user@x.com", "hash", "First")
                .await
                .unwrap();

            let result = store.insert_user("USER@x.com", "hash", "Second").await;
            assert!(matches!(result, Err(UserStorageError::DuplicateEmail)));

            // Lookup matches independent of case too
            let found = store.get_user_by_email("UsEr@X.cOm").await.unwrap();
            assert_eq!(found.unwrap().display_name, "First");
        });
    }

    #[test]
    fn new_accounts_start_unverified() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;

            let user = store
                .insert_user("fresh@example.org", "hash", "Fresh")
                .await
                .unwrap();
            assert!(!user.email_verified);

            store.set_email_verified(&user.id).await.unwrap();
            let verified = store.get_user(&user.id).await.unwrap().unwrap();
            assert!(verified.email_verified);
        });
    }

    #[test]
    fn deleting_an_account_preserves_published_scrolls() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "leaving@example.org", "secret", "Leaving").await;
            let subject = add_subject(store, "History").await;

            let scroll = store
                .insert_draft(&test_draft(&user, &subject, "<html><body>Archives</body></html>"))
                .await
                .unwrap();
            store.publish_scroll(&scroll.id, Utc::now()).await.unwrap();

            store.delete_user(&user.id).await.unwrap();

            assert!(store.get_user(&user.id).await.unwrap().is_none());
            let orphaned = store.get_scroll(&scroll.id).await.unwrap().unwrap();
            assert_eq!(orphaned.user_id, None);
            assert!(orphaned.is_published());
        });
    }
}
