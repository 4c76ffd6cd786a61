// SPDX-License-Identifier: AGPL-3.0-or-later

//! Single-use bearer tokens for email verification and password resets.
//!
//! The plain token only ever leaves the system inside an email link. The database stores its
//! SHA-256 digest, so a leaked table does not leak usable tokens.
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::db::errors::TokenStorageError;
use crate::db::SqlStore;
use crate::scrolls::UserId;

/// Email verification tokens stay valid for 24 hours.
const VERIFICATION_TTL_HOURS: i64 = 24;

/// Password reset tokens stay valid for 1 hour.
const RESET_TTL_HOURS: i64 = 1;

/// Purpose a token is scoped to. A verification token can not reset a password and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }

    fn ttl_hours(&self) -> i64 {
        match self {
            Self::EmailVerification => VERIFICATION_TTL_HOURS,
            Self::PasswordReset => RESET_TTL_HOURS,
        }
    }
}

/// Generates a cryptographically random URL-safe token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hashes a plain token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issues a fresh token for the user and returns the plain value to embed in an email link.
///
/// Outstanding tokens of the same purpose are invalidated first so only the latest link works.
pub async fn issue_token(
    store: &SqlStore,
    user_id: &UserId,
    purpose: TokenPurpose,
) -> Result<String, TokenStorageError> {
    let now = Utc::now();
    store.invalidate_tokens(user_id, purpose, now).await?;

    let plain = generate_token();
    store
        .insert_token(
            user_id,
            &hash_token(&plain),
            purpose,
            now,
            now + Duration::hours(purpose.ttl_hours()),
        )
        .await?;

    Ok(plain)
}

/// Validates and consumes a token, returning the owning user id.
///
/// Returns `None` for unknown, expired, already used or wrongly scoped tokens. Consumption is
/// atomic, a token can not be redeemed twice.
pub async fn consume_token(
    store: &SqlStore,
    plain: &str,
    purpose: TokenPurpose,
) -> Result<Option<UserId>, TokenStorageError> {
    store
        .consume_token(&hash_token(plain), purpose, Utc::now())
        .await
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::db::SqlStore;
    use crate::test_utils::{add_user, initialize_db};

    use super::{consume_token, generate_token, hash_token, issue_token, TokenPurpose};

    #[test]
    fn token_hash_is_stable() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_eq!(hash_token(&token).len(), 64);
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn tokens_are_single_use() {
        let pool = initialize_db().await;
        let store = SqlStore::new(pool);
        let user = add_user(&store, "tokens@example.org", "secret", "Token User").await;

        let plain = issue_token(&store, &user.id, TokenPurpose::EmailVerification)
            .await
            .unwrap();

        // First redemption succeeds ..
        let redeemed = consume_token(&store, &plain, TokenPurpose::EmailVerification)
            .await
            .unwrap();
        assert_eq!(redeemed, Some(user.id.clone()));

        // .. the second does not
        let again = consume_token(&store, &plain, TokenPurpose::EmailVerification)
            .await
            .unwrap();
        assert_eq!(again, None);
    }

    #[tokio::test]
    async fn tokens_are_scoped_to_their_purpose() {
        let pool = initialize_db().await;
        let store = SqlStore::new(pool);
        let user = add_user(&store, "scoped@example.org", "secret", "Scoped").await;

        let plain = issue_token(&store, &user.id, TokenPurpose::PasswordReset)
            .await
            .unwrap();

        assert_eq!(
            consume_token(&store, &plain, TokenPurpose::EmailVerification)
                .await
                .unwrap(),
            None
        );
        assert!(consume_token(&store, &plain, TokenPurpose::PasswordReset)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let pool = initialize_db().await;
        let store = SqlStore::new(pool);
        let user = add_user(&store, "expired@example.org", "secret", "Expired").await;

        let plain = generate_token();
        let now = Utc::now();
        store
            .insert_token(
                &user.id,
                &hash_token(&plain),
                TokenPurpose::EmailVerification,
                now - Duration::hours(48),
                now - Duration::hours(24),
            )
            .await
            .unwrap();

        assert_eq!(
            consume_token(&store, &plain, TokenPurpose::EmailVerification)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn issuing_invalidates_previous_tokens() {
        let pool = initialize_db().await;
        let store = SqlStore::new(pool);
        let user = add_user(&store, "resend@example.org", "secret", "Resend").await;

        let first = issue_token(&store, &user.id, TokenPurpose::EmailVerification)
            .await
            .unwrap();
        let second = issue_token(&store, &user.id, TokenPurpose::EmailVerification)
            .await
            .unwrap();

        // Only the latest link works
        assert_eq!(
            consume_token(&store, &first, TokenPurpose::EmailVerification)
                .await
                .unwrap(),
            None
        );
        assert!(consume_token(&store, &second, TokenPurpose::EmailVerification)
            .await
            .unwrap()
            .is_some());
    }
}
