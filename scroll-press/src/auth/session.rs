// SPDX-License-Identifier: AGPL-3.0-or-later

//! Database-backed login sessions.
//!
//! A session is a random URL-safe token handed to the browser in the `session_id` cookie and
//! stored server-side with an expiry. Expired sessions are treated as absent and lazily removed
//! when encountered.
use chrono::{Duration, Utc};
use http::header::{HeaderMap, COOKIE};
use rand::RngCore;

use crate::auth::types::User;
use crate::db::errors::SessionStorageError;
use crate::db::SqlStore;
use crate::scrolls::UserId;

/// Name of the browser cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Sessions expire after 24 hours.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Generates a cryptographically random URL-safe session token.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Creates a new session for the user and returns its token.
pub async fn create_session(
    store: &SqlStore,
    user_id: &UserId,
) -> Result<String, SessionStorageError> {
    let session_id = generate_session_id();
    let now = Utc::now();

    store
        .insert_session(&session_id, user_id, now, now + Duration::hours(SESSION_TTL_HOURS))
        .await?;

    Ok(session_id)
}

/// Deletes a session, ending the login.
pub async fn delete_session(store: &SqlStore, session_id: &str) -> Result<(), SessionStorageError> {
    store.delete_session(session_id).await
}

/// Extracts the session token from a request's Cookie header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(COOKIE)?.to_str().ok()?;

    cookie_header.split(';').find_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(name), Some(value)) if name == SESSION_COOKIE && !value.is_empty() => {
                Some(value.to_string())
            }
            _ => None,
        }
    })
}

/// Returns the logged-in user for a request, if any.
pub async fn current_user(
    store: &SqlStore,
    headers: &HeaderMap,
) -> Result<Option<User>, SessionStorageError> {
    let session_id = match session_id_from_headers(headers) {
        Some(id) => id,
        None => return Ok(None),
    };

    store.get_user_by_session(&session_id, Utc::now()).await
}

/// Builds the Set-Cookie value which stores a session token in the browser.
pub fn session_cookie(session_id: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        SESSION_TTL_HOURS * 3600
    )
}

/// Builds the Set-Cookie value which removes the session cookie from the browser.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use http::header::{HeaderMap, HeaderValue, COOKIE};

    use crate::db::SqlStore;
    use crate::test_utils::{add_user, initialize_db};

    use super::{
        create_session, delete_session, current_user, generate_session_id,
        session_id_from_headers,
    };

    #[test]
    fn session_ids_are_unique_and_url_safe() {
        let first = generate_session_id();
        let second = generate_session_id();

        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc123".to_string()));

        let mut empty = HeaderMap::new();
        empty.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_id_from_headers(&empty), None);
    }

    #[tokio::test]
    async fn session_round_trip() {
        let pool = initialize_db().await;
        let store = SqlStore::new(pool);
        let user = add_user(&store, "login@example.org", "secret", "Login User").await;

        let session_id = create_session(&store, &user.id).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("session_id={}", session_id)).unwrap(),
        );

        let logged_in = current_user(&store, &headers).await.unwrap().unwrap();
        assert_eq!(logged_in.id, user.id);

        // Logout removes the session, the cookie no longer resolves to a user
        delete_session(&store, &session_id).await.unwrap();
        assert!(current_user(&store, &headers).await.unwrap().is_none());
    }
}
