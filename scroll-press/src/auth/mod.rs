// SPDX-License-Identifier: AGPL-3.0-or-later

//! Accounts, passwords, sessions and single-use tokens.
pub mod password;
pub mod session;
pub mod token;
pub mod types;

pub use password::{hash_password, verify_password};
pub use session::{
    clear_session_cookie, create_session, current_user, delete_session, session_cookie,
    session_id_from_headers, SESSION_COOKIE,
};
pub use token::{consume_token, issue_token, TokenPurpose};
pub use types::{Session, User};
