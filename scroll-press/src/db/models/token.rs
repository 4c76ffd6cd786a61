// SPDX-License-Identifier: AGPL-3.0-or-later

use sqlx::FromRow;

/// Representation of a row from the `tokens` table as stored in the database.
///
/// Holds single-use bearer tokens for email verification and password resets. Only the SHA-256
/// hash of a token is stored, the plain value leaves the system exactly once inside an email.
#[derive(FromRow, Debug, Clone)]
pub struct TokenRow {
    pub id: String,

    pub user_id: String,

    /// SHA-256 hex digest of the plain token.
    pub token: String,

    pub token_type: String,

    pub created_at: String,

    pub expires_at: String,

    /// Consumption marker, set exactly once.
    pub used_at: Option<String>,
}
