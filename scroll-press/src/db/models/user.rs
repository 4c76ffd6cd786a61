// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use sqlx::FromRow;

use crate::auth::types::User;
use crate::db::parse_db_timestamp;
use crate::scrolls::UserId;

/// Representation of a row from the `users` table as stored in the database.
#[derive(FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: String,

    /// Stored lowercased so the UNIQUE constraint is case-insensitive in effect.
    pub email: String,

    pub password_hash: String,

    pub display_name: String,

    pub email_verified: bool,

    pub created_at: String,

    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = String;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from(row.id),
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            email_verified: row.email_verified,
            created_at: parse_db_timestamp(&row.created_at)?,
            updated_at: parse_db_timestamp(&row.updated_at)?,
        })
    }
}
