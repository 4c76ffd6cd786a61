// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use sqlx::FromRow;

use crate::auth::types::Session;
use crate::db::parse_db_timestamp;
use crate::scrolls::UserId;

/// Representation of a row from the `sessions` table as stored in the database.
#[derive(FromRow, Debug, Clone)]
pub struct SessionRow {
    pub session_id: String,

    pub user_id: String,

    pub created_at: String,

    pub expires_at: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = String;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            session_id: row.session_id,
            user_id: UserId::from(row.user_id),
            created_at: parse_db_timestamp(&row.created_at)?,
            expires_at: parse_db_timestamp(&row.expires_at)?,
        })
    }
}
