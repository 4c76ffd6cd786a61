// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;

use sqlx::FromRow;

use crate::db::parse_db_timestamp;
use crate::scrolls::{Subject, SubjectId};

/// Representation of a row from the `subjects` table as stored in the database.
#[derive(FromRow, Debug, Clone)]
pub struct SubjectRow {
    pub id: String,

    pub name: String,

    pub description: Option<String>,

    pub created_at: String,
}

impl TryFrom<SubjectRow> for Subject {
    type Error = String;

    fn try_from(row: SubjectRow) -> Result<Self, Self::Error> {
        Ok(Subject {
            id: SubjectId::from(row.id),
            name: row.name,
            description: row.description,
            created_at: parse_db_timestamp(&row.created_at)?,
        })
    }
}
