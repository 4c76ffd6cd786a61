// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryFrom;
use std::str::FromStr;

use sqlx::FromRow;

use crate::db::parse_db_timestamp;
use crate::scrolls::{DoiStatus, License, Scroll, ScrollId, ScrollStatus, SubjectId, UserId};

/// Representation of a row from the `scrolls` table as stored in the database.
#[derive(FromRow, Debug, Clone)]
pub struct ScrollRow {
    pub id: String,

    /// Owning user, NULL when the account was deleted while the scroll stays on record.
    pub user_id: Option<String>,

    pub subject_id: String,

    pub title: String,

    /// Comma-separated author names.
    pub authors: String,

    #[sqlx(rename = "abstract")]
    pub abstract_text: String,

    /// JSON array of keyword strings.
    pub keywords: Option<String>,

    /// Normalized HTML content.
    pub html_content: String,

    pub original_filename: Option<String>,

    pub file_size: Option<i64>,

    pub license: String,

    pub status: String,

    /// Full SHA-256 fingerprint, NULL for rows predating content addressing.
    pub content_hash: Option<String>,

    /// Short public path segment derived from `content_hash`.
    pub url_hash: Option<String>,

    pub doi: Option<String>,

    pub doi_status: Option<String>,

    pub doi_minted_at: Option<String>,

    pub zenodo_deposit_id: Option<i64>,

    pub created_at: String,

    pub updated_at: String,

    pub published_at: Option<String>,
}

impl TryFrom<ScrollRow> for Scroll {
    type Error = String;

    fn try_from(row: ScrollRow) -> Result<Self, Self::Error> {
        let keywords = match &row.keywords {
            Some(json) => serde_json::from_str(json)
                .map_err(|err| format!("invalid keywords column: {}", err))?,
            None => Vec::new(),
        };

        let doi_status = row
            .doi_status
            .as_deref()
            .map(DoiStatus::from_str)
            .transpose()
            .map_err(|err| err.to_string())?;

        Ok(Scroll {
            id: ScrollId::from(row.id),
            user_id: row.user_id.map(UserId::from),
            subject_id: SubjectId::from(row.subject_id),
            title: row.title,
            authors: row.authors,
            abstract_text: row.abstract_text,
            keywords,
            html_content: row.html_content,
            original_filename: row.original_filename,
            file_size: row.file_size,
            license: License::from_str(&row.license).map_err(|err| err.to_string())?,
            status: ScrollStatus::from_str(&row.status).map_err(|err| err.to_string())?,
            content_hash: row.content_hash,
            url_hash: row.url_hash,
            doi: row.doi,
            doi_status,
            doi_minted_at: row
                .doi_minted_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            zenodo_deposit_id: row.zenodo_deposit_id,
            created_at: parse_db_timestamp(&row.created_at)?,
            updated_at: parse_db_timestamp(&row.updated_at)?,
            published_at: row
                .published_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
        })
    }
}
