// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::errors::ScrollStorageError;

/// Identifier of a scroll record.
///
/// Scrolls are identified by a random UUID next to their content-addressed `url_hash` since
/// drafts exist before any content hash is assigned permanently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrollId(String);

impl ScrollId {
    /// Generates a new random scroll id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScrollId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ScrollId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScrollId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScrollId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a registered user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a subject category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Publication state of a scroll.
///
/// A scroll starts its life as a `Draft` when a user uploads content. Publishing makes it
/// publicly visible. Editing a draft does not mutate it in place, instead the old row is marked
/// `Discarded` (releasing its content identity) and a new row is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStatus {
    Draft,
    Published,
    Discarded,
}

impl ScrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Discarded => "discarded",
        }
    }
}

impl FromStr for ScrollStatus {
    type Err = ScrollStorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "discarded" => Ok(Self::Discarded),
            _ => Err(ScrollStorageError::InvalidColumn(format!(
                "unknown scroll status '{}'",
                value
            ))),
        }
    }
}

impl Display for ScrollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of the asynchronous DOI registration for a published scroll.
///
/// Transitions are one-directional: `Pending` moves to either `Minted` or `Failed`, both of
/// which are terminal. Scrolls which predate the DOI feature carry no status at all
/// (`Option<DoiStatus>` is `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoiStatus {
    /// Registrar submission has been triggered but no outcome recorded yet.
    Pending,

    /// The registrar returned a DOI which is now persisted on the scroll.
    Minted,

    /// The registrar reported an error. No automatic retry, re-publishing is an external action.
    Failed,
}

impl DoiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Minted => "minted",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DoiStatus {
    type Err = ScrollStorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "minted" => Ok(Self::Minted),
            "failed" => Ok(Self::Failed),
            _ => Err(ScrollStorageError::InvalidColumn(format!(
                "unknown doi status '{}'",
                value
            ))),
        }
    }
}

impl Display for DoiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// License under which a scroll is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum License {
    /// Creative Commons Attribution 4.0.
    CcBy4,

    /// All rights reserved.
    AllRightsReserved,
}

impl License {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CcBy4 => "cc-by-4.0",
            Self::AllRightsReserved => "arr",
        }
    }

    /// Maps the scroll license onto the identifier the Zenodo registrar understands.
    pub fn registrar_id(&self) -> &'static str {
        match self {
            Self::CcBy4 => "cc-by-4.0",
            Self::AllRightsReserved => "other-open",
        }
    }
}

impl FromStr for License {
    type Err = ScrollStorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cc-by-4.0" => Ok(Self::CcBy4),
            "arr" => Ok(Self::AllRightsReserved),
            _ => Err(ScrollStorageError::InvalidColumn(format!(
                "unknown license '{}'",
                value
            ))),
        }
    }
}

impl Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subject category scrolls belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A scholarly document record.
#[derive(Debug, Clone)]
pub struct Scroll {
    pub id: ScrollId,
    pub user_id: Option<UserId>,
    pub subject_id: SubjectId,
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub html_content: String,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub license: License,
    pub status: ScrollStatus,
    pub content_hash: Option<String>,
    pub url_hash: Option<String>,
    pub doi: Option<String>,
    pub doi_status: Option<DoiStatus>,
    pub doi_minted_at: Option<DateTime<Utc>>,
    pub zenodo_deposit_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Scroll {
    /// Returns the permanent content-addressed URL path of this scroll.
    pub fn permanent_url(&self) -> Option<String> {
        self.url_hash.as_ref().map(|hash| format!("/scroll/{}", hash))
    }

    pub fn is_published(&self) -> bool {
        self.status == ScrollStatus::Published
    }

    /// Splits the comma-separated author field into individual names.
    pub fn author_names(&self) -> Vec<String> {
        self.authors
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Validated input for a new scroll draft, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewScroll {
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub html_content: String,
    pub original_filename: Option<String>,
    pub file_size: Option<i64>,
    pub license: License,
    pub content_hash: String,
    pub url_hash: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::{DoiStatus, License, ScrollStatus};

    #[rstest]
    #[case(ScrollStatus::Draft, "draft")]
    #[case(ScrollStatus::Published, "published")]
    #[case(ScrollStatus::Discarded, "discarded")]
    fn scroll_status_round_trips(#[case] status: ScrollStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(ScrollStatus::from_str(text).unwrap(), status);
    }

    #[rstest]
    #[case(DoiStatus::Pending, "pending")]
    #[case(DoiStatus::Minted, "minted")]
    #[case(DoiStatus::Failed, "failed")]
    fn doi_status_round_trips(#[case] status: DoiStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(DoiStatus::from_str(text).unwrap(), status);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(ScrollStatus::from_str("retracted").is_err());
        assert!(DoiStatus::from_str("").is_err());
    }

    #[test]
    fn license_maps_to_registrar_id() {
        assert_eq!(License::from_str("cc-by-4.0").unwrap(), License::CcBy4);
        assert_eq!(License::CcBy4.registrar_id(), "cc-by-4.0");
        assert_eq!(License::AllRightsReserved.registrar_id(), "other-open");
        assert!(License::from_str("gpl").is_err());
    }
}
