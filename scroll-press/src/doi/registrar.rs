// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};

use crate::scrolls::Scroll;

/// Metadata handed to the registrar when opening a deposit for a scroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub title: String,
    pub creators: Vec<String>,
    pub description: String,
    /// ISO date (YYYY-MM-DD) of publication.
    pub publication_date: String,
    pub keywords: Vec<String>,
    pub license_id: String,
}

impl DepositRequest {
    /// Builds the registrar metadata from a published scroll.
    pub fn from_scroll(scroll: &Scroll, published_at: DateTime<Utc>) -> Self {
        Self {
            title: scroll.title.clone(),
            creators: scroll.author_names(),
            description: scroll.abstract_text.clone(),
            publication_date: published_at.format("%Y-%m-%d").to_string(),
            keywords: scroll.keywords.clone(),
            license_id: scroll.license.registrar_id().to_string(),
        }
    }
}

/// A deposit opened at the registrar with a pre-reserved DOI, not yet published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedDeposit {
    pub deposit_id: i64,
    pub doi: String,
    /// Target for file uploads belonging to this deposit.
    pub bucket_url: String,
}

/// Outcome of a successfully published deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedDoi {
    pub doi: String,
    pub deposit_id: i64,
}

/// Error talking to the registrar, classified by whether a retry can help.
///
/// Rate limits and server errors are retryable, other client errors are not. The message never
/// contains credentials.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct RegistrarError {
    pub message: String,
    pub status_code: Option<u16>,
    pub retryable: bool,
}

impl RegistrarError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            retryable: false,
        }
    }
}

/// External DOI registrar collaborator.
///
/// The three-step shape (reserve, upload, publish) mirrors how registration actually proceeds
/// and lets the caller persist the reserved deposit in between, so a crash after registrar
/// success never silently drops a DOI. `resume_deposit` picks an interrupted registration back
/// up by its stored deposit id.
#[async_trait::async_trait]
pub trait DoiRegistrar: Send + Sync {
    /// Opens a new deposit with a pre-reserved DOI.
    async fn create_deposit(
        &self,
        request: &DepositRequest,
    ) -> Result<ReservedDeposit, RegistrarError>;

    /// Loads an existing deposit previously created by us.
    async fn resume_deposit(&self, deposit_id: i64) -> Result<ReservedDeposit, RegistrarError>;

    /// Uploads the document into the deposit's bucket.
    async fn upload_file(
        &self,
        deposit: &ReservedDeposit,
        filename: &str,
        content: &[u8],
    ) -> Result<(), RegistrarError>;

    /// Publishes the deposit, registering the DOI with the global resolver.
    async fn publish_deposit(&self, deposit_id: i64) -> Result<MintedDoi, RegistrarError>;
}
