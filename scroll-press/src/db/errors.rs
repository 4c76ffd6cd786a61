// SPDX-License-Identifier: AGPL-3.0-or-later

/// `SqlStore` errors for the `scrolls` table.
#[derive(thiserror::Error, Debug)]
pub enum ScrollStorageError {
    /// Catch all error for failed queries and transactions.
    #[error("Error occured in scroll storage: {0}")]
    TransactionFailed(String),

    /// Error which originates in `insert_draft()` when the insertion fails.
    #[error("Error occured when inserting scroll {0} into storage")]
    InsertionFailed(String),

    /// Byte-identical content has already been uploaded.
    #[error("A scroll with identical content already exists")]
    DuplicateContent,

    /// The derived url hash is already claimed by different content.
    #[error("Url hash '{0}' is already taken")]
    UrlHashTaken(String),

    /// No free url hash prefix up to the maximum length, which should not occur with SHA-256.
    #[error("Could not resolve a unique url hash for content hash {0}")]
    UrlHashExhausted(String),

    /// A column value in the database could not be converted into its domain type.
    #[error("Invalid value stored in database: {0}")]
    InvalidColumn(String),
}

/// `SqlStore` errors for the `users` table.
#[derive(thiserror::Error, Debug)]
pub enum UserStorageError {
    #[error("Error occured in user storage: {0}")]
    TransactionFailed(String),

    /// An account with this email address already exists (case-insensitive).
    #[error("An account with this email address already exists")]
    DuplicateEmail,

    #[error("Invalid value stored in database: {0}")]
    InvalidColumn(String),
}

/// `SqlStore` errors for the `sessions` table.
#[derive(thiserror::Error, Debug)]
pub enum SessionStorageError {
    #[error("Error occured in session storage: {0}")]
    TransactionFailed(String),

    #[error("Invalid value stored in database: {0}")]
    InvalidColumn(String),
}

/// `SqlStore` errors for the `tokens` table.
#[derive(thiserror::Error, Debug)]
pub enum TokenStorageError {
    #[error("Error occured in token storage: {0}")]
    TransactionFailed(String),

    #[error("Invalid value stored in database: {0}")]
    InvalidColumn(String),
}

/// `SqlStore` errors for the `subjects` table.
#[derive(thiserror::Error, Debug)]
pub enum SubjectStorageError {
    #[error("Error occured in subject storage: {0}")]
    TransactionFailed(String),

    /// A subject with this name already exists.
    #[error("A subject named '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid value stored in database: {0}")]
    InvalidColumn(String),
}
