// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::auth::{self, User};
use crate::db::SqlStore;
use crate::doi::{
    DepositRequest, DoiRegistrar, MintedDoi, RegistrarError, ReservedDeposit,
};
use crate::scrolls::{self, License, NewScroll, Subject};

/// Registers a user with a hashed password.
pub async fn add_user(store: &SqlStore, email: &str, password: &str, display_name: &str) -> User {
    let password_hash = auth::hash_password(password).expect("Password hashes");

    store
        .insert_user(email, &password_hash, display_name)
        .await
        .expect("User inserts")
}

/// Creates a subject category.
pub async fn add_subject(store: &SqlStore, name: &str) -> Subject {
    store
        .insert_subject(name, None)
        .await
        .expect("Subject inserts")
}

/// Builds a valid content-addressed draft for the given HTML content.
///
/// The url hash is the plain 12 character prefix, tests needing collision handling go through
/// `resolve_url_hash` themselves.
pub fn test_draft(user: &User, subject: &Subject, html: &str) -> NewScroll {
    let normalized = scrolls::normalize_line_endings(html);
    let content_hash = scrolls::content_hash(&normalized);
    let url_hash = content_hash[..12].to_string();

    NewScroll {
        user_id: user.id.clone(),
        subject_id: subject.id.clone(),
        title: "A Modest Scroll".into(),
        authors: "A. Uthor, B. Writer".into(),
        abstract_text: "An abstract about the content of this scroll.".into(),
        keywords: vec!["testing".into()],
        html_content: normalized,
        original_filename: None,
        file_size: None,
        license: License::CcBy4,
        content_hash,
        url_hash,
    }
}

/// Registers a user through the HTTP surface and returns the session cookie value.
pub async fn login_session(store: &SqlStore, user: &User) -> String {
    let session_id = auth::create_session(store, &user.id)
        .await
        .expect("Session inserts");

    format!("session_id={}", session_id)
}

enum MockBehaviour {
    Succeed { doi: String, deposit_id: i64 },
    Fail { message: String },
}

/// Scriptable registrar double counting how it was used.
#[derive(Clone)]
pub struct MockRegistrar {
    behaviour: Arc<MockBehaviour>,
    created: Arc<AtomicUsize>,
    resumed: Arc<AtomicUsize>,
    published: Arc<AtomicUsize>,
}

impl MockRegistrar {
    /// Registrar which reserves and publishes the given DOI.
    pub fn succeeding(doi: &str, deposit_id: i64) -> Self {
        Self::new(MockBehaviour::Succeed {
            doi: doi.to_string(),
            deposit_id,
        })
    }

    /// Registrar whose every call fails fatally.
    pub fn failing(message: &str) -> Self {
        Self::new(MockBehaviour::Fail {
            message: message.to_string(),
        })
    }

    fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour: Arc::new(behaviour),
            created: Arc::new(AtomicUsize::new(0)),
            resumed: Arc::new(AtomicUsize::new(0)),
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created_deposits(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn resumed_deposits(&self) -> usize {
        self.resumed.load(Ordering::Relaxed)
    }

    pub fn published_deposits(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    fn deposit(&self) -> Result<ReservedDeposit, RegistrarError> {
        match &*self.behaviour {
            MockBehaviour::Succeed { doi, deposit_id } => Ok(ReservedDeposit {
                deposit_id: *deposit_id,
                doi: doi.clone(),
                bucket_url: format!("mock://bucket/{}", deposit_id),
            }),
            MockBehaviour::Fail { message } => Err(RegistrarError::fatal(message.clone())),
        }
    }
}

#[async_trait::async_trait]
impl DoiRegistrar for MockRegistrar {
    async fn create_deposit(
        &self,
        _request: &DepositRequest,
    ) -> Result<ReservedDeposit, RegistrarError> {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.deposit()
    }

    async fn resume_deposit(&self, _deposit_id: i64) -> Result<ReservedDeposit, RegistrarError> {
        self.resumed.fetch_add(1, Ordering::Relaxed);
        self.deposit()
    }

    async fn upload_file(
        &self,
        _deposit: &ReservedDeposit,
        _filename: &str,
        _content: &[u8],
    ) -> Result<(), RegistrarError> {
        match &*self.behaviour {
            MockBehaviour::Succeed { .. } => Ok(()),
            MockBehaviour::Fail { message } => Err(RegistrarError::fatal(message.clone())),
        }
    }

    async fn publish_deposit(&self, deposit_id: i64) -> Result<MintedDoi, RegistrarError> {
        self.published.fetch_add(1, Ordering::Relaxed);

        match &*self.behaviour {
            MockBehaviour::Succeed { doi, .. } => Ok(MintedDoi {
                doi: doi.clone(),
                deposit_id,
            }),
            MockBehaviour::Fail { message } => Err(RegistrarError::fatal(message.clone())),
        }
    }
}
