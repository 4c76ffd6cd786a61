// SPDX-License-Identifier: AGPL-3.0-or-later

//! Serializable view structs handed into templates and the JSON API.
use std::collections::HashMap;

use serde::Serialize;

use crate::auth::User;
use crate::doi::render_doi_badge;
use crate::scrolls::{Scroll, Subject};

/// The slice of a user account templates are allowed to see.
#[derive(Serialize, Debug, Clone)]
pub struct UserView {
    pub display_name: String,
    pub email: String,
    pub email_verified: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
        }
    }
}

/// A subject entry for dropdowns and browse filters.
#[derive(Serialize, Debug, Clone)]
pub struct SubjectView {
    pub id: String,
    pub name: String,
}

impl From<&Subject> for SubjectView {
    fn from(subject: &Subject) -> Self {
        Self {
            id: subject.id.to_string(),
            name: subject.name.clone(),
        }
    }
}

/// A scroll card in listings and partial fragments.
#[derive(Serialize, Debug, Clone)]
pub struct ScrollCard {
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url_hash: String,
    pub subject_name: String,
    pub doi_badge: String,
}

impl ScrollCard {
    pub fn new(scroll: &Scroll, subject_names: &HashMap<String, String>) -> Self {
        Self {
            title: scroll.title.clone(),
            authors: scroll.authors.clone(),
            abstract_text: scroll.abstract_text.clone(),
            url_hash: scroll.url_hash.clone().unwrap_or_default(),
            subject_name: subject_names
                .get(scroll.subject_id.as_str())
                .cloned()
                .unwrap_or_default(),
            doi_badge: render_doi_badge(scroll.doi.as_deref(), scroll.doi_status, true),
        }
    }
}

/// Full scroll view for the reading page.
#[derive(Serialize, Debug, Clone)]
pub struct ScrollView {
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub html_content: String,
    pub license: String,
    pub subject_name: String,
    pub url_hash: String,
}

/// A published scroll in the JSON API.
#[derive(Serialize, Debug, Clone)]
pub struct ApiScroll {
    pub id: String,
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub url_hash: Option<String>,
    pub license: String,
    pub doi: Option<String>,
    pub doi_status: Option<String>,
    pub published_at: Option<String>,
}

impl From<&Scroll> for ApiScroll {
    fn from(scroll: &Scroll) -> Self {
        Self {
            id: scroll.id.to_string(),
            title: scroll.title.clone(),
            authors: scroll.authors.clone(),
            abstract_text: scroll.abstract_text.clone(),
            keywords: scroll.keywords.clone(),
            url_hash: scroll.url_hash.clone(),
            license: scroll.license.as_str().to_string(),
            doi: scroll.doi.clone(),
            doi_status: scroll.doi_status.map(|status| status.as_str().to_string()),
            published_at: scroll.published_at.map(|at| at.to_rfc3339()),
        }
    }
}
