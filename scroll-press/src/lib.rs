// SPDX-License-Identifier: AGPL-3.0-or-later

//! # scroll-press
//!
//! Publishing server for scholarly HTML documents ("scrolls"): account registration with email
//! verification, uploads with a draft to published workflow, content-addressed scroll identity
//! with deduplication, asynchronous DOI minting against Zenodo, subject browsing and search,
//! and HTMX fragment rendering.
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

mod auth;
mod bus;
mod config;
mod context;
mod db;
mod doi;
mod email;
mod http;
mod manager;
mod press;
mod scrolls;
mod worker;

#[cfg(test)]
mod test_utils;

pub use crate::config::{Configuration, SmtpConfiguration, ZenodoConfiguration};
pub use crate::press::Press;
