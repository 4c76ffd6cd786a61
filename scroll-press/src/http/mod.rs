// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP surface: full pages, HTMX fragments and the JSON API.
mod auth;
mod context;
mod errors;
mod pages;
mod partials;
mod scrolls;
mod service;
mod templates;
mod views;

pub use context::HttpServiceContext;
pub use service::{build_server, http_service};
