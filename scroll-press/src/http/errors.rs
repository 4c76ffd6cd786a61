// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use log::error;
use tera::Context as TeraContext;

use crate::http::templates::TEMPLATES;

/// Error responses of the HTTP surface.
///
/// Everything renders a branded page, internals never leak to the client. Internal errors are
/// logged with their cause before being flattened to a generic 500.
#[derive(Debug)]
pub enum HttpError {
    NotFound(&'static str),
    InternalError(anyhow::Error),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::NotFound(message) => error_page(StatusCode::NOT_FOUND, message),
            HttpError::InternalError(err) => {
                error!("Internal error while handling request: {:#}", err);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
        }
    }
}

impl<E> From<E> for HttpError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        HttpError::InternalError(err.into())
    }
}

/// Renders the branded error page for a status code.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let mut context = TeraContext::new();
    context.insert(
        "status",
        &format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        ),
    );
    context.insert("message", message);

    match TEMPLATES.render("error.html", &context) {
        Ok(html) => (status, Html(html)).into_response(),
        // Rendering the error page itself failed, fall back to plain text
        Err(err) => {
            error!("Could not render error page: {}", err);
            (status, message.to_string()).into_response()
        }
    }
}
