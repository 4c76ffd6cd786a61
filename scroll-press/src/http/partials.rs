// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fragment endpoints for HTMX partial swaps.
//!
//! Everything under `/partials/` answers with a self-contained fragment: status 200, no
//! redirects, no document chrome. A redirect here would make the client swap a full page into
//! a page subsection, nesting the whole application inside itself. Auth or verification
//! concerns must never short-circuit these routes.
use axum::extract::{Extension, Query};
use axum::response::Html;

use crate::http::context::HttpServiceContext;
use crate::http::errors::HttpError;
use crate::http::pages::{listing_context, render, ListingQuery};

/// `GET /partials/scrolls?subject=&search=` Scroll grid fragment.
pub async fn handle_scrolls_partial(
    Extension(ctx): Extension<HttpServiceContext>,
    Query(query): Query<ListingQuery>,
) -> Result<Html<String>, HttpError> {
    let context = listing_context(&ctx, &query).await?;
    render("partials/scrolls.html", &context)
}
