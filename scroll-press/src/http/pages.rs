// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::auth;
use crate::doi::render_doi_badge;
use crate::http::context::HttpServiceContext;
use crate::http::errors::HttpError;
use crate::http::templates::TEMPLATES;
use crate::http::views::{ScrollCard, ScrollView, SubjectView, UserView};

/// How many scrolls the landing page and the scrolls partial show.
pub const LISTING_LIMIT: i64 = 20;

#[derive(Deserialize, Debug, Default)]
pub struct ListingQuery {
    pub subject: Option<String>,
    pub search: Option<String>,
}

/// Renders a template into an HTML response.
pub fn render(template: &str, context: &TeraContext) -> Result<Html<String>, HttpError> {
    TEMPLATES
        .render(template, context)
        .map(Html)
        .map_err(|err| HttpError::InternalError(err.into()))
}

/// Base context for full-page templates: the current user under the key the layout expects.
pub async fn page_context(
    ctx: &HttpServiceContext,
    headers: &HeaderMap,
) -> Result<(TeraContext, Option<crate::auth::User>), HttpError> {
    let user = auth::current_user(ctx.store(), headers).await?;

    let mut context = TeraContext::new();
    context.insert("current_user", &user.as_ref().map(UserView::from));

    Ok((context, user))
}

/// Loads the scroll cards and subject list shared by the landing page and the partial.
pub async fn listing_context(
    ctx: &HttpServiceContext,
    query: &ListingQuery,
) -> Result<TeraContext, HttpError> {
    let subject = query
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty());

    let subjects = ctx.store().get_subjects().await?;
    let subject_names: HashMap<String, String> = subjects
        .iter()
        .map(|entry| (entry.id.to_string(), entry.name.clone()))
        .collect();

    let scrolls = ctx
        .store()
        .list_published_scrolls(subject, search, LISTING_LIMIT)
        .await?;
    let cards: Vec<ScrollCard> = scrolls
        .iter()
        .map(|scroll| ScrollCard::new(scroll, &subject_names))
        .collect();

    let mut context = TeraContext::new();
    context.insert("scrolls", &cards);
    context.insert(
        "subjects",
        &subjects.iter().map(SubjectView::from).collect::<Vec<_>>(),
    );
    context.insert("selected_subject", subject.unwrap_or(""));
    context.insert("search", search.unwrap_or(""));

    Ok(context)
}

/// `GET /` Landing page with subject browsing and search.
pub async fn handle_landing_page(
    Extension(ctx): Extension<HttpServiceContext>,
    Query(query): Query<ListingQuery>,
    headers: HeaderMap,
) -> Result<Html<String>, HttpError> {
    let (mut context, _) = page_context(&ctx, &headers).await?;
    context.extend(listing_context(&ctx, &query).await?);

    render("index.html", &context)
}

/// `GET /scroll/:url_hash` Permanent reading page of a published scroll.
pub async fn handle_view_scroll(
    Extension(ctx): Extension<HttpServiceContext>,
    Path(url_hash): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let scroll = match ctx.store().get_published_scroll(&url_hash).await? {
        Some(scroll) => scroll,
        None => return Err(HttpError::NotFound("Scroll not found")),
    };

    let subject_name = ctx
        .store()
        .get_subject(&scroll.subject_id)
        .await?
        .map(|subject| subject.name)
        .unwrap_or_default();

    let (mut context, _) = page_context(&ctx, &headers).await?;
    context.insert(
        "scroll",
        &ScrollView {
            title: scroll.title.clone(),
            authors: scroll.authors.clone(),
            abstract_text: scroll.abstract_text.clone(),
            html_content: scroll.html_content.clone(),
            license: scroll.license.as_str().to_string(),
            subject_name,
            url_hash,
        },
    );
    context.insert(
        "doi_badge",
        &render_doi_badge(scroll.doi.as_deref(), scroll.doi_status, false),
    );

    Ok(render("scroll.html", &context)?.into_response())
}

/// Fallback for unknown paths, renders the branded 404 page.
pub async fn handle_not_found() -> HttpError {
    HttpError::NotFound("This page does not exist")
}
