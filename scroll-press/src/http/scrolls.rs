// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::extract::{Extension, Form, Multipart, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use log::info;
use serde::Deserialize;
use serde_json::json;
use tera::Context as TeraContext;

use crate::auth::{self, User};
use crate::bus::ServiceMessage;
use crate::db::errors::ScrollStorageError;
use crate::email::OutboundEmail;
use crate::http::context::HttpServiceContext;
use crate::http::errors::HttpError;
use crate::http::pages::{page_context, render, ListingQuery};
use crate::http::views::{ApiScroll, SubjectView};
use crate::scrolls::{
    self, upload::validate_html_content, License, NewScroll, Scroll, ScrollId, ScrollStatus,
    SubjectId, UploadError,
};

#[derive(Deserialize, Debug, Default, Clone)]
pub struct UploadForm {
    pub title: String,
    pub authors: String,
    pub subject_id: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: String,
    pub html_content: String,
    pub license: String,
    #[serde(default)]
    pub confirm_rights: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// What a validated upload turns into before touching the store.
struct ValidatedUpload {
    draft: NewScroll,
    publish: bool,
}

enum UploadOutcome {
    Created(Scroll),
    Rejected(String),
}

/// `GET /upload` Upload form, authenticated users only.
pub async fn handle_upload_page(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (mut context, user) = page_context(&ctx, &headers).await?;
    if user.is_none() {
        info!("Unauthenticated user redirected from upload page to login");
        return Ok(Redirect::to("/login").into_response());
    }

    insert_upload_form_context(&ctx, &mut context, &UploadForm::default()).await?;
    Ok(render("upload.html", &context)?.into_response())
}

async fn insert_upload_form_context(
    ctx: &HttpServiceContext,
    context: &mut TeraContext,
    form: &UploadForm,
) -> Result<(), HttpError> {
    let subjects = ctx.store().get_subjects().await?;
    context.insert(
        "subjects",
        &subjects.iter().map(SubjectView::from).collect::<Vec<_>>(),
    );

    // All field values except secrets come back on validation errors
    context.insert(
        "form",
        &json!({
            "title": form.title,
            "authors": form.authors,
            "subject_id": form.subject_id,
            "abstract": form.abstract_text,
            "keywords": form.keywords,
            "html_content": form.html_content,
            "license": form.license,
        }),
    );

    Ok(())
}

/// Checks form fields and assembles the content-addressed draft.
async fn validate_upload_form(
    ctx: &HttpServiceContext,
    user: &User,
    form: &UploadForm,
    raw_content: &str,
) -> Result<Result<ValidatedUpload, String>, HttpError> {
    let title = form.title.trim();
    let authors = form.authors.trim();
    let abstract_text = form.abstract_text.trim();

    if title.is_empty() {
        return Ok(Err("Title is required".into()));
    }
    if authors.is_empty() {
        return Ok(Err("Authors are required".into()));
    }
    if abstract_text.is_empty() {
        return Ok(Err("Abstract is required".into()));
    }
    if let Err(err) = validate_html_content(raw_content) {
        return Ok(Err(err.to_string()));
    }

    let license: License = match form.license.parse() {
        Ok(license) => license,
        Err(_) => {
            return Ok(Err(
                "License must be selected (CC BY 4.0 or All Rights Reserved)".into(),
            ))
        }
    };

    if form.confirm_rights.as_deref().map(str::to_lowercase) != Some("true".into()) {
        return Ok(Err(
            "You must confirm that you have the right to publish this content".into(),
        ));
    }

    let subject_id = SubjectId::from(form.subject_id.trim());
    if ctx.store().get_subject(&subject_id).await?.is_none() {
        return Ok(Err("Invalid subject selected".into()));
    }

    let keywords: Vec<String> = form
        .keywords
        .split(',')
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect();

    // Content-addressed identity: normalize first, then fingerprint
    let normalized = scrolls::normalize_line_endings(raw_content.trim());
    let content_hash = scrolls::content_hash(&normalized);
    let url_hash = scrolls::resolve_url_hash(ctx.store(), &content_hash).await?;

    Ok(Ok(ValidatedUpload {
        draft: NewScroll {
            user_id: user.id.clone(),
            subject_id,
            title: title.to_string(),
            authors: authors.to_string(),
            abstract_text: abstract_text.to_string(),
            keywords,
            html_content: normalized,
            original_filename: None,
            file_size: None,
            license,
            content_hash,
            url_hash,
        },
        publish: form.action.as_deref() != Some("draft"),
    }))
}

/// Stores the draft and optionally publishes it, translating duplicates into a user message.
async fn store_upload(
    ctx: &HttpServiceContext,
    user: &User,
    upload: ValidatedUpload,
) -> Result<UploadOutcome, HttpError> {
    let scroll = match ctx.store().insert_draft(&upload.draft).await {
        Ok(scroll) => scroll,
        Err(ScrollStorageError::DuplicateContent) => {
            return Ok(UploadOutcome::Rejected(
                "A scroll with identical content already exists".into(),
            ))
        }
        Err(ScrollStorageError::UrlHashTaken(_)) => {
            return Ok(UploadOutcome::Rejected(
                "A scroll with identical content already exists".into(),
            ))
        }
        Err(err) => return Err(err.into()),
    };

    if !upload.publish {
        return Ok(UploadOutcome::Created(scroll));
    }

    ctx.store()
        .publish_scroll(&scroll.id, chrono::Utc::now())
        .await?;
    let published = ctx
        .store()
        .get_scroll(&scroll.id)
        .await?
        .expect("scroll just inserted");

    announce_publication(ctx, user, &published);

    Ok(UploadOutcome::Created(published))
}

/// Emits bus messages for a freshly published scroll: DOI minting and the admin notification.
fn announce_publication(ctx: &HttpServiceContext, user: &User, scroll: &Scroll) {
    let _ = ctx
        .tx
        .send(ServiceMessage::ScrollPublished(scroll.id.clone()));
    let _ = ctx.tx.send(ServiceMessage::EmailRequested(
        OutboundEmail::AdminPublish {
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            title: scroll.title.clone(),
            url_hash: scroll.url_hash.clone().unwrap_or_default(),
        },
    ));
}

fn success_fragment(scroll: &Scroll) -> Result<Response, HttpError> {
    let mut context = TeraContext::new();

    if scroll.is_published() {
        context.insert("message", "Your scroll has been published successfully!");
        context.insert("status", "Published");
        context.insert("scroll_url", &scroll.permanent_url());
    } else {
        context.insert(
            "message",
            &format!("Draft '{}' has been saved successfully!", scroll.title),
        );
        context.insert("status", "Draft");
    }
    context.insert("title", &scroll.title);

    Ok(render("partials/upload_success.html", &context)?.into_response())
}

/// `POST /upload-form` Pasted-HTML upload, answered with an HTMX fragment.
pub async fn handle_upload_form(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
    Form(form): Form<UploadForm>,
) -> Result<Response, HttpError> {
    let (mut context, user) = page_context(&ctx, &headers).await?;
    let user = match user {
        Some(user) => user,
        None => return Ok(Redirect::to("/login").into_response()),
    };

    let outcome = match validate_upload_form(&ctx, &user, &form, &form.html_content).await? {
        Ok(upload) => store_upload(&ctx, &user, upload).await?,
        Err(message) => UploadOutcome::Rejected(message),
    };

    match outcome {
        UploadOutcome::Created(scroll) => success_fragment(&scroll),
        UploadOutcome::Rejected(error) => {
            insert_upload_form_context(&ctx, &mut context, &form).await?;
            context.insert("error", &error);
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                render("upload.html", &context)?,
            )
                .into_response())
        }
    }
}

/// `POST /upload/html` Multipart file upload, answered with JSON.
pub async fn handle_upload_html(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, HttpError> {
    let user = match auth::current_user(ctx.store(), &headers).await? {
        Some(user) => user,
        None => {
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Authentication required" })),
            )
                .into_response())
        }
    };

    let mut form = UploadForm {
        // File uploads always confirm rights through the form UI
        confirm_rights: Some("true".into()),
        ..UploadForm::default()
    };
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| HttpError::InternalError(err.into()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| HttpError::InternalError(err.into()))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| HttpError::InternalError(err.into()))?;
                match name.as_str() {
                    "title" => form.title = value,
                    "authors" => form.authors = value,
                    "subject_id" => form.subject_id = value,
                    "abstract" => form.abstract_text = value,
                    "keywords" => form.keywords = value,
                    "license" => form.license = value,
                    "action" => form.action = Some(value),
                    "confirm_rights" => form.confirm_rights = Some(value),
                    _ => (),
                }
            }
        }
    }

    let bytes = match file_bytes {
        Some(bytes) => bytes,
        None => return Ok(upload_rejection("An HTML file is required")),
    };

    // Size, encoding, extension and markup checks before any content processing
    let content = match scrolls::validate_upload(&bytes, filename.as_deref()) {
        Ok(content) => content,
        Err(err @ UploadError::TooLarge(_)) => {
            return Ok((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "success": false, "message": err.to_string() })),
            )
                .into_response())
        }
        Err(err) => return Ok(upload_rejection(&err.to_string())),
    };

    let outcome = match validate_upload_form(&ctx, &user, &form, &content).await? {
        Ok(mut upload) => {
            upload.draft.original_filename = filename;
            upload.draft.file_size = Some(bytes.len() as i64);
            store_upload(&ctx, &user, upload).await?
        }
        Err(message) => UploadOutcome::Rejected(message),
    };

    match outcome {
        UploadOutcome::Created(scroll) => Ok(Json(json!({
            "success": true,
            "scroll_id": scroll.id.to_string(),
            "title": scroll.title,
            "status": scroll.status.as_str(),
            "url_hash": scroll.url_hash,
            "scroll_url": scroll.permanent_url(),
            "message": if scroll.is_published() {
                "Scroll published successfully"
            } else {
                "Scroll saved as draft"
            },
        }))
        .into_response()),
        UploadOutcome::Rejected(message) => Ok(upload_rejection(&message)),
    }
}

fn upload_rejection(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}

/// `POST /scrolls/:id/publish` Publishes a draft, owner only.
pub async fn handle_publish_scroll(
    Extension(ctx): Extension<HttpServiceContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (mut context, user) = page_context(&ctx, &headers).await?;
    let user = match user {
        Some(user) => user,
        None => return Ok(Redirect::to("/login").into_response()),
    };

    let id = ScrollId::from(id);
    let scroll = ctx.store().get_scroll(&id).await?;

    let scroll = match scroll {
        Some(scroll) if scroll.user_id.as_ref() == Some(&user.id) => scroll,
        // Not yours or not there, the difference is nobody's business
        _ => return Err(HttpError::NotFound("Scroll not found")),
    };

    if scroll.status != ScrollStatus::Draft {
        context.insert("heading", "Not published");
        context.insert("message", "Only draft scrolls can be published.");
        context.insert("is_error", &true);
        return Ok((StatusCode::BAD_REQUEST, render("message.html", &context)?).into_response());
    }

    ctx.store().publish_scroll(&id, chrono::Utc::now()).await?;
    let published = ctx
        .store()
        .get_scroll(&id)
        .await?
        .expect("scroll just published");

    announce_publication(&ctx, &user, &published);

    success_fragment(&published)
}

/// `POST /scrolls/:id/discard` Discards a draft, owner only.
///
/// Editing happens as discard-and-resubmit, a draft is never mutated in place.
pub async fn handle_discard_scroll(
    Extension(ctx): Extension<HttpServiceContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let user = match auth::current_user(ctx.store(), &headers).await? {
        Some(user) => user,
        None => return Ok(Redirect::to("/login").into_response()),
    };

    let id = ScrollId::from(id);
    let scroll = match ctx.store().get_scroll(&id).await? {
        Some(scroll) if scroll.user_id.as_ref() == Some(&user.id) => scroll,
        _ => return Err(HttpError::NotFound("Scroll not found")),
    };

    if scroll.status != ScrollStatus::Draft {
        return Err(HttpError::NotFound("Scroll not found"));
    }

    ctx.store().discard_scroll(&id).await?;

    Ok(Redirect::to("/upload").into_response())
}

/// `GET /api/scrolls` JSON listing of published scrolls.
pub async fn handle_api_scrolls(
    Extension(ctx): Extension<HttpServiceContext>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<serde_json::Value>, HttpError> {
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

    let scrolls = ctx
        .store()
        .list_published_scrolls(subject, search, 100)
        .await?;

    Ok(Json(json!({
        "scrolls": scrolls.iter().map(ApiScroll::from).collect::<Vec<_>>(),
        "count": scrolls.len(),
    })))
}
