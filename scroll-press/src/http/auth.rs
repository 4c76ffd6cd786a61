// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::extract::{Extension, Form, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tera::Context as TeraContext;

use crate::auth::{self, TokenPurpose};
use crate::bus::ServiceMessage;
use crate::db::errors::UserStorageError;
use crate::email::OutboundEmail;
use crate::http::context::HttpServiceContext;
use crate::http::errors::HttpError;
use crate::http::pages::{page_context, render};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, Debug)]
pub struct RegisterForm {
    display_name: String,
    email: String,
    password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize, Debug)]
pub struct TokenQuery {
    token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ForgotPasswordForm {
    email: String,
}

#[derive(Deserialize, Debug)]
pub struct ResetPasswordForm {
    token: String,
    password: String,
}

/// Sends a message onto the communication bus, ignoring the absence of subscribers.
fn notify(ctx: &HttpServiceContext, message: ServiceMessage) {
    let _ = ctx.tx.send(message);
}

/// Renders a form page again with an error message, preserving input except secrets.
fn form_error(
    template: &str,
    error: &str,
    fields: &[(&str, &str)],
) -> Result<Response, HttpError> {
    let mut context = TeraContext::new();
    context.insert("error", error);
    for (key, value) in fields {
        context.insert(*key, value);
    }

    Ok((StatusCode::UNPROCESSABLE_ENTITY, render(template, &context)?).into_response())
}

/// Redirect which also stores the session cookie.
fn redirect_with_session(target: &str, session_id: &str) -> Response {
    let mut response = Redirect::to(target).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        auth::session_cookie(session_id)
            .parse()
            .expect("valid cookie header"),
    );
    response
}

/// `GET /register`
pub async fn handle_register_page(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (context, user) = page_context(&ctx, &headers).await?;
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    Ok(render("register.html", &context)?.into_response())
}

/// `POST /register`
///
/// Creates the account, queues the verification email and logs the new user straight in.
pub async fn handle_register(
    Extension(ctx): Extension<HttpServiceContext>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, HttpError> {
    let display_name = form.display_name.trim();
    let email = form.email.trim();

    let preserved = [("display_name", display_name), ("email", email)];

    if display_name.is_empty() || email.is_empty() || !email.contains('@') {
        return form_error("register.html", "A display name and a valid email address are required", &preserved);
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return form_error(
            "register.html",
            "Password must be at least 8 characters long",
            &preserved,
        );
    }

    let password_hash = auth::hash_password(&form.password)?;

    let user = match ctx.store().insert_user(email, &password_hash, display_name).await {
        Ok(user) => user,
        Err(UserStorageError::DuplicateEmail) => {
            return form_error(
                "register.html",
                "An account with this email address already exists",
                &preserved,
            );
        }
        Err(err) => return Err(err.into()),
    };

    let token = auth::issue_token(ctx.store(), &user.id, TokenPurpose::EmailVerification).await?;
    notify(
        &ctx,
        ServiceMessage::EmailRequested(OutboundEmail::Verification {
            to: user.email.clone(),
            name: user.display_name.clone(),
            token,
        }),
    );
    notify(
        &ctx,
        ServiceMessage::EmailRequested(OutboundEmail::AdminSignup {
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            user_id: user.id.to_string(),
        }),
    );

    let session_id = auth::create_session(ctx.store(), &user.id).await?;
    Ok(redirect_with_session("/", &session_id))
}

/// `GET /login`
pub async fn handle_login_page(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (context, user) = page_context(&ctx, &headers).await?;

    // Authenticated users have no business on the login page
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    Ok(render("login.html", &context)?.into_response())
}

/// `POST /login`
pub async fn handle_login(
    Extension(ctx): Extension<HttpServiceContext>,
    Form(form): Form<LoginForm>,
) -> Result<Response, HttpError> {
    let email = form.email.trim();
    let user = ctx.store().get_user_by_email(email).await?;

    let user = match user {
        Some(user) if auth::verify_password(&form.password, &user.password_hash) => user,
        // Same message for unknown address and wrong password
        _ => return form_error("login.html", "Invalid email or password", &[("email", email)]),
    };

    let session_id = auth::create_session(ctx.store(), &user.id).await?;
    Ok(redirect_with_session("/", &session_id))
}

/// `POST /logout`
pub async fn handle_logout(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    if let Some(session_id) = auth::session_id_from_headers(&headers) {
        auth::delete_session(ctx.store(), &session_id).await?;
    }

    let mut response = Redirect::to("/").into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        auth::clear_session_cookie()
            .parse()
            .expect("valid cookie header"),
    );

    Ok(response)
}

/// `GET /verify-email?token=`
pub async fn handle_verify_email(
    Extension(ctx): Extension<HttpServiceContext>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (mut context, _) = page_context(&ctx, &headers).await?;

    let user_id = match query.token.as_deref() {
        Some(token) => {
            auth::consume_token(ctx.store(), token, TokenPurpose::EmailVerification).await?
        }
        None => None,
    };

    match user_id {
        Some(user_id) => {
            ctx.store().set_email_verified(&user_id).await?;

            context.insert("heading", "Email verified");
            context.insert("message", "Your email address has been verified. Welcome aboard!");
            context.insert("is_error", &false);
            context.insert("link_url", "/");
            context.insert("link_label", "Back to the homepage");
            Ok(render("message.html", &context)?.into_response())
        }
        None => {
            context.insert("heading", "Verification failed");
            context.insert(
                "message",
                "This verification link is invalid or has expired. You can request a new one from the homepage.",
            );
            context.insert("is_error", &true);
            Ok((StatusCode::BAD_REQUEST, render("message.html", &context)?).into_response())
        }
    }
}

/// `POST /resend-verification`
pub async fn handle_resend_verification(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (mut context, user) = page_context(&ctx, &headers).await?;

    let user = match user {
        Some(user) => user,
        None => return Ok(Redirect::to("/login").into_response()),
    };

    if !user.email_verified {
        let token =
            auth::issue_token(ctx.store(), &user.id, TokenPurpose::EmailVerification).await?;
        notify(
            &ctx,
            ServiceMessage::EmailRequested(OutboundEmail::Verification {
                to: user.email.clone(),
                name: user.display_name.clone(),
                token,
            }),
        );
    }

    context.insert("heading", "Verification email sent");
    context.insert(
        "message",
        "We sent a fresh verification link to your address. The previous link no longer works.",
    );
    context.insert("is_error", &false);
    Ok(render("message.html", &context)?.into_response())
}

/// `GET /forgot-password`
pub async fn handle_forgot_password_page(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
) -> Result<Html<String>, HttpError> {
    let (context, _) = page_context(&ctx, &headers).await?;
    render("forgot_password.html", &context)
}

/// `POST /forgot-password`
///
/// Always answers the same way so the form can not be used to probe which addresses exist.
pub async fn handle_forgot_password(
    Extension(ctx): Extension<HttpServiceContext>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, HttpError> {
    if let Some(user) = ctx.store().get_user_by_email(form.email.trim()).await? {
        let token = auth::issue_token(ctx.store(), &user.id, TokenPurpose::PasswordReset).await?;
        notify(
            &ctx,
            ServiceMessage::EmailRequested(OutboundEmail::PasswordReset {
                to: user.email.clone(),
                name: user.display_name.clone(),
                token,
            }),
        );
    }

    let mut context = TeraContext::new();
    context.insert("heading", "Check your inbox");
    context.insert(
        "message",
        "If an account exists for this address, a password reset link is on its way.",
    );
    context.insert("is_error", &false);
    Ok(render("message.html", &context)?.into_response())
}

/// `GET /reset-password?token=`
pub async fn handle_reset_password_page(
    Extension(ctx): Extension<HttpServiceContext>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (mut context, _) = page_context(&ctx, &headers).await?;

    match query.token {
        Some(token) if !token.is_empty() => {
            context.insert("token", &token);
            Ok(render("reset_password.html", &context)?.into_response())
        }
        _ => {
            context.insert("heading", "Reset failed");
            context.insert("message", "This password reset link is incomplete.");
            context.insert("is_error", &true);
            Ok((StatusCode::BAD_REQUEST, render("message.html", &context)?).into_response())
        }
    }
}

/// `POST /reset-password`
///
/// Consumes the single-use token, replaces the password and ends every existing session of the
/// account.
pub async fn handle_reset_password(
    Extension(ctx): Extension<HttpServiceContext>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, HttpError> {
    if form.password.len() < MIN_PASSWORD_LEN {
        let mut context = TeraContext::new();
        context.insert("token", &form.token);
        context.insert("error", "Password must be at least 8 characters long");
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            render("reset_password.html", &context)?,
        )
            .into_response());
    }

    let mut context = TeraContext::new();

    match auth::consume_token(ctx.store(), &form.token, TokenPurpose::PasswordReset).await? {
        Some(user_id) => {
            let password_hash = auth::hash_password(&form.password)?;
            ctx.store().update_password(&user_id, &password_hash).await?;
            ctx.store().delete_user_sessions(&user_id).await?;

            context.insert("heading", "Password updated");
            context.insert(
                "message",
                "Your password has been changed. All existing sessions were logged out.",
            );
            context.insert("is_error", &false);
            context.insert("link_url", "/login");
            context.insert("link_label", "Log in");
            Ok(render("message.html", &context)?.into_response())
        }
        None => {
            context.insert("heading", "Reset failed");
            context.insert(
                "message",
                "This password reset link is invalid or has expired. Please request a new one.",
            );
            context.insert("is_error", &true);
            Ok((StatusCode::BAD_REQUEST, render("message.html", &context)?).into_response())
        }
    }
}

/// `DELETE /account`
///
/// Deletes the account and its sessions. Published scrolls stay on record without an owner.
pub async fn handle_delete_account(
    Extension(ctx): Extension<HttpServiceContext>,
    headers: HeaderMap,
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

    ctx.store().delete_user(&user.id).await?;

    let mut response = Json(json!({ "message": "Account deleted" })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        auth::clear_session_cookie()
            .parse()
            .expect("valid cookie header"),
    );

    Ok(response)
}
