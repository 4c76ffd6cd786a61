// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use http::header::CONTENT_TYPE;
use log::{debug, warn};
use tower_http::cors::{Any, CorsLayer};

use crate::bus::ServiceSender;
use crate::context::Context;
use crate::http::auth::{
    handle_delete_account, handle_forgot_password, handle_forgot_password_page, handle_login,
    handle_login_page, handle_logout, handle_register, handle_register_page,
    handle_resend_verification, handle_reset_password, handle_reset_password_page,
    handle_verify_email,
};
use crate::http::context::HttpServiceContext;
use crate::http::pages::{handle_landing_page, handle_not_found, handle_view_scroll};
use crate::http::partials::handle_scrolls_partial;
use crate::http::scrolls::{
    handle_api_scrolls, handle_discard_scroll, handle_publish_scroll, handle_upload_form,
    handle_upload_html, handle_upload_page,
};
use crate::manager::{ServiceReadySender, Shutdown};
use crate::scrolls::MAX_UPLOAD_BYTES;

/// Build HTTP server with page, fragment and API routes.
pub fn build_server(http_context: HttpServiceContext) -> Router {
    // Configure CORS middleware for the JSON API
    let cors = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(false)
        .allow_origin(Any);

    Router::new()
        // Pages
        .route("/", get(handle_landing_page))
        .route("/scroll/:url_hash", get(handle_view_scroll))
        // Accounts
        .route("/register", get(handle_register_page).post(handle_register))
        .route("/login", get(handle_login_page).post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/verify-email", get(handle_verify_email))
        .route("/resend-verification", post(handle_resend_verification))
        .route(
            "/forgot-password",
            get(handle_forgot_password_page).post(handle_forgot_password),
        )
        .route(
            "/reset-password",
            get(handle_reset_password_page).post(handle_reset_password),
        )
        .route("/account", delete(handle_delete_account))
        // Upload and publish workflow
        .route("/upload", get(handle_upload_page))
        .route("/upload-form", post(handle_upload_form))
        .route("/upload/html", post(handle_upload_html))
        .route("/scrolls/:id/publish", post(handle_publish_scroll))
        .route("/scrolls/:id/discard", post(handle_discard_scroll))
        // Fragments for HTMX swaps
        .route("/partials/scrolls", get(handle_scrolls_partial))
        // JSON API
        .route("/api/scrolls", get(handle_api_scrolls))
        // Branded 404 for everything else
        .fallback(handle_not_found)
        // Add middlewares
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        // Add shared context
        .layer(Extension(http_context))
}

/// Start HTTP server.
pub async fn http_service(
    context: Context,
    signal: Shutdown,
    tx: ServiceSender,
    tx_ready: ServiceReadySender,
) -> Result<()> {
    let http_port = context.config.http_port;
    let http_address = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), http_port);

    let http_context = HttpServiceContext::new(context, tx);

    axum::Server::try_bind(&http_address)?
        .serve(build_server(http_context).into_make_service())
        .with_graceful_shutdown(async {
            debug!("HTTP service is ready");
            if tx_ready.send(()).is_err() {
                warn!("No subscriber informed about HTTP service being ready");
            };

            signal.await.ok();
        })
        .await?;

    Ok(())
}
