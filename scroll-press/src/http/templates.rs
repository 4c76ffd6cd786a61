// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedded tera templates.
//!
//! Full pages extend the base layout, fragments under `partials/` never do. That split is what
//! keeps the partial-render contract honest: a handler picking a `partials/` template can not
//! accidentally ship a second `<html>` document into an HTMX swap.
use once_cell::sync::Lazy;
use tera::Tera;

pub static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();

    tera.add_raw_templates(vec![
        ("base.html", include_str!("../../templates/base.html")),
        ("index.html", include_str!("../../templates/index.html")),
        ("login.html", include_str!("../../templates/login.html")),
        ("register.html", include_str!("../../templates/register.html")),
        (
            "forgot_password.html",
            include_str!("../../templates/forgot_password.html"),
        ),
        (
            "reset_password.html",
            include_str!("../../templates/reset_password.html"),
        ),
        ("upload.html", include_str!("../../templates/upload.html")),
        ("scroll.html", include_str!("../../templates/scroll.html")),
        ("message.html", include_str!("../../templates/message.html")),
        ("error.html", include_str!("../../templates/error.html")),
        (
            "partials/scrolls.html",
            include_str!("../../templates/partials/scrolls.html"),
        ),
        (
            "partials/upload_success.html",
            include_str!("../../templates/partials/upload_success.html"),
        ),
    ])
    .expect("Templates compile");

    tera
});
