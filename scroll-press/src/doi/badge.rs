// SPDX-License-Identifier: AGPL-3.0-or-later

//! DOI badge rendering.
//!
//! A pure function instead of template conditionals so every state can be unit-tested without
//! a template engine.
use crate::scrolls::DoiStatus;

/// Sandbox DOIs are minted under this prefix and marked as such in the badge.
const SANDBOX_PREFIX: &str = "10.5072";

/// Renders the DOI badge fragment for a scroll.
///
/// `compact` drops the attribution line for list views. Failed and absent states render
/// nothing, readers of a scroll page are not the audience for registrar problems.
pub fn render_doi_badge(doi: Option<&str>, status: Option<DoiStatus>, compact: bool) -> String {
    match (status, doi) {
        (Some(DoiStatus::Minted), Some(doi)) => {
            let sandbox = if doi.starts_with(SANDBOX_PREFIX) {
                " <span class=\"doi-sandbox\">(sandbox)</span>"
            } else {
                ""
            };

            let attribution = if compact {
                String::new()
            } else {
                "<span class=\"doi-attribution\">Registered via Zenodo</span>".to_string()
            };

            format!(
                "<span class=\"doi-badge doi-badge-minted\">DOI \
                 <a href=\"https://doi.org/{doi}\">{doi}</a>{sandbox}{attribution}</span>",
                doi = doi,
                sandbox = sandbox,
                attribution = attribution,
            )
        }
        (Some(DoiStatus::Pending), _) => {
            "<span class=\"doi-badge doi-badge-pending\">DOI registration in progress</span>"
                .to_string()
        }
        // Failed registrations and legacy scrolls show no badge at all
        (Some(DoiStatus::Failed), _) | (None, _) | (Some(DoiStatus::Minted), None) => {
            String::new()
        }
    }
}
