// SPDX-License-Identifier: AGPL-3.0-or-later

//! Domain model of scholarly scrolls: types, content-addressed identity and upload validation.
pub mod identity;
pub mod types;
pub mod upload;

pub use identity::{content_hash, normalize_line_endings, resolve_url_hash};
pub use types::{
    DoiStatus, License, NewScroll, Scroll, ScrollId, ScrollStatus, Subject, SubjectId, UserId,
};
pub use upload::{validate_upload, UploadError, MAX_UPLOAD_BYTES};
