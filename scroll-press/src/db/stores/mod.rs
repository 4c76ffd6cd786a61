// SPDX-License-Identifier: AGPL-3.0-or-later

//! One `impl SqlStore` block per storage concern.
mod scroll;
mod session;
mod subject;
mod token;
mod user;
