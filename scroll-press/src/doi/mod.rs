// SPDX-License-Identifier: AGPL-3.0-or-later

//! DOI lifecycle: registrar collaborator, background minting service and badge rendering.
pub mod badge;
pub mod registrar;
pub mod service;
pub mod zenodo;

pub use badge::render_doi_badge;
pub use registrar::{DepositRequest, DoiRegistrar, MintedDoi, RegistrarError, ReservedDeposit};
pub use service::doi_service;
pub use zenodo::ZenodoRegistrar;
