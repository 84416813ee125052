#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod credential;
pub mod manifest;

pub use credential::{hash_password, verify_password, CredentialError, SecretScheme};
pub use manifest::{Manifest, PackageEntry};
