//! Kit probes: per-candidate detection of downloadable phishing kits.
//!
//! The crawler only depends on the [`Probe`] trait. [`Website`] is the
//! default implementation, which looks for open directory listings that
//! expose archive files.

mod target;
mod website;

use crate::http::FetchError;
use std::future::Future;
use thiserror::Error;

pub use target::{validate_target, TargetError};
pub use website::{Website, KIT_EXTENSIONS};

/// Errors raised while probing a single candidate.
///
/// The crawler treats every one of these as "no kit found".
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Refusing to probe: {0}")]
    UnsafeTarget(#[from] TargetError),
}

/// A probe subject bound to one candidate URL.
///
/// Built by the crawler through a factory closure, moved into exactly one
/// spawned task, and either kept (kit found) or cleaned up and dropped.
/// Implementors can write `async fn has_kit` as long as the future is `Send`.
pub trait Probe {
    /// The candidate URL this subject is bound to.
    fn url(&self) -> &str;

    /// Returns `true` when a phishing kit artifact was found and retained.
    fn has_kit(&mut self) -> impl Future<Output = Result<bool, ProbeError>> + Send;

    /// Releases whatever a negative probe left behind.
    fn cleanup(&mut self);
}
