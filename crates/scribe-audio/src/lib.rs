//! Space audio download for Scribe.
//!
//! [`AudioFetcher`] turns a Space URL into a local audio file. The
//! production implementation, [`SpaceDownloader`], runs `twspace_dl` as a
//! child process under a timeout.

pub mod downloader;
pub mod error;
pub mod space_url;

use std::path::Path;

use async_trait::async_trait;
use scribe_models::AudioArtifact;

pub use downloader::SpaceDownloader;
pub use error::{FetchError, Result};
pub use space_url::{is_space_url, space_id};

/// Fetches the recording of a finished Space.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Downloads the Space at `space_url`.
    async fn fetch(&self, space_url: &str) -> Result<AudioArtifact>;

    /// Deletes a recording returned by [`fetch`](Self::fetch) once nothing
    /// refers to it any more.
    async fn release(&self, _audio: &Path) -> Result<()> {
        Ok(())
    }
}
