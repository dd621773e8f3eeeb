//! Gallery renderer port
//!
//! After every successful create, sync, or remove the published gallery must
//! reflect the reconciled state. The engine never renders anything itself;
//! commands hand the finalized [`State`] and [`Album`] to a renderer.

use crate::domain::{Album, State};

/// Port trait for publishing gallery output
#[async_trait::async_trait]
pub trait IGalleryRenderer: Send + Sync {
    /// Regenerates the gallery output for `album` and the workspace index
    async fn render(&self, state: &State, album: &Album) -> anyhow::Result<()>;

    /// Removes the gallery output of an album that no longer exists and
    /// regenerates the workspace index
    async fn remove_album(&self, state: &State, album: &Album) -> anyhow::Result<()>;
}
