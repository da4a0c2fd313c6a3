//! Client side of the explosion preview protocol.
//!
//! The client never touches server state: it sends requests over a
//! [`PreviewLink`](blast_proto::PreviewLink) and projects whatever comes back
//! onto an [`OverlayHost`].

pub mod overlay;
pub mod session;

pub use overlay::{OverlayHost, OverlayState, PreviewOverlay};
pub use session::{ClientError, ExplosionPreviewClient};

/// Overlay host without a renderer. Counts registrations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeadlessHost {
    pub added: u32,
    pub removed: u32,
    active: bool,
}

impl OverlayHost for HeadlessHost {
    fn add_overlay(&mut self) {
        self.added += 1;
        self.active = true;
    }

    fn remove_overlay(&mut self) {
        self.removed += 1;
        self.active = false;
    }

    fn has_overlay(&self) -> bool {
        self.active
    }
}
