use blast_proto::{
    ClientMessage, LinkError, MapCoordinates, PreviewLink, PreviewRejected, PreviewRequest,
    ServerMessage, SessionId,
};
use thiserror::Error;

use crate::overlay::{OverlayHost, OverlayState, PreviewOverlay};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Client end of one preview session.
///
/// Owns the overlay for as long as the session is open; [`close`] is the only
/// way out and hands the renderer host back.
///
/// [`close`]: ExplosionPreviewClient::close
#[derive(Debug)]
pub struct ExplosionPreviewClient<H: OverlayHost> {
    link: PreviewLink,
    overlay: PreviewOverlay<H>,
    last_rejection: Option<PreviewRejected>,
}

impl<H: OverlayHost> ExplosionPreviewClient<H> {
    pub fn new(link: PreviewLink, host: H) -> Self {
        Self {
            link,
            overlay: PreviewOverlay::new(host),
            last_rejection: None,
        }
    }

    pub fn session(&self) -> SessionId {
        self.link.session()
    }

    pub fn request_preview(
        &self,
        epicenter: MapCoordinates,
        type_id: impl Into<String>,
        total_intensity: f32,
        slope: f32,
        max_intensity: f32,
    ) -> Result<(), ClientError> {
        let request = PreviewRequest {
            epicenter,
            type_id: type_id.into(),
            total_intensity,
            slope,
            max_intensity,
        };
        self.link.send(&ClientMessage::PreviewRequest(request))?;
        Ok(())
    }

    /// Apply every server message received so far. Returns how many arrived.
    pub fn poll(&mut self) -> Result<usize, ClientError> {
        let mut handled = 0;
        while let Some(message) = self.link.try_recv()? {
            match message {
                ServerMessage::PreviewData(data) => {
                    self.last_rejection = None;
                    self.overlay
                        .on_preview_data(data.explosion, data.slope, data.total_intensity);
                }
                ServerMessage::PreviewRejected(rejected) => {
                    self.last_rejection = Some(rejected);
                }
            }
            handled += 1;
        }
        Ok(handled)
    }

    pub fn overlay_state(&self) -> Option<&OverlayState> {
        self.overlay.state()
    }

    pub fn last_rejection(&self) -> Option<&PreviewRejected> {
        self.last_rejection.as_ref()
    }

    /// Drop the local preview but keep the session open.
    pub fn clear_preview(&mut self) {
        self.overlay.clear();
    }

    /// Tell the server to end the session and tear down the overlay.
    ///
    /// The overlay is cleared even when the server is already gone.
    pub fn close(mut self) -> H {
        let _ = self.link.send(&ClientMessage::Close);
        self.overlay.clear();
        self.overlay.into_host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessHost;
    use blast_proto::{link_pair, ExplosionResult, GridId, MapId, PreviewData, TileCoord};

    #[test]
    fn poll_feeds_the_overlay() {
        let (server, link) = link_pair(SessionId(1));
        let mut client = ExplosionPreviewClient::new(link, HeadlessHost::default());

        let mut explosion =
            ExplosionResult::empty(MapCoordinates::new(MapId(1), 0.5, 0.5), "Default");
        explosion.tiles.insert(TileCoord::new(GridId(1), 0, 0), 5.0);
        server
            .send(&ServerMessage::PreviewData(PreviewData {
                explosion,
                slope: 5.0,
                total_intensity: 5.0,
            }))
            .unwrap();

        assert_eq!(client.poll().unwrap(), 1);
        assert_eq!(client.overlay_state().unwrap().tiles.len(), 1);
        assert_eq!(client.poll().unwrap(), 0);
    }

    #[test]
    fn rejection_keeps_the_previous_overlay() {
        let (server, link) = link_pair(SessionId(1));
        let mut client = ExplosionPreviewClient::new(link, HeadlessHost::default());
        server
            .send(&ServerMessage::PreviewData(PreviewData {
                explosion: ExplosionResult::empty(
                    MapCoordinates::new(MapId(1), 0.5, 0.5),
                    "Default",
                ),
                slope: 5.0,
                total_intensity: 5.0,
            }))
            .unwrap();
        server
            .send(&ServerMessage::PreviewRejected(PreviewRejected {
                type_id: "Nuke".into(),
                reason: "unknown explosion type: Nuke".into(),
            }))
            .unwrap();

        assert_eq!(client.poll().unwrap(), 2);
        assert!(client.overlay_state().is_some());
        assert_eq!(client.last_rejection().unwrap().type_id, "Nuke");
    }

    #[test]
    fn close_sends_close_and_clears() {
        let (server, link) = link_pair(SessionId(7));
        let mut client = ExplosionPreviewClient::new(link, HeadlessHost::default());
        client
            .request_preview(
                MapCoordinates::new(MapId(1), 1.0, 1.0),
                "Default",
                10.0,
                5.0,
                100.0,
            )
            .unwrap();
        server
            .send(&ServerMessage::PreviewData(PreviewData {
                explosion: ExplosionResult::empty(
                    MapCoordinates::new(MapId(1), 1.0, 1.0),
                    "Default",
                ),
                slope: 5.0,
                total_intensity: 10.0,
            }))
            .unwrap();
        client.poll().unwrap();

        let host = client.close();
        assert_eq!(host.added, 1);
        assert_eq!(host.removed, 1);

        assert!(matches!(
            server.try_recv().unwrap(),
            Some(ClientMessage::PreviewRequest(_))
        ));
        assert!(matches!(server.try_recv().unwrap(), Some(ClientMessage::Close)));
    }

    #[test]
    fn close_without_server_still_clears() {
        let (server, link) = link_pair(SessionId(2));
        drop(server);
        let client = ExplosionPreviewClient::new(link, HeadlessHost::default());
        let host = client.close();
        assert_eq!(host.removed, 0);
    }

    #[test]
    fn disconnected_server_surfaces_on_poll() {
        let (server, link) = link_pair(SessionId(3));
        drop(server);
        let mut client = ExplosionPreviewClient::new(link, HeadlessHost::default());
        assert!(matches!(
            client.poll(),
            Err(ClientError::Link(LinkError::Disconnected(SessionId(3))))
        ));
    }
}
