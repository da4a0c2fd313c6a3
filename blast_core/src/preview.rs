//! Server side of the explosion preview protocol.
//!
//! Each requester owns one [`PreviewSession`]. Sessions never share mutable
//! state, so pending requests for every open session are answered in parallel
//! against the same read-only tile world.

use std::collections::BTreeMap;

use bevy::prelude::{Res, ResMut, Resource};
use blast_proto::{
    link_pair, ClientMessage, ExplosionResult, LinkError, PreviewData, PreviewLink,
    PreviewRejected, PreviewRequest, ServerLink, ServerMessage, SessionId,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ExplosionConfigHandle;
use crate::definition::{ExplosionCatalogHandle, ResolveError};
use crate::engine::{plan_explosion, ExplosionContext, ExplosionParams};
use crate::map::TileWorld;

#[derive(Debug)]
pub struct PreviewSession {
    link: ServerLink,
    last_preview: Option<ExplosionResult>,
    previews_served: u64,
    closed: bool,
}

impl PreviewSession {
    pub fn new(link: ServerLink) -> Self {
        Self {
            link,
            last_preview: None,
            previews_served: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.link.session()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn last_preview(&self) -> Option<&ExplosionResult> {
        self.last_preview.as_ref()
    }

    pub fn previews_served(&self) -> u64 {
        self.previews_served
    }

    /// Dry-run the requested explosion. The world is only read.
    pub fn compute_preview(
        &mut self,
        ctx: &ExplosionContext<'_>,
        request: &PreviewRequest,
    ) -> Result<PreviewData, ResolveError> {
        let params = ExplosionParams::from(request);
        let outcome = plan_explosion(ctx, &request.type_id, &params)?;
        self.last_preview = Some(outcome.result.clone());
        self.previews_served += 1;
        Ok(PreviewData {
            explosion: outcome.result,
            slope: request.slope,
            total_intensity: request.total_intensity,
        })
    }

    /// Drop the stored preview. Calling it again is a no-op.
    pub fn clear_preview(&mut self) {
        self.last_preview = None;
    }

    pub fn close(&mut self) {
        self.clear_preview();
        self.closed = true;
    }

    /// Answer every request waiting on the link. Returns the number of replies.
    pub fn service(&mut self, ctx: &ExplosionContext<'_>) -> usize {
        let mut replies = 0;
        while !self.closed {
            let message = match self.link.try_recv() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(LinkError::Disconnected(session)) => {
                    info!(
                        target: "blast::preview",
                        %session,
                        "preview.session_closed=disconnected"
                    );
                    self.close();
                    break;
                }
                Err(err) => {
                    warn!(
                        target: "blast::preview",
                        session = %self.id(),
                        error = %err,
                        "preview.frame_dropped"
                    );
                    continue;
                }
            };

            match message {
                ClientMessage::PreviewRequest(request) => {
                    let reply = self.answer(ctx, &request);
                    if let Err(err) = self.link.send(&reply) {
                        warn!(
                            target: "blast::preview",
                            session = %self.id(),
                            error = %err,
                            "preview.reply_failed"
                        );
                        self.close();
                        break;
                    }
                    replies += 1;
                }
                ClientMessage::Close => {
                    info!(
                        target: "blast::preview",
                        session = %self.id(),
                        "preview.session_closed=client"
                    );
                    self.close();
                }
            }
        }
        replies
    }

    fn answer(&mut self, ctx: &ExplosionContext<'_>, request: &PreviewRequest) -> ServerMessage {
        match self.compute_preview(ctx, request) {
            Ok(data) => {
                debug!(
                    target: "blast::preview",
                    session = %self.id(),
                    type_id = %request.type_id,
                    tiles = data.explosion.tiles.len(),
                    space_tiles = data.explosion.space_tiles.len(),
                    "preview.computed"
                );
                ServerMessage::PreviewData(data)
            }
            Err(err) => {
                warn!(
                    target: "blast::preview",
                    session = %self.id(),
                    type_id = %request.type_id,
                    "preview.rejected=unknown_type"
                );
                ServerMessage::PreviewRejected(PreviewRejected {
                    type_id: request.type_id.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Open preview sessions, one per requester.
#[derive(Resource, Debug, Default)]
pub struct PreviewSessions {
    sessions: BTreeMap<SessionId, PreviewSession>,
}

impl PreviewSessions {
    /// Open a session for `session`, replacing any session it already had.
    pub fn open(&mut self, session: SessionId) -> PreviewLink {
        let (server, client) = link_pair(session);
        if let Some(mut previous) = self.sessions.insert(session, PreviewSession::new(server)) {
            previous.close();
            info!(target: "blast::preview", %session, "preview.session_replaced");
        } else {
            info!(target: "blast::preview", %session, "preview.session_opened");
        }
        client
    }

    pub fn close(&mut self, session: SessionId) -> bool {
        match self.sessions.remove(&session) {
            Some(mut closed) => {
                closed.close();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, session: SessionId) -> Option<&PreviewSession> {
        self.sessions.get(&session)
    }

    pub fn is_open(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Service every session in parallel, then forget the ones that closed.
    pub fn service_all(&mut self, ctx: &ExplosionContext<'_>) -> usize {
        let replies = self
            .sessions
            .par_iter_mut()
            .map(|(_, session)| session.service(ctx))
            .sum::<usize>();
        self.sessions.retain(|_, session| !session.is_closed());
        replies
    }
}

pub fn service_preview_sessions(
    mut sessions: ResMut<PreviewSessions>,
    world: Res<TileWorld>,
    catalog: Res<ExplosionCatalogHandle>,
    config: Res<ExplosionConfigHandle>,
) {
    if sessions.is_empty() {
        return;
    }
    let ctx = ExplosionContext::new(&world, &catalog.0, &config.0);
    let replies = sessions.service_all(&ctx);
    if replies > 0 {
        debug!(target: "blast::preview", replies, open = sessions.len(), "preview.serviced");
    }
}
