use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::{decode_message, encode_message, ClientMessage, ProtoError, ServerMessage, SessionId};

/// Error surfaced by either end of a preview link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("preview link for session {0} is disconnected")]
    Disconnected(SessionId),
}

/// Client end of a preview session: sends requests, receives preview frames.
#[derive(Debug)]
pub struct PreviewLink {
    session: SessionId,
    outgoing: Sender<Vec<u8>>,
    incoming: Receiver<Vec<u8>>,
}

/// Server end of a preview session.
#[derive(Debug)]
pub struct ServerLink {
    session: SessionId,
    incoming: Receiver<Vec<u8>>,
    outgoing: Sender<Vec<u8>>,
}

/// Create both ends of an ordered, reliable in-process link.
pub fn link_pair(session: SessionId) -> (ServerLink, PreviewLink) {
    let (to_server, from_client) = unbounded::<Vec<u8>>();
    let (to_client, from_server) = unbounded::<Vec<u8>>();
    (
        ServerLink {
            session,
            incoming: from_client,
            outgoing: to_client,
        },
        PreviewLink {
            session,
            outgoing: to_server,
            incoming: from_server,
        },
    )
}

impl PreviewLink {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn send(&self, message: &ClientMessage) -> Result<(), LinkError> {
        let frame = encode_message(message)?;
        self.outgoing
            .send(frame)
            .map_err(|_| LinkError::Disconnected(self.session))
    }

    /// Send an already encoded frame.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        self.outgoing
            .send(frame)
            .map_err(|_| LinkError::Disconnected(self.session))
    }

    /// Pop the next server frame, if any.
    pub fn try_recv(&self) -> Result<Option<ServerMessage>, LinkError> {
        match self.incoming.try_recv() {
            Ok(frame) => Ok(Some(decode_message(&frame)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected(self.session)),
        }
    }
}

impl ServerLink {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), LinkError> {
        let frame = encode_message(message)?;
        self.outgoing
            .send(frame)
            .map_err(|_| LinkError::Disconnected(self.session))
    }

    /// Pop the next client frame, if any.
    ///
    /// A frame that fails to decode is consumed and reported as
    /// [`LinkError::Proto`]; the link stays usable.
    pub fn try_recv(&self) -> Result<Option<ClientMessage>, LinkError> {
        match self.incoming.try_recv() {
            Ok(frame) => Ok(Some(decode_message(&frame)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected(self.session)),
        }
    }
}
