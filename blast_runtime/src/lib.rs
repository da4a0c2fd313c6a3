//! Runtime helpers shared by the explosion server and admin tooling.
//!
//! Re-exports the wire types from `blast_proto` and owns the text command
//! surface (`explosion`, `explosionui`) without depending on the Bevy runtime
//! in `blast_core`.

pub use blast_proto::*;

pub mod command_text;

pub use command_text::{
    parse_command_line, CommandParseError, CommandPayload, ExplosionArgs, EXPLOSION_USAGE,
    EXPLOSION_UI_USAGE,
};
