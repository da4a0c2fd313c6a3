//! Admin commands: `explosionui` and `explosion`.
//!
//! Parsing lives in `blast_runtime`; this module fills in defaults from the
//! issuer and the server config and touches the world only on success.

use bevy::prelude::World;
use blast_proto::{MapCoordinates, PreviewLink, SessionId};
use blast_runtime::{parse_command_line, CommandParseError, CommandPayload, ExplosionArgs};
use thiserror::Error;
use tracing::{info, warn};

use crate::commit::{ExplosionQueue, QueuedExplosion};
use crate::config::ExplosionConfigHandle;
use crate::definition::{ExplosionCatalogHandle, ResolveError};
use crate::engine::ExplosionParams;
use crate::preview::PreviewSessions;

/// Who ran a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandIssuer {
    /// `None` for the server console.
    pub session: Option<SessionId>,
    pub position: Option<MapCoordinates>,
    pub privileged: bool,
}

impl CommandIssuer {
    pub fn console() -> Self {
        Self {
            session: None,
            position: None,
            privileged: true,
        }
    }

    pub fn player(session: SessionId, position: Option<MapCoordinates>, privileged: bool) -> Self {
        Self {
            session: Some(session),
            position,
            privileged,
        }
    }
}

#[derive(Debug)]
pub enum CommandOutcome {
    PreviewOpened(PreviewLink),
    ExplosionQueued {
        type_id: String,
        params: ExplosionParams,
        /// The issuer named no type; the first registered one was used.
        defaulted_type: bool,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("This does not work from the server console.")]
    NotInteractive,
    #[error("You do not have permission to run this command.")]
    PermissionDenied,
    #[error("Failed get default coordinates/map via player's transform. Need to specify explicitly.")]
    NoResolvablePosition,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("no explosion types are registered")]
    NoExplosionTypes,
}

#[derive(Debug, Error)]
pub enum CommandLineError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

pub fn run_command_line(
    world: &mut World,
    issuer: &CommandIssuer,
    line: &str,
) -> Result<CommandOutcome, CommandLineError> {
    let payload = parse_command_line(line).map_err(|err| {
        warn!(
            target: "blast::command",
            token = err.token().unwrap_or(""),
            error = %err,
            "command.rejected=parse"
        );
        err
    })?;
    Ok(execute_command(world, issuer, payload)?)
}

pub fn execute_command(
    world: &mut World,
    issuer: &CommandIssuer,
    payload: CommandPayload,
) -> Result<CommandOutcome, CommandError> {
    if !issuer.privileged {
        return Err(CommandError::PermissionDenied);
    }
    match payload {
        CommandPayload::OpenExplosionUi => {
            let session = issuer.session.ok_or(CommandError::NotInteractive)?;
            let link = world.resource_mut::<PreviewSessions>().open(session);
            Ok(CommandOutcome::PreviewOpened(link))
        }
        CommandPayload::Explosion(args) => queue_explosion(world, issuer, &args),
    }
}

fn queue_explosion(
    world: &mut World,
    issuer: &CommandIssuer,
    args: &ExplosionArgs,
) -> Result<CommandOutcome, CommandError> {
    let epicenter = resolve_epicenter(issuer, args)?;
    let config = world.resource::<ExplosionConfigHandle>().get();
    let catalog = world.resource::<ExplosionCatalogHandle>().get();

    let (definition, defaulted_type) = match &args.type_id {
        Some(type_id) => (catalog.resolve(type_id)?, false),
        None => (
            catalog
                .default_definition()
                .ok_or(CommandError::NoExplosionTypes)?,
            true,
        ),
    };

    let params = ExplosionParams::new(
        epicenter,
        args.intensity,
        args.slope.unwrap_or(config.default_slope),
        args.max_intensity.unwrap_or(config.default_max_intensity),
    );
    let type_id = definition.id().to_string();

    world.resource_mut::<ExplosionQueue>().queue(QueuedExplosion {
        issuer: issuer.session,
        definition,
        params,
    });
    info!(
        target: "blast::command",
        type_id = %type_id,
        epicenter = %epicenter,
        intensity = params.total_intensity,
        slope = params.slope,
        max_intensity = params.max_intensity,
        defaulted_type,
        "explosion.queued"
    );

    Ok(CommandOutcome::ExplosionQueued {
        type_id,
        params,
        defaulted_type,
    })
}

/// Explicit coordinates win; `x y` alone borrow the issuer's map.
fn resolve_epicenter(
    issuer: &CommandIssuer,
    args: &ExplosionArgs,
) -> Result<MapCoordinates, CommandError> {
    match (args.position, args.map) {
        (Some((x, y)), Some(map)) => Ok(MapCoordinates::new(map, x, y)),
        (Some((x, y)), None) => issuer
            .position
            .map(|current| MapCoordinates::new(current.map, x, y))
            .ok_or(CommandError::NoResolvablePosition),
        (None, _) => issuer.position.ok_or(CommandError::NoResolvablePosition),
    }
}

/// Reply text for the issuer.
pub fn describe_outcome(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::PreviewOpened(link) => {
            format!("Explosion preview opened (session {}).", link.session())
        }
        CommandOutcome::ExplosionQueued {
            type_id,
            params,
            defaulted_type,
        } => {
            let mut reply = format!(
                "Queued {type_id} explosion at {} (intensity {}, slope {}, max {}).",
                params.epicenter, params.total_intensity, params.slope, params.max_intensity
            );
            if *defaulted_type {
                reply.push_str(&format!(
                    " No type given; using first registered type {type_id}."
                ));
            }
            reply
        }
    }
}
