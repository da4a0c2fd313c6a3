use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::MapId;

pub const EXPLOSION_USAGE: &str =
    "Usage: explosion intensity [slope] [maxIntensity] [x y] [mapId] [prototypeId]";
pub const EXPLOSION_UI_USAGE: &str = "Usage: explosionui";

/// Arguments of the `explosion` admin command.
///
/// Optional values stay `None` so the server can fill them from its own
/// configuration and from the issuer's position.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionArgs {
    pub intensity: f32,
    pub slope: Option<f32>,
    pub max_intensity: Option<f32>,
    pub position: Option<(f32, f32)>,
    pub map: Option<MapId>,
    pub type_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    /// `explosionui`: open an interactive preview session.
    OpenExplosionUi,
    /// `explosion ...`: queue a live explosion.
    Explosion(ExplosionArgs),
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("Wrong number of arguments. {usage}")]
    WrongArgumentCount { count: usize, usage: &'static str },
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid float '{value}' for {context}: {source}")]
    InvalidFloat {
        value: String,
        context: &'static str,
        source: ParseFloatError,
    },
    #[error("non-finite value '{value}' for {context}")]
    NonFinite {
        value: String,
        context: &'static str,
    },
}

impl CommandParseError {
    /// The argument token that failed to parse, when there is one.
    pub fn token(&self) -> Option<&str> {
        match self {
            CommandParseError::InvalidInteger { value, .. }
            | CommandParseError::InvalidFloat { value, .. }
            | CommandParseError::NonFinite { value, .. } => Some(value),
            _ => None,
        }
    }
}

pub fn parse_command_line(input: &str) -> Result<CommandPayload, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;
    let args: Vec<&str> = parts.collect();

    match verb.as_str() {
        "explosionui" => {
            if !args.is_empty() {
                return Err(CommandParseError::WrongArgumentCount {
                    count: args.len(),
                    usage: EXPLOSION_UI_USAGE,
                });
            }
            Ok(CommandPayload::OpenExplosionUi)
        }
        "explosion" => parse_explosion_args(&args).map(CommandPayload::Explosion),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

/// Parse `intensity [slope] [maxIntensity] [x y] [mapId] [prototypeId]`.
///
/// Zero, exactly four (an `x` without a `y`), or more than seven arguments are
/// rejected before any token is parsed.
pub fn parse_explosion_args(args: &[&str]) -> Result<ExplosionArgs, CommandParseError> {
    if args.is_empty() || args.len() == 4 || args.len() > 7 {
        return Err(CommandParseError::WrongArgumentCount {
            count: args.len(),
            usage: EXPLOSION_USAGE,
        });
    }

    let intensity = parse_f32(args[0], "intensity")?;
    let slope = args
        .get(1)
        .map(|token| parse_f32(token, "slope"))
        .transpose()?;
    let max_intensity = args
        .get(2)
        .map(|token| parse_f32(token, "max intensity"))
        .transpose()?;
    let position = if args.len() > 4 {
        let x = parse_f32(args[3], "x coordinate")?;
        let y = parse_f32(args[4], "y coordinate")?;
        Some((x, y))
    } else {
        None
    };
    let map = args
        .get(5)
        .map(|token| parse_u32(token, "map id").map(MapId))
        .transpose()?;
    let type_id = args.get(6).map(|token| token.to_string());

    Ok(ExplosionArgs {
        intensity,
        slope,
        max_intensity,
        position,
        map,
        type_id,
    })
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_f32(value: &str, context: &'static str) -> Result<f32, CommandParseError> {
    let parsed = value
        .parse::<f32>()
        .map_err(|source| CommandParseError::InvalidFloat {
            value: value.to_string(),
            context,
            source,
        })?;
    if !parsed.is_finite() {
        return Err(CommandParseError::NonFinite {
            value: value.to_string(),
            context,
        });
    }
    Ok(parsed)
}
