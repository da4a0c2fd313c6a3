//! Explosion computation shared by the preview (dry run) and commit paths.
//!
//! [`compute_explosion`] only ever reads the [`TileWorld`]. Writing the
//! outcome back is a separate step, [`apply_tile_breaks`], owned by the commit
//! system.

use std::collections::BTreeMap;

use blast_proto::{ExplosionResult, MapCoordinates, PreviewRequest, TileCoord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::break_chance::roll_tile_breaks;
use crate::config::ExplosionConfig;
use crate::definition::{ExplosionCatalog, ExplosionDefinition, ResolveError};
use crate::hashing::explosion_seed;
use crate::map::{TileKind, TileWorld};
use crate::propagation::{FloodFill, Propagation};

/// Inputs shared by every explosion request, whatever its type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplosionParams {
    pub epicenter: MapCoordinates,
    pub total_intensity: f32,
    pub slope: f32,
    pub max_intensity: f32,
}

impl ExplosionParams {
    pub fn new(
        epicenter: MapCoordinates,
        total_intensity: f32,
        slope: f32,
        max_intensity: f32,
    ) -> Self {
        Self {
            epicenter,
            total_intensity,
            slope,
            max_intensity,
        }
    }

    /// Positive, finite budget, slope and cap.
    pub fn is_valid(&self) -> bool {
        [self.total_intensity, self.slope, self.max_intensity]
            .iter()
            .all(|value| value.is_finite() && *value > 0.0)
    }

    pub fn to_request(&self, type_id: impl Into<String>) -> PreviewRequest {
        PreviewRequest {
            epicenter: self.epicenter,
            type_id: type_id.into(),
            total_intensity: self.total_intensity,
            slope: self.slope,
            max_intensity: self.max_intensity,
        }
    }

    pub fn seed(&self, world_seed: u64, type_id: &str) -> u64 {
        explosion_seed(
            world_seed,
            type_id,
            &self.epicenter,
            self.total_intensity,
            self.slope,
            self.max_intensity,
        )
    }
}

impl From<&PreviewRequest> for ExplosionParams {
    fn from(request: &PreviewRequest) -> Self {
        Self::new(
            request.epicenter,
            request.total_intensity,
            request.slope,
            request.max_intensity,
        )
    }
}

/// One tile whose break chain advanced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBreak {
    pub coord: TileCoord,
    pub from: TileKind,
    pub to: TileKind,
    pub breaks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionOutcome {
    pub result: ExplosionResult,
    /// Intensity of every reached tile, space tiles included.
    pub tile_intensity: BTreeMap<TileCoord, f32>,
    pub breaks: Vec<TileBreak>,
}

impl ExplosionOutcome {
    pub fn intensity_at(&self, coord: &TileCoord) -> Option<f32> {
        self.tile_intensity.get(coord).copied()
    }
}

/// Read-only view of everything an explosion is computed from.
#[derive(Clone, Copy)]
pub struct ExplosionContext<'a> {
    pub world: &'a TileWorld,
    pub catalog: &'a ExplosionCatalog,
    pub config: &'a ExplosionConfig,
}

impl<'a> ExplosionContext<'a> {
    pub fn new(
        world: &'a TileWorld,
        catalog: &'a ExplosionCatalog,
        config: &'a ExplosionConfig,
    ) -> Self {
        Self {
            world,
            catalog,
            config,
        }
    }

    pub fn propagation(&self) -> FloodFill {
        FloodFill::new(self.config.max_rings)
    }
}

/// Propagate, then roll the break chain of every reached tile.
///
/// Tiles are visited in coordinate order so a given roll sequence always
/// produces the same partition.
pub fn compute_explosion<P, R>(
    world: &TileWorld,
    definition: &ExplosionDefinition,
    params: &ExplosionParams,
    propagation: &P,
    max_breaks: u32,
    rng: &mut R,
) -> ExplosionOutcome
where
    P: Propagation + ?Sized,
    R: Rng + ?Sized,
{
    let field = propagation.propagate(world, params);

    let mut result = ExplosionResult::empty(params.epicenter, definition.id());
    result.space_transform = field.space_transform;
    result.iteration_intensity = field.iteration_intensity.clone();

    let curve_usable = match definition.break_curve().validate() {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(
                target: "blast::explosion",
                id = definition.id(),
                error = %err,
                "explosion.break_curve_malformed; no tiles will break"
            );
            false
        }
    };

    let mut breaks = Vec::new();
    for (&coord, &intensity) in &field.tiles {
        let start = world.tile(coord);
        let end = if curve_usable {
            let outcome = roll_tile_breaks(
                start,
                intensity,
                definition.tile_break_reroll_reduction(),
                max_breaks,
                |value| definition.tile_break_chance(value),
                &mut *rng,
            );
            if outcome.is_broken() {
                breaks.push(TileBreak {
                    coord,
                    from: start,
                    to: outcome.end,
                    breaks: outcome.breaks,
                });
            }
            outcome.end
        } else {
            start
        };

        if end.is_space() {
            result.space_tiles.insert(coord);
        } else {
            result.tiles.insert(coord, intensity);
        }
    }

    ExplosionOutcome {
        result,
        tile_intensity: field.tiles,
        breaks,
    }
}

/// Resolve `type_id` and compute with the roll sequence seeded from the inputs.
pub fn plan_explosion(
    ctx: &ExplosionContext<'_>,
    type_id: &str,
    params: &ExplosionParams,
) -> Result<ExplosionOutcome, ResolveError> {
    let definition = ctx.catalog.resolve(type_id)?;
    Ok(plan_with_definition(ctx, &definition, params))
}

pub fn plan_with_definition(
    ctx: &ExplosionContext<'_>,
    definition: &ExplosionDefinition,
    params: &ExplosionParams,
) -> ExplosionOutcome {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed(ctx.config.world_seed, definition.id()));
    compute_explosion(
        ctx.world,
        definition,
        params,
        &ctx.propagation(),
        ctx.config.max_tile_breaks,
        &mut rng,
    )
}

/// Write every broken tile back to the world. Returns the number written.
pub fn apply_tile_breaks(world: &mut TileWorld, outcome: &ExplosionOutcome) -> usize {
    outcome
        .breaks
        .iter()
        .filter(|tile_break| world.set_tile(tile_break.coord, tile_break.to))
        .count()
}
