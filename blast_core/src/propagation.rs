//! Intensity falloff from an epicenter across a tile grid.

use std::collections::{BTreeMap, HashSet};

use bevy::math::IVec2;
use blast_proto::{SpaceTransform, TileCoord};

use crate::engine::ExplosionParams;
use crate::map::{Grid, TileWorld};

/// Loops allowed before a fill gives up, whatever budget is left.
const MAX_FILL_ITERATIONS: usize = 10_000;

const NEIGHBOURS: [IVec2; 4] = [IVec2::X, IVec2::Y, IVec2::NEG_X, IVec2::NEG_Y];

/// Per-tile intensity produced by a propagation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntensityField {
    /// Every reached tile with a positive intensity.
    pub tiles: BTreeMap<TileCoord, f32>,
    /// Intensity of each ring, epicenter first. Non-increasing.
    pub iteration_intensity: Vec<f32>,
    pub space_transform: SpaceTransform,
}

impl IntensityField {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Maps explosion parameters onto the tiles they reach.
///
/// Implementations only read the world; they must never mutate it.
pub trait Propagation: Send + Sync {
    fn propagate(&self, world: &TileWorld, params: &ExplosionParams) -> IntensityField;
}

/// Ring flood fill over the grid under the epicenter.
///
/// Each pass raises every open ring, innermost first, by `slope` (capped at
/// `max_intensity`) and pays `raise * ring size` from the total budget, then
/// opens the next ring of 4-connected solid tiles. A ring the budget cannot
/// fully raise gets an even share of what is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodFill {
    pub max_rings: u32,
}

impl FloodFill {
    pub fn new(max_rings: u32) -> Self {
        Self { max_rings }
    }
}

impl Propagation for FloodFill {
    fn propagate(&self, world: &TileWorld, params: &ExplosionParams) -> IntensityField {
        let mut field = IntensityField::default();
        if !params.is_valid() || self.max_rings == 0 {
            return field;
        }
        let Some(origin) = world.tile_at(&params.epicenter) else {
            return field;
        };
        let Some(grid) = world.grid(origin.grid) else {
            return field;
        };
        field.space_transform = grid.transform();

        let origin_pos = IVec2::new(origin.x, origin.y);
        let mut visited: HashSet<IVec2> = HashSet::from([origin_pos]);
        let mut rings: Vec<Vec<IVec2>> = vec![vec![origin_pos]];
        let mut intensity: Vec<f32> = vec![0.0];
        let mut remaining = params.total_intensity;

        for _ in 0..MAX_FILL_ITERATIONS {
            let mut raised = false;
            for (ring, value) in rings.iter().zip(intensity.iter_mut()) {
                if remaining <= 0.0 {
                    break;
                }
                let headroom = params.max_intensity - *value;
                if headroom <= 0.0 {
                    continue;
                }
                let step = params.slope.min(headroom);
                let cost = step * ring.len() as f32;
                if cost <= remaining {
                    *value += step;
                    remaining -= cost;
                } else {
                    *value += remaining / ring.len() as f32;
                    remaining = 0.0;
                }
                raised = true;
            }
            if remaining <= 0.0 {
                break;
            }

            let grew = rings.len() < self.max_rings as usize
                && match next_ring(grid, &rings[rings.len() - 1], &mut visited) {
                    Some(ring) => {
                        rings.push(ring);
                        intensity.push(0.0);
                        true
                    }
                    None => false,
                };
            if !grew && !raised {
                break;
            }
        }

        while intensity.last().is_some_and(|value| *value <= 0.0) {
            intensity.pop();
            rings.pop();
        }

        for (ring, value) in rings.iter().zip(&intensity) {
            for pos in ring {
                field
                    .tiles
                    .insert(TileCoord::new(origin.grid, pos.x, pos.y), *value);
            }
        }
        field.iteration_intensity = intensity;
        field
    }
}

fn next_ring(grid: &Grid, frontier: &[IVec2], visited: &mut HashSet<IVec2>) -> Option<Vec<IVec2>> {
    let mut ring = Vec::new();
    for pos in frontier {
        for offset in NEIGHBOURS {
            let candidate = *pos + offset;
            if grid.tile(candidate).is_space() || !visited.insert(candidate) {
                continue;
            }
            ring.push(candidate);
        }
    }
    (!ring.is_empty()).then_some(ring)
}
