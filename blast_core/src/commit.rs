//! Live explosions: queued by commands, applied on the update step.

use std::collections::VecDeque;
use std::sync::Arc;

use bevy::prelude::*;
use blast_proto::{MapCoordinates, SessionId, TileCoord};
use tracing::info;

use crate::config::ExplosionConfigHandle;
use crate::definition::{
    DamageSpecifier, ExplosionCatalog, ExplosionCatalogHandle, ExplosionDefinition,
    ExplosionPresentation, ResolveError,
};
use crate::engine::{apply_tile_breaks, plan_with_definition, ExplosionContext, ExplosionParams};
use crate::map::TileWorld;

/// A resolved explosion waiting for the next update.
#[derive(Debug, Clone)]
pub struct QueuedExplosion {
    pub issuer: Option<SessionId>,
    pub definition: Arc<ExplosionDefinition>,
    pub params: ExplosionParams,
}

impl QueuedExplosion {
    pub fn type_id(&self) -> &str {
        self.definition.id()
    }
}

/// FIFO of committed explosions, drained once per update.
#[derive(Resource, Debug, Default)]
pub struct ExplosionQueue {
    pending: VecDeque<QueuedExplosion>,
}

impl ExplosionQueue {
    pub fn queue(&mut self, explosion: QueuedExplosion) {
        self.pending.push_back(explosion);
    }

    /// Resolve `type_id` and queue a live explosion.
    pub fn commit(
        &mut self,
        catalog: &ExplosionCatalog,
        issuer: Option<SessionId>,
        type_id: &str,
        params: ExplosionParams,
    ) -> Result<(), ResolveError> {
        let definition = catalog.resolve(type_id)?;
        self.queue(QueuedExplosion {
            issuer,
            definition,
            params,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueuedExplosion> + '_ {
        self.pending.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = QueuedExplosion> + '_ {
        self.pending.drain(..)
    }
}

/// Tile an entity stands on.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePosition(pub TileCoord);

/// Damage taken from explosions so far.
#[derive(Component, Debug, Clone, Default)]
pub struct Damageable {
    pub received: DamageSpecifier,
    pub hits: u32,
}

impl Damageable {
    pub fn apply(&mut self, damage: &DamageSpecifier) {
        self.received.add(damage);
        self.hits += 1;
    }
}

/// Emitted once per committed explosion for effect playback.
#[derive(Event, Debug, Clone)]
pub struct ExplosionEffect {
    pub epicenter: MapCoordinates,
    pub type_id: String,
    pub presentation: ExplosionPresentation,
    pub total_intensity: f32,
    pub broken_tiles: usize,
    pub space_tiles: usize,
}

pub fn process_explosion_queue(
    mut queue: ResMut<ExplosionQueue>,
    mut world: ResMut<TileWorld>,
    catalog: Res<ExplosionCatalogHandle>,
    config: Res<ExplosionConfigHandle>,
    mut targets: Query<(&TilePosition, &mut Damageable)>,
    mut effects: EventWriter<ExplosionEffect>,
) {
    if queue.is_empty() {
        return;
    }

    for queued in queue.drain() {
        let outcome = {
            let ctx = ExplosionContext::new(&world, &catalog.0, &config.0);
            plan_with_definition(&ctx, &queued.definition, &queued.params)
        };
        let broken_tiles = apply_tile_breaks(&mut world, &outcome);

        let mut damaged = 0usize;
        for (position, mut damageable) in targets.iter_mut() {
            if let Some(intensity) = outcome.intensity_at(&position.0) {
                damageable.apply(&queued.definition.damage_at(intensity));
                damaged += 1;
            }
        }

        info!(
            target: "blast::commit",
            issuer = ?queued.issuer.map(|session| session.0),
            type_id = queued.type_id(),
            epicenter = %queued.params.epicenter,
            broken_tiles,
            space_tiles = outcome.result.space_tiles.len(),
            damaged,
            "explosion.committed"
        );

        effects.send(ExplosionEffect {
            epicenter: queued.params.epicenter,
            type_id: queued.type_id().to_string(),
            presentation: queued.definition.presentation().clone(),
            total_intensity: queued.params.total_intensity,
            broken_tiles,
            space_tiles: outcome.result.space_tiles.len(),
        });
    }
}
