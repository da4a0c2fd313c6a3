//! Explosion tile-break model and preview server.
//!
//! Previews are dry runs against the shared [`TileWorld`]; commits go through
//! the [`ExplosionQueue`] and are applied when [`run_update`] is invoked.

pub mod break_chance;
pub mod command;
pub mod commit;
pub mod config;
pub mod definition;
pub mod engine;
pub mod hashing;
pub mod map;
pub mod preview;
pub mod propagation;

use std::sync::Arc;

use bevy::prelude::*;
use blast_proto::{GridId, MapId, SpaceTransform};

pub use break_chance::{roll_tile_breaks, BreakChanceCurve, MalformedCurve, TileBreakOutcome};
pub use command::{
    describe_outcome, execute_command, run_command_line, CommandError, CommandIssuer,
    CommandLineError, CommandOutcome,
};
pub use commit::{
    process_explosion_queue, Damageable, ExplosionEffect, ExplosionQueue, QueuedExplosion,
    TilePosition,
};
pub use config::{
    load_explosion_config, load_explosion_config_from_env, ExplosionConfig, ExplosionConfigError,
    ExplosionConfigHandle,
};
pub use definition::{
    load_explosion_catalog, load_explosion_catalog_from_env, Color, DamageSpecifier,
    ExplosionCatalog, ExplosionCatalogError, ExplosionCatalogHandle, ExplosionCatalogMetadata,
    ExplosionDefinition, ExplosionPresentation, ResolveError,
};
pub use engine::{
    apply_tile_breaks, compute_explosion, plan_explosion, ExplosionContext, ExplosionOutcome,
    ExplosionParams, TileBreak,
};
pub use map::{Grid, TileKind, TileWorld};
pub use preview::{service_preview_sessions, PreviewSession, PreviewSessions};
pub use propagation::{FloodFill, IntensityField, Propagation};

/// Construct a headless [`App`] from the environment-selected config and
/// catalog, seeded with a single demo station on map 1.
pub fn build_headless_app() -> App {
    let config = load_explosion_config_from_env();
    let (catalog, metadata) = load_explosion_catalog_from_env();

    let mut world = TileWorld::new();
    world.insert_grid(
        GridId(1),
        Grid::station(
            MapId(1),
            SpaceTransform::IDENTITY,
            config.station_width,
            config.station_height,
            TileKind::Floor,
        ),
    );

    let mut app = build_app_with(config, catalog, world);
    app.insert_resource(metadata);
    app
}

/// Construct an [`App`] around explicit config, catalog and tiles.
pub fn build_app_with(
    config: Arc<ExplosionConfig>,
    catalog: Arc<ExplosionCatalog>,
    world: TileWorld,
) -> App {
    let mut app = App::new();
    app.insert_resource(ExplosionConfigHandle::new(config))
        .insert_resource(ExplosionCatalogHandle::new(catalog))
        .insert_resource(world)
        .insert_resource(ExplosionQueue::default())
        .insert_resource(PreviewSessions::default())
        .add_event::<ExplosionEffect>()
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (service_preview_sessions, process_explosion_queue).chain(),
        );
    app
}

/// Run one update: answer pending previews, then apply queued commits.
pub fn run_update(app: &mut App) {
    app.update();
}
