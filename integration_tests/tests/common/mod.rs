#![allow(dead_code)]

use std::sync::Arc;

use bevy::prelude::App;
use blast_core::{build_app_with, ExplosionCatalog, ExplosionConfig, Grid, TileKind, TileWorld};
use blast_proto::{GridId, MapCoordinates, MapId, SpaceTransform};

pub const STATION_GRID: GridId = GridId(1);
pub const STATION_MAP: MapId = MapId(1);

pub fn test_config() -> Arc<ExplosionConfig> {
    Arc::new(
        ExplosionConfig::from_json_str(r#"{"world_seed": 42, "max_rings": 32}"#)
            .expect("test config parses"),
    )
}

pub fn station_world() -> TileWorld {
    let mut world = TileWorld::new();
    world.insert_grid(
        STATION_GRID,
        Grid::station(STATION_MAP, SpaceTransform::IDENTITY, 24, 16, TileKind::Floor),
    );
    world
}

/// Catalog with a single `default` type.
pub fn default_only_catalog() -> Arc<ExplosionCatalog> {
    Arc::new(
        ExplosionCatalog::from_json_str(
            r#"{"version": 1, "explosions": [
                {"id": "default", "damagePerIntensity": {"Heat": 5.0}}
            ]}"#,
        )
        .expect("test catalog parses"),
    )
}

pub fn build_test_app() -> App {
    build_app_with(test_config(), ExplosionCatalog::builtin(), station_world())
}

pub fn station_centre() -> MapCoordinates {
    MapCoordinates::new(STATION_MAP, 12.5, 8.5)
}

/// Every solid tile, sorted, for before/after comparisons.
pub fn tile_snapshot(world: &TileWorld) -> Vec<(u32, i32, i32, TileKind)> {
    let mut tiles: Vec<_> = world
        .grids()
        .flat_map(|(id, grid)| {
            grid.tiles()
                .map(move |(pos, kind)| (id.0, pos.x, pos.y, kind))
        })
        .collect();
    tiles.sort();
    tiles
}
