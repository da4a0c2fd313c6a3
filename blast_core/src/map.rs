use std::collections::{BTreeMap, HashMap};

use bevy::{math::IVec2, prelude::Resource};
use blast_proto::{GridId, MapCoordinates, MapId, SpaceTransform, TileCoord};

/// Tile kinds ordered along the break chain, sturdiest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileKind {
    Space,
    Lattice,
    Plating,
    Floor,
    Reinforced,
}

impl TileKind {
    /// The tile left behind after one successful break.
    pub fn break_to(self) -> TileKind {
        match self {
            TileKind::Reinforced => TileKind::Floor,
            TileKind::Floor => TileKind::Plating,
            TileKind::Plating => TileKind::Lattice,
            TileKind::Lattice | TileKind::Space => TileKind::Space,
        }
    }

    pub fn is_space(self) -> bool {
        matches!(self, TileKind::Space)
    }
}

/// A tile grid anchored on a map.
///
/// Tile `(x, y)` covers `[x, x + 1) x [y, y + 1)` in the grid's local frame.
/// Tiles that were never set, or were broken down to space, read as
/// [`TileKind::Space`].
#[derive(Debug, Clone)]
pub struct Grid {
    map: MapId,
    transform: SpaceTransform,
    tiles: HashMap<IVec2, TileKind>,
}

impl Grid {
    pub fn new(map: MapId, transform: SpaceTransform) -> Self {
        Self {
            map,
            transform,
            tiles: HashMap::new(),
        }
    }

    /// A `width` x `height` rectangle of `fill` with a reinforced border.
    pub fn station(
        map: MapId,
        transform: SpaceTransform,
        width: u32,
        height: u32,
        fill: TileKind,
    ) -> Self {
        let mut grid = Self::new(map, transform);
        let (w, h) = (width as i32, height as i32);
        for y in 0..h {
            for x in 0..w {
                let border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
                let kind = if border { TileKind::Reinforced } else { fill };
                grid.set_tile(IVec2::new(x, y), kind);
            }
        }
        grid
    }

    pub fn map(&self) -> MapId {
        self.map
    }

    pub fn transform(&self) -> SpaceTransform {
        self.transform
    }

    pub fn tile(&self, position: IVec2) -> TileKind {
        self.tiles.get(&position).copied().unwrap_or(TileKind::Space)
    }

    pub fn set_tile(&mut self, position: IVec2, kind: TileKind) {
        if kind.is_space() {
            self.tiles.remove(&position);
        } else {
            self.tiles.insert(position, kind);
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> impl Iterator<Item = (IVec2, TileKind)> + '_ {
        self.tiles.iter().map(|(pos, kind)| (*pos, *kind))
    }

    /// Grid-local tile containing a map-space point.
    pub fn local_tile(&self, point: [f32; 2]) -> IVec2 {
        let local = self.transform.inverse_transform_point(point);
        IVec2::new(local[0].floor() as i32, local[1].floor() as i32)
    }
}

/// Authoritative tile state for every grid in the world.
///
/// Dry-run computations only ever see `&TileWorld`; the commit path is the
/// single writer and runs on the update schedule.
#[derive(Resource, Debug, Clone, Default)]
pub struct TileWorld {
    grids: BTreeMap<GridId, Grid>,
}

impl TileWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_grid(&mut self, id: GridId, grid: Grid) -> Option<Grid> {
        self.grids.insert(id, grid)
    }

    pub fn grid(&self, id: GridId) -> Option<&Grid> {
        self.grids.get(&id)
    }

    pub fn grids(&self) -> impl Iterator<Item = (GridId, &Grid)> + '_ {
        self.grids.iter().map(|(id, grid)| (*id, grid))
    }

    pub fn tile(&self, coord: TileCoord) -> TileKind {
        self.grids
            .get(&coord.grid)
            .map(|grid| grid.tile(IVec2::new(coord.x, coord.y)))
            .unwrap_or(TileKind::Space)
    }

    /// Returns `false` when the grid does not exist.
    pub fn set_tile(&mut self, coord: TileCoord, kind: TileKind) -> bool {
        match self.grids.get_mut(&coord.grid) {
            Some(grid) => {
                grid.set_tile(IVec2::new(coord.x, coord.y), kind);
                true
            }
            None => false,
        }
    }

    /// First grid (by id) on the point's map with a solid tile under it.
    pub fn tile_at(&self, point: &MapCoordinates) -> Option<TileCoord> {
        self.grids
            .iter()
            .filter(|(_, grid)| grid.map == point.map)
            .find_map(|(id, grid)| {
                let local = grid.local_tile(point.position());
                (!grid.tile(local).is_space()).then(|| TileCoord::new(*id, local.x, local.y))
            })
    }

    pub fn tile_count(&self) -> usize {
        self.grids.values().map(Grid::tile_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_chain_ends_in_space() {
        let mut kind = TileKind::Reinforced;
        let mut steps = 0;
        while !kind.is_space() {
            kind = kind.break_to();
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert_eq!(TileKind::Space.break_to(), TileKind::Space);
    }

    #[test]
    fn station_has_reinforced_border() {
        let grid = Grid::station(MapId(1), SpaceTransform::IDENTITY, 5, 4, TileKind::Floor);
        assert_eq!(grid.tile_count(), 20);
        assert_eq!(grid.tile(IVec2::new(0, 0)), TileKind::Reinforced);
        assert_eq!(grid.tile(IVec2::new(2, 2)), TileKind::Floor);
        assert_eq!(grid.tile(IVec2::new(9, 9)), TileKind::Space);
    }

    #[test]
    fn setting_space_removes_the_tile() {
        let mut grid = Grid::station(MapId(1), SpaceTransform::IDENTITY, 3, 3, TileKind::Floor);
        grid.set_tile(IVec2::new(1, 1), TileKind::Space);
        assert_eq!(grid.tile_count(), 8);
        assert!(grid.tile(IVec2::new(1, 1)).is_space());
    }

    #[test]
    fn tile_lookup_respects_grid_transform() {
        let mut world = TileWorld::new();
        world.insert_grid(
            GridId(7),
            Grid::station(
                MapId(2),
                SpaceTransform::new(0.0, [10.0, 20.0]),
                4,
                4,
                TileKind::Floor,
            ),
        );

        let hit = world.tile_at(&MapCoordinates::new(MapId(2), 11.5, 22.25));
        assert_eq!(hit, Some(TileCoord::new(GridId(7), 1, 2)));

        // Same position on another map, and a point off the grid.
        assert_eq!(world.tile_at(&MapCoordinates::new(MapId(1), 11.5, 22.25)), None);
        assert_eq!(world.tile_at(&MapCoordinates::new(MapId(2), 0.0, 0.0)), None);
    }

    #[test]
    fn set_tile_on_missing_grid_is_rejected() {
        let mut world = TileWorld::new();
        assert!(!world.set_tile(TileCoord::new(GridId(3), 0, 0), TileKind::Floor));
        assert_eq!(world.tile(TileCoord::new(GridId(3), 0, 0)), TileKind::Space);
    }
}
