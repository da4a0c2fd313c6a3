//! Wire types shared by the explosion preview server and its clients.
//!
//! Messages are plain `serde` types encoded with `bincode`. The transport that
//! carries the encoded frames is owned by [`PreviewLink`].

use ahash::RandomState;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

mod link;

pub use link::{link_pair, LinkError, PreviewLink, ServerLink};

/// Identifier for a map (a disjoint coordinate space).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a tile grid placed on a map.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridId(pub u32);

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a connected requester (one preview session each).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position in map space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCoordinates {
    pub map: MapId,
    pub x: f32,
    pub y: f32,
}

impl MapCoordinates {
    pub fn new(map: MapId, x: f32, y: f32) -> Self {
        Self { map, x, y }
    }

    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl fmt::Display for MapCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map {} ({:.2}, {:.2})", self.map, self.x, self.y)
    }
}

/// Grid-local tile index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub grid: GridId,
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(grid: GridId, x: i32, y: i32) -> Self {
        Self { grid, x, y }
    }

    /// Center of the tile in grid-local space.
    pub fn center(&self) -> [f32; 2] {
        [self.x as f32 + 0.5, self.y as f32 + 0.5]
    }
}

/// Rigid 2D transform from a grid's local frame into map space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceTransform {
    /// Rotation in radians, counter-clockwise.
    pub rotation: f32,
    pub translation: [f32; 2],
}

impl SpaceTransform {
    pub const IDENTITY: Self = Self {
        rotation: 0.0,
        translation: [0.0, 0.0],
    };

    pub fn new(rotation: f32, translation: [f32; 2]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn transform_point(&self, point: [f32; 2]) -> [f32; 2] {
        let (sin, cos) = self.rotation.sin_cos();
        [
            cos * point[0] - sin * point[1] + self.translation[0],
            sin * point[0] + cos * point[1] + self.translation[1],
        ]
    }

    pub fn inverse_transform_point(&self, point: [f32; 2]) -> [f32; 2] {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = point[0] - self.translation[0];
        let dy = point[1] - self.translation[1];
        [cos * dx + sin * dy, -sin * dx + cos * dy]
    }
}

impl Default for SpaceTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Outcome of one explosion computation.
///
/// Built once per invocation and never mutated afterwards. `tiles` holds every
/// reached tile that did not become space, keyed to the intensity it received;
/// `space_tiles` holds the tiles whose break chain ran all the way to vacuum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplosionResult {
    pub epicenter: MapCoordinates,
    pub type_id: String,
    pub tiles: BTreeMap<TileCoord, f32>,
    pub space_tiles: BTreeSet<TileCoord>,
    pub space_transform: SpaceTransform,
    /// Intensity assigned to each flood-fill ring, epicenter first.
    pub iteration_intensity: Vec<f32>,
}

impl ExplosionResult {
    pub fn empty(epicenter: MapCoordinates, type_id: impl Into<String>) -> Self {
        Self {
            epicenter,
            type_id: type_id.into(),
            tiles: BTreeMap::new(),
            space_tiles: BTreeSet::new(),
            space_transform: SpaceTransform::IDENTITY,
            iteration_intensity: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty() && self.space_tiles.is_empty()
    }

    pub fn affected_tile_count(&self) -> usize {
        self.tiles.len() + self.space_tiles.len()
    }

    /// In-process hash of the tile partition, used to compare runs. Not stable
    /// across builds, so never persist it or send it over the wire.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
        hasher.write_usize(self.tiles.len());
        for (coord, intensity) in &self.tiles {
            write_coord(&mut hasher, coord);
            hasher.write_u32(intensity.to_bits());
        }
        hasher.write_usize(self.space_tiles.len());
        for coord in &self.space_tiles {
            write_coord(&mut hasher, coord);
        }
        hasher.finish()
    }
}

fn write_coord(hasher: &mut impl Hasher, coord: &TileCoord) {
    hasher.write_u32(coord.grid.0);
    hasher.write_i32(coord.x);
    hasher.write_i32(coord.y);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub epicenter: MapCoordinates,
    pub type_id: String,
    pub total_intensity: f32,
    pub slope: f32,
    pub max_intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewData {
    pub explosion: ExplosionResult,
    pub slope: f32,
    pub total_intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRejected {
    pub type_id: String,
    pub reason: String,
}

/// Messages sent by the previewing client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    PreviewRequest(PreviewRequest),
    Close,
}

/// Messages sent back by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    PreviewData(PreviewData),
    PreviewRejected(PreviewRejected),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] bincode::Error),
}

pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtoError> {
    bincode::serialize(message).map_err(ProtoError::Encode)
}

pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtoError> {
    bincode::deserialize(bytes).map_err(ProtoError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ExplosionResult {
        let mut result = ExplosionResult::empty(MapCoordinates::new(MapId(1), 3.0, 4.0), "default");
        result.tiles.insert(TileCoord::new(GridId(1), 3, 4), 12.0);
        result.tiles.insert(TileCoord::new(GridId(1), 3, 5), 7.0);
        result.space_tiles.insert(TileCoord::new(GridId(1), 4, 4));
        result.iteration_intensity = vec![12.0, 7.0];
        result
    }

    #[test]
    fn transform_inverse_recovers_point() {
        let transform = SpaceTransform::new(std::f32::consts::FRAC_PI_2, [10.0, -2.0]);
        let point = [3.5, 1.25];
        let mapped = transform.transform_point(point);
        assert!((mapped[0] - 8.75).abs() < 1e-4);
        assert!((mapped[1] - 1.5).abs() < 1e-4);

        let back = transform.inverse_transform_point(mapped);
        assert!((back[0] - point[0]).abs() < 1e-4);
        assert!((back[1] - point[1]).abs() < 1e-4);
    }

    #[test]
    fn fingerprint_tracks_partition() {
        let a = sample_result();
        let b = sample_result();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut moved = sample_result();
        let coord = TileCoord::new(GridId(1), 3, 5);
        moved.tiles.remove(&coord);
        moved.space_tiles.insert(coord);
        assert_ne!(a.fingerprint(), moved.fingerprint());
    }

    #[test]
    fn preview_data_survives_the_codec() {
        let data = ServerMessage::PreviewData(PreviewData {
            explosion: sample_result(),
            slope: 5.0,
            total_intensity: 50.0,
        });
        let bytes = encode_message(&data).expect("encode");
        let decoded: ServerMessage = decode_message(&bytes).expect("decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn garbage_frame_is_a_decode_error() {
        let result = decode_message::<ClientMessage>(&[0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(matches!(result, Err(ProtoError::Decode(_))));
    }
}
