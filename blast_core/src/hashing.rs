use std::hash::Hasher;

use blast_proto::MapCoordinates;

/// FNV-1a 64-bit hasher backing [`explosion_seed`].
///
/// A preview served by one process and the commit applied later must roll the
/// same breaks, so the seed hash has to be fixed across processes and builds.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        self.state = bytes.iter().fold(self.state, |state, &byte| {
            (state ^ u64::from(byte)).wrapping_mul(Self::PRIME)
        });
    }
}

/// Roll seed for one explosion.
///
/// Identical inputs against the same world seed always yield the same seed, so
/// a preview and the commit that follows it roll the same sequence.
pub fn explosion_seed(
    world_seed: u64,
    type_id: &str,
    epicenter: &MapCoordinates,
    total_intensity: f32,
    slope: f32,
    max_intensity: f32,
) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write_u64(world_seed);
    hasher.write(type_id.as_bytes());
    hasher.write_u8(0xff);
    hasher.write_u32(epicenter.map.0);
    hasher.write_u32(epicenter.x.to_bits());
    hasher.write_u32(epicenter.y.to_bits());
    hasher.write_u32(total_intensity.to_bits());
    hasher.write_u32(slope.to_bits());
    hasher.write_u32(max_intensity.to_bits());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blast_proto::MapId;

    #[test]
    fn fnv_matches_reference_vector() {
        let mut hasher = FnvHasher::new();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn seed_depends_on_every_input() {
        let epicenter = MapCoordinates::new(MapId(1), 3.0, 4.0);
        let base = explosion_seed(7, "Default", &epicenter, 50.0, 5.0, 100.0);
        assert_eq!(base, explosion_seed(7, "Default", &epicenter, 50.0, 5.0, 100.0));

        let moved = MapCoordinates::new(MapId(1), 3.0, 5.0);
        assert_ne!(base, explosion_seed(8, "Default", &epicenter, 50.0, 5.0, 100.0));
        assert_ne!(base, explosion_seed(7, "Cryo", &epicenter, 50.0, 5.0, 100.0));
        assert_ne!(base, explosion_seed(7, "Default", &moved, 50.0, 5.0, 100.0));
        assert_ne!(base, explosion_seed(7, "Default", &epicenter, 51.0, 5.0, 100.0));
        assert_ne!(base, explosion_seed(7, "Default", &epicenter, 50.0, 4.0, 100.0));
        assert_ne!(base, explosion_seed(7, "Default", &epicenter, 50.0, 5.0, 90.0));
    }
}
