//! Arena Registry (spec §4.2): arena definitions and their container sets.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

/// A point in the host world, with orientation.
///
/// Mirrors the teacher's `AxialHex` newtype shape (small struct + derived
/// arithmetic) but carries full 3D float coordinates since arenas are not
/// laid out on a hex grid.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
)]
pub struct Position {
    pub world_id: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Position {
    pub fn new(world_id: u64, x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self {
            world_id,
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A spawn point: a position plus the orientation a participant should face.
pub type SpawnPoint = Position;

pub type ArenaName = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena {
    pub name: ArenaName,
    pub world_id: u64,
    pub spawn_points: Vec<SpawnPoint>,
    pub deathmatch_center: Position,
    pub containers: Vec<Position>,
    pub min_participants: u32,
    pub max_participants: u32,
}

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("an arena named `{0}` already exists")]
    ArenaExists(String),
    #[error("invalid bounds for arena creation")]
    InvalidBounds,
    #[error("no arena named `{0}`")]
    NotFound(String),
}

/// Holds all arena definitions; case-insensitive name lookups. Container
/// sets are mutated only via [`ArenaRegistry::rescan_containers`].
#[derive(Default)]
pub struct ArenaRegistry {
    arenas: HashMap<String, Arena>,
}

impl ArenaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Scans a cubic volume centred on `origin` with the given `radius` for
    /// container-shaped world blocks (via `container_probe`), records their
    /// positions, and assigns spawn points on a radial layout around the
    /// perimeter.
    pub fn create(
        &mut self,
        name: &str,
        origin: Position,
        radius: f64,
        min_participants: u32,
        max_participants: u32,
        container_probe: impl Fn(Position) -> bool,
    ) -> Result<&Arena, ArenaError> {
        if radius <= 0.0 || min_participants == 0 || min_participants > max_participants {
            return Err(ArenaError::InvalidBounds);
        }
        let key = Self::key(name);
        if self.arenas.contains_key(&key) {
            return Err(ArenaError::ArenaExists(name.to_string()));
        }

        let containers = scan_containers(origin, radius, &container_probe);
        let spawn_points = radial_spawn_points(origin, radius, max_participants);

        let arena = Arena {
            name: name.to_string(),
            world_id: origin.world_id,
            spawn_points,
            deathmatch_center: origin,
            containers,
            min_participants,
            max_participants,
        };
        self.arenas.insert(key.clone(), arena);
        Ok(self.arenas.get(&key).expect("just inserted"))
    }

    pub fn get(&self, name: &str) -> Option<&Arena> {
        self.arenas.get(&Self::key(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Arena> {
        self.arenas.get_mut(&Self::key(name))
    }

    pub fn all(&self) -> impl Iterator<Item = &Arena> {
        self.arenas.values()
    }

    /// Replaces the container set atomically and returns the new count.
    pub fn rescan_containers(
        &mut self,
        name: &str,
        container_probe: impl Fn(Position) -> bool,
    ) -> Result<usize, ArenaError> {
        let key = Self::key(name);
        let arena = self
            .arenas
            .get_mut(&key)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;
        let origin = arena.deathmatch_center;
        // radius is not stored separately; re-derive the scan volume from the
        // furthest currently-known container, falling back to spawn spread.
        let radius = arena
            .containers
            .iter()
            .map(|c| origin.distance(c))
            .fold(32.0_f64, f64::max);
        let containers = scan_containers(origin, radius, &container_probe);
        let count = containers.len();
        arena.containers = containers;
        Ok(count)
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let arenas: Vec<&Arena> = self.arenas.values().collect();
        let doc = serde_yaml::to_string(&arenas)?;
        std::fs::write(path, doc)?;
        Ok(())
    }

    pub fn load(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        let doc = std::fs::read_to_string(path)?;
        let arenas: Vec<Arena> = serde_yaml::from_str(&doc)?;
        for arena in arenas {
            self.arenas.insert(Self::key(&arena.name), arena);
        }
        Ok(())
    }
}

fn scan_containers(origin: Position, radius: f64, probe: &impl Fn(Position) -> bool) -> Vec<Position> {
    let steps = (radius.ceil() as i64).max(1);
    let mut found = Vec::new();
    for dx in -steps..=steps {
        for dy in -steps..=steps {
            for dz in -steps..=steps {
                let candidate = Position::new(
                    origin.world_id,
                    origin.x + dx as f64,
                    origin.y + dy as f64,
                    origin.z + dz as f64,
                    0.0,
                    0.0,
                );
                if origin.distance(&candidate) <= radius && probe(candidate) {
                    found.push(candidate);
                }
            }
        }
    }
    found
}

fn radial_spawn_points(origin: Position, radius: f64, count: u32) -> Vec<SpawnPoint> {
    let count = count.max(1);
    (0..count)
        .map(|i| {
            let angle = (i as f64 / count as f64) * std::f64::consts::TAU;
            let x = origin.x + radius * angle.cos();
            let z = origin.z + radius * angle.sin();
            // Face inward, toward the arena center.
            let yaw = (angle.to_degrees() + 180.0) as f32 % 360.0;
            Position::new(origin.world_id, x, origin.y, z, yaw, 0.0)
        })
        .collect()
}

/// Validates a loaded loot/arena weight, per the Validation error kind.
pub fn validate_weight(item: &str, weight: f64) -> Result<(), ValidationError> {
    if weight <= 0.0 {
        return Err(ValidationError::NonPositiveWeight {
            item: item.to_string(),
            weight,
        });
    }
    Ok(())
}

/// Pick a uniformly random point within `radius` of `center` (used by
/// explosive ground ignition and hazard placement).
pub fn random_point_in_radius(rng: &mut impl Rng, center: Position, radius: f64) -> Position {
    let angle = rng.random_range(0.0..std::f64::consts::TAU);
    let r = radius * rng.random_range(0.0_f64..1.0).sqrt();
    Position::new(
        center.world_id,
        center.x + r * angle.cos(),
        center.y,
        center.z + r * angle.sin(),
        0.0,
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Position {
        Position::new(1, 0.0, 64.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn create_rejects_duplicate_names_case_insensitively() {
        let mut reg = ArenaRegistry::new();
        reg.create("Colosseum", origin(), 16.0, 2, 8, |_| false)
            .unwrap();
        let err = reg
            .create("colosseum", origin(), 16.0, 2, 8, |_| false)
            .unwrap_err();
        assert!(matches!(err, ArenaError::ArenaExists(_)));
    }

    #[test]
    fn create_rejects_invalid_bounds() {
        let mut reg = ArenaRegistry::new();
        let err = reg.create("x", origin(), -1.0, 2, 8, |_| false).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidBounds));
    }

    #[test]
    fn spawn_points_are_distinct_and_match_max_participants() {
        let mut reg = ArenaRegistry::new();
        reg.create("x", origin(), 16.0, 2, 6, |_| false).unwrap();
        let arena = reg.get("x").unwrap();
        assert_eq!(arena.spawn_points.len(), 6);
    }

    #[test]
    fn rescan_replaces_container_set_and_returns_count() {
        let mut reg = ArenaRegistry::new();
        reg.create("x", origin(), 4.0, 2, 6, |p| p.x == 1.0 && p.z == 0.0)
            .unwrap();
        let count = reg.rescan_containers("x", |p| p.x == 1.0 && p.z == 0.0).unwrap();
        assert_eq!(count, reg.get("x").unwrap().containers.len());
        assert!(count >= 1);
    }
}
