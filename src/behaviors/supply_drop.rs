//! Supply drop arrivals (spec §1 purpose: one of the four per-match
//! background behaviors; not broken out as its own numbered component in
//! §4, so it's grounded here on the same periodic-job shape as loot refill
//! §4.9 and owned per-match for the same bulk-cleanup reason as projectiles
//! and trackers).
//!
//! A drop lands at a random point within the arena radius around the
//! deathmatch center on a fixed period; the tracker behavior (§4.8) folds
//! live drop positions into its target set.

use std::collections::HashMap;

use rand::Rng;

use crate::arena::{random_point_in_radius, Position};
use crate::clock::Tick;
use crate::match_engine::MatchId;

pub struct SupplyDropConfig {
    pub arrival_period_ticks: Tick,
    pub radius: f64,
}

impl Default for SupplyDropConfig {
    fn default() -> Self {
        Self {
            arrival_period_ticks: 20 * 120, // every 2 minutes
            radius: 40.0,
        }
    }
}

struct MatchDrops {
    drops: Vec<Position>,
    next_arrival: Tick,
}

/// Owns every match's active supply-drop positions, keyed for bulk cleanup
/// on match termination (same ownership rule as `ProjectileInstance` and
/// `TrackerBinding`, spec §3).
#[derive(Default)]
pub struct SupplyDropBehavior {
    config_defaults: Option<SupplyDropConfig>,
    per_match: HashMap<MatchId, MatchDrops>,
}

impl SupplyDropBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate_match(&mut self, match_id: MatchId, config: SupplyDropConfig, now: Tick) {
        self.per_match.insert(
            match_id,
            MatchDrops {
                drops: Vec::new(),
                next_arrival: now + config.arrival_period_ticks,
            },
        );
        self.config_defaults = Some(config);
    }

    pub fn cleanup_match(&mut self, match_id: MatchId) {
        self.per_match.remove(&match_id);
    }

    pub fn positions(&self, match_id: MatchId) -> &[Position] {
        self.per_match
            .get(&match_id)
            .map(|m| m.drops.as_slice())
            .unwrap_or(&[])
    }

    /// Spawns a new drop for every match whose arrival timer has elapsed.
    pub fn on_tick(&mut self, now: Tick, center_of: impl Fn(MatchId) -> Option<Position>, rng: &mut impl Rng) {
        let period = self
            .config_defaults
            .as_ref()
            .map(|c| c.arrival_period_ticks)
            .unwrap_or(SupplyDropConfig::default().arrival_period_ticks);
        let radius = self
            .config_defaults
            .as_ref()
            .map(|c| c.radius)
            .unwrap_or(SupplyDropConfig::default().radius);

        for (match_id, state) in self.per_match.iter_mut() {
            if now < state.next_arrival {
                continue;
            }
            state.next_arrival = now + period;
            if let Some(center) = center_of(*match_id) {
                state.drops.push(random_point_in_radius(rng, center, radius));
            }
        }
    }
}
