//! Loot Table (spec §4.3): tiered weighted item catalog and container fill.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::opaque_item::OpaqueItemProvider;

pub type Tier = String;

/// Either a host-intrinsic material name or a deferred reference to an
/// add-in item resolved through an [`OpaqueItemProvider`] at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemOrigin {
    Material(String),
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    pub origin: ItemOrigin,
    pub tier: Tier,
    pub weight: f64,
    pub min_amount: u32,
    pub max_amount: u32,
}

#[derive(Debug, Deserialize)]
struct LootDocEntry {
    item: String,
    #[serde(default)]
    opaque: bool,
    tiers: HashMap<Tier, f64>,
    #[serde(default = "default_min")]
    min_amount: u32,
    #[serde(default = "default_max")]
    max_amount: u32,
}

fn default_min() -> u32 {
    1
}
fn default_max() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum LootError {
    #[error("no loot entries for tier `{0}`")]
    UnknownTier(String),
    #[error("target position does not host a writable container")]
    TargetNotContainer,
}

/// Tiered weighted item catalog, loaded once from a structured document and
/// consulted per container fill.
#[derive(Default)]
pub struct LootTable {
    entries: HashMap<Tier, Vec<LootEntry>>,
}

impl LootTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML loot document. Items tagged `opaque: true` are looked up
    /// through `opaque_provider`; if the provider has nothing registered for
    /// that name the entry is silently skipped (spec §4.3).
    pub fn load(source: &str, opaque_provider: &dyn OpaqueItemProvider) -> anyhow::Result<Self> {
        let doc: Vec<LootDocEntry> = serde_yaml::from_str(source)?;
        let mut table = LootTable::new();
        for entry in doc {
            if entry.min_amount > entry.max_amount {
                anyhow::bail!(
                    "loot entry `{}` has min-amount {} greater than max-amount {}",
                    entry.item,
                    entry.min_amount,
                    entry.max_amount
                );
            }
            let origin = if entry.opaque {
                if !opaque_provider.is_available(&entry.item) {
                    continue;
                }
                ItemOrigin::Opaque(entry.item.clone())
            } else {
                ItemOrigin::Material(entry.item.clone())
            };
            for (tier, weight) in entry.tiers {
                if weight <= 0.0 {
                    continue;
                }
                table.entries.entry(tier.clone()).or_default().push(LootEntry {
                    origin: origin.clone(),
                    tier,
                    weight,
                    min_amount: entry.min_amount,
                    max_amount: entry.max_amount,
                });
            }
        }
        Ok(table)
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.entries.keys()
    }

    /// Draw `u` uniformly in `[0, Σw)`; return the first entry whose
    /// cumulative prefix weight is `>= u`. `None` if the tier is unknown or
    /// its total weight is not strictly positive.
    pub fn random_item(&self, tier: &str, rng: &mut impl Rng) -> Option<&LootEntry> {
        let entries = self.entries.get(tier)?;
        let total: f64 = entries.iter().map(|e| e.weight).sum();
        if total <= 0.0 {
            return None;
        }
        let u = rng.random_range(0.0..total);
        let mut cumulative = 0.0;
        for entry in entries {
            cumulative += entry.weight;
            if cumulative >= u {
                return Some(entry);
            }
        }
        entries.last()
    }

    pub fn random_tier(&self, rng: &mut impl Rng) -> Option<&Tier> {
        let populated: Vec<&Tier> = self
            .entries
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k)
            .collect();
        if populated.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..populated.len());
        Some(populated[idx])
    }

    /// Picks a stack size uniformly in `[entry.min_amount, entry.max_amount]`.
    pub fn roll_stack_size(entry: &LootEntry, rng: &mut impl Rng) -> u32 {
        if entry.min_amount >= entry.max_amount {
            entry.min_amount
        } else {
            rng.random_range(entry.min_amount..=entry.max_amount)
        }
    }

    /// Fills `container`'s empty slots with `items_min`–`items_max` stacks
    /// (inclusive, uniform), up to 50 placement attempts. Each attempt draws
    /// a random empty slot and a random item for `tier`; a miss (no empty
    /// slot, or sampling came back empty) still counts against the attempt
    /// budget.
    pub fn fill_container(
        &self,
        tier: &str,
        container: &mut dyn ContainerSlots,
        items_min: u32,
        items_max: u32,
        rng: &mut impl Rng,
    ) -> Result<u32, LootError> {
        if !self.entries.contains_key(tier) {
            return Err(LootError::UnknownTier(tier.to_string()));
        }
        let target = if items_min >= items_max {
            items_min
        } else {
            rng.random_range(items_min..=items_max)
        };
        let mut placed = 0u32;
        for _ in 0..50 {
            if placed >= target {
                break;
            }
            let empty_slots = container.empty_slots();
            if empty_slots.is_empty() {
                break;
            }
            let Some(entry) = self.random_item(tier, rng) else {
                continue;
            };
            let slot = empty_slots[rng.random_range(0..empty_slots.len())];
            let amount = Self::roll_stack_size(entry, rng);
            container.set_slot(slot, entry.origin.clone(), amount);
            placed += 1;
        }
        Ok(placed)
    }
}

/// Slot-level view of a container a loot fill writes into. Kept separate
/// from `World` so `loot.rs` doesn't need a full world capability to be
/// unit-tested.
pub trait ContainerSlots {
    fn empty_slots(&self) -> Vec<u32>;
    fn set_slot(&mut self, slot: u32, item: ItemOrigin, amount: u32);
}
