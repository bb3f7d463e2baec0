//! The explicit `Context`/engine aggregate (spec §9 Design Notes: replace
//! ambient plugin-instance statics with explicit capability passing). Every
//! component is constructed once at boot and threaded through here; nothing
//! reaches into process-wide state.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::arena::{ArenaError, ArenaRegistry, Position};
use crate::behaviors::explosive::ExplosiveBehavior;
use crate::behaviors::supply_drop::{SupplyDropBehavior, SupplyDropConfig};
use crate::behaviors::tracker::{TrackerBehavior, TrackerBinding, TrackerTarget};
use crate::clock::Tick;
use crate::config::Config;
use crate::loot::LootTable;
use crate::match_engine::registry::{MatchCleanupHook, MatchRegistry};
use crate::match_engine::team::TeamManager;
use crate::match_engine::{AdmissionError, MatchEvent, MatchId, ParticipantId, Phase};
use crate::opaque_item::OpaqueItemProvider;
use crate::stats::StatsSink;
use crate::world::{ContainerHandle, ParticipantHandle, World};

const TRACKER_ITEM_ID: &str = "compass_tracker";

/// Adapter from a `World` container handle to the `LootTable::fill_container`
/// slot interface (spec §4.3's `ContainerSlots` is kept world-agnostic so
/// loot logic stays unit-testable without a live `World`).
struct WorldContainer<'a> {
    world: &'a dyn World,
    handle: ContainerHandle,
}

impl crate::loot::ContainerSlots for WorldContainer<'_> {
    fn empty_slots(&self) -> Vec<u32> {
        self.world.empty_slots(self.handle)
    }
    fn set_slot(&mut self, slot: u32, item: crate::loot::ItemOrigin, amount: u32) {
        self.world.set_slot(self.handle, slot, item, amount);
    }
}

struct CleanupHook<'a> {
    explosives: &'a mut HashMap<MatchId, ExplosiveBehavior>,
    trackers: &'a mut TrackerBehavior,
    supply_drops: &'a mut SupplyDropBehavior,
    teams: &'a mut TeamManager,
}

impl MatchCleanupHook for CleanupHook<'_> {
    fn cleanup_match(&mut self, match_id: MatchId) {
        self.explosives.remove(&match_id);
        self.trackers.cleanup_match(match_id);
        self.supply_drops.cleanup_match(match_id);
        self.teams.cleanup_match(match_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSummary<'a> {
    pub arena: &'a str,
    pub phase: Phase,
    pub roster_size: usize,
}

/// Aggregates every leaf component (spec §2 dependency order) behind one
/// capability struct. Owns the single logical tick and is the only thing
/// `main.rs`/the CLI admin surface talks to.
pub struct Engine {
    pub config: Config,
    world: Arc<dyn World>,
    stats: Arc<dyn StatsSink>,
    opaque_items: Arc<dyn OpaqueItemProvider>,
    arenas: ArenaRegistry,
    loot: LootTable,
    matches: MatchRegistry,
    teams: TeamManager,
    explosives: HashMap<MatchId, ExplosiveBehavior>,
    trackers: TrackerBehavior,
    supply_drops: SupplyDropBehavior,
    rng: StdRng,
    now: Tick,
}

impl Engine {
    pub fn new(
        config: Config,
        world: Arc<dyn World>,
        stats: Arc<dyn StatsSink>,
        opaque_items: Arc<dyn OpaqueItemProvider>,
    ) -> Self {
        Self {
            config,
            world,
            stats,
            opaque_items,
            arenas: ArenaRegistry::new(),
            loot: LootTable::new(),
            matches: MatchRegistry::new(),
            teams: TeamManager::new(),
            explosives: HashMap::new(),
            trackers: TrackerBehavior::new(),
            supply_drops: SupplyDropBehavior::new(),
            rng: StdRng::from_os_rng(),
            now: 0,
        }
    }

    pub fn load_loot(&mut self, source: &str) -> anyhow::Result<()> {
        self.loot = LootTable::load(source, self.opaque_items.as_ref())?;
        Ok(())
    }

    pub fn create_arena(
        &mut self,
        name: &str,
        origin: Position,
        radius: f64,
        min_participants: u32,
        max_participants: u32,
    ) -> Result<(), ArenaError> {
        let world = self.world.clone();
        self.arenas.create(name, origin, radius, min_participants, max_participants, |pos| {
            world.get_block(pos).as_deref() == Some("chest")
        })?;
        Ok(())
    }

    pub fn rescan_containers(&mut self, name: &str) -> Result<usize, ArenaError> {
        let world = self.world.clone();
        self.arenas
            .rescan_containers(name, |pos| world.get_block(pos).as_deref() == Some("chest"))
    }

    /// `start <arena>`: activates (or reuses) the arena's non-terminal match.
    pub fn start(&mut self, arena_name: &str) -> anyhow::Result<MatchId> {
        let arena = self
            .arenas
            .get(arena_name)
            .ok_or_else(|| anyhow::anyhow!("no arena named `{arena_name}`"))?
            .clone();
        let id = self.matches.get_or_create(&arena, &self.config, self.now);
        if let Some(m) = self.matches.get_mut(&id) {
            if m.phase() == Phase::Inactive {
                m.activate(self.now)?;
                self.teams
                    .start_setup_timer(id, self.now + self.config.phases.setup_period_seconds * 20);
                self.supply_drops.activate_match(id, SupplyDropConfig::default(), self.now);
            }
        }
        Ok(id)
    }

    /// `stop`: administrative stop of the arena's active match.
    pub fn stop(&mut self, arena_name: &str) -> anyhow::Result<()> {
        let id = self
            .matches
            .by_arena(arena_name)
            .map(|m| m.id)
            .ok_or_else(|| anyhow::anyhow!("no active match on `{arena_name}`"))?;
        if let Some(m) = self.matches.get_mut(&id) {
            m.admin_stop(self.now);
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<ArenaSummary<'_>> {
        self.matches
            .active()
            .map(|m| ArenaSummary {
                arena: &m.arena,
                phase: m.phase(),
                roster_size: m.roster().len(),
            })
            .collect()
    }

    pub fn admit(&mut self, arena_name: &str, participant: ParticipantId) -> anyhow::Result<()> {
        if self.matches.is_admitted_anywhere(&participant) {
            anyhow::bail!(AdmissionError::AlreadyInMatch);
        }
        let id = self
            .matches
            .by_arena(arena_name)
            .map(|m| m.id)
            .ok_or_else(|| anyhow::anyhow!("no active match on `{arena_name}`"))?;
        let m = self.matches.get_mut(&id).expect("looked up by arena");
        m.admit(participant.clone(), self.now)?;
        self.matches.track_admission(id, participant);
        Ok(())
    }

    /// Advances the engine by one logical tick: drives every match's phase
    /// timers and periodic work, advances projectile ballistics/fuses and
    /// supply-drop arrivals, then sweeps terminal matches so behavior
    /// cleanup happens on the very next tick (P9).
    pub fn tick(&mut self, now: Tick) {
        self.now = now;
        let match_ids: Vec<MatchId> = self.matches.active().map(|m| m.id).collect();
        for &id in &match_ids {
            let events = {
                let Some(m) = self.matches.get_mut(&id) else { continue };
                m.on_tick(now, self.stats.as_ref());
                m.drain_events()
            };
            for event in events {
                self.handle_event(id, event);
            }
        }

        self.tick_supply_drops();
        for &id in &match_ids {
            self.tick_explosives(id);
        }

        let mut cleanup = CleanupHook {
            explosives: &mut self.explosives,
            trackers: &mut self.trackers,
            supply_drops: &mut self.supply_drops,
            teams: &mut self.teams,
        };
        self.matches.sweep_terminal(&mut cleanup);
    }

    fn tick_supply_drops(&mut self) {
        let arenas = &self.arenas;
        let matches = &self.matches;
        self.supply_drops.on_tick(
            self.now,
            |match_id| {
                let m = matches.get(&match_id)?;
                let arena = arenas.get(&m.arena)?;
                Some(arena.deathmatch_center)
            },
            &mut self.rng,
        );
    }

    /// Advances one match's in-flight projectiles against the live positions
    /// of its alive roster (spec §2/§4.7: "Clock ticks drive ... projectile
    /// physics").
    fn tick_explosives(&mut self, match_id: MatchId) {
        let Some(m) = self.matches.get(&match_id) else { return };
        if !matches!(m.phase(), Phase::Active | Phase::Deathmatch) {
            return;
        }
        let world = self.world.clone();
        let handles: Vec<(ParticipantId, Position)> = m
            .roster()
            .iter()
            .filter(|(_, state)| state.alive)
            .filter_map(|(id, _)| world.get_position(&HandleRef(id)).map(|position| (id.clone(), position)))
            .collect();
        let refs: Vec<HandleRef> = handles.iter().map(|(id, _)| HandleRef(id)).collect();
        let roster: Vec<(&ParticipantId, &dyn ParticipantHandle, Position)> = handles
            .iter()
            .zip(refs.iter())
            .map(|((id, position), handle)| (id, handle as &dyn ParticipantHandle, *position))
            .collect();
        let Some(explosive) = self.explosives.get_mut(&match_id) else { return };
        explosive.on_tick(self.now, world.as_ref(), &roster, &mut self.rng);
    }

    fn handle_event(&mut self, match_id: MatchId, event: MatchEvent) {
        match event {
            MatchEvent::PhaseChanged { .. } | MatchEvent::Completed => {}
            MatchEvent::RefillContainersDue => self.refill_containers(match_id),
            MatchEvent::NotifyTrackersDue => self.notify_trackers(match_id),
            MatchEvent::RelocateToDeathmatchCenter { participants } => {
                self.relocate_to_deathmatch_center(match_id, participants)
            }
        }
    }

    const CONTAINERS_PER_CYCLE: usize = 3;

    fn refill_containers(&mut self, match_id: MatchId) {
        let Some(m) = self.matches.get(&match_id) else { return };
        let Some(arena) = self.arenas.get(&m.arena) else { return };
        let mut positions = arena.containers.clone();
        if positions.is_empty() {
            return;
        }
        use rand::seq::SliceRandom;
        positions.shuffle(&mut self.rng);
        positions.truncate(Self::CONTAINERS_PER_CYCLE);

        for position in positions {
            let Some(handle) = self.world.open_container(position) else {
                warn!(?position, "refill target is not a writable container");
                continue;
            };
            let Some(tier) = self.loot.random_tier(&mut self.rng).cloned() else {
                continue;
            };
            let mut container = WorldContainer {
                world: self.world.as_ref(),
                handle,
            };
            let fill = &self.config.container_fill;
            if let Err(err) = self.loot.fill_container(
                &tier,
                &mut container,
                fill.items_per_container_min,
                fill.items_per_container_max,
                &mut self.rng,
            ) {
                warn!(?err, ?position, "container fill skipped this cycle");
            }
        }
    }

    fn notify_trackers(&mut self, _match_id: MatchId) {
        let world = self.world.clone();
        let matches = &self.matches;
        let supply_drops = &self.supply_drops;
        self.trackers.on_tick(
            self.now,
            world.as_ref(),
            |holder| world.get_position(&HandleRef(holder)),
            |holder| world.get_position(&HandleRef(holder)).map(|p| p.yaw),
            |holder| world.has_item(&HandleRef(holder), TRACKER_ITEM_ID),
            |mid, holder| {
                let Some(m) = matches.get(&mid) else { return Vec::new() };
                let mut targets: Vec<TrackerTarget> = m
                    .roster()
                    .iter()
                    .filter(|(id, state)| state.alive && *id != holder)
                    .filter_map(|(id, state)| {
                        world
                            .get_position(&HandleRef(id))
                            .map(|position| TrackerTarget {
                                id: id.clone(),
                                position,
                                kills: state.kills,
                                is_supply_drop: false,
                            })
                    })
                    .collect();
                targets.extend(supply_drops.positions(mid).iter().map(|&position| TrackerTarget {
                    id: Vec::new(),
                    position,
                    kills: 0,
                    is_supply_drop: true,
                }));
                targets
            },
        );
    }

    fn relocate_to_deathmatch_center(&mut self, match_id: MatchId, participants: Vec<ParticipantId>) {
        let Some(m) = self.matches.get(&match_id) else { return };
        let Some(arena) = self.arenas.get(&m.arena) else { return };
        let center = arena.deathmatch_center;
        for participant in participants {
            self.world.move_to(&HandleRef(&participant), center);
        }
    }

    pub fn bind_tracker(&mut self, match_id: MatchId, holder: ParticipantId) {
        self.trackers
            .bind(TrackerBinding::new(holder, match_id, &self.config.tracker, self.now));
    }

    pub fn explosives_for(&mut self, match_id: MatchId) -> &mut ExplosiveBehavior {
        let config = self.config.explosive.clone();
        self.explosives
            .entry(match_id)
            .or_insert_with(|| ExplosiveBehavior::new(config))
    }
}

/// Thin `ParticipantHandle` adapter over a raw id, for call sites that only
/// have the id bytes on hand (not a live handle object).
struct HandleRef<'a>(&'a ParticipantId);
impl ParticipantHandle for HandleRef<'_> {
    fn id(&self) -> &[u8] {
        self.0
    }
    fn name(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::explosive::ProjectileKind;
    use crate::behaviors::supply_drop::SupplyDropConfig;
    use crate::config::PhaseTimings;
    use crate::opaque_item::NoOpaqueItems;
    use crate::stats::LoggingStatsSink;
    use crate::world::test_double::RecordingWorld;

    fn fast_config() -> Config {
        Config {
            phases: PhaseTimings {
                setup_period_seconds: 0,
                countdown_seconds: 0,
                grace_seconds: 0,
                active_seconds: 600,
                deathmatch_seconds: 180,
            },
            ..Config::default()
        }
    }

    fn origin() -> Position {
        Position::new(1, 0.0, 64.0, 0.0, 0.0, 0.0)
    }

    fn new_engine(config: Config) -> Engine {
        Engine::new(config, Arc::new(RecordingWorld::default()), Arc::new(LoggingStatsSink), Arc::new(NoOpaqueItems))
    }

    #[test]
    fn tick_drives_explosive_fuses_and_detonation_for_active_matches() {
        let mut config = fast_config();
        config.explosive.fuse_ticks = 1;
        let mut engine = new_engine(config);
        engine.create_arena("colosseum", origin(), 50.0, 2, 8).unwrap();
        let match_id = engine.start("colosseum").unwrap();
        engine.admit("colosseum", vec![1]).unwrap();
        engine.admit("colosseum", vec![2]).unwrap();
        engine.tick(1); // all-zero pre-combat timings cascade straight to Active
        assert_eq!(engine.matches.get(&match_id).unwrap().phase(), Phase::Active);

        engine.explosives_for(match_id).throw(vec![1], ProjectileKind::Fire, origin(), 1).unwrap();
        assert_eq!(engine.explosives_for(match_id).instance_count(), 1);

        // The engine's own tick loop, not a direct behavior call, must
        // advance the fuse and detonate it once it reaches zero.
        engine.tick(2);
        assert_eq!(
            engine.explosives_for(match_id).instance_count(),
            0,
            "Engine::tick must drive ExplosiveBehavior::on_tick so fuses advance and detonate"
        );
    }

    #[test]
    fn tick_drives_supply_drop_arrivals() {
        let mut engine = new_engine(fast_config());
        engine.create_arena("colosseum", origin(), 50.0, 2, 8).unwrap();
        let match_id = engine.start("colosseum").unwrap();
        engine.supply_drops.cleanup_match(match_id);
        engine
            .supply_drops
            .activate_match(match_id, SupplyDropConfig { arrival_period_ticks: 1, radius: 10.0 }, 0);

        assert!(engine.supply_drops.positions(match_id).is_empty());
        engine.tick(1);
        assert_eq!(
            engine.supply_drops.positions(match_id).len(),
            1,
            "Engine::tick must drive SupplyDropBehavior::on_tick so drops actually arrive"
        );
    }
}
