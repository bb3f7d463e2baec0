//! Match Registry (spec §4.5): all active matches, lookup by participant or
//! arena, and the single point from which per-match behavior cleanup
//! (projectiles, trackers, teams) is triggered on deregistration.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::arena::{Arena, ArenaName};
use crate::clock::Tick;
use crate::config::Config;
use crate::match_engine::{Match, MatchId, ParticipantId, Phase};

/// Invoked once per deregistered match so behavior subsystems keyed by
/// `MatchId` can drop their state (satisfies P9: no projectile/tracker
/// references a match past the tick it terminates on).
pub trait MatchCleanupHook {
    fn cleanup_match(&mut self, match_id: MatchId);
}

/// Holds every non-terminal `Match`, one per arena (spec §3: "a Match holds
/// a logical reference [to an Arena]... never share an arena simultaneously").
#[derive(Default)]
pub struct MatchRegistry {
    matches: HashMap<MatchId, Match>,
    by_arena: HashMap<ArenaName, MatchId>,
    by_participant: HashMap<ParticipantId, MatchId>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing non-terminal Match on `arena`, else creates one.
    pub fn get_or_create(&mut self, arena: &Arena, config: &Config, now: Tick) -> MatchId {
        if let Some(&id) = self.by_arena.get(&arena.name) {
            if self.matches.contains_key(&id) {
                return id;
            }
        }
        let id = Uuid::now_v7();
        let m = Match::new(
            id,
            arena,
            config.phases.clone(),
            config.container_fill.refill_interval_seconds,
            now,
        );
        self.matches.insert(id, m);
        self.by_arena.insert(arena.name.clone(), id);
        info!(match_id = %id, arena = %arena.name, "match created");
        id
    }

    pub fn get(&self, id: &MatchId) -> Option<&Match> {
        self.matches.get(id)
    }

    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut Match> {
        self.matches.get_mut(id)
    }

    pub fn by_participant(&self, participant: &ParticipantId) -> Option<&Match> {
        self.by_participant
            .get(participant)
            .and_then(|id| self.matches.get(id))
    }

    pub fn by_arena(&self, arena: &str) -> Option<&Match> {
        self.by_arena.get(arena).and_then(|id| self.matches.get(id))
    }

    pub fn active(&self) -> impl Iterator<Item = &Match> {
        self.matches.values()
    }

    /// Records that `participant` now belongs to `match_id`'s roster; called
    /// by the orchestrator right after a successful `Match::admit`, so that
    /// P1 (unique membership) can be enforced registry-wide rather than
    /// per-match.
    pub fn track_admission(&mut self, match_id: MatchId, participant: ParticipantId) {
        self.by_participant.insert(participant, match_id);
    }

    pub fn untrack_participant(&mut self, participant: &ParticipantId) {
        self.by_participant.remove(participant);
    }

    pub fn is_admitted_anywhere(&self, participant: &ParticipantId) -> bool {
        self.by_participant.contains_key(participant)
    }

    /// Sweeps every match, deregistering the ones that have reached a
    /// terminal phase and invoking `cleanup` for each so bulk behavior
    /// teardown happens on the very next tick after termination.
    pub fn sweep_terminal(&mut self, cleanup: &mut dyn MatchCleanupHook) {
        let terminal: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|(_, m)| matches!(m.phase(), Phase::Finished | Phase::Aborted))
            .map(|(id, _)| *id)
            .collect();
        for id in terminal {
            self.deregister(id, cleanup);
        }
    }

    fn deregister(&mut self, id: MatchId, cleanup: &mut dyn MatchCleanupHook) {
        let Some(m) = self.matches.remove(&id) else {
            return;
        };
        self.by_arena.remove(&m.arena);
        self.by_participant.retain(|_, v| *v != id);
        cleanup.cleanup_match(id);
        info!(match_id = %id, arena = %m.arena, "match deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Position;
    use crate::config::Config;
    use crate::stats::LoggingStatsSink;

    fn arena(name: &str) -> Arena {
        Arena {
            name: name.to_string(),
            world_id: 1,
            spawn_points: Vec::new(),
            deathmatch_center: Position::new(1, 0.0, 64.0, 0.0, 0.0, 0.0),
            containers: Vec::new(),
            min_participants: 2,
            max_participants: 4,
        }
    }

    struct RecordingCleanup(Vec<MatchId>);
    impl MatchCleanupHook for RecordingCleanup {
        fn cleanup_match(&mut self, match_id: MatchId) {
            self.0.push(match_id);
        }
    }

    #[test]
    fn get_or_create_returns_existing_nonterminal_match_on_arena() {
        let mut reg = MatchRegistry::new();
        let config = Config::default();
        let a = arena("x");
        let id1 = reg.get_or_create(&a, &config, 0);
        let id2 = reg.get_or_create(&a, &config, 0);
        assert_eq!(id1, id2);
    }

    #[test]
    fn sweep_terminal_deregisters_and_invokes_cleanup() {
        let mut reg = MatchRegistry::new();
        let config = Config::default();
        let a = arena("x");
        let id = reg.get_or_create(&a, &config, 0);
        reg.get_mut(&id).unwrap().admin_stop(1);
        let mut cleanup = RecordingCleanup(Vec::new());
        reg.sweep_terminal(&mut cleanup);
        assert!(reg.get(&id).is_none());
        assert_eq!(cleanup.0, vec![id]);
        assert!(reg.by_arena("x").is_none());
    }

    #[test]
    fn participant_tracking_enforces_single_match_membership() {
        let mut reg = MatchRegistry::new();
        let config = Config::default();
        let a1 = arena("a1");
        let a2 = arena("a2");
        let id1 = reg.get_or_create(&a1, &config, 0);
        let id2 = reg.get_or_create(&a2, &config, 0);
        let p = vec![1u8];
        reg.get_mut(&id1).unwrap().activate(0).unwrap();
        reg.get_mut(&id1).unwrap().admit(p.clone(), 0).unwrap();
        reg.track_admission(id1, p.clone());
        assert!(reg.is_admitted_anywhere(&p));
        assert_eq!(
            reg.get_mut(&id2).unwrap().admit(p.clone(), 0),
            Err(crate::match_engine::AdmissionError::MatchNotAdmitting)
        );
        let _ = LoggingStatsSink;
    }
}
