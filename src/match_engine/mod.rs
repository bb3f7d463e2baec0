//! Match (spec §4.4): the per-match state machine, roster, timers, kill
//! ledger, and the periodic work that rides on top of phase ticking.

pub mod behavior;
pub mod registry;
pub mod team;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::arena::{Arena, ArenaName};
use crate::clock::Tick;
use crate::config::PhaseTimings;
use crate::stats::{MatchPhase, Placement, StatsSink};

pub const TICKS_PER_SECOND: Tick = 20;

pub type ParticipantId = Vec<u8>;
pub type MatchId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inactive,
    Waiting,
    Countdown,
    Grace,
    Active,
    Deathmatch,
    Finished,
    Aborted,
}

impl Phase {
    fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Aborted)
    }

    fn as_stats_phase(self) -> MatchPhase {
        match self {
            Phase::Waiting | Phase::Inactive => MatchPhase::Waiting,
            Phase::Countdown => MatchPhase::Countdown,
            Phase::Grace => MatchPhase::Grace,
            Phase::Active => MatchPhase::Active,
            Phase::Deathmatch | Phase::Finished | Phase::Aborted => MatchPhase::Deathmatch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub alive: bool,
    pub kills: u32,
    pub damage_dealt: f64,
    pub chests_opened: u32,
    pub join_epoch: Tick,
}

impl ParticipantState {
    fn new(join_epoch: Tick) -> Self {
        Self {
            alive: true,
            kills: 0,
            damage_dealt: 0.0,
            chests_opened: 0,
            join_epoch,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("participant is already in this match")]
    AlreadyInMatch,
    #[error("match roster is at capacity")]
    MatchFull,
    #[error("match is not currently admitting participants")]
    MatchNotAdmitting,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal transition from {from:?} via {trigger}")]
    Illegal { from: Phase, trigger: &'static str },
}

/// Periodic work a [`Match`] surfaces for the orchestrator to carry out
/// against `World`/`LootTable`/the behavior subsystems. `Match` itself never
/// touches those capabilities directly (spec §4 Design Notes: explicit
/// capability passing rather than reaching into ambient statics).
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    PhaseChanged { from: Phase, to: Phase },
    RefillContainersDue,
    NotifyTrackersDue,
    RelocateToDeathmatchCenter { participants: Vec<ParticipantId> },
    Completed,
}

/// State machine, roster, timers, kill ledger and broadcasts for one match.
/// Owns its [`ParticipantState`]s and the current `Team`/behavior-facing
/// roster view; destroying a `Match` destroys them (spec §3 ownership).
pub struct Match {
    pub id: MatchId,
    pub arena: ArenaName,
    world_id: u64,
    phase: Phase,
    roster: HashMap<ParticipantId, ParticipantState>,
    spectators: HashSet<ParticipantId>,
    death_order: Vec<ParticipantId>,
    winner: Option<ParticipantId>,
    min_participants: u32,
    max_participants: u32,
    timings: PhaseTimings,
    refill_interval_ticks: Tick,
    setup_deadline: Option<Tick>,
    phase_deadline: Option<Tick>,
    deathmatch_deadline: Option<Tick>,
    last_refill_tick: Tick,
    created_tick: Tick,
    stats_emitted: bool,
    pending_events: Vec<MatchEvent>,
}

impl Match {
    pub fn new(
        id: MatchId,
        arena: &Arena,
        timings: PhaseTimings,
        refill_interval_seconds: u64,
        now: Tick,
    ) -> Self {
        Self {
            id,
            arena: arena.name.clone(),
            world_id: arena.world_id,
            phase: Phase::Inactive,
            roster: HashMap::new(),
            spectators: HashSet::new(),
            death_order: Vec::new(),
            winner: None,
            min_participants: arena.min_participants,
            max_participants: arena.max_participants,
            timings,
            refill_interval_ticks: refill_interval_seconds * TICKS_PER_SECOND,
            setup_deadline: None,
            phase_deadline: None,
            deathmatch_deadline: None,
            last_refill_tick: now,
            created_tick: now,
            stats_emitted: false,
            pending_events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn roster(&self) -> &HashMap<ParticipantId, ParticipantState> {
        &self.roster
    }

    pub fn alive_count(&self) -> usize {
        self.roster.values().filter(|p| p.alive).count()
    }

    fn alive_participants(&self) -> Vec<ParticipantId> {
        self.roster
            .iter()
            .filter(|(_, p)| p.alive)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// INACTIVE -> WAITING: admin activates with a game mode. Starts the
    /// setup-period timer (spec §4.6).
    pub fn activate(&mut self, now: Tick) -> Result<(), TransitionError> {
        if self.phase != Phase::Inactive {
            return Err(TransitionError::Illegal {
                from: self.phase,
                trigger: "activate",
            });
        }
        self.setup_deadline = Some(now + self.timings.setup_period_seconds * TICKS_PER_SECOND);
        self.set_phase(Phase::Waiting, now);
        Ok(())
    }

    /// `admit` is legal only in WAITING or COUNTDOWN, below roster max.
    pub fn admit(&mut self, participant: ParticipantId, now: Tick) -> Result<(), AdmissionError> {
        if !matches!(self.phase, Phase::Waiting | Phase::Countdown) {
            return Err(AdmissionError::MatchNotAdmitting);
        }
        if self.roster.contains_key(&participant) {
            return Err(AdmissionError::AlreadyInMatch);
        }
        if self.roster.len() as u32 >= self.max_participants {
            return Err(AdmissionError::MatchFull);
        }
        self.roster.insert(participant, ParticipantState::new(now));
        Ok(())
    }

    /// Valid at all phases. During ACTIVE/DEATHMATCH a still-alive departure
    /// counts as a death with no killer. Dropping the roster to zero while
    /// still in COUNTDOWN aborts the match outright; dropping merely below
    /// the minimum is left for the next tick to notice (spec §4.4).
    pub fn remove(&mut self, participant: &ParticipantId, stats: &dyn StatsSink, now: Tick) {
        let in_combat = matches!(self.phase, Phase::Active | Phase::Deathmatch);
        if let Some(state) = self.roster.get_mut(participant) {
            if in_combat && state.alive {
                state.alive = false;
                self.death_order.push(participant.clone());
                stats.record_death(
                    match_id_bits(self.id),
                    participant,
                    None,
                    self.phase.as_stats_phase(),
                );
            }
        }
        self.spectators.remove(participant);
        self.roster.remove(participant);

        if matches!(self.phase, Phase::Countdown) && self.roster.is_empty() {
            self.set_phase(Phase::Aborted, now);
        }
    }

    fn roster_below_minimum(&self) -> bool {
        (self.roster.len() as u32) < self.min_participants
    }

    /// ACTIVE/DEATHMATCH only. Spectators have `alive = false` and never
    /// appear in the kill ledger as targets.
    pub fn add_spectator(&mut self, participant: ParticipantId) -> Result<(), TransitionError> {
        if !matches!(self.phase, Phase::Active | Phase::Deathmatch) {
            return Err(TransitionError::Illegal {
                from: self.phase,
                trigger: "add_spectator",
            });
        }
        if let Some(state) = self.roster.get_mut(&participant) {
            state.alive = false;
        }
        self.spectators.insert(participant);
        Ok(())
    }

    pub fn is_spectator(&self, participant: &ParticipantId) -> bool {
        self.spectators.contains(participant)
    }

    /// Rejects all inter-participant damage while GRACE is active (spec §3
    /// invariant, §7 damage-gating).
    pub fn damage_allowed(&self) -> bool {
        !matches!(self.phase, Phase::Grace)
    }

    /// Both must be in roster; victim becomes not alive, killer's kill
    /// count increments, kill ledger is monotonic non-decreasing.
    pub fn record_kill(
        &mut self,
        killer: &ParticipantId,
        victim: &ParticipantId,
        stats: &dyn StatsSink,
    ) {
        if !self.damage_allowed() {
            warn!(match_id = %self.id, "rejected kill recorded during GRACE");
            return;
        }
        if !self.roster.contains_key(killer) || !self.roster.contains_key(victim) {
            return;
        }
        if let Some(state) = self.roster.get_mut(victim) {
            if !state.alive {
                return;
            }
            state.alive = false;
        }
        self.death_order.push(victim.clone());
        if let Some(state) = self.roster.get_mut(killer) {
            state.kills += 1;
        }
        stats.record_kill(match_id_bits(self.id), killer, victim);
        stats.record_death(
            match_id_bits(self.id),
            victim,
            Some(killer),
            self.phase.as_stats_phase(),
        );
    }

    pub fn record_damage(&mut self, participant: &ParticipantId, amount: f64) -> bool {
        if !self.damage_allowed() {
            return false;
        }
        if let Some(state) = self.roster.get_mut(participant) {
            state.damage_dealt += amount;
            true
        } else {
            false
        }
    }

    /// Admin: forces GRACE -> ACTIVE immediately.
    pub fn skip_grace(&mut self, now: Tick) -> Result<(), TransitionError> {
        if self.phase != Phase::Grace {
            return Err(TransitionError::Illegal {
                from: self.phase,
                trigger: "skip_grace",
            });
        }
        self.begin_active(now);
        Ok(())
    }

    /// Administrative stop: transitions any non-terminal match to ABORTED.
    pub fn admin_stop(&mut self, now: Tick) {
        if !self.phase.is_terminal() {
            self.set_phase(Phase::Aborted, now);
        }
    }

    fn set_phase(&mut self, to: Phase, now: Tick) {
        let from = self.phase;
        self.phase = to;
        info!(match_id = %self.id, ?from, ?to, tick = now, "match phase transition");
        self.pending_events.push(MatchEvent::PhaseChanged { from, to });
    }

    fn begin_countdown(&mut self, now: Tick) {
        self.setup_deadline = None;
        self.phase_deadline = Some(now + self.timings.countdown_seconds * TICKS_PER_SECOND);
        self.set_phase(Phase::Countdown, now);
    }

    fn begin_grace(&mut self, now: Tick) {
        self.phase_deadline = Some(now + self.timings.grace_seconds * TICKS_PER_SECOND);
        self.set_phase(Phase::Grace, now);
    }

    fn begin_active(&mut self, now: Tick) {
        self.phase_deadline = Some(now + self.timings.active_seconds * TICKS_PER_SECOND);
        self.last_refill_tick = now;
        self.set_phase(Phase::Active, now);
    }

    fn begin_deathmatch(&mut self, now: Tick) -> Vec<ParticipantId> {
        self.deathmatch_deadline = Some(now + self.timings.deathmatch_seconds * TICKS_PER_SECOND);
        self.set_phase(Phase::Deathmatch, now);
        self.alive_participants()
    }

    fn finish(&mut self, now: Tick, stats: &dyn StatsSink) {
        let alive = self.alive_participants();
        self.winner = match alive.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        };
        self.set_phase(Phase::Finished, now);
        self.emit_completion(now, stats);
    }

    fn emit_completion(&mut self, now: Tick, stats: &dyn StatsSink) {
        if self.stats_emitted {
            return;
        }
        self.stats_emitted = true;
        let placements = self.placements();
        stats.record_completion(
            match_id_bits(self.id),
            &self.arena,
            placements,
            now.saturating_sub(self.created_tick),
        );
    }

    /// Winner (if any) first, then the rest in reverse death order (most
    /// recent death is the runner-up) — the "no winner" case still orders
    /// survivors/deaths this way, conservatively, per spec §9.
    fn placements(&self) -> Vec<Placement> {
        let mut ordered: Vec<ParticipantId> = Vec::with_capacity(self.roster.len());
        if let Some(winner) = &self.winner {
            ordered.push(winner.clone());
        }
        for id in self.death_order.iter().rev() {
            if Some(id) != self.winner.as_ref() {
                ordered.push(id.clone());
            }
        }
        ordered
            .into_iter()
            .filter_map(|id| {
                self.roster.get(&id).map(|state| Placement {
                    participant: id,
                    kills: state.kills,
                    damage_dealt: state.damage_dealt,
                })
            })
            .collect()
    }

    pub fn winner(&self) -> Option<&ParticipantId> {
        self.winner.as_ref()
    }

    /// Drains the events accumulated since the last call — phase changes and
    /// periodic-work due-signals the orchestrator must act on.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Advances phase timers and periodic-work due-signals by one tick.
    /// Re-evaluates the termination predicate every tick per spec §4.4.
    ///
    /// The pre-combat phases (WAITING/COUNTDOWN/GRACE) are pure deadline
    /// checks with no side effects on the world, so a tick that clears
    /// several zero-duration deadlines at once cascades through all of them
    /// before returning — a match with `countdown_seconds: 0` really does
    /// reach GRACE on the same tick it left WAITING. ACTIVE/DEATHMATCH carry
    /// real per-tick work (refills, tracker updates, win detection), so a
    /// phase entered via cascade this tick has that work deferred to the
    /// next tick rather than run twice as much work on the entry tick.
    pub fn on_tick(&mut self, now: Tick, stats: &dyn StatsSink) {
        if self.phase.is_terminal() {
            return;
        }
        let phase_at_entry = self.phase;

        loop {
            let before = self.phase;
            match self.phase {
                Phase::Waiting => {
                    if let Some(deadline) = self.setup_deadline {
                        if now >= deadline && (self.roster.len() as u32) >= self.min_participants {
                            self.begin_countdown(now);
                        }
                    }
                }
                Phase::Countdown => {
                    if self.roster_below_minimum() {
                        self.set_phase(Phase::Waiting, now);
                        self.setup_deadline =
                            Some(now + self.timings.setup_period_seconds * TICKS_PER_SECOND);
                    } else if let Some(deadline) = self.phase_deadline {
                        if now >= deadline {
                            self.begin_grace(now);
                        }
                    }
                }
                Phase::Grace => {
                    if let Some(deadline) = self.phase_deadline {
                        if now >= deadline {
                            self.begin_active(now);
                        }
                    }
                }
                Phase::Active | Phase::Deathmatch | Phase::Inactive | Phase::Finished | Phase::Aborted => {
                    break;
                }
            }
            if self.phase == before {
                break;
            }
        }

        match self.phase {
            Phase::Active if phase_at_entry == Phase::Active => {
                self.tick_periodic_work(now);
                if self.alive_count() <= 1 {
                    self.finish(now, stats);
                } else if self.phase_deadline.is_some_and(|d| now >= d) {
                    let participants = self.begin_deathmatch(now);
                    self.pending_events
                        .push(MatchEvent::RelocateToDeathmatchCenter { participants });
                }
            }
            Phase::Deathmatch if phase_at_entry == Phase::Deathmatch => {
                self.tick_periodic_work(now);
                let deadline_elapsed = self.deathmatch_deadline.is_some_and(|d| now >= d);
                if self.alive_count() <= 1 || deadline_elapsed {
                    self.finish(now, stats);
                }
            }
            _ => {}
        }
    }

    /// Every 30s of ACTIVE/DEATHMATCH: signal a container refill is due.
    /// Every 10 ticks: signal trackers should be notified.
    fn tick_periodic_work(&mut self, now: Tick) {
        let refill_period = self.refill_interval_ticks;
        if now.saturating_sub(self.last_refill_tick) >= refill_period {
            self.last_refill_tick = now;
            self.pending_events.push(MatchEvent::RefillContainersDue);
        }
        if now.is_multiple_of(10) {
            self.pending_events.push(MatchEvent::NotifyTrackersDue);
        }
    }

    /// Delivered to all roster members and spectators via the broadcast
    /// sink. Roster/spectator membership isn't distinguished at the wire
    /// level — the host world broadcasts per-world, not per-participant-set.
    pub fn broadcast(&self, world: &dyn crate::world::World, message: &str) {
        world.broadcast(self.world_id, message);
    }
}

/// `StatsSink` keys matches by `u64`; `MatchId` is a `Uuid`. Fold the id down
/// the way the teacher's codebase uses string ids verbatim as DB keys — here
/// the low 64 bits are stable and good enough for a stats-sink key.
fn match_id_bits(id: MatchId) -> u64 {
    u64::from_be_bytes(id.as_bytes()[8..16].try_into().expect("16-byte uuid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::LoggingStatsSink;

    fn arena() -> Arena {
        Arena {
            name: "colosseum".to_string(),
            world_id: 1,
            spawn_points: Vec::new(),
            deathmatch_center: crate::arena::Position::new(1, 0.0, 64.0, 0.0, 0.0, 0.0),
            containers: Vec::new(),
            min_participants: 2,
            max_participants: 4,
        }
    }

    fn fast_timings() -> PhaseTimings {
        PhaseTimings {
            setup_period_seconds: 0,
            countdown_seconds: 0,
            grace_seconds: 0,
            active_seconds: 0,
            deathmatch_seconds: 0,
        }
    }

    fn pid(n: u8) -> ParticipantId {
        vec![n]
    }

    fn new_match(timings: PhaseTimings) -> Match {
        Match::new(Uuid::now_v7(), &arena(), timings, 30, 0)
    }

    #[test]
    fn admission_rejects_before_activation() {
        let mut m = new_match(fast_timings());
        assert_eq!(m.admit(pid(1), 0), Err(AdmissionError::MatchNotAdmitting));
    }

    #[test]
    fn admission_rejects_duplicate_and_full_roster() {
        let mut m = new_match(fast_timings());
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        assert_eq!(m.admit(pid(1), 0), Err(AdmissionError::AlreadyInMatch));
        m.admit(pid(2), 0).unwrap();
        m.admit(pid(3), 0).unwrap();
        m.admit(pid(4), 0).unwrap();
        assert_eq!(m.admit(pid(5), 0), Err(AdmissionError::MatchFull));
    }

    #[test]
    fn phase_dag_never_revisits_waiting_from_active() {
        // P3: no Match re-enters a previously-left phase, and with every
        // timer at zero the two survivors ride the whole DAG to a tied
        // FINISHED within a handful of ticks.
        let mut m = new_match(fast_timings());
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        let stats = LoggingStatsSink;
        let mut saw_active = false;
        for tick in 1..=5 {
            m.on_tick(tick, &stats);
            saw_active |= m.phase() == Phase::Active;
            assert!(!matches!(m.phase(), Phase::Waiting | Phase::Countdown | Phase::Grace));
        }
        assert!(saw_active, "match should have passed through Active");
        assert_eq!(m.phase(), Phase::Finished);
        assert_eq!(m.winner(), None, "two survivors at the deathmatch deadline tie");
    }

    #[test]
    fn countdown_drops_to_waiting_below_minimum() {
        let mut timings = fast_timings();
        timings.countdown_seconds = 10;
        let mut m = new_match(timings);
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        let stats = LoggingStatsSink;
        m.on_tick(1, &stats);
        assert_eq!(m.phase(), Phase::Countdown);
        m.remove(&pid(2), &stats, 2);
        m.on_tick(2, &stats);
        assert_eq!(m.phase(), Phase::Waiting);
    }

    #[test]
    fn grace_blocks_damage() {
        // P4: during GRACE no inter-participant damage is applied.
        let mut timings = fast_timings();
        timings.grace_seconds = 100;
        let mut m = new_match(timings);
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        let stats = LoggingStatsSink;
        m.on_tick(1, &stats);
        assert_eq!(m.phase(), Phase::Grace);
        assert!(!m.damage_allowed());
        assert!(!m.record_damage(&pid(1), 5.0));
        assert_eq!(m.roster().get(&pid(1)).unwrap().damage_dealt, 0.0);
    }

    #[test]
    fn record_kill_is_monotonic_and_respects_grace() {
        // P2: kill count never decreases.
        let mut m = new_match(fast_timings());
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        let stats = LoggingStatsSink;
        m.on_tick(1, &stats); // -> Active (grace_seconds=0)
        m.record_kill(&pid(1), &pid(2), &stats);
        assert_eq!(m.roster().get(&pid(1)).unwrap().kills, 1);
        m.record_kill(&pid(1), &pid(2), &stats);
        assert_eq!(m.roster().get(&pid(1)).unwrap().kills, 1, "victim already dead");
    }

    #[test]
    fn active_finishes_when_one_alive_remains_and_emits_completion_once() {
        let mut m = new_match(fast_timings());
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        let stats = LoggingStatsSink;
        m.on_tick(1, &stats);
        assert_eq!(m.phase(), Phase::Active);
        m.record_kill(&pid(1), &pid(2), &stats);
        m.on_tick(2, &stats);
        assert_eq!(m.phase(), Phase::Finished);
        assert_eq!(m.winner(), Some(&pid(1)));
        let placements = m.placements();
        assert_eq!(placements[0].participant, pid(1));
        assert_eq!(placements[1].participant, pid(2));
    }

    #[test]
    fn admin_stop_aborts_from_any_nonterminal_phase_and_skips_completion() {
        let mut m = new_match(fast_timings());
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        m.admin_stop(1);
        assert_eq!(m.phase(), Phase::Aborted);
        let stats = LoggingStatsSink;
        m.on_tick(2, &stats);
        assert_eq!(m.phase(), Phase::Aborted);
        assert!(!m.stats_emitted);
    }

    #[test]
    fn removing_empty_roster_during_countdown_aborts() {
        let mut timings = fast_timings();
        timings.countdown_seconds = 100;
        let mut m = new_match(timings);
        m.activate(0).unwrap();
        m.admit(pid(1), 0).unwrap();
        m.admit(pid(2), 0).unwrap();
        let stats = LoggingStatsSink;
        m.on_tick(1, &stats);
        assert_eq!(m.phase(), Phase::Countdown);
        m.remove(&pid(1), &stats, 2);
        m.remove(&pid(2), &stats, 2);
        assert_eq!(m.phase(), Phase::Aborted);
    }
}
