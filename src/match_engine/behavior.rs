//! Tagged hook trait (spec Design Notes: collapse anonymous callback webs
//! into behavior structs with `on_activate`/`on_tick`/`on_participant_damaged`
//! hooks). Generic extension point for behaviors that don't need an API
//! beyond these three hooks; the two behaviors the spec singles out as
//! hardest (explosive, tracker) are held as concrete fields on [`Match`]
//! because they expose additional entry points (`throw`, `bind`) a trait
//! object can't carry without downcasting.
//!
//! [`Match`]: super::Match

use crate::clock::Tick;
use crate::match_engine::ParticipantId;
use crate::world::World;

/// Context passed to every hook: what a match-local behavior is allowed to
/// touch without reaching back into `Match` itself.
pub struct BehaviorContext<'a> {
    pub world: &'a dyn World,
    pub tick: Tick,
}

pub trait MatchBehavior: Send {
    fn on_activate(&mut self, _ctx: &mut BehaviorContext) {}
    fn on_tick(&mut self, _ctx: &mut BehaviorContext) {}
    fn on_participant_damaged(&mut self, _participant: &ParticipantId, _amount: f64, _ctx: &mut BehaviorContext) {}
}
