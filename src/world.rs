//! World capability (spec §6): the host world simulation, consumed as an
//! opaque trait so the engine never depends on a concrete game host.

use crate::arena::Position;
use crate::loot::ItemOrigin;

/// Stable identity for a participant. Implementations are expected to be
/// cheap to clone (an id + cached display name), mirroring the teacher's
/// `EntityView` pattern of a lightweight handle over a heavier entity.
pub trait ParticipantHandle: Send + Sync {
    fn id(&self) -> &[u8];
    fn name(&self) -> &str;
}

/// Opaque handle to a previously-opened container, scoped to one fill/read
/// operation. Implementations decide what this wraps (slot array, block
/// entity reference, ...).
pub type ContainerHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Fire,
    Poison,
}

/// Everything the engine needs from the host simulation. Every method is a
/// best-effort side effect; the engine never blocks on a reply beyond what's
/// returned here, per the concurrency model (§5): suspension only happens at
/// callback boundaries, never inside one.
pub trait World: Send + Sync {
    fn get_position(&self, participant: &dyn ParticipantHandle) -> Option<Position>;
    fn move_to(&self, participant: &dyn ParticipantHandle, position: Position);
    fn apply_damage(&self, participant: &dyn ParticipantHandle, amount: f64);

    /// Applies an instantaneous velocity change `(dx, dy, dz)`, e.g. the
    /// explosive behavior's per-victim knockback vector (spec §4.7).
    fn apply_knockback(&self, participant: &dyn ParticipantHandle, vector: (f64, f64, f64));
    fn apply_effect(
        &self,
        participant: &dyn ParticipantHandle,
        kind: EffectKind,
        duration_ticks: u64,
        amplifier: u32,
    );
    fn set_block(&self, position: Position, kind: &str);
    fn get_block(&self, position: Position) -> Option<String>;

    fn open_container(&self, position: Position) -> Option<ContainerHandle>;
    fn set_slot(&self, handle: ContainerHandle, index: u32, item: ItemOrigin, amount: u32);
    fn empty_slots(&self, handle: ContainerHandle) -> Vec<u32>;

    /// Whether `participant` currently carries an item tagged `item_id`.
    /// Backs the tracker's self-termination check (spec §4.8: "a binding
    /// self-terminates on any tick where the holder no longer carries the
    /// tracker item").
    fn has_item(&self, participant: &dyn ParticipantHandle, item_id: &str) -> bool;

    fn broadcast(&self, world_id: u64, message: &str);
    fn emit_particle(&self, position: Position, kind: &str);
    fn emit_sound(&self, position: Position, kind: &str);

    /// Private message to a single participant — backs the tracker's compass
    /// display, which must not be broadcast to the whole world.
    fn notify_participant(&self, participant: &dyn ParticipantHandle, message: &str);
}

#[cfg(test)]
pub mod test_double {
    //! A no-op [`World`] for unit tests that don't exercise world side
    //! effects, plus a recording variant for assertions on what was called.

    use super::*;
    use std::sync::Mutex;

    type Knockback = (Vec<u8>, (f64, f64, f64));

    #[derive(Default)]
    pub struct RecordingWorld {
        pub damage_calls: Mutex<Vec<(Vec<u8>, f64)>>,
        pub broadcasts: Mutex<Vec<String>>,
        pub notifications: Mutex<Vec<(Vec<u8>, String)>>,
        pub positions: Mutex<std::collections::HashMap<Vec<u8>, Position>>,
        pub items_held: Mutex<std::collections::HashSet<(Vec<u8>, String)>>,
        pub knockbacks: Mutex<Vec<Knockback>>,
    }

    impl World for RecordingWorld {
        fn get_position(&self, participant: &dyn ParticipantHandle) -> Option<Position> {
            self.positions.lock().unwrap().get(participant.id()).copied()
        }
        fn move_to(&self, participant: &dyn ParticipantHandle, position: Position) {
            self.positions
                .lock()
                .unwrap()
                .insert(participant.id().to_vec(), position);
        }
        fn apply_damage(&self, participant: &dyn ParticipantHandle, amount: f64) {
            self.damage_calls
                .lock()
                .unwrap()
                .push((participant.id().to_vec(), amount));
        }
        fn apply_knockback(&self, participant: &dyn ParticipantHandle, vector: (f64, f64, f64)) {
            self.knockbacks
                .lock()
                .unwrap()
                .push((participant.id().to_vec(), vector));
        }
        fn apply_effect(
            &self,
            _participant: &dyn ParticipantHandle,
            _kind: EffectKind,
            _duration_ticks: u64,
            _amplifier: u32,
        ) {
        }
        fn set_block(&self, _position: Position, _kind: &str) {}
        fn get_block(&self, _position: Position) -> Option<String> {
            None
        }
        fn open_container(&self, _position: Position) -> Option<ContainerHandle> {
            Some(0)
        }
        fn set_slot(&self, _handle: ContainerHandle, _index: u32, _item: ItemOrigin, _amount: u32) {}
        fn empty_slots(&self, _handle: ContainerHandle) -> Vec<u32> {
            Vec::new()
        }
        fn has_item(&self, participant: &dyn ParticipantHandle, item_id: &str) -> bool {
            self.items_held
                .lock()
                .unwrap()
                .contains(&(participant.id().to_vec(), item_id.to_string()))
        }
        fn broadcast(&self, _world_id: u64, message: &str) {
            self.broadcasts.lock().unwrap().push(message.to_string());
        }
        fn emit_particle(&self, _position: Position, _kind: &str) {}
        fn emit_sound(&self, _position: Position, _kind: &str) {}
        fn notify_participant(&self, participant: &dyn ParticipantHandle, message: &str) {
            self.notifications
                .lock()
                .unwrap()
                .push((participant.id().to_vec(), message.to_string()));
        }
    }
}
