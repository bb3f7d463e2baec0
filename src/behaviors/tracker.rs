//! Tracker Behavior (spec §4.8): per-holder periodic compass projection of
//! nearby targets onto a width-21 textual bar covering ±90° of the holder's
//! yaw.

use crate::arena::Position;
use crate::clock::Tick;
use crate::config::TrackerConfig;
use crate::match_engine::{MatchId, ParticipantId};
use crate::world::World;

pub const COMPASS_WIDTH: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Dot,
    Sword,
    Package,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Near,
    Mid,
    Far,
    TopKiller,
}

#[derive(Debug, Clone, Copy)]
pub struct CompassMark {
    pub symbol: Symbol,
    pub color: Color,
}

/// Rendered compass: a fixed-width row of optional marks. Later targets in
/// rendering order overwrite earlier ones that land on the same column.
#[derive(Debug, Clone)]
pub struct Compass {
    pub columns: [Option<CompassMark>; COMPASS_WIDTH],
}

impl Compass {
    fn empty() -> Self {
        Self {
            columns: [None; COMPASS_WIDTH],
        }
    }

    pub fn render(&self) -> String {
        self.columns
            .iter()
            .map(|mark| match mark {
                None => '·',
                Some(CompassMark { symbol: Symbol::Sword, .. }) => 'S',
                Some(CompassMark { symbol: Symbol::Package, .. }) => 'P',
                Some(CompassMark { symbol: Symbol::Dot, .. }) => '.',
            })
            .collect()
    }
}

/// One live target to project: its world position, kill count (for
/// top-killer selection), and whether it's a supply drop rather than a
/// participant.
pub struct TrackerTarget {
    pub id: ParticipantId,
    pub position: Position,
    pub kills: u32,
    pub is_supply_drop: bool,
}

#[derive(Debug, Clone)]
pub struct TrackerBinding {
    pub holder: ParticipantId,
    pub match_id: MatchId,
    pub update_period: Tick,
    pub max_range: f64,
    pub close_distance: f64,
    pub medium_distance: f64,
    pub track_players: bool,
    pub track_top_killer: bool,
    pub track_supply_drops: bool,
    last_update: Tick,
}

impl TrackerBinding {
    pub fn new(holder: ParticipantId, match_id: MatchId, config: &TrackerConfig, now: Tick) -> Self {
        Self {
            holder,
            match_id,
            update_period: config.update_period_ticks,
            max_range: config.max_range,
            close_distance: config.close_distance,
            medium_distance: config.medium_distance,
            track_players: true,
            track_top_killer: true,
            track_supply_drops: true,
            last_update: now,
        }
    }

    fn due(&self, now: Tick) -> bool {
        now.saturating_sub(self.last_update) >= self.update_period
    }
}

/// Owns every live `TrackerBinding`, keyed by match for bulk cleanup
/// (satisfies P9 together with [`MatchRegistry::sweep_terminal`]).
///
/// [`MatchRegistry::sweep_terminal`]: crate::match_engine::registry::MatchRegistry::sweep_terminal
#[derive(Default)]
pub struct TrackerBehavior {
    bindings: Vec<TrackerBinding>,
}

impl TrackerBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, binding: TrackerBinding) {
        self.bindings.retain(|b| b.holder != binding.holder);
        self.bindings.push(binding);
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Drops every binding keyed by `match_id` (registry deregistration
    /// hook).
    pub fn cleanup_match(&mut self, match_id: MatchId) {
        self.bindings.retain(|b| b.match_id != match_id);
    }

    /// Drives every due binding: self-terminates (unregisters silently) any
    /// binding whose holder no longer carries the tracker item, otherwise
    /// computes and emits a compass to the holder.
    pub fn on_tick(
        &mut self,
        now: Tick,
        world: &dyn World,
        holder_position: impl Fn(&ParticipantId) -> Option<Position>,
        holder_yaw: impl Fn(&ParticipantId) -> Option<f32>,
        holds_tracker: impl Fn(&ParticipantId) -> bool,
        targets_for: impl Fn(MatchId, &ParticipantId) -> Vec<TrackerTarget>,
    ) {
        self.bindings.retain(|b| holds_tracker(&b.holder));

        for binding in &mut self.bindings {
            if !binding.due(now) {
                continue;
            }
            binding.last_update = now;
            let Some(holder_pos) = holder_position(&binding.holder) else {
                continue;
            };
            let Some(yaw) = holder_yaw(&binding.holder) else {
                continue;
            };
            let targets = targets_for(binding.match_id, &binding.holder);
            let compass = project(binding, holder_pos, yaw as f64, &targets);
            world.notify_participant(
                &ParticipantHandleRef(&binding.holder),
                &compass.render(),
            );
        }
    }
}

/// Thin `ParticipantHandle` adapter so the behavior doesn't need a live
/// handle object, just the id bytes it already tracks.
struct ParticipantHandleRef<'a>(&'a ParticipantId);
impl crate::world::ParticipantHandle for ParticipantHandleRef<'_> {
    fn id(&self) -> &[u8] {
        self.0
    }
    fn name(&self) -> &str {
        ""
    }
}

/// Computes the projected compass for one binding. The top killer (if
/// selected) renders first; regular targets render nearest-first after it
/// and overwrite it on a column collision.
fn project(binding: &TrackerBinding, holder: Position, holder_yaw: f64, targets: &[TrackerTarget]) -> Compass {
    let mut compass = Compass::empty();

    let top_killer = if binding.track_top_killer {
        select_top_killer(targets)
    } else {
        None
    };

    let mut rest: Vec<&TrackerTarget> = targets
        .iter()
        .filter(|t| {
            let is_top = top_killer.is_some_and(|top| top.id == t.id);
            if is_top {
                return false;
            }
            if t.is_supply_drop {
                binding.track_supply_drops
            } else {
                binding.track_players
            }
        })
        .collect();
    rest.sort_by(|a, b| {
        let da = holder.distance(&a.position);
        let db = holder.distance(&b.position);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut ordered: Vec<&TrackerTarget> = Vec::with_capacity(rest.len() + 1);
    ordered.extend(top_killer);
    ordered.extend(rest);

    for target in ordered {
        let distance = holder.distance(&target.position);
        if distance > binding.max_range {
            continue;
        }
        let bearing = world_bearing(holder, target.position);
        let relative = relative_bearing(bearing, holder_yaw);
        if relative.abs() > 90.0 {
            continue;
        }
        let column = compass_column(relative);
        let is_top = top_killer.is_some_and(|top| top.id == target.id);
        let symbol = if is_top {
            Symbol::Sword
        } else if target.is_supply_drop {
            Symbol::Package
        } else {
            Symbol::Dot
        };
        let color = if is_top {
            Color::TopKiller
        } else if distance < binding.close_distance {
            Color::Near
        } else if distance < binding.medium_distance {
            Color::Mid
        } else {
            Color::Far
        };
        compass.columns[column] = Some(CompassMark { symbol, color });
    }

    compass
}

/// The unique participant with strictly the highest non-zero kill count;
/// `None` if the max is shared or nobody has killed yet.
fn select_top_killer(targets: &[TrackerTarget]) -> Option<&TrackerTarget> {
    let max_kills = targets.iter().map(|t| t.kills).max().unwrap_or(0);
    if max_kills == 0 {
        return None;
    }
    let mut leaders = targets.iter().filter(|t| t.kills == max_kills);
    let first = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// World-frame bearing (degrees, 0 = +z/"north") from `holder` to `target`.
/// Defaults to 0° when the positions are in different worlds, identical, or
/// the result is not finite (spec §4.8 robustness rule).
fn world_bearing(holder: Position, target: Position) -> f64 {
    if holder.world_id != target.world_id {
        return 0.0;
    }
    let dx = target.x - holder.x;
    let dz = target.z - holder.z;
    if dx == 0.0 && dz == 0.0 {
        return 0.0;
    }
    let bearing = dx.atan2(dz).to_degrees();
    if bearing.is_finite() {
        bearing
    } else {
        0.0
    }
}

/// `((θ_target - θ_holder + 540) mod 360) - 180`.
fn relative_bearing(target_bearing: f64, holder_yaw: f64) -> f64 {
    ((target_bearing - holder_yaw + 540.0).rem_euclid(360.0)) - 180.0
}

fn compass_column(relative_bearing: f64) -> usize {
    let raw = ((relative_bearing + 90.0) / 180.0 * (COMPASS_WIDTH as f64 - 1.0)).round();
    raw.clamp(0.0, COMPASS_WIDTH as f64 - 1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_double::RecordingWorld;
    use uuid::Uuid;

    fn holder_at(yaw: f32) -> Position {
        Position::new(1, 0.0, 64.0, 0.0, yaw, 0.0)
    }

    fn target_at_bearing(degrees: f64, distance: f64) -> Position {
        let rad = degrees.to_radians();
        Position::new(1, distance * rad.sin(), 64.0, distance * rad.cos(), 0.0, 0.0)
    }

    fn binding() -> TrackerBinding {
        TrackerBinding::new(
            vec![0],
            Uuid::now_v7(),
            &TrackerConfig {
                update_period_ticks: 10,
                max_range: 200.0,
                close_distance: 20.0,
                medium_distance: 75.0,
            },
            0,
        )
    }

    #[test]
    fn compass_columns_match_spec_scenario() {
        // P7 + §8 scenario 5: holder yaw 0, targets at {0,45,-90,135} degrees.
        let b = binding();
        let targets = vec![
            TrackerTarget { id: vec![1], position: target_at_bearing(0.0, 10.0), kills: 0, is_supply_drop: false },
            TrackerTarget { id: vec![2], position: target_at_bearing(45.0, 10.0), kills: 0, is_supply_drop: false },
            TrackerTarget { id: vec![3], position: target_at_bearing(-90.0, 10.0), kills: 0, is_supply_drop: false },
            TrackerTarget { id: vec![4], position: target_at_bearing(135.0, 10.0), kills: 0, is_supply_drop: false },
        ];
        let compass = project(&b, holder_at(0.0), 0.0, &targets);
        assert!(compass.columns[10].is_some());
        assert!(compass.columns[15].is_some());
        assert!(compass.columns[0].is_some());
        // 135 degrees is > 90 away and must be dropped entirely.
        assert_eq!(compass.columns.iter().filter(|c| c.is_some()).count(), 3);
    }

    #[test]
    fn top_killer_renders_with_sword_and_reserved_color() {
        let b = binding();
        let targets = vec![
            TrackerTarget { id: vec![1], position: target_at_bearing(0.0, 10.0), kills: 5, is_supply_drop: false },
            TrackerTarget { id: vec![2], position: target_at_bearing(45.0, 10.0), kills: 1, is_supply_drop: false },
        ];
        let compass = project(&b, holder_at(0.0), 0.0, &targets);
        let mark = compass.columns[10].unwrap();
        assert_eq!(mark.symbol, Symbol::Sword);
        assert_eq!(mark.color, Color::TopKiller);
    }

    #[test]
    fn nearer_regular_target_overwrites_top_killer_at_same_column() {
        // §4.8: top killer renders first, later (nearest-first) regular
        // targets overwrite it on a column collision.
        let b = binding();
        let targets = vec![
            TrackerTarget { id: vec![1], position: target_at_bearing(0.0, 10.0), kills: 5, is_supply_drop: false },
            TrackerTarget { id: vec![2], position: target_at_bearing(0.0, 10.0), kills: 1, is_supply_drop: false },
        ];
        let compass = project(&b, holder_at(0.0), 0.0, &targets);
        let mark = compass.columns[10].unwrap();
        assert_ne!(mark.color, Color::TopKiller);
    }

    #[test]
    fn tied_kill_counts_select_no_top_killer() {
        let targets = vec![
            TrackerTarget { id: vec![1], position: target_at_bearing(0.0, 10.0), kills: 3, is_supply_drop: false },
            TrackerTarget { id: vec![2], position: target_at_bearing(0.0, 10.0), kills: 3, is_supply_drop: false },
        ];
        assert!(select_top_killer(&targets).is_none());
    }

    #[test]
    fn bearing_defaults_to_north_for_identical_or_cross_world_positions() {
        let holder = Position::new(1, 0.0, 64.0, 0.0, 0.0, 0.0);
        assert_eq!(world_bearing(holder, holder), 0.0);
        let other_world = Position::new(2, 5.0, 64.0, 5.0, 0.0, 0.0);
        assert_eq!(world_bearing(holder, other_world), 0.0);
    }

    #[test]
    fn binding_self_terminates_when_item_is_gone() {
        let mut behavior = TrackerBehavior::new();
        behavior.bind(binding());
        let world = RecordingWorld::default();
        behavior.on_tick(
            10,
            &world,
            |_| Some(holder_at(0.0)),
            |_| Some(0.0),
            |_| false,
            |_, _| Vec::new(),
        );
        assert_eq!(behavior.binding_count(), 0);
    }

    #[test]
    fn out_of_range_targets_are_dropped() {
        let b = binding();
        let targets = vec![TrackerTarget {
            id: vec![1],
            position: target_at_bearing(0.0, 500.0),
            kills: 0,
            is_supply_drop: false,
        }];
        let compass = project(&b, holder_at(0.0), 0.0, &targets);
        assert!(compass.columns.iter().all(|c| c.is_none()));
    }
}
