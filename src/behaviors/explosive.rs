//! Projectile Behavior (spec §4.7): ballistic timed explosive, area effect,
//! fire/poison damage and knockback. Owned per-match so match teardown
//! drops every in-flight projectile and the per-thrower cooldown table for
//! free (satisfies P9).

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;
use uuid::Uuid;

use crate::arena::Position;
use crate::clock::Tick;
use crate::config::ExplosiveConfig;
use crate::match_engine::ParticipantId;
use crate::world::{EffectKind, ParticipantHandle, World};

const GRAVITY_PER_TICK: f64 = -0.02;
const COOLDOWN_SWEEP_PERIOD_TICKS: Tick = 6000; // 5 minutes at 20 ticks/sec

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileKind {
    Fire,
    Poison,
}

#[derive(Debug, Clone)]
pub struct ProjectileInstance {
    pub id: Uuid,
    pub thrower: ParticipantId,
    pub kind: ProjectileKind,
    pub fuse_ticks_remaining: u64,
    pub position: Position,
    pub velocity: (f64, f64, f64),
    pub area_radius: f64,
    pub persist_effect_duration: u64,
    pub effect_amplifier: u32,
    pub damage_thrower: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrowError {
    #[error("thrower is on cooldown")]
    OnCooldown,
}

struct PendingRevert {
    position: Position,
    revert_at: Tick,
}

/// Owns all live projectiles, the ignited-ground revert queue, and the
/// per-thrower cooldown map for one match.
pub struct ExplosiveBehavior {
    config: ExplosiveConfig,
    instances: Vec<ProjectileInstance>,
    cooldowns: HashMap<ParticipantId, Tick>,
    reverts: Vec<PendingRevert>,
    last_sweep: Tick,
}

impl ExplosiveBehavior {
    pub fn new(config: ExplosiveConfig) -> Self {
        Self {
            config,
            instances: Vec::new(),
            cooldowns: HashMap::new(),
            reverts: Vec::new(),
            last_sweep: 0,
        }
    }

    /// Spawns a projectile at `eye_position` along its yaw/pitch, iff the
    /// thrower isn't on cooldown. Caller is responsible for the
    /// GRACE-phase gate (spec: "rejects if match is not ACTIVE/DEATHMATCH").
    pub fn throw(
        &mut self,
        thrower: ParticipantId,
        kind: ProjectileKind,
        eye_position: Position,
        now: Tick,
    ) -> Result<(), ThrowError> {
        if let Some(&last) = self.cooldowns.get(&thrower) {
            let cooldown_ticks = self.config.cooldown_seconds * 20;
            if now.saturating_sub(last) < cooldown_ticks {
                return Err(ThrowError::OnCooldown);
            }
        }
        let yaw_rad = (eye_position.yaw as f64).to_radians();
        let pitch_rad = (eye_position.pitch as f64).to_radians();
        let look = (
            -yaw_rad.sin() * pitch_rad.cos(),
            -pitch_rad.sin(),
            yaw_rad.cos() * pitch_rad.cos(),
        );
        let velocity = (
            look.0 * self.config.throw_velocity,
            look.1 * self.config.throw_velocity,
            look.2 * self.config.throw_velocity,
        );
        self.instances.push(ProjectileInstance {
            id: Uuid::now_v7(),
            thrower: thrower.clone(),
            kind,
            fuse_ticks_remaining: self.config.fuse_ticks,
            position: eye_position,
            velocity,
            area_radius: self.config.radius,
            persist_effect_duration: self.config.fire_duration_ticks,
            effect_amplifier: 1,
            damage_thrower: self.config.damage_thrower,
        });
        self.cooldowns.insert(thrower, now);
        Ok(())
    }

    /// Advances all projectiles one tick: integrates ballistic motion,
    /// counts down fuses, explodes anything at zero, processes ground-fire
    /// reverts, and sweeps stale cooldown entries every 5 minutes.
    pub fn on_tick(
        &mut self,
        now: Tick,
        world: &dyn World,
        roster: &[(&ParticipantId, &dyn ParticipantHandle, Position)],
        rng: &mut impl Rng,
    ) {
        let mut exploded = Vec::new();
        for instance in &mut self.instances {
            instance.position.x += instance.velocity.0;
            instance.position.y += instance.velocity.1;
            instance.position.z += instance.velocity.2;
            instance.velocity.1 += GRAVITY_PER_TICK;
            instance.fuse_ticks_remaining = instance.fuse_ticks_remaining.saturating_sub(1);
            if instance.fuse_ticks_remaining == 0 {
                exploded.push(instance.clone());
            }
        }
        self.instances.retain(|i| i.fuse_ticks_remaining > 0);
        for instance in exploded {
            self.explode(&instance, world, roster, rng, now);
        }

        self.reverts.retain(|r| {
            if r.revert_at <= now {
                world.set_block(r.position, "air");
                false
            } else {
                true
            }
        });

        if now.saturating_sub(self.last_sweep) >= COOLDOWN_SWEEP_PERIOD_TICKS {
            self.last_sweep = now;
            let cutoff = self.config.cooldown_seconds * 20;
            self.cooldowns
                .retain(|_, &mut last| now.saturating_sub(last) < COOLDOWN_SWEEP_PERIOD_TICKS.max(cutoff));
        }
    }

    fn explode(
        &mut self,
        instance: &ProjectileInstance,
        world: &dyn World,
        roster: &[(&ParticipantId, &dyn ParticipantHandle, Position)],
        rng: &mut impl Rng,
        now: Tick,
    ) {
        world.emit_particle(instance.position, "explosion");
        world.emit_sound(instance.position, "explosion");

        for (id, handle, position) in roster {
            if *id == &instance.thrower && !instance.damage_thrower {
                continue;
            }
            let d = instance.position.distance(position);
            if d > instance.area_radius {
                continue;
            }
            let falloff = 1.0 - d / instance.area_radius;
            match instance.kind {
                ProjectileKind::Fire => {
                    world.apply_damage(*handle, self.config.base_damage * falloff);
                }
                ProjectileKind::Poison => {
                    world.apply_damage(*handle, 0.5 * self.config.base_damage * falloff);
                    world.apply_effect(
                        *handle,
                        EffectKind::Poison,
                        instance.persist_effect_duration,
                        instance.effect_amplifier,
                    );
                }
            }
            let knockback = compute_knockback(&instance.position, position, d, instance.area_radius, rng);
            world.apply_knockback(*handle, knockback);
        }

        if instance.kind == ProjectileKind::Fire {
            for point in ignition_points(instance.position, instance.area_radius, rng) {
                world.set_block(point, "fire");
                self.reverts.push(PendingRevert {
                    position: point,
                    revert_at: now + instance.persist_effect_duration,
                });
            }
        }
    }

    #[cfg(test)]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[cfg(test)]
    pub fn is_on_cooldown(&self, thrower: &ParticipantId, now: Tick) -> bool {
        self.cooldowns
            .get(thrower)
            .map(|&last| now.saturating_sub(last) < self.config.cooldown_seconds * 20)
            .unwrap_or(false)
    }
}

/// `normalize(victim - impact) * (1 - d/r) * 0.5` with minimum vertical
/// +0.2; coincident positions get a small random horizontal kick plus +0.3
/// vertical; any non-finite result falls back to `(0, 0.3, 0)`.
fn compute_knockback(
    impact: &Position,
    victim: &Position,
    d: f64,
    r: f64,
    rng: &mut impl Rng,
) -> (f64, f64, f64) {
    if d < f64::EPSILON {
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        return (angle.cos() * 0.1, 0.3, angle.sin() * 0.1);
    }
    let (dx, dy, dz) = (victim.x - impact.x, victim.y - impact.y, victim.z - impact.z);
    let scale = (1.0 - d / r) * 0.5 / d;
    let (kx, mut ky, kz) = (dx * scale, dy * scale, dz * scale);
    if ky < 0.2 {
        ky = 0.2;
    }
    if !kx.is_finite() || !ky.is_finite() || !kz.is_finite() {
        return (0.0, 0.3, 0.0);
    }
    (kx, ky, kz)
}

/// Angular-uniform samples on concentric rings with Gaussian radial jitter
/// (σ=0.5) and ~30% chance of a vertical offset in [-1, 1].
fn ignition_points(center: Position, radius: f64, rng: &mut impl Rng) -> Vec<Position> {
    let rings = 3;
    let samples_per_ring = 8;
    let jitter = Normal::new(0.0, 0.5).expect("fixed, valid parameters");
    let mut points = Vec::with_capacity(rings * samples_per_ring);
    for ring in 0..rings {
        let base_r = radius * (ring as f64 + 1.0) / rings as f64;
        for sample in 0..samples_per_ring {
            let angle = (sample as f64 / samples_per_ring as f64) * std::f64::consts::TAU;
            let r = (base_r + jitter.sample(rng)).max(0.0);
            let y_offset = if rng.random_bool(0.3) {
                rng.random_range(-1.0..=1.0)
            } else {
                0.0
            };
            points.push(Position::new(
                center.world_id,
                center.x + r * angle.cos(),
                center.y + y_offset,
                center.z + r * angle.sin(),
                0.0,
                0.0,
            ));
        }
    }
    points
}
