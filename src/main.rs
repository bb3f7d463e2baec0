use std::sync::Arc;

use arena_engine::arena::Position;
use arena_engine::command::Command;
use arena_engine::config::Config;
use arena_engine::engine::Engine;
use arena_engine::opaque_item::NoOpaqueItems;
use arena_engine::stats::LoggingStatsSink;
use arena_engine::world::{ContainerHandle, EffectKind, ParticipantHandle, World};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const TICK_PERIOD: Duration = Duration::from_millis(50); // 20 ticks/second

/// A logging-only `World` for the demo binary: the real host simulation
/// (blocks, entities, sounds, particles) is an external collaborator per
/// spec §1/§6 and isn't part of this crate.
struct DemoWorld;

impl World for DemoWorld {
    fn get_position(&self, _participant: &dyn ParticipantHandle) -> Option<Position> {
        None
    }
    fn move_to(&self, participant: &dyn ParticipantHandle, position: Position) {
        info!(participant = ?participant.id(), ?position, "move_to");
    }
    fn apply_damage(&self, participant: &dyn ParticipantHandle, amount: f64) {
        info!(participant = ?participant.id(), amount, "apply_damage");
    }
    fn apply_knockback(&self, participant: &dyn ParticipantHandle, vector: (f64, f64, f64)) {
        info!(participant = ?participant.id(), ?vector, "apply_knockback");
    }
    fn apply_effect(
        &self,
        participant: &dyn ParticipantHandle,
        kind: EffectKind,
        duration_ticks: u64,
        amplifier: u32,
    ) {
        info!(participant = ?participant.id(), ?kind, duration_ticks, amplifier, "apply_effect");
    }
    fn set_block(&self, position: Position, kind: &str) {
        info!(?position, kind, "set_block");
    }
    fn get_block(&self, _position: Position) -> Option<String> {
        None
    }
    fn open_container(&self, _position: Position) -> Option<ContainerHandle> {
        None
    }
    fn set_slot(&self, _handle: ContainerHandle, _index: u32, _item: arena_engine::loot::ItemOrigin, _amount: u32) {}
    fn empty_slots(&self, _handle: ContainerHandle) -> Vec<u32> {
        Vec::new()
    }
    fn broadcast(&self, world_id: u64, message: &str) {
        info!(world_id, message, "broadcast");
    }
    fn emit_particle(&self, position: Position, kind: &str) {
        info!(?position, kind, "emit_particle");
    }
    fn emit_sound(&self, position: Position, kind: &str) {
        info!(?position, kind, "emit_sound");
    }
    fn has_item(&self, _participant: &dyn ParticipantHandle, _item_id: &str) -> bool {
        false
    }
    fn notify_participant(&self, participant: &dyn ParticipantHandle, message: &str) {
        info!(participant = ?participant.id(), message, "notify_participant");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::default();
    let mut engine = Engine::new(
        config,
        Arc::new(DemoWorld),
        Arc::new(LoggingStatsSink),
        Arc::new(NoOpaqueItems),
    );

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    tracker.spawn({
        let token = token.clone();
        let run = async move {
            let stdin = io::stdin();
            let mut lines = BufReader::new(stdin).lines();
            let mut ticks = interval(TICK_PERIOD);
            let mut now = 0u64;

            info!("arena match engine running; admin commands on stdin");
            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        now += 1;
                        engine.tick(now);
                    }
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) if !line.trim().is_empty() => {
                                match Command::parse(&line) {
                                    Ok(command) => {
                                        if let Err(err) = command.handle(&mut engine) {
                                            warn!(%err, "command failed");
                                        }
                                    }
                                    Err(err) => warn!(%err, "could not parse command"),
                                }
                            }
                            Ok(Some(_)) => {}
                            Ok(None) => break,
                            Err(err) => {
                                warn!(%err, "stdin read error");
                                break;
                            }
                        }
                    }
                }
            }
        };

        async move {
            tokio::select! {
                () = run => {},
                () = token.cancelled() => {},
            }
        }
    });

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("shutting down");
    token.cancel();
    tracker.close();
    tracker.wait().await;
}
