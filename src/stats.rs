//! Stats sink (spec §6): statistics aggregation is a downstream collaborator,
//! reached only through this trait. The engine never blocks waiting on it —
//! failures are swallowed at this boundary (spec §7, External errors).

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Waiting,
    Countdown,
    Grace,
    Active,
    Deathmatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub participant: Vec<u8>,
    pub kills: u32,
    pub damage_dealt: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub participant: Vec<u8>,
    pub value: f64,
}

pub type LeaderboardFuture = Pin<Box<dyn Future<Output = Vec<PlayerStats>> + Send>>;

/// Downstream stats collaborator. `leaderboard` is the only method that
/// returns a future — it backs menu/GUI queries and must never be awaited
/// from the engine thread directly (spec §6: "does not block engine").
pub trait StatsSink: Send + Sync {
    fn record_death(
        &self,
        match_id: u64,
        victim: &[u8],
        killer: Option<&[u8]>,
        phase: MatchPhase,
    );
    fn record_kill(&self, match_id: u64, killer: &[u8], victim: &[u8]);
    fn record_completion(
        &self,
        match_id: u64,
        arena: &str,
        placements: Vec<Placement>,
        duration_ticks: u64,
    );
    fn leaderboard(&self, stat_kind: &str, limit: usize) -> LeaderboardFuture;
}

/// Default sink for hosts that haven't wired up real stats persistence:
/// logs every event at `info!` and returns an empty leaderboard. Grounded on
/// the teacher's habit of logging domain events through `tracing` rather
/// than silently dropping them.
pub struct LoggingStatsSink;

impl StatsSink for LoggingStatsSink {
    fn record_death(
        &self,
        match_id: u64,
        victim: &[u8],
        killer: Option<&[u8]>,
        phase: MatchPhase,
    ) {
        tracing::info!(
            match_id,
            victim = ?victim,
            killer = ?killer,
            ?phase,
            "participant death"
        );
    }

    fn record_kill(&self, match_id: u64, killer: &[u8], victim: &[u8]) {
        tracing::info!(match_id, killer = ?killer, victim = ?victim, "kill recorded");
    }

    fn record_completion(
        &self,
        match_id: u64,
        arena: &str,
        placements: Vec<Placement>,
        duration_ticks: u64,
    ) {
        tracing::info!(
            match_id,
            arena,
            duration_ticks,
            placements = placements.len(),
            "match completion recorded"
        );
    }

    fn leaderboard(&self, stat_kind: &str, _limit: usize) -> LeaderboardFuture {
        warn!(stat_kind, "leaderboard requested from logging sink; no data kept");
        Box::pin(async { Vec::new() })
    }
}
