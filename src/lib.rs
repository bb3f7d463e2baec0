//! In-process multi-arena match orchestrator for a last-player-standing
//! combat game: admission, countdown/grace/active/deathmatch phase
//! sequencing, weighted loot generation, and the two hardest per-match
//! custom-item behaviors (a timed area-effect explosive and a directional
//! compass tracker).

pub mod arena;
pub mod behaviors;
pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod loot;
pub mod match_engine;
pub mod opaque_item;
pub mod stats;
pub mod world;
