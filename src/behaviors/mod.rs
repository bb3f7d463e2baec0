//! Per-match custom-item behaviors (spec §4.7, §4.8): the two representative
//! behaviors the spec singles out as exercising the system's hardest
//! invariants. Each is owned per-match and keyed by match id for bulk
//! cleanup, per spec §3 ownership and the Design Notes' "collapse anonymous
//! callback webs into tagged behavior structs" guidance.

pub mod explosive;
pub mod supply_drop;
pub mod tracker;
