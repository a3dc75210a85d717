//! PrizeCraft Core Types
//!
//! This crate defines the fundamental data structures shared by the
//! settlement engine: contests and their winners, leaderboard period
//! snapshots, checkpoints, and the period accounting functions that map
//! wall-clock time onto period identifiers.

mod claim;
mod duration;
mod error;
mod period;
mod types;

pub use claim::*;
pub use duration::*;
pub use error::*;
pub use period::*;
pub use types::*;
