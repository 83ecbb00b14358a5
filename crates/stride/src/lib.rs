//! Running statistics and tempo-matched music queueing.
//!
//! [`stats::RunningStatsEngine`] turns a distance sample stream into run
//! statistics, and [`scheduler::QueueScheduler`] keeps a remote player's
//! queue filled with tracks matching the runner's cadence.
//! [`session::RunSession`] owns both for the lifetime of one run.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod format;
pub mod models;
pub mod player;
pub mod replay;
pub mod scheduler;
pub mod session;
pub mod stats;

pub use config::StrideConfig;
pub use session::RunSession;
