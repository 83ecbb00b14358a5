//! Simulation tooling for stride.
//!
//! Provides synthetic runners, an in-memory remote player and a static track
//! backend so a full [`stride::RunSession`] can be exercised without a phone,
//! a music service or a network.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stride_sim::prelude::*;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let library = generate_library(300, 140.0..190.0, &mut rng);
//! let player = Arc::new(SimulatedPlayer::new("spotify:track:"));
//! let backend = Arc::new(StaticBackend::new(library, 3.0));
//! let mut session = RunSession::new(StrideConfig::default(), player.clone(), backend);
//! session.start_run();
//! session.change_tempo(165.0, &["top".into()]).await?;
//! ```

pub mod backend;
pub mod catalog;
pub mod player;
pub mod profiles;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::StaticBackend;
    pub use crate::catalog::{generate_library, random_track_id};
    pub use crate::player::{PlayerCall, SimulatedPlayer};
    pub use crate::profiles::{RunnerProfile, SampleNoise};
    pub use rand::{SeedableRng, rngs::StdRng};
    pub use std::sync::Arc;
    pub use stride::{RunSession, StrideConfig};
}
