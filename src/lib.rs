pub mod cli;
pub mod config;
pub mod error;
pub mod gpx;
pub mod legacy;
pub mod session;
pub mod sport;
pub mod transport;
pub mod types;
pub mod utils;
pub mod workouts;

pub use error::{Error, Result};
pub use legacy::LegacySessionClient;
pub use session::{SessionClient, SessionState};
pub use sport::Sport;
pub use types::{TrackPoint, WorkoutRecord};
pub use workouts::Workouts;
