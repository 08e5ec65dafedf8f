pub mod config;
pub mod logging;
pub mod scheduler;
pub mod shutdown;

pub use config::Config;
pub use scheduler::{CycleError, CycleReport, FailureTracker, Phase, Scheduler};
pub use shutdown::{ShutdownListener, ShutdownSignal};
