pub mod config;
pub mod scheduler;

pub use config::load_config;
pub use scheduler::{CycleOutcome, Scheduler};
