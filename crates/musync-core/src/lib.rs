pub mod config;
pub mod disk;
pub mod error;
pub mod fetch;
pub mod playlist;
pub mod prelude;
pub mod queue;
pub mod reconcile;
pub mod song;
pub mod ytdlp;

pub use config::*;
pub use error::*;
pub use playlist::Playlist;
