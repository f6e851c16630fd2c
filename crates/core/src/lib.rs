pub mod config;
pub mod error;
pub mod payload;

pub use config::Config;
pub use error::*;
pub use payload::*;
