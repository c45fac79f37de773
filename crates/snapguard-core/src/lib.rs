pub mod config;
pub mod error;
pub mod rules;
pub mod types;

pub use config::SnapguardConfig;
pub use error::{Result, SnapguardError};
pub use types::*;
