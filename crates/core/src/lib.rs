//! chatloop core library
//!
//! Foundational utilities shared by every chatloop crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ChatConfig, ProviderSettings};
pub use error::{AppError, AppResult};
