//! Configuration module
//!
//! - Path resolution for the data directory
//! - Persisted user settings (active budget, display preferences)

pub mod paths;
pub mod settings;

pub use paths::EnvelopePaths;
pub use settings::Settings;
