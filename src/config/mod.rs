//! Publish settings
//!
//! Settings are resolved from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Registry config file (TOML)
//! 3. Programmatic overrides (JSON)

mod defaults;
mod merge;
mod settings;

pub use defaults::{MetadataSettings, PublishSettings, DEFAULT_NOT_ALLOWED_FIELDS};
pub use merge::{deep_merge, merge_layers};
pub use settings::{ConfigError, ConfigOrigin, ConfigSource, ResolvedSettings};
