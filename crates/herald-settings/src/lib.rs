//! # herald-settings
//!
//! Configuration for the Herald push server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`HeraldSettings::default()`]
//! 2. **Settings file**: `~/.herald/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `HERALD_*` overrides (highest priority)
//!
//! There is no global settings instance: the binary loads settings once and
//! hands the values to the components it constructs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{HeraldSettings, LoggingSettings, PushSettings, ServerSettings};
