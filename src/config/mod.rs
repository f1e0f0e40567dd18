//! Configuration directory layout and `settings.conf` loading.

pub mod paths;
mod settings;
mod skeleton;

pub use paths::{config_dir, logs_dir};
pub use settings::{DEFAULT_BIND, Settings, StoreKind, load, parse_settings};
pub use skeleton::SETTINGS_SKELETON_CONTENT;
