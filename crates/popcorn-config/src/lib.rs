#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Application settings loaded from YAML with environment overrides.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (file + env layering),
//! `validate.rs` (field checks), `handle.rs` (`SettingsHandle` watch channel).

pub mod error;
mod handle;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use handle::SettingsHandle;
pub use loader::{CONFIG_PATH_ENV, ConfigLoader, ENV_PREFIX};
pub use model::{
    BackendSettings, LoaderSettings, LogFormatSetting, LogSettings, Settings, TorrentSettings,
};
