#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Torrent load orchestration for the media player.
//!
//! Layout: `orchestrator.rs` (`LoadTorrentService` state machine), `state.rs`
//! (load states and listeners), `dispatch.rs` (bus to orchestrator bridge),
//! `bootstrap.rs` (service wiring), `error.rs`.

/// Application bootstrap and backend wiring.
pub mod bootstrap;
/// Event bus request dispatch.
pub mod dispatch;
pub mod error;
/// Load-torrent orchestrator.
pub mod orchestrator;
pub mod state;

pub use bootstrap::run_app;
pub use dispatch::spawn_request_listener;
pub use error::{AppError, AppResult, LoadError, LoadResult};
pub use orchestrator::LoadTorrentService;
pub use state::{ListenerId, ListenerRegistry, LoadState, LoadTorrentEvent};
