#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Transport to the native backend process.
//!
//! Layout: `message.rs` (envelope + `IpcMessage`), `messages.rs` (typed
//! payloads), `channel.rs` (`FxChannel`), `adapters/` (collaborator trait
//! implementations over the channel).

pub mod adapters;
pub mod channel;
pub mod error;
pub mod message;
pub mod messages;

pub use adapters::{
    ChannelStream, ChannelStreamService, ChannelSubtitleService, ChannelTorrent,
    ChannelTorrentService,
};
pub use channel::{DEFAULT_TIMEOUT, FxChannel};
pub use error::{IpcError, IpcResult};
pub use message::{FxMessage, IpcMessage};
