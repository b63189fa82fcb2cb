#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Shared test helpers used across integration suites.
//! Layout: fakes.rs (in-memory collaborators + call journal), fixtures.rs (sample requests and torrents).

pub mod fakes;
pub mod fixtures;

pub use fakes::{
    FakeStream, FakeStreamService, FakeSubtitleService, FakeTorrent, FakeTorrentService, Journal,
};
