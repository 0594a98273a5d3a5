//! Rivulet Web - HTTP surface for selective torrent streaming
//!
//! JSON endpoints for listing torrents and toggling selections, plus ranged
//! file streaming that waits for pieces as they arrive.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]

pub mod error;
pub mod handlers;
pub mod server;

// Re-export main types
pub use error::ApiError;
pub use server::{AppState, router, run_server};
