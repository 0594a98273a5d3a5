//! HTTP request handlers organized by functionality

pub mod files;
pub mod torrents;

// Re-export handler functions
pub use files::serve_file;
pub use torrents::{
    delete_torrent, get_torrent, list_torrents, pause_torrent, resume_torrent, start_all,
    start_file, stop_all, stop_file, torrent_stats,
};
