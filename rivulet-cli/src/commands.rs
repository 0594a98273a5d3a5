//! CLI command implementations

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use rivulet_core::TorrentRegistry;
use rivulet_core::config::RivuletConfig;
use rivulet_sim::{DemoTorrent, layout_for_directory};
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve a local directory as a torrent fed by a simulated swarm
    Serve {
        /// Directory whose files make up the torrent
        dir: PathBuf,
        /// Address to bind to
        #[arg(long)]
        bind: Option<IpAddr>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Piece length in bytes
        #[arg(long)]
        piece_length: Option<u32>,
        /// Milliseconds between simulated delivery rounds
        #[arg(long)]
        tick_ms: Option<u64>,
        /// Pieces delivered per round
        #[arg(long)]
        pieces_per_tick: Option<u32>,
        /// Seed for reproducible arrival order
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the piece layout of a directory
    Inspect {
        /// Directory to inspect
        dir: PathBuf,
        /// Piece length in bytes
        #[arg(long)]
        piece_length: Option<u32>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let mut config = RivuletConfig::from_env();
    match command {
        Commands::Serve {
            dir,
            bind,
            port,
            piece_length,
            tick_ms,
            pieces_per_tick,
            seed,
        } => {
            let overrides = ServeOverrides {
                bind,
                port,
                piece_length,
                tick_ms,
                pieces_per_tick,
                seed,
            };
            overrides.apply(&mut config);
            serve(&dir, config).await
        }
        Commands::Inspect { dir, piece_length } => {
            let piece_length = piece_length.unwrap_or(config.simulation.piece_length);
            inspect(&dir, piece_length).await
        }
    }
}

/// Flags that take precedence over `RIVULET_*` variables.
#[derive(Debug, Default)]
struct ServeOverrides {
    bind: Option<IpAddr>,
    port: Option<u16>,
    piece_length: Option<u32>,
    tick_ms: Option<u64>,
    pieces_per_tick: Option<u32>,
    seed: Option<u64>,
}

impl ServeOverrides {
    fn apply(self, config: &mut RivuletConfig) {
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(piece_length) = self.piece_length {
            config.simulation.piece_length = piece_length;
        }
        if let Some(millis) = self.tick_ms {
            config.simulation.tick_interval = Duration::from_millis(millis);
        }
        if let Some(count) = self.pieces_per_tick {
            config.simulation.pieces_per_tick = count;
        }
        if self.seed.is_some() {
            config.simulation.seed = self.seed;
        }
    }
}

/// Builds a demo torrent from `dir` and serves it until Ctrl-C.
///
/// # Errors
/// - Invalid configuration, unreadable directory, or server failure
async fn serve(dir: &Path, config: RivuletConfig) -> anyhow::Result<()> {
    config.validate()?;

    let demo = DemoTorrent::from_directory(dir, &config.simulation)
        .await
        .with_context(|| format!("failed to load {}", dir.display()))?;
    let torrent = demo.torrent;

    let registry = TorrentRegistry::new();
    registry.insert(torrent.clone());

    let base = format!("http://{}", config.server.socket_addr());
    println!("Serving {} ({})", torrent.name(), torrent.info_hash());
    for file in torrent.summary().files {
        println!("  {base}{}", file.link);
    }
    info!(dir = %dir.display(), "Starting server");

    rivulet_web::run_server(config, registry).await?;
    Ok(())
}

/// Prints each file's offset, length and piece range.
///
/// # Errors
/// - Unreadable or empty directory
async fn inspect(dir: &Path, piece_length: u32) -> anyhow::Result<()> {
    let layout = layout_for_directory(dir, piece_length)
        .await
        .with_context(|| format!("failed to inspect {}", dir.display()))?;

    println!(
        "{} files, {} bytes, {} pieces of {} bytes",
        layout.files().len(),
        layout.total_length(),
        layout.piece_count(),
        layout.piece_length()
    );
    for (file, span) in layout.files().iter().zip(layout.file_spans()) {
        println!(
            "  [{:>6}..={:<6}] offset {:>12} length {:>12}  {}",
            span.start, span.end, file.offset, file.length, file.path
        );
    }
    Ok(())
}
