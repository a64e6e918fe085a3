//! ss_proc command - port to process mapper.
//!
//! Prints one `port cmd pid fd` line per local TCP/UDP port, in ascending
//! port order. A much cheaper alternative to `lsof -i` for scripts that
//! only need to know who owns a port.

use anyhow::Context;
use clap::Parser;
use procsock::{Libproc, PortMap, SocketLayout};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ss_proc",
    version,
    about = "Fast port-to-process mapper",
    after_help = "Output format: port cmd pid fd\nExample: 22 sshd 1234 4"
)]
struct Cli {
    /// Built-in socket_fdinfo layout (darwin, ios13) or a JSON layout file.
    #[arg(long, value_name = "LAYOUT")]
    layout: Option<PathBuf>,

    /// Output in JSON format.
    #[arg(short = 'j', long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let layout = match &cli.layout {
        Some(path) => SocketLayout::load(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => SocketLayout::darwin(),
    };

    let source = Libproc::with_layout(&layout)?;
    let map = tokio::task::spawn_blocking(move || PortMap::build(&source, &layout))
        .await?
        .context("failed to get process list")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let owners: Vec<_> = map.iter().collect();
        serde_json::to_writer_pretty(&mut handle, &owners)?;
        writeln!(handle)?;
    } else {
        write!(handle, "{}", map)?;
    }

    Ok(())
}
