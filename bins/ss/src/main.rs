//! ss command - socket statistics.
//!
//! A Linux `ss` clone for macOS and iOS. Sockets are discovered through
//! `libproc` descriptor introspection rather than `NETLINK_SOCK_DIAG`.

mod output;

use anyhow::Context;
use clap::Parser;
use procsock::{CallerConfig, Collector, Libproc, SocketLayout, Summary};
use std::path::PathBuf;

const ABOUT: &str = "Socket Statistics for Apple platforms (macOS/iOS)";

#[derive(Parser)]
#[command(
    name = "ss",
    about = ABOUT,
    long_about = "Socket Statistics for Apple platforms (macOS/iOS)\n\
                  A Linux ss command clone for Darwin/XNU systems",
    after_help = "Examples:\n  ss -tuln    Show TCP/UDP listening sockets (numeric)\n  \
                  ss -ta      Show all TCP sockets\n  \
                  ss -s       Show summary statistics\n  \
                  ss -tlp     Show listening TCP with process info\n\n\
                  Note: Process information (-p) may require root privileges.",
    disable_version_flag = true
)]
struct Cli {
    /// Display TCP sockets.
    #[arg(short = 't', long)]
    tcp: bool,

    /// Display UDP sockets.
    #[arg(short = 'u', long)]
    udp: bool,

    /// Display Unix sockets.
    #[arg(short = 'x', long)]
    unix: bool,

    /// Display listening sockets.
    #[arg(short = 'l', long)]
    listening: bool,

    /// Display all sockets (including non-established).
    #[arg(short = 'a', long)]
    all: bool,

    /// Don't resolve service names; show wildcard addresses literally.
    #[arg(short = 'n', long)]
    numeric: bool,

    /// Show process using socket.
    #[arg(short = 'p', long)]
    processes: bool,

    /// Show extended socket info.
    #[arg(short = 'e', long)]
    extended: bool,

    /// Print summary statistics.
    #[arg(short = 's', long)]
    summary: bool,

    /// Display IPv4 sockets only.
    #[arg(short = '4', long)]
    ipv4: bool,

    /// Display IPv6 sockets only.
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Don't display header.
    #[arg(short = 'H', long)]
    no_header: bool,

    /// Output in JSON format.
    #[arg(short = 'j', long)]
    json: bool,

    /// Built-in socket_fdinfo layout (darwin, ios13) or a JSON layout file.
    #[arg(long, value_name = "LAYOUT")]
    layout: Option<PathBuf>,

    /// Scan up to N processes in parallel.
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Show version information.
    #[arg(short = 'V', long)]
    version: bool,
}

impl Cli {
    fn caller_config(&self) -> CallerConfig {
        CallerConfig {
            tcp: self.tcp,
            udp: self.udp,
            unix: self.unix,
            listening: self.listening,
            all: self.all,
            numeric: self.numeric,
            processes: self.processes,
            ipv4_only: self.ipv4,
            ipv6_only: self.ipv6,
        }
    }

    fn display_options(&self) -> output::DisplayOptions {
        output::DisplayOptions {
            processes: self.processes,
            extended: self.extended,
            no_header: self.no_header,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    if cli.version {
        println!("ss (Darwin) version {}", env!("CARGO_PKG_VERSION"));
        println!("{}", ABOUT);
        println!("A Linux ss command clone for Darwin/XNU systems");
        return Ok(());
    }

    let layout = match &cli.layout {
        Some(path) => SocketLayout::load(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => SocketLayout::darwin(),
    };

    let config = cli.caller_config();
    tracing::debug!(?config, "collecting sockets");

    let source = Libproc::with_layout(&layout)?;
    let collector = Collector::new(source, &config).with_layout(layout);

    let result = match cli.jobs {
        Some(jobs) if jobs > 1 => collector.collect_concurrent(jobs).await,
        _ => collector.collect(),
    };
    let sockets = match result {
        Err(e) if e.is_permission_denied() => {
            let err = anyhow::Error::new(e);
            return Err(err.context("cannot list processes (try running as root)"));
        }
        other => other?.into_records(),
    };

    if cli.summary {
        let summary = Summary::from_records(&sockets);
        output::print_summary(&summary, cli.json)?;
        return Ok(());
    }

    let opts = cli.display_options();
    if cli.json {
        output::print_json(&sockets, &opts)?;
    } else {
        output::print_text(&sockets, &opts)?;
    }

    Ok(())
}
