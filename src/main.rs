//! Entry point for `stop-and-wait`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All protocol work is delegated to the library; `main.rs` owns only process
//! setup (logging, argument parsing, socket creation).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use stop_and_wait::{ConnError, Config, Connection, Socket};

/// Stop-and-wait reliable delivery over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    tuning: Tuning,
}

#[derive(Subcommand)]
enum Mode {
    /// Print every payload received; optionally echo it back.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Send each payload back to the peer it came from.
        #[arg(long)]
        echo: bool,
    },
    /// Send each line of stdin to the server.
    Client {
        /// Remote server address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
    },
}

#[derive(Args)]
struct Tuning {
    /// Maximum payload bytes per segment.
    #[arg(long, global = true, default_value_t = stop_and_wait::config::DEFAULT_MSS)]
    mss: usize,
    /// Retransmission timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 100)]
    rto_ms: u64,
    /// Bound on a single receive wait in milliseconds (unbounded if unset).
    #[arg(long, global = true)]
    wait_ms: Option<u64>,
}

impl Tuning {
    fn config(&self) -> Config {
        Config::default()
            .with_mss(self.mss)
            .with_rto(Duration::from_millis(self.rto_ms))
            .with_receive_wait(self.wait_ms.map(Duration::from_millis))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.tuning.config();

    match cli.mode {
        Mode::Server { bind, echo } => {
            log::info!("Starting server on {bind}");
            let socket = Socket::bind(bind).await.context("bind server socket")?;
            run_server(Connection::new(socket, config)?, echo).await
        }
        Mode::Client { server } => {
            log::info!("Starting client, sending to {server}");
            let local: SocketAddr = if server.is_ipv4() {
                "0.0.0.0:0".parse()?
            } else {
                "[::]:0".parse()?
            };
            let socket = Socket::bind(local)
                .await
                .context("bind client socket")?
                .connect(server)
                .await
                .context("connect client socket")?;
            run_client(Connection::new(socket, config)?, server).await
        }
    }
}

async fn run_server(conn: Connection<Socket>, echo: bool) -> Result<()> {
    loop {
        let payload = match conn.receive_one().await {
            Ok(p) => p,
            Err(ConnError::WouldBlock) => continue,
            Err(e) => bail!("server stopped: {e}"),
        };
        println!("{}", String::from_utf8_lossy(&payload));

        if echo {
            if let Some(peer) = conn.last_peer() {
                conn.send(&payload, peer).await?;
            }
        }
    }
}

async fn run_client(conn: Connection<Socket>, server: SocketAddr) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        conn.send(line.as_bytes(), server).await?;
        let rtt = conn.rtt();
        log::info!(
            "sent {} byte(s); rtt {}us (min {}us, max {}us)",
            line.len(),
            rtt.last_us,
            rtt.min_us,
            rtt.max_us
        );
        while let Ok(reply) = conn.try_receive_one() {
            println!("{}", String::from_utf8_lossy(&reply));
        }
    }
    Ok(())
}
