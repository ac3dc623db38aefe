//! Place clients - console player and bot swarm
//!
//! # Usage
//!
//! ```text
//! place console alice                      # play from the terminal
//! place bots grief --count 10 --name g     # ten griefing bots: g-0 .. g-9
//! place bots region --region 40 60 40 60 --color red
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use place_client::console::{describe_change, parse_command, render_board, ConsoleCommand};
use place_client::{Bot, BotKind, BotTiming, ClientError, NetworkClient};
use place_core::PlaceColor;

// ============================================================================
// CLI Arguments
// ============================================================================

/// Place clients - paint the shared canvas
#[derive(Parser, Debug)]
#[command(name = "place", version, about)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct ServerArgs {
    /// Server host
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, global = true, default_value_t = 5555)]
    port: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play interactively from the terminal
    Console {
        /// Username to log in with
        username: String,
    },
    /// Run a swarm of bots
    Bots(BotArgs),
}

#[derive(ClapArgs, Debug)]
struct BotArgs {
    /// Tile policy
    #[arg(value_enum)]
    kind: KindArg,

    /// Base username; bots are named `<name>-<n>`
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Number of bots
    #[arg(short, long, default_value_t = 1)]
    count: usize,

    /// Paint color for `color` and `region` bots (index or name)
    #[arg(long, default_value = "red")]
    color: PlaceColor,

    /// Color a `grief` bot hunts for
    #[arg(long, default_value = "white")]
    target: PlaceColor,

    /// Rectangle for `region` bots: first row, last row, first col, last col
    #[arg(long, num_args = 4, value_names = ["ROW0", "ROW1", "COL0", "COL1"])]
    region: Option<Vec<i32>>,

    /// Server cooldown in milliseconds; the shortest wait between moves
    #[arg(long, default_value_t = 1000)]
    cooldown_ms: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Random,
    Color,
    Region,
    Grief,
}

impl BotArgs {
    fn kind(&self) -> Result<BotKind> {
        Ok(match self.kind {
            KindArg::Random => BotKind::Random,
            KindArg::Color => BotKind::Color { color: self.color },
            KindArg::Region => {
                let bounds = self
                    .region
                    .as_deref()
                    .and_then(|r| <[i32; 4]>::try_from(r).ok());
                let Some([r0, r1, c0, c1]) = bounds else {
                    bail!("region bots need --region ROW0 ROW1 COL0 COL1");
                };
                BotKind::Region {
                    rows: r0..=r1,
                    cols: c0..=c1,
                    color: self.color,
                }
            }
            KindArg::Grief => BotKind::Grief {
                target: self.target,
            },
        })
    }
}

// ============================================================================
// Console
// ============================================================================

async fn run_console(addr: SocketAddr, username: &str) -> Result<()> {
    let mut client = NetworkClient::connect(addr)
        .await
        .with_context(|| format!("Could not reach {addr}"))?;

    let model = match client.login(username).await {
        Ok(model) => model,
        Err(ClientError::UsernameTaken(name)) => bail!("Username {name:?} is not available"),
        Err(e) => return Err(e).context("Login failed"),
    };
    client.start_listener()?;

    model
        .add_observer(|tile| println!("{}", describe_change(tile)))
        .await;

    print!("{}", render_board(&model.snapshot().await));
    println!("Type tile change as: row col color");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(ConsoleCommand::Paint { row, col, color }) => {
                if let Err(e) = client.submit(row, col, color).await {
                    println!("Invalid move: {e}");
                }
            }
            Ok(ConsoleCommand::Show) => print!("{}", render_board(&model.snapshot().await)),
            Ok(ConsoleCommand::Quit) => break,
            Err(e) => println!("{e}"),
        }

        if !model.is_connected() {
            println!("Disconnected from server");
            break;
        }
    }

    info!("Disconnecting from server");
    client.shutdown().await;
    Ok(())
}

// ============================================================================
// Bots
// ============================================================================

async fn run_bots(addr: SocketAddr, args: BotArgs) -> Result<()> {
    let kind = args.kind()?;
    let timing = BotTiming::for_cooldown(Duration::from_millis(args.cooldown_ms));
    let cancel_token = CancellationToken::new();
    let mut bots = JoinSet::new();

    for i in 0..args.count {
        let username = format!("{}-{i}", args.name);
        let mut client = NetworkClient::connect(addr)
            .await
            .with_context(|| format!("Could not reach {addr}"))?;
        let model = match client.login(&username).await {
            Ok(model) => model,
            Err(e) => {
                warn!(username = %username, error = %e, "Bot could not log in");
                continue;
            }
        };
        client.start_listener()?;

        info!(username = %username, kind = kind.name(), "New bot created");
        let bot = Bot::new(kind.clone(), client, model, timing);
        bots.spawn(bot.run(cancel_token.clone()));
    }

    if bots.is_empty() {
        bail!("No bot could log in");
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Error waiting for Ctrl+C");
            }
            info!("Stopping bots");
            cancel_token.cancel();
        }
        _ = async { while bots.join_next().await.is_some() {} } => {
            warn!("All bots disconnected");
        }
    }

    while bots.join_next().await.is_some() {}
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("place_client=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = tokio::net::lookup_host((args.server.host.as_str(), args.server.port))
        .await
        .context("Failed to resolve server address")?
        .next()
        .context("Server address resolved to nothing")?;

    match args.command {
        Command::Console { username } => run_console(addr, &username).await,
        Command::Bots(bot_args) => run_bots(addr, bot_args).await,
    }
}
