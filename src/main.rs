mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use peer_cluster::config::PeerConfig;
use peer_cluster::directory::{LocalDirectory, NameService, RemoteDirectory};
use peer_cluster::node::{ChatPeer, MutexPeer, ReplicaPeer};
use peer_cluster::orb::{MethodRegistry, PeerId, Skeleton};
use peer_cluster::storage::FortuneDatabase;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Directory { host, port } => run_directory(&host, port).await,
        Commands::Peers {
            peer_type,
            directory,
        } => {
            let directory = RemoteDirectory::new(directory);
            let peers = directory
                .require_all(&peer_type)
                .await
                .context("Failed to query the name service")?;

            println!("Peers of type '{}':", peer_type);
            for (id, address) in peers {
                println!("    id: {:>2}, address: {}", id.0, address);
            }
            Ok(())
        }
        Commands::Chat(args) => run_chat(args.into_config()).await,
        Commands::Mutex(args) => run_mutex(args.into_config()).await,
        Commands::Replica { peer, file } => run_replica(peer.into_config(), &file).await,
    }
}

async fn run_directory(host: &str, port: u16) -> Result<()> {
    let directory = Arc::new(LocalDirectory::new());
    let registry = MethodRegistry::new();
    directory.register_methods(&registry)?;

    let skeleton = Skeleton::bind(host, port)
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    tracing::info!("Name service listening on {}", skeleton.local_addr());

    let server = skeleton.serve(registry);
    tokio::signal::ctrl_c().await?;
    server.abort();

    tracing::info!("Name service stopped");
    Ok(())
}

fn connect(config: &PeerConfig) -> Result<Arc<dyn NameService>> {
    config.validate(false)?;
    Ok(Arc::new(RemoteDirectory::new(config.directory.clone())))
}

fn prompt(cursor: &str) {
    print!("{}", cursor);
    let _ = std::io::stdout().flush();
}

fn input() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn run_mutex(config: PeerConfig) -> Result<()> {
    let node = MutexPeer::start(&config, connect(&config)?).await?;

    let menu = "\
Choose one of the following commands:
    l  ::  list peers,
    s  ::  display status,
    a  ::  acquire the lock,
    r  ::  release the lock,
    h  ::  print this menu,
    q  ::  exit.";

    println!("{}", menu);
    let mut lines = input();
    let mut locked = false;

    loop {
        let state = if locked { "LOCKED" } else { "RELEASED" };
        prompt(&format!("{}({}):{}> ", config.peer_type, node.id(), state));

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "l" => println!("{}", node.display_peers().await),
            "s" => println!("{}", node.display_status().await),
            "a" if locked => println!("The lock is already held."),
            "a" => {
                node.acquire().await;
                locked = true;
            }
            "r" => match node.release().await {
                Ok(()) => locked = false,
                Err(e) => println!("An error has occurred: {}.", e),
            },
            "h" => println!("{}", menu),
            "q" => break,
            _ => {}
        }
    }

    node.destroy().await
}

async fn run_replica(config: PeerConfig, file: &Path) -> Result<()> {
    let store = FortuneDatabase::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let node = ReplicaPeer::start(&config, connect(&config)?, Arc::new(store)).await?;

    let menu = "\
Choose one of the following commands:
    l  ::  list peers,
    s  ::  display status,
    h  ::  print this menu,
    q  ::  exit.";

    println!("{}", menu);
    let mut lines = input();
    let cursor = format!("{}({})> ", config.peer_type, node.core().id());

    loop {
        prompt(&cursor);

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "l" => println!("{}", node.core().display_peers().await),
            "s" => println!("{}", node.core().display_status().await),
            "h" => println!("{}", menu),
            "q" => break,
            _ => {}
        }
    }

    node.destroy().await
}

async fn run_chat(config: PeerConfig) -> Result<()> {
    let node = ChatPeer::start(&config, connect(&config)?).await?;

    let menu = "\
Choose one of the following commands:
    l                       ::  display the peer list,
    <PEER_ID> : <MESSAGE>   ::  send <MESSAGE> to <PEER_ID>,
    h                       ::  print this menu,
    q                       ::  exit.";

    println!("{}", menu);
    let mut lines = input();
    let cursor = format!("{}({})> ", config.peer_type, node.id());

    loop {
        prompt(&cursor);

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "l" => println!("{}", node.display_peers().await),
            "h" => println!("{}", menu),
            "q" => break,
            command => {
                if let Some((to, text)) = parse_message(command)
                    && let Err(e) = node.send_message(to, text).await
                {
                    println!("{:#}", e);
                }
            }
        }
    }

    node.destroy().await
}

/// `<id> : <text>`
fn parse_message(command: &str) -> Option<(PeerId, &str)> {
    let (to, text) = command.split_once(':')?;
    let to = to.trim().parse::<u32>().ok()?;
    Some((PeerId(to), text.trim()))
}
