//! Command-line client for the replicated fortune database.

use anyhow::{Context, Result};
use clap::Parser;
use peer_cluster::config::validate_peer_type;
use peer_cluster::directory::{NameService, RemoteDirectory};
use peer_cluster::orb::{PeerAddress, PeerId, Stub};
use serde_json::json;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fortune-client")]
#[command(about = "Reads a random fortune from the database, or writes a new one", long_about = None)]
struct Cli {
    /// Write a new fortune to the database
    #[arg(short, long, value_name = "FORTUNE")]
    write: Option<String>,

    /// Interactive session with the fortune database
    #[arg(short, long)]
    interactive: bool,

    /// Type of the replicas to talk to
    #[arg(short = 't', long = "type", env = "PEER_TYPE")]
    peer_type: String,

    /// A particular replica; any replica when omitted
    #[arg(short, long = "peer", value_name = "PEER_ID")]
    peer_id: Option<u32>,

    /// Name service address
    #[arg(long, env = "NAME_SERVICE_ADDR", default_value = "127.0.0.1:42424")]
    directory: PeerAddress,
}

const MENU: &str = "\
Choose one of the following commands:
    r            ::  read a random fortune from the database,
    w <FORTUNE>  ::  write a new fortune into the database,
    h            ::  print this menu,
    q            ::  exit.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    validate_peer_type(&cli.peer_type).context("Invalid peer type")?;

    let directory = RemoteDirectory::new(cli.directory.clone());
    let address = match cli.peer_id {
        Some(id) => directory.require_object(&cli.peer_type, PeerId(id)).await,
        None => directory.require_any(&cli.peer_type).await,
    }
    .context("Failed to locate a replica")?;

    println!("Connecting to server: {}", address);
    let db = Stub::new(address);

    if !cli.interactive {
        match cli.write {
            Some(fortune) => {
                println!("Writing '{}' to the fortune database.", fortune);
                write(&db, &fortune).await?;
            }
            None => read(&db).await?,
        }
        return Ok(());
    }

    println!("{}", MENU);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Command> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match line.trim() {
            "r" => read(&db).await,
            "h" => {
                println!("{}", MENU);
                Ok(())
            }
            "q" => break,
            command => match command.strip_prefix('w') {
                Some(rest) if rest.starts_with([' ', '\t']) => write(&db, rest.trim()).await,
                _ => Ok(()),
            },
        };

        if let Err(e) = result {
            println!("An error has occurred: {:#}.", e);
        }
    }

    Ok(())
}

async fn read(db: &Stub) -> Result<()> {
    let fortune: Option<String> = db.invoke("read", vec![]).await?;
    match fortune {
        Some(fortune) => println!("{}", fortune),
        None => println!("The fortune database is empty."),
    }
    Ok(())
}

async fn write(db: &Stub, fortune: &str) -> Result<()> {
    db.call("write", vec![json!(fortune)]).await?;
    Ok(())
}
