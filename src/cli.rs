use clap::{Args, Parser, Subcommand};
use peer_cluster::config::{DEFAULT_DIRECTORY_PORT, DEFAULT_HOST, PeerConfig, random_port};
use peer_cluster::orb::PeerAddress;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "peer-cluster")]
#[command(about = "Peers sharing a name service, a token lock and replicated fortunes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the name service
    Directory {
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        #[arg(short, long, env = "NAME_SERVICE_PORT", default_value_t = DEFAULT_DIRECTORY_PORT)]
        port: u16,
    },
    /// List the peers of a type registered with the name service
    Peers {
        #[arg(short = 't', long = "type", env = "PEER_TYPE")]
        peer_type: String,

        #[arg(long, env = "NAME_SERVICE_ADDR", default_value = "127.0.0.1:42424")]
        directory: PeerAddress,
    },
    /// Chat peer
    Chat(PeerArgs),
    /// Distributed mutual exclusion peer
    Mutex(PeerArgs),
    /// Fortune database replica
    Replica {
        #[command(flatten)]
        peer: PeerArgs,

        /// Fortune file backing this replica
        #[arg(short, long, env = "FORTUNE_DB", default_value = "dbs/fortune.db")]
        file: PathBuf,
    },
}

#[derive(Args, Clone)]
pub struct PeerArgs {
    /// Host to listen on and advertise
    #[arg(long, env = "PEER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on, random in [40001, 50000) when omitted
    #[arg(short, long, env = "PEER_PORT")]
    pub port: Option<u16>,

    /// Peer type; every peer of the same type forms one group
    #[arg(short = 't', long = "type", env = "PEER_TYPE")]
    pub peer_type: String,

    /// Name service address
    #[arg(long, env = "NAME_SERVICE_ADDR", default_value = "127.0.0.1:42424")]
    pub directory: PeerAddress,
}

impl PeerArgs {
    pub fn into_config(self) -> PeerConfig {
        PeerConfig {
            host: self.host,
            port: self.port.unwrap_or_else(random_port),
            peer_type: self.peer_type,
            directory: self.directory,
        }
    }
}
