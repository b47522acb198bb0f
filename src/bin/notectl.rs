//! NoteCtl - Command line client for a Storj Worker
//!
//! Usage:
//!   notectl health                    - Check the service is up
//!   notectl list [--prefix P]         - List note keys
//!   notectl read <filename>           - Print a note
//!   notectl write <filename> [...]    - Store a note from --content, --file or stdin

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use storj_worker::client::NoteClient;

/// Storj Worker Control Tool
#[derive(Parser)]
#[command(name = "notectl")]
#[command(version, about = "Read and write notes on a Storj Worker", long_about = None)]
struct Cli {
    /// API endpoint to connect to
    #[arg(short, long, env = "NOTECTL_ENDPOINT", default_value = "http://127.0.0.1:5000")]
    endpoint: String,

    /// Bearer token for the note endpoints
    #[arg(short, long, env = "BACKEND_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// List stored notes
    List {
        /// Only list keys starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Print the content of a note
    Read {
        filename: String,
    },
    /// Create or overwrite a note
    Write {
        filename: String,
        /// Note content
        #[arg(short, long, conflicts_with = "file")]
        content: Option<String>,
        /// Read content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = NoteClient::new(cli.endpoint, cli.token)?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            let title = format!("Storj Worker at {}", client.base_url());
            println!();
            println!("{}", title);
            println!("{}", "=".repeat(title.len()));
            println!("Status:   {}", if health.ok { "\x1b[32mOK\x1b[0m" } else { "\x1b[31mDOWN\x1b[0m" });
            println!("Bucket:   {}", health.bucket);
            println!("Endpoint: {}", health.endpoint);
            println!();
        }
        Commands::List { prefix } => {
            let files = client.list(prefix.as_deref()).await?;
            for file in &files {
                println!("{}", file);
            }
            eprintln!("{} note(s)", files.len());
        }
        Commands::Read { filename } => {
            let content = client.read(&filename).await?;
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
        Commands::Write { filename, content, file } => {
            let content = match (content, file) {
                (Some(c), _) => c,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("failed to read {:?}: {}", path, e))?,
                (None, None) => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let message = client.write(&filename, &content).await?;
            println!("{}", message);
        }
    }

    Ok(())
}
