use anyhow::Result;
use clap::{Parser, Subcommand};

mod client;
mod commands;
mod config;
mod format;

use client::Client;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "vmmctl")]
#[command(about = "Operator CLI for the Node-Manager VM Control Core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format override (table or json).
    #[arg(long, global = true)]
    format: Option<String>,

    /// vmm-daemon base URL override.
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List VMs controlled by this node.
    List,
    /// Show details for one VM.
    Show { vm_id: i32 },
    /// Print a VM's monitor dialogue history.
    Logs {
        vm_id: i32,
        /// Only show the last N lines.
        #[arg(long, short = 'n')]
        tail: Option<usize>,
    },
    /// Bind a debug console proxy to a VM's monitor PTY.
    Console { vm_id: i32 },
    /// Kill a VM (SIGKILL); the Reaper reclaims its record.
    Destroy { vm_id: i32 },
    /// Freeze a VM's guest CPU (`monitor stop`).
    Pause { vm_id: i32 },
    /// Resume a paused VM (`monitor c`).
    Unpause { vm_id: i32 },
    /// Pass an operator string straight to `vmmSpecificCall`
    /// (`startvnc`, `stopvnc`, `changecdrom:{iso}`, `startconsole`).
    Call { vm_id: i32, arg: String },
    /// Start a new VM.
    Instantiate {
        #[arg(long, default_value = "1024")]
        memory_mb: u64,
        #[arg(long, default_value = "1")]
        cores: u32,
        /// `uri:persistent`, repeatable.
        #[arg(long = "disk")]
        disks: Vec<String>,
        /// `mac:vlan`, repeatable.
        #[arg(long = "nic")]
        nics: Vec<String>,
        /// `key=value`, repeatable.
        #[arg(long = "hint")]
        hints: Vec<String>,
    },
    /// Suspend a VM to a DFS-backed snapshot name.
    Suspend {
        vm_id: i32,
        target: String,
        /// Opaque cookie to round-trip across the suspend/resume pair.
        cookie: String,
    },
    /// Resume a suspended VM from a DFS-backed snapshot name.
    Resume { source: String },
    /// Start a VM listening for an incoming migration and print its
    /// transport cookie.
    PrepReceive {
        #[arg(long, default_value = "1024")]
        memory_mb: u64,
        #[arg(long, default_value = "1")]
        cores: u32,
        #[arg(long = "disk")]
        disks: Vec<String>,
        #[arg(long = "nic")]
        nics: Vec<String>,
        #[arg(long = "hint")]
        hints: Vec<String>,
        /// Wire-compat field; unused by the backend.
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Migrate a VM out to a peer holding a transport cookie from that
    /// peer's `prep-receive`.
    Migrate {
        vm_id: i32,
        target_host: String,
        transport_cookie: String,
    },
    /// Accept an incoming migration on this node.
    Receive { transport_cookie: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load()?;

    let base_url = cli.base_url.unwrap_or(config.base_url);
    let client = Client::new(base_url, config.timeout)?;

    let output_format = match cli.format.as_deref() {
        Some("json") => config::OutputFormat::Json,
        Some("table") => config::OutputFormat::Table,
        Some(other) => {
            eprintln!("Invalid format '{other}', using configured default");
            config.format
        }
        None => config.format,
    };

    match cli.command {
        Commands::List => commands::list::execute(&client, &output_format).await?,
        Commands::Show { vm_id } => commands::show::execute(&client, vm_id, &output_format).await?,
        Commands::Logs { vm_id, tail } => commands::logs::execute(&client, vm_id, tail).await?,
        Commands::Console { vm_id } => commands::console::execute(&client, vm_id).await?,
        Commands::Destroy { vm_id } => commands::destroy::execute(&client, vm_id).await?,
        Commands::Pause { vm_id } => commands::pause::execute(&client, vm_id).await?,
        Commands::Unpause { vm_id } => commands::unpause::execute(&client, vm_id).await?,
        Commands::Call { vm_id, arg } => commands::call::execute(&client, vm_id, arg).await?,
        Commands::Instantiate {
            memory_mb,
            cores,
            disks,
            nics,
            hints,
        } => {
            commands::instantiate::execute(&client, memory_mb, cores, disks, nics, hints).await?
        }
        Commands::Suspend {
            vm_id,
            target,
            cookie,
        } => commands::suspend::execute(&client, vm_id, target, cookie).await?,
        Commands::Resume { source } => commands::resume::execute(&client, source).await?,
        Commands::PrepReceive {
            memory_mb,
            cores,
            disks,
            nics,
            hints,
            source,
        } => {
            commands::prep_receive::execute(&client, memory_mb, cores, disks, nics, hints, source)
                .await?
        }
        Commands::Migrate {
            vm_id,
            target_host,
            transport_cookie,
        } => commands::migrate::execute(&client, vm_id, target_host, transport_cookie).await?,
        Commands::Receive { transport_cookie } => {
            commands::receive::execute(&client, transport_cookie).await?
        }
    }

    Ok(())
}
