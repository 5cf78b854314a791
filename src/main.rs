//! diagrams-net-mcp-bridge: MCP stdio bridge for the diagrams.net IDE plugin
//!
//! Without an operation flag the process serves JSON-RPC on stdin/stdout.
//! With one, it runs that operation against the plugin and exits.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use diagrams_net_mcp_bridge::cli::{self, CliCommand, RunMode};
use diagrams_net_mcp_bridge::client::{ClientSettings, PluginClient};
use diagrams_net_mcp_bridge::config::{self, Config, TransportMode};
use diagrams_net_mcp_bridge::error::error_chain;
use diagrams_net_mcp_bridge::mcp::server::McpServer;
use diagrams_net_mcp_bridge::mcp::tools::FILE_TYPES;

/// MCP bridge for the diagrams.net IntelliJ plugin.
///
/// Lets AI assistants list, read, update and create diagrams open in the IDE.
/// Runs as an MCP stdio server unless an operation flag is given.
#[derive(Parser, Debug)]
#[command(name = "diagrams-net-mcp-bridge")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("operation")
        .args(["status", "tools", "list", "get", "update_diagram", "create_diagram"])
))]
#[allow(clippy::struct_excessive_bools)] // One flag per operation
struct Args {
    /// Plugin port (same as --port)
    #[arg(value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    port_arg: Option<u16>,

    /// Plugin port [default: from environment, config file, or 8765]
    #[arg(long, value_name = "PORT", conflicts_with = "port_arg", value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Plugin host [default: localhost]
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Request timeout in seconds [default: 30]
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..=300))]
    timeout: Option<u64>,

    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Relay JSON-RPC messages to the plugin's /mcp endpoint unchanged
    #[arg(long, conflicts_with = "operation")]
    passthrough: bool,

    /// Show plugin status
    #[arg(long)]
    status: bool,

    /// List available MCP tools
    #[arg(long)]
    tools: bool,

    /// List open diagrams
    #[arg(long, visible_alias = "show-diagrams")]
    list: bool,

    /// Show a diagram's metadata and content
    #[arg(long, value_name = "ID", visible_alias = "get-diagram")]
    get: Option<String>,

    /// Replace a diagram's content with the XML in FILE
    #[arg(long, num_args = 2, value_names = ["ID", "FILE"])]
    update_diagram: Option<Vec<String>>,

    /// Create a new diagram at PATH inside PROJECT
    #[arg(long, num_args = 2, value_names = ["PROJECT", "PATH"])]
    create_diagram: Option<Vec<String>>,

    /// File type for --create-diagram [default: svg]
    #[arg(long, value_name = "TYPE", requires = "create_diagram", value_parser = FILE_TYPES)]
    file_type: Option<String>,

    /// Initial XML for --create-diagram
    #[arg(long, value_name = "FILE", requires = "create_diagram")]
    content_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Picks the run mode. Clap guarantees at most one operation.
    fn run_mode(&self) -> RunMode {
        let command = if self.status {
            CliCommand::Status
        } else if self.tools {
            CliCommand::ListTools
        } else if self.list {
            CliCommand::ListDiagrams
        } else if let Some(id) = &self.get {
            CliCommand::GetDiagram { id: id.clone() }
        } else if let Some([id, file]) = self.update_diagram.as_deref() {
            CliCommand::UpdateDiagram {
                id: id.clone(),
                file: PathBuf::from(file),
            }
        } else if let Some([project, path]) = self.create_diagram.as_deref() {
            CliCommand::CreateDiagram {
                project: project.clone(),
                path: path.clone(),
                file_type: self.file_type.clone(),
                content_file: self.content_file.clone(),
            }
        } else {
            return RunMode::Stdio;
        };
        RunMode::Cli(command)
    }

    /// Port given on the command line, by flag or positionally.
    const fn cli_port(&self) -> Option<u16> {
        match self.port {
            Some(port) => Some(port),
            None => self.port_arg,
        }
    }

    /// Applies command-line overrides to the loaded configuration.
    fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(host) = &self.host {
            cfg.host.clone_from(host);
        }
        if let Some(secs) = self.timeout {
            cfg.timeout_secs = secs;
            cfg.connect_timeout_secs = cfg.connect_timeout_secs.min(secs);
        }
        if self.passthrough {
            cfg.transport = TransportMode::Passthrough;
        }
    }
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the diagrams-net-mcp-bridge.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };
    args.apply_overrides(&mut cfg);
    if let Err(e) = cfg.validate() {
        eprintln!("Error: {}", error_chain(&e));
        return ExitCode::FAILURE;
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let mode = args.run_mode();
    let settings = ClientSettings {
        host: cfg.host.clone(),
        port: config::resolve_port(args.cli_port(), cfg.port),
        timeout: cfg.timeout(),
        connect_timeout: cfg.connect_timeout(),
    };

    let client = match PluginClient::new(&settings) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            return ExitCode::FAILURE;
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    match mode {
        RunMode::Cli(command) => match runtime.block_on(cli::execute(&command, &client)) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", error_chain(&e));
                ExitCode::FAILURE
            }
        },
        RunMode::Stdio => {
            // Display GPL license notice (required by GPLv3 Section 5d)
            eprintln!(
                "diagrams-net-mcp-bridge {}  Copyright (C) 2026  The diagrams.net IntelliJ plugin contributors",
                env!("CARGO_PKG_VERSION")
            );
            eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
            eprintln!("This is free software, licensed under GPL-3.0-or-later.");
            eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
            eprintln!();

            info!(
                version = env!("CARGO_PKG_VERSION"),
                plugin = client.base_url(),
                transport = ?cfg.transport,
                "Starting diagrams.net MCP bridge"
            );

            let mut server = McpServer::new(client, cfg.transport);
            match runtime.block_on(server.run()) {
                Ok(()) => {
                    info!("Bridge shut down gracefully");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(error = %e, "Bridge error");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
