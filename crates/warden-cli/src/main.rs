//! LLM Warden CLI - scan text, manage manifest pins and inspect presets.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use warden_core::{PresetName, ScanContext, ToolCall, ToolManifestPin, Warden, WardenConfig};
use warden_policy::PolicyEngine;
use warden_registry::{pin_manifest, verify_manifest};

/// Exit code for a blocked scan.
const EXIT_BLOCKED: u8 = 2;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "LLM Warden - request-time security and governance for LLM traffic")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scan text (argument or stdin) and print the result as JSON
    Scan {
        /// Text to scan. Read from stdin when absent.
        text: Option<String>,
        /// Preset for this request (strict, moderate, relaxed or an alias)
        #[arg(short, long)]
        preset: Option<String>,
        /// Agent id used for tool permissions
        #[arg(short, long)]
        agent: Option<String>,
        /// Declared tool call, as NAME or NAME@SERVER. Repeatable.
        #[arg(short, long = "tool", value_name = "NAME[@SERVER]")]
        tools: Vec<String>,
        /// Configuration file path (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Pin a server's tool names and print the pin as JSON
    Pin {
        server: String,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Compare tool names against a pin file and print the drift report
    VerifyPin {
        pin: PathBuf,
        names: Vec<String>,
    },
    /// Check configuration validity
    Check {
        /// Configuration file path (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the built-in presets
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan {
            text,
            preset,
            agent,
            tools,
            config,
        } => {
            let input = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let config = load_config(config.as_deref())?;
            let warden = Warden::new(config).await?;

            let mut context = ScanContext::new();
            if let Some(preset) = preset {
                context = context.with_preset(preset);
            }
            if let Some(agent) = agent {
                context = context.with_agent(agent);
            }
            for spec in &tools {
                context = context.with_tool(parse_tool(spec)?);
            }

            let result = warden.scan(&input, &context)?;
            warden.close().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if result.is_blocked() {
                return Ok(ExitCode::from(EXIT_BLOCKED));
            }
        }
        Commands::Pin { server, names } => {
            let pin = pin_manifest(&server, &names)?;
            println!("{}", serde_json::to_string_pretty(&pin)?);
        }
        Commands::VerifyPin { pin: path, names } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading pin file {}", path.display()))?;
            let pin: ToolManifestPin = serde_json::from_str(&raw)
                .with_context(|| format!("parsing pin file {}", path.display()))?;
            let report = verify_manifest(&pin, &names)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Check { config } => {
            let config = load_config(Some(&config))?;
            config.validate()?;
            println!("Configuration OK (preset: {})", config.preset_name()?);
        }
        Commands::Presets => {
            for name in PresetName::ALL {
                println!("{}", describe_preset(name));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_stdin() -> anyhow::Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading input from stdin")?;
    Ok(input)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WardenConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            WardenConfig::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(WardenConfig::default()),
    }
}

/// `NAME` or `NAME@SERVER`.
fn parse_tool(spec: &str) -> anyhow::Result<ToolCall> {
    match spec.split_once('@') {
        Some((name, server)) if !name.is_empty() && !server.is_empty() => {
            Ok(ToolCall::new(name).from_server(server))
        }
        Some(_) => anyhow::bail!("invalid tool '{spec}', expected NAME or NAME@SERVER"),
        None if spec.is_empty() => anyhow::bail!("tool name must not be empty"),
        None => Ok(ToolCall::new(spec)),
    }
}

fn describe_preset(name: PresetName) -> String {
    let policy = PolicyEngine::from_name(name);
    format!(
        "{:<9} injection>={:.2} ({}) depth={} budget=${:.2}/day warn@{:.0}% dangerous=[{}]",
        name.as_str(),
        policy.injection_threshold(),
        format!("{:?}", policy.injection_action()).to_lowercase(),
        policy.max_chain_depth(),
        policy.daily_budget(),
        policy.budget_warn_pct() * 100.0,
        policy.dangerous_patterns().join(", "),
    )
}
