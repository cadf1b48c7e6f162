//! Command-line front end for the edge gateway console.
//!
//! Every subcommand builds a [`Console`] against the gateway backend, runs
//! one operation and prints the result. Notices go to the log.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use gateway_console::{
    ChildrenState, Console, DetailState, ResourceBrowser, TailState, TracingNotifier,
};
use gateway_core::{ConsoleSettings, IdentifierType, PublishingMode, TailMessage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Configure and watch an edge gateway", long_about = None)]
struct Args {
    /// Console settings file (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend API base, e.g. http://gateway:5000/api/
    #[arg(short, long, env = "GATEWAY_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Agent state and dashboard counters.
    Status,
    /// Render the agent config and restart the agent.
    Apply,
    /// Print the agent config that would be applied.
    Preview,
    /// Print the OPC UA address space.
    Browse {
        /// Node to start from; defaults to the configured root.
        #[arg(long)]
        root: Option<String>,
        /// Levels to expand.
        #[arg(short, long, default_value_t = 2)]
        depth: usize,
    },
    /// Add an OPC UA node to the sampled node list.
    AddNode { node_id: String },
    /// List the sampled OPC UA nodes.
    Nodes,
    /// List the Modbus registers.
    Registers {
        /// Replace an empty setup with the demo server and registers.
        #[arg(long, default_value_t = false)]
        demo: bool,
    },
    /// Show or change the publishing mode.
    Publishing {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Group interval, e.g. 10s.
        #[arg(long)]
        interval: Option<String>,
    },
    /// Probe a data source or the broker.
    Test {
        #[arg(value_enum)]
        target: TestTarget,
    },
    /// Follow the messages published to the broker.
    Tail {
        /// Stop after this many seconds; defaults to the session ceiling.
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Individual,
    Grouped,
}

impl From<ModeArg> for PublishingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Individual => PublishingMode::Individual,
            ModeArg::Grouped => PublishingMode::Grouped,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TestTarget {
    Modbus,
    Opcua,
    Mqtt,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,gateway_console=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    let console = Console::connect(settings, Arc::new(TracingNotifier))
        .context("Failed to set up the backend connection")?;

    run(&console, args.command).await?;
    console.shutdown().await;
    Ok(())
}

fn load_settings(args: &Args) -> Result<ConsoleSettings> {
    let settings = match &args.config {
        Some(path) => ConsoleSettings::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConsoleSettings::default(),
    };
    let settings = match &args.url {
        Some(url) => settings.with_base_url(url.as_str())?,
        None => settings,
    };
    settings.validate()?;
    Ok(settings)
}

async fn run(console: &Console, command: Command) -> Result<()> {
    match command {
        Command::Status => status(console).await,
        Command::Apply => {
            let result = console.actions().apply_config().await?;
            if let Some(path) = result.path {
                println!("Config written to {}", path);
            }
            Ok(())
        }
        Command::Preview => {
            print!("{}", console.actions().preview_config().await?);
            Ok(())
        }
        Command::Browse { root, depth } => {
            let root = root.unwrap_or_else(|| console.settings().browse_root.clone());
            browse(console.browser(), &root, depth).await
        }
        Command::AddNode { node_id } => {
            let browser = console.browser();
            browser.select_node(&node_id).await;
            if let DetailState::Ready(detail) = browser.detail() {
                println!("{} = {}", detail.display_name, detail.value_text());
            }
            if !browser.can_add_selected() {
                tracing::warn!("{} is not a variable node", node_id);
            }
            let outcome = console.add_selected_node().await?;
            println!("{:?}", outcome);
            Ok(())
        }
        Command::Nodes => {
            console.nodes().load().await?;
            for node in console.nodes().snapshot() {
                println!(
                    "{:<24} ns={};{}={:<32} {:?} {}",
                    node.name,
                    node.namespace,
                    identifier_prefix(&node.identifier_type),
                    node.identifier,
                    node.sampling_mode,
                    node.interval
                );
            }
            Ok(())
        }
        Command::Registers { demo } => {
            let registers = console.registers();
            registers.load().await?;
            if demo && !registers.fill_demo().await {
                anyhow::bail!("The backend rejected the demo registers");
            }
            let connection = registers.connection();
            println!(
                "{} (slave {}, timeout {}, {})",
                connection.controller,
                connection.slave_id,
                connection.timeout,
                if connection.enabled { "enabled" } else { "disabled" }
            );
            for register in registers.snapshot() {
                println!(
                    "{:>6} {:<24} {:?} {:?} {:?}",
                    register.address,
                    register.name,
                    register.register_type,
                    register.data_type,
                    register.byte_order
                );
            }
            Ok(())
        }
        Command::Publishing { mode, interval } => publishing(console, mode, interval).await,
        Command::Test { target } => {
            let actions = console.actions();
            let outcome = match target {
                TestTarget::Modbus => {
                    let registers = console.registers();
                    registers.load().await?;
                    actions.test_modbus_connection(&registers.connection()).await?
                }
                TestTarget::Opcua => actions.test_opcua_connection(None).await?,
                TestTarget::Mqtt => {
                    console.mqtt().load().await?;
                    actions.test_mqtt_connection(&console.mqtt().get()).await?
                }
            };
            println!("{}", outcome.summary());
            if !outcome.ok {
                anyhow::bail!("Connection test failed");
            }
            Ok(())
        }
        Command::Tail { duration_secs } => {
            let duration = duration_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| console.settings().tail_ceiling());
            tail(console, duration).await
        }
    }
}

async fn status(console: &Console) -> Result<()> {
    let agent = console.actions().agent_status().await?;
    let dashboard = console.dashboard().await?;
    let metrics = &dashboard.metrics;

    println!("Agent:      {}", if agent.running { "running" } else { "stopped" });
    println!("Uptime:     {}s", dashboard.info.uptime_seconds);
    println!(
        "Host:       cpu {:.1}%  mem {:.1}%  disk {:.1}%",
        dashboard.health.cpu_percent, dashboard.health.memory_percent, dashboard.health.disk_percent
    );
    println!(
        "Pipeline:   gathered {}  written {}  input errors {}",
        metrics.total_gathered(),
        metrics.mqtt_written,
        metrics.input_errors()
    );
    if let Some(loss) = metrics.loss_percent() {
        println!("Loss:       {:.1}%", loss);
    }
    if let Some(rate) = metrics.read_success_rate() {
        println!("OPC UA ok:  {:.1}%", rate);
    }
    println!("Buffer:     {:.1}%", metrics.buffer_fill_percent());
    if let Some(at) = metrics.last_updated_at() {
        println!("Updated:    {}", at.to_rfc3339());
    }
    for container in &dashboard.info.containers {
        println!("  {:<24} {}", container.name, container.status);
    }
    Ok(())
}

async fn browse(browser: &ResourceBrowser, root: &str, depth: usize) -> Result<()> {
    if let Err(failure) = browser.load_root(root).await {
        println!("{}", failure);
        println!("{}", failure.remediation());
        anyhow::bail!("Browse failed");
    }

    // Each pass expands one more level.
    for _ in 1..depth {
        for row in browser.visible_rows() {
            let failed = matches!(row.children, ChildrenState::Failed(_));
            if row.node.has_children && !row.expanded && !failed {
                browser.toggle_expand(&row.node.node_id).await;
            }
        }
    }

    for row in browser.visible_rows() {
        println!(
            "{}{} [{:?}] {}",
            "  ".repeat(row.depth),
            row.node.display_name,
            row.node.node_class,
            row.node.node_id
        );
    }
    Ok(())
}

async fn publishing(
    console: &Console,
    mode: Option<ModeArg>,
    interval: Option<String>,
) -> Result<()> {
    let editor = console.publishing();
    editor.load().await?;
    if let Some(mode) = mode {
        editor.set_mode(mode.into());
    }
    if let Some(interval) = interval {
        editor.set_group_interval(interval);
    }
    for problem in editor.problems() {
        tracing::warn!("{}", problem);
    }
    if editor.has_pending_save() && !editor.flush().await {
        anyhow::bail!("The backend rejected the publishing settings");
    }

    let config = editor.get();
    if editor.is_group_mode_active() {
        println!("grouped, every {}", config.group_interval);
    } else {
        println!("individual");
    }
    Ok(())
}

async fn tail(console: &Console, duration: Duration) -> Result<()> {
    let session = console.tail();
    let mut updates = session.subscribe();
    session.start().await?;

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut last_seen: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_new(&snapshot.messages, &mut last_seen);
                if snapshot.state == TailState::Stopped {
                    break;
                }
            }
        }
    }

    session.stop().await;
    Ok(())
}

/// Print messages newer than `last_seen`, oldest first.
fn print_new(messages: &[TailMessage], last_seen: &mut Option<DateTime<Utc>>) {
    let mut fresh: Vec<&TailMessage> = messages
        .iter()
        .filter(|m| last_seen.map_or(true, |seen| m.timestamp > seen))
        .collect();
    fresh.sort_by_key(|m| m.timestamp);
    for message in fresh {
        println!("{} {}", message.utc_timestamp(), message.topic);
        println!("{}", message.pretty_payload());
        *last_seen = Some(message.timestamp);
    }
}

fn identifier_prefix(kind: &IdentifierType) -> &'static str {
    match kind {
        IdentifierType::String => "s",
        IdentifierType::Numeric => "i",
        IdentifierType::Guid => "g",
        IdentifierType::Opaque => "b",
    }
}
