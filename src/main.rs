mod console;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use crossterm::style::Stylize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dockhand_core::config::{AppConfig, RetryConfig};
use dockhand_core::event::EventBus;
use dockhand_core::traits::LlmClient;
use dockhand_core::types::ThreadId;

use dockhand_agent::{open_checkpointer, AgentRuntime};
use dockhand_tools::ToolRegistry;

const DEFAULT_PROMPT: &str = "Can you optimize my Dockerfile?";

#[derive(Parser)]
#[command(name = "dockhand", version, about = "Tool-calling agent that optimizes Dockerfiles")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "dockhand.toml")]
    config: PathBuf,

    /// Conversation thread; checkpoints are kept per thread
    #[arg(short, long, default_value = "42")]
    thread: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single prompt and exit (default)
    Run {
        /// The prompt to send to the agent
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// List the tools bound to the model
    Tools,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries tool echoes and the answer
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dockhand=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "dockhand", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;
    let tools = Arc::new(ToolRegistry::dockerfile_tools(&config.tools));

    match cli.command {
        Some(Commands::Tools) => {
            for def in tools.definitions() {
                println!("{:<20} {}", def.name, def.description);
            }
            return Ok(());
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        _ => {}
    }

    let prompt = match cli.command {
        Some(Commands::Run { prompt }) if !prompt.is_empty() => prompt.join(" "),
        _ => DEFAULT_PROMPT.to_string(),
    };

    let llm = build_llm(&config)?;
    let checkpointer = open_checkpointer(&config.agent.checkpoint, &config.working_dir())?;
    let event_bus = Arc::new(EventBus::default());
    let runtime = AgentRuntime::new(config, llm, tools, event_bus.clone())
        .with_checkpointer(checkpointer);

    let cancel = runtime.cancel_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Interrupted, cancelling run");
        cancel.cancel();
    });

    let thread_id = ThreadId::from(cli.thread);
    run_once(&runtime, &event_bus, &thread_id, &prompt).await
}

/// Primary client, wrapped with retry and fallbacks when configured.
fn build_llm(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    let primary = dockhand_llm::create_client(&config.model)?;
    if config.fallback_models.is_empty() && config.model.retry.is_none() {
        return Ok(Arc::from(primary));
    }

    let retry_config = config
        .model
        .retry
        .clone()
        .unwrap_or_else(RetryConfig::default);
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|mc| Ok((mc.clone(), dockhand_llm::create_client(mc)?)))
        .collect::<dockhand_core::Result<Vec<_>>>()?;

    Ok(Arc::new(dockhand_llm::RetryingClient::new(
        primary,
        fallbacks,
        retry_config,
    )))
}

async fn run_once(
    runtime: &AgentRuntime,
    event_bus: &Arc<EventBus>,
    thread_id: &ThreadId,
    prompt: &str,
) -> anyhow::Result<()> {
    let rx = event_bus.subscribe();

    let print_handle = tokio::spawn(console::echo_events(rx, |echo| match echo {
        console::Echo::Tool(summary) => println!("{}", summary.cyan()),
        console::Echo::ToolError(line) | console::Echo::Done(line) => eprintln!("{}", line),
    }));

    let result = runtime.run(thread_id, prompt).await;
    print_handle.await.ok();

    let text = result?;
    println!("{}", text);
    Ok(())
}
