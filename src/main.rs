// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use trellis_rs::adk::agent::Agent;
use trellis_rs::adk::model::{create_model, ModelCaller};
use trellis_rs::trellis::agents::{dispatch_graph, tool_loop_graph, DEFAULT_SYSTEM_PROMPT};
use trellis_rs::trellis::config::{ConfigLoader, EngineConfig};
use trellis_rs::trellis::server;
use trellis_rs::trellis::service::{ChatRequest, ChatService};
use trellis_rs::trellis::session::InMemorySessionStore;
use trellis_rs::trellis::tools::register_default_tools;
use trellis_rs::trellis::workflow::registry::ToolRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question with the single-agent tool loop
    Ask {
        /// The question to answer
        question: String,
    },
    /// Send one message through the router and specialists
    Chat {
        #[arg(short, long)]
        message: String,

        /// Session to continue
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

async fn build_parts(config: &EngineConfig) -> anyhow::Result<(ModelCaller, ToolRegistry)> {
    let model = create_model(&config.model.provider, &config.model.model_name, config.generation())
        .context("failed to create model")?;
    log::info!(
        "Using provider '{}' with model '{}'",
        config.model.provider,
        config.model.model_name
    );
    let caller = ModelCaller::new(
        model,
        config.model_timeout(),
        config.engine.model_retries,
        config.retry_backoff(),
    );

    let registry = ToolRegistry::new();
    register_default_tools(&registry, config).await;
    Ok((caller, registry))
}

fn chat_service(config: &EngineConfig, caller: ModelCaller, registry: ToolRegistry) -> anyhow::Result<ChatService> {
    let graph = dispatch_graph(caller, registry, &config.dispatch())?;
    let store = InMemorySessionStore::new(config.eviction());
    Ok(ChatService::new(Arc::new(graph), Arc::new(store)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = ConfigLoader::load(args.config.as_deref())?;

    match args.command {
        Commands::Ask { question } => {
            let (caller, registry) = build_parts(&config).await?;
            let graph = tool_loop_graph(
                caller,
                registry,
                DEFAULT_SYSTEM_PROMPT,
                config.tool_timeout(),
                config.engine.finalize_window,
                config.engine.max_hops,
            )?;
            let answer = graph.run(question).await?;
            println!("{}", answer);
        }
        Commands::Chat { message, session } => {
            let (caller, registry) = build_parts(&config).await?;
            let service = chat_service(&config, caller, registry)?;
            let response = service
                .handle(ChatRequest {
                    message,
                    session_id: session,
                })
                .await?;
            println!("{}", response.response);
            println!();
            println!(
                "session: {}  agent: {}  complete: {}",
                response.session_id,
                response.agent_used.as_deref().unwrap_or("-"),
                response.is_complete
            );
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let (caller, registry) = build_parts(&config).await?;
            let service = chat_service(&config, caller, registry)?;
            server::serve(&config.server.host, config.server.port, service).await?;
        }
    }

    Ok(())
}
