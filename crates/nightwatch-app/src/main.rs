//! Nightwatch application binary - composition root.
//!
//! 1. Load `.env`, the TOML config, env overrides and CLI flags
//! 2. Construct the Azure clients that are configured
//! 3. Load the available tools into the registry
//! 4. Warm the NSG vector index unless disabled
//! 5. Answer questions from `--query` or an interactive stdin loop

mod cli;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use nightwatch_chat::{ChatOrchestrator, QueryRouter};
use nightwatch_core::config::NightwatchConfig;
use nightwatch_core::error::NightwatchError;
use nightwatch_core::llm::{AzureOpenAiClient, CompletionService};
use nightwatch_tools::kql::client::LogAnalyticsClient;
use nightwatch_tools::nsg::storage::AzureBlobStore;
use nightwatch_tools::registry::ToolRegistry;
use nightwatch_tools::tool::ToolContext;
use nightwatch_vector::cache::VectorIndexCache;
use nightwatch_vector::embedding::AzureOpenAiEmbeddings;

use cli::CliArgs;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Construct every configured client. Missing configuration leaves the
/// matching slot empty so the tools that need it are skipped at load time.
fn build_context(
    config: &NightwatchConfig,
    llm: Arc<dyn CompletionService>,
) -> Result<ToolContext, NightwatchError> {
    let mut ctx = ToolContext::new(config.clone()).with_llm(llm);

    ctx = ctx.with_log_query(Arc::new(LogAnalyticsClient::from_config(
        &config.log_analytics,
        &config.llm,
    )?));

    match AzureBlobStore::from_config(&config.storage, &config.llm)? {
        Some(store) => ctx = ctx.with_blob_store(Arc::new(store)),
        None => tracing::warn!("Blob storage not configured; NSG flow-log tool disabled"),
    }

    match AzureOpenAiEmbeddings::from_config(&config.embeddings, &config.llm)? {
        Some(embedder) => {
            let cache = VectorIndexCache::new(&config.index.path, config.index.chunk_size, Arc::new(embedder));
            tracing::info!(path = %cache.path().display(), persisted = cache.is_persisted(), "Vector index cache ready");
            ctx = ctx.with_index_cache(Arc::new(cache));
        }
        None => tracing::warn!("Embeddings not configured; NSG questions answered with the preview prompt"),
    }

    Ok(ctx)
}

async fn answer(chat: &mut ChatOrchestrator, query: &str) {
    let run = chat.route_and_run(query).await;
    if let Some(kql) = &run.kql {
        println!("\nExecuting KQL:\n{}", kql);
    }
    match &run.tool_name {
        Some(name) => println!("\n{}:\n{}\n", name, run.output),
        None => println!("\n{}\n", run.output),
    }
}

async fn interactive(chat: &mut ChatOrchestrator) -> std::io::Result<()> {
    println!("\nNightwatch multi-tool mode. Ask your question. Type 'exit' to quit.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        answer(chat, query).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    let args = CliArgs::parse();

    // Config: file, then environment, then CLI.
    let config_file = args.resolve_config_path();
    let mut config = NightwatchConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    args.apply(&mut config);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Nightwatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");
    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded .env");
    }

    let Some(llm) = AzureOpenAiClient::from_config(&config.llm)? else {
        let err = NightwatchError::MissingConfiguration(
            "AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_DEPLOYMENT_NAME are required for routing".to_string(),
        );
        tracing::error!(error = %err, "Cannot start");
        return Err(err.into());
    };
    let llm: Arc<dyn CompletionService> = Arc::new(llm);

    let ctx = build_context(&config, Arc::clone(&llm))?;
    let registry = ToolRegistry::load(&ctx);
    tracing::info!(tools = ?registry.list_names(), "Tool registry ready");

    if config.index.eager_build {
        match nightwatch_tools::nsg::tool::warm_index(&ctx).await {
            Ok(Some(outcome)) => tracing::info!(?outcome, "Index warm-up finished"),
            Ok(None) => tracing::debug!("Index warm-up skipped; storage or embeddings not configured"),
            Err(e) => tracing::warn!(error = %e, "Index warm-up failed; the index will be built on first use"),
        }
    }

    let mut chat = ChatOrchestrator::new(registry, QueryRouter::new(llm));

    match args.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => answer(&mut chat, query).await,
        None => interactive(&mut chat).await?,
    }

    Ok(())
}
