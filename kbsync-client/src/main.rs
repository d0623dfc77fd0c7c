//! kbsync - track server-side knowledge-base processing jobs

use anyhow::Result;
use clap::{Parser, Subcommand};
use kbsync_client::KnowledgeBaseStore;
use kbsync_common::config::ClientConfig;
use kbsync_common::{KbId, KnowledgeBase};
use serde_json::json;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "kbsync", about = "Track server-side knowledge-base processing jobs")]
struct Cli {
    /// API base URL (overrides KBSYNC_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all knowledge bases
    List,
    /// Create a knowledge base
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Start parsing, then watch the job until it settles
    Parse {
        id: String,
        #[arg(long)]
        embedding_model: i64,
    },
    /// Watch one knowledge base until its job settles
    Watch { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = ClientConfig::resolve(cli.base_url.as_deref());
    info!("API base URL: {}", config.base_url);

    let store = KnowledgeBaseStore::new(&config)?;

    match cli.command {
        Command::List => {
            store.fetch_all().await?;
            print_table(&store.entries().await);
        }
        Command::Create { name, description } => {
            let kb = store
                .create_knowledge_base(json!({ "name": name, "description": description }))
                .await?;
            println!("created {} ({})", kb.id, kb.name);
            watch(&store, &kb.id).await;
        }
        Command::Parse {
            id,
            embedding_model,
        } => {
            let id = KbId::from(id);
            store.fetch_all().await?;
            store.start_parsing(&id, embedding_model).await?;
            watch(&store, &id).await;
        }
        Command::Watch { id } => {
            let id = KbId::from(id);
            store.fetch_all().await?;
            watch(&store, &id).await;
        }
    }

    Ok(())
}

/// Report the entity's status once per second until the job settles and its
/// poller has stopped.
async fn watch(store: &KnowledgeBaseStore, id: &KbId) {
    loop {
        match store.get(id).await {
            Some(kb) => {
                println!("{}  status={}  {}", kb.id, kb.status, stage_column(&kb));
                if !store.pollers().is_active(id) && !kb.needs_polling() {
                    break;
                }
            }
            None => {
                println!("{} is gone", id);
                break;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

fn stage_column(kb: &KnowledgeBase) -> String {
    kb.parsing_state
        .as_ref()
        .map(|p| format!("{} {:.0}%", p.stage, p.progress))
        .unwrap_or_else(|| "-".to_string())
}

fn print_table(entries: &[KnowledgeBase]) {
    println!("{:<8} {:<32} {:<12} {}", "ID", "NAME", "STATUS", "STAGE");
    for kb in entries {
        println!(
            "{:<8} {:<32} {:<12} {}",
            kb.id.to_string(),
            kb.name,
            kb.status.to_string(),
            stage_column(kb)
        );
    }
}
