use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use homeledger::config::LedgerConfig;
use homeledger::input;
use homeledger::ledger::{LedgerEngine, MovementChanges, MovementId};
use homeledger::posts::{PostChanges, PostId, PostService};
use homeledger::store::SqliteStore;
use homeledger::types::UserId;

// --- Constants ---
const DEFAULT_DB_FILE: &str = "movements.db";
const DB_ENV_VAR: &str = "MOVEMENTS_DB";

// --- CLI Argument Parsing ---
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set the verbosity level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    verbose: String,

    /// Acting user id
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Path to the SQLite database (defaults to $MOVEMENTS_DB, then movements.db)
    #[arg(long, global = true)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List movements in ledger order
    List {
        /// Emit JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Insert a new movement after an existing one
    Add {
        /// Anchor movement id (defaults to the most recently created)
        #[arg(long)]
        after: Option<String>,
    },
    /// Update fields of a movement
    Set {
        /// Movement id
        id: String,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// New amount in major units, e.g. "79.47"
        #[arg(long)]
        amount: Option<String>,
    },
    /// Delete a movement
    Rm {
        /// Movement id
        id: String,
    },
    /// Manage blog posts
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },
}

#[derive(Subcommand)]
enum PostCommands {
    /// List posts, newest first
    List,
    /// Create a post
    New { title: String, body: String },
    /// Edit a post
    Edit {
        /// Post id
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New body (markdown source)
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete a post
    Rm {
        /// Post id
        id: String,
    },
}

// --- Main Application Logic ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.verbose).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path = cli
        .db
        .clone()
        .or_else(|| std::env::var(DB_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_DB_FILE.to_string());
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let user = UserId::new(cli.user.clone());

    match cli.command {
        Commands::List { json } => {
            let engine = LedgerEngine::new(store, LedgerConfig::default());
            run_list(&engine, &user, json).await?;
        }
        Commands::Add { after } => {
            let engine = LedgerEngine::new(store, LedgerConfig::default());
            let anchor = after.map(MovementId::new);
            let movement = engine.create_after(&user, anchor.as_ref()).await?;
            println!("created {}", movement.id);
        }
        Commands::Set {
            id,
            description,
            date,
            amount,
        } => {
            let engine = LedgerEngine::new(store, LedgerConfig::default());
            let mut changes = MovementChanges::default();
            if let Some(text) = description {
                changes = changes.with_description(input::require_text("description", &text)?);
            }
            if let Some(text) = date {
                changes = changes.with_date(input::parse_date(&text)?);
            }
            if let Some(text) = amount {
                changes = changes.with_amount_in_cents(input::parse_amount(&text)?);
            }
            let movement = engine.update(&user, &MovementId::new(id), changes).await?;
            println!("updated {}", movement.id);
        }
        Commands::Rm { id } => {
            let engine = LedgerEngine::new(store, LedgerConfig::default());
            engine.delete(&user, &MovementId::new(id)).await?;
            println!("deleted");
        }
        Commands::Post { command } => {
            let service = PostService::new(store);
            run_post_command(&service, &user, command).await?;
        }
    }

    Ok(())
}

async fn run_list(
    engine: &LedgerEngine,
    user: &UserId,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let movements = engine.list(user).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&movements)?);
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>12}  {}",
        "ID", "DATE", "AMOUNT", "DESCRIPTION"
    );
    for movement in &movements {
        println!(
            "{:<36}  {:<10}  {:>12}  {}",
            movement.id, movement.date, movement.amount, movement.description
        );
    }
    Ok(())
}

async fn run_post_command(
    service: &PostService,
    user: &UserId,
    command: PostCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        PostCommands::List => {
            for post in service.list().await? {
                println!("{}  {}  {}", post.id, post.created_at.date_naive(), post.title);
            }
        }
        PostCommands::New { title, body } => {
            let title = input::require_text("title", &title)?;
            let body = input::require_text("body", &body)?;
            let post = service.create(user, title, body).await?;
            println!("created {}", post.id);
        }
        PostCommands::Edit { id, title, body } => {
            let mut changes = PostChanges::default();
            if let Some(text) = title {
                changes = changes.with_title(input::require_text("title", &text)?);
            }
            if let Some(text) = body {
                changes = changes.with_body(input::require_text("body", &text)?);
            }
            let post = service.update(user, &PostId::new(id), changes).await?;
            println!("updated {}", post.id);
        }
        PostCommands::Rm { id } => {
            service.delete(user, &PostId::new(id)).await?;
            println!("deleted");
        }
    }
    Ok(())
}
