//! `docstore` CLI entry-point.
//!
//! Available sub-commands:
//! - `ping`:   connect and verify the deployment answers.
//! - `list`:   print documents of a collection as extended JSON.
//! - `get`:    print one document by identifier.
//! - `delete`: remove every document matching a filter.
//! - `index`:  create an index on a collection.

mod args;

use std::time::Duration;

use anyhow::{bail, Context};
use bson::{Bson, Document};
use clap::{Parser, Subcommand};
use docstore::{Direction, IndexSpec, RecordController, Selector, StoreConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{parse_index_key, parse_predicate, parse_value};

#[derive(Parser)]
#[command(
    name = "docstore",
    about = "Inspect and maintain document-store collections",
    version
)]
struct Cli {
    /// Connection string.
    #[arg(long, global = true, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    uri: String,

    /// Database to operate on.
    #[arg(long, global = true, env = "MONGODB_DATABASE", default_value = "docstore")]
    database: String,

    /// Give up selecting a server after this many milliseconds.
    #[arg(long, global = true, env = "MONGODB_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and ping the deployment.
    Ping,
    /// Print matching documents, one JSON object per line.
    List {
        collection: String,
        /// Equality predicate; repeat to AND several.
        #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = parse_predicate)]
        predicates: Vec<(String, Bson)>,
    },
    /// Print the document with the given identifier.
    Get { collection: String, id: String },
    /// Delete every document matching the predicates.
    Delete {
        collection: String,
        #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = parse_predicate)]
        predicates: Vec<(String, Bson)>,
        /// Allow deleting with no predicates (empties the collection).
        #[arg(long)]
        all: bool,
    },
    /// Create an index and print its name.
    Index {
        collection: String,
        /// Index keys in column order, e.g. `tenant email:desc`.
        #[arg(required = true, value_name = "FIELD[:asc|:desc]", value_parser = parse_index_key)]
        keys: Vec<(String, Direction)>,
        #[arg(long)]
        unique: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::new(&cli.uri, &cli.database).with_app_name("docstore-cli");
    if let Some(ms) = cli.timeout_ms {
        config = config.with_server_selection_timeout(Duration::from_millis(ms));
    }
    let db = docstore::connect_with(&config)
        .await
        .context("cannot reach the document store")?;

    match cli.command {
        Command::Ping => {
            info!("Connected to database '{}'", db.name());
            println!("ok");
        }
        Command::List { collection, predicates } => {
            let ctrl = RecordController::<Document>::from_database(&db, &collection);
            let selector: Selector = predicates.into_iter().collect();
            for document in ctrl.list(&selector).await? {
                print_document(document)?;
            }
        }
        Command::Get { collection, id } => {
            let ctrl = RecordController::<Document>::from_database(&db, &collection);
            let document = ctrl
                .get(parse_value(&id))
                .await
                .with_context(|| format!("no document '{id}' in '{collection}'"))?;
            print_document(document)?;
        }
        Command::Delete { collection, predicates, all } => {
            if predicates.is_empty() && !all {
                bail!("refusing to delete without --where; pass --all to empty '{collection}'");
            }
            let ctrl = RecordController::<Document>::from_database(&db, &collection);
            let selector: Selector = predicates.into_iter().collect();
            ctrl.delete_range(&selector).await?;
            info!("Deleted matching documents from '{collection}'");
        }
        Command::Index { collection, keys, unique } => {
            let ctrl = RecordController::<Document>::from_database(&db, &collection);
            let spec = keys
                .into_iter()
                .fold(IndexSpec::new(), |spec, (field, dir)| spec.key(field, dir))
                .unique(unique);
            println!("{}", ctrl.create_index(&spec).await?);
        }
    }

    Ok(())
}

fn print_document(document: Document) -> anyhow::Result<()> {
    let json = Bson::Document(document).into_relaxed_extjson();
    println!("{}", serde_json::to_string(&json)?);
    Ok(())
}
