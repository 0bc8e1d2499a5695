//! Connecting to a MongoDB deployment.

use bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, info, instrument};

use crate::{StoreConfig, StoreError};

/// Open a client for `connection_string`, ping the deployment, and return
/// the handle for `database_name`.
///
/// A single attempt is made; failures surface immediately as
/// [`StoreError::Connection`]. No schema setup is performed.
pub async fn connect(connection_string: &str, database_name: &str) -> Result<Database, StoreError> {
    connect_with(&StoreConfig::new(connection_string, database_name)).await
}

/// Same as [`connect`], also applying the optional settings in `config`.
#[instrument(skip(config), fields(database = %config.database))]
pub async fn connect_with(config: &StoreConfig) -> Result<Database, StoreError> {
    info!("Connecting to document store");

    let mut options = ClientOptions::parse(&config.uri)
        .await
        .map_err(|source| StoreError::Connection { context: "connect", source })?;
    if let Some(name) = &config.app_name {
        options.app_name = Some(name.clone());
    }
    if let Some(timeout) = config.server_selection_timeout {
        options.server_selection_timeout = Some(timeout);
    }

    let client = Client::with_options(options)
        .map_err(|source| StoreError::Connection { context: "connect", source })?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .map_err(|source| StoreError::Connection { context: "ping", source })?;
    debug!("ping succeeded");

    Ok(client.database(&config.database))
}
