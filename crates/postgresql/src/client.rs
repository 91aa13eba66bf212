//! PostgreSQL client utilities

use anyhow::{Context, Result};
use log::error;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Config, NoTls};

/// Application name reported to the server unless the connection string sets one.
pub const APPLICATION_NAME: &str = "watermark-sync";

/// Connect and spawn the connection task.
pub async fn new_postgresql_client(connection_string: &str) -> Result<Arc<Mutex<Client>>> {
    let mut config: Config = connection_string
        .parse()
        .context("Invalid PostgreSQL connection string")?;
    if config.get_application_name().is_none() {
        config.application_name(APPLICATION_NAME);
    }

    let (client, connection) = config
        .connect(NoTls)
        .await
        .context("Failed to connect to PostgreSQL")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {e}");
        }
    });

    Ok(Arc::new(Mutex::new(client)))
}
