use std::future::Future;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

use crate::config::Config;
use crate::errors::ApiError;
use crate::models::User;

pub async fn connect(config: &Config) -> mongodb::error::Result<Database> {
    let client_options = ClientOptions::parse(&config.database_url).await?;
    let client = Client::with_options(client_options)?;
    Ok(client.database(&config.database_name))
}

/// Uniqueness of email and access token is enforced by the store; a violation
/// surfaces as a duplicate-key write error at insert time.
pub async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    let users = db.collection::<User>("users");
    for field in ["email", "access_token"] {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        users.create_index(index, None).await?;
    }
    Ok(())
}

/// Bounds a persistence call; expiry and store errors both surface as
/// `Persistence` so no request hangs on a stuck connection.
pub async fn with_timeout<T>(
    limit: Duration,
    op: impl Future<Output = mongodb::error::Result<T>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(limit, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ApiError::Persistence(e.to_string())),
        Err(_) => Err(ApiError::Persistence(format!(
            "store call timed out after {}s",
            limit.as_secs()
        ))),
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}
