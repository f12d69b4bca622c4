pub mod answer;
pub mod init;
pub mod run;
pub mod status;

use color_eyre::eyre::{Result, WrapErr};
use std::path::Path;
use vf_core::config::load_config;
use vf_core::store::SqliteStore;

/// Open the store at `database`, or at the configured URL.
pub async fn open_store(root: &Path, database: Option<&str>) -> Result<SqliteStore> {
    let url = match database {
        Some(url) => url.to_string(),
        None => load_config(root).await?.settings.database.url,
    };

    SqliteStore::connect(&url)
        .await
        .wrap_err_with(|| format!("Failed to open database {url}"))
}
