use super::open_store;
use crate::output;
use color_eyre::eyre::Result;
use std::path::Path;
use vf_core::state::runner::stored_status;

pub async fn execute(root: &Path, subject: &str, json: bool, database: Option<&str>) -> Result<()> {
    let store = open_store(root, database).await?;
    let status = stored_status(&store, subject).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status {
        Some(status) => output::print_status(&status),
        None => println!("No runs recorded for {subject}"),
    }
    Ok(())
}
