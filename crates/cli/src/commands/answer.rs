use super::open_store;
use color_eyre::eyre::Result;
use colored::Colorize;
use std::path::Path;
use uuid::Uuid;
use vf_core::interaction::submit_answer;

pub async fn execute(
    root: &Path,
    interaction_id: Uuid,
    text: &str,
    database: Option<&str>,
) -> Result<()> {
    let store = open_store(root, database).await?;
    let interaction = submit_answer(&store, interaction_id, text).await?;

    println!(
        "{} answer for {} ({})",
        "Recorded".green().bold(),
        interaction.subject_id.cyan(),
        interaction.id
    );
    Ok(())
}
