use color_eyre::eyre::Result;
use colored::Colorize;
use std::path::PathBuf;
use vf_core::init::{generate_vitalflow_structure, InitOptions};

pub async fn execute(target_dir: PathBuf, force: bool, minimal: bool) -> Result<()> {
    let created = generate_vitalflow_structure(InitOptions {
        target_dir,
        force,
        minimal,
    })
    .await?;

    println!("{} {}", "Initialized".green().bold(), created.display());
    if minimal {
        println!("Stages use the built-in instructions and scripted agents.");
    } else {
        println!(
            "Edit {} to point stages at your reasoning agents.",
            created.join("agents").display()
        );
    }

    Ok(())
}
