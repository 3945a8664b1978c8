use anyhow::{Context, Result};
use colored::*;
use std::fs;

use knowledge_rag::core::config::RagConfig;
use knowledge_rag::core::paths::DataPaths;
use knowledge_rag::KnowledgeBase;

pub fn run(paths: &DataPaths, force: bool) -> Result<()> {
    println!("{}", "Knowledge Base Setup".bold());
    println!("{}", "=".repeat(50));
    println!();

    for (path, purpose) in paths.required_folders() {
        if path.exists() {
            println!("{} {} exists ({})", "✓".green(), path.display(), purpose);
        } else {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            println!("{} Created {} ({})", "✓".green(), path.display(), purpose);
        }
    }

    if paths.config.exists() && !force {
        println!(
            "{} {} exists (use --force to overwrite)",
            "✓".green(),
            paths.config.display()
        );
    } else {
        let yaml = RagConfig::default().to_yaml()?;
        fs::write(&paths.config, yaml)
            .with_context(|| format!("Failed to write {}", paths.config.display()))?;
        println!("{} Wrote default {}", "✓".green(), paths.config.display());
    }

    let kb = KnowledgeBase::open(paths)?;
    let db = kb.config().database_path(&paths.root);
    println!(
        "{} Knowledge store ready at {} ({} entries)",
        "✓".green(),
        db.display(),
        kb.stats()?.total
    );

    println!();
    println!("{}", "✓ Knowledge base initialized!".green().bold());
    Ok(())
}
