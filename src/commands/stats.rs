//! Knowledge base statistics

use anyhow::Result;
use colored::Colorize;

use knowledge_rag::core::paths::DataPaths;
use knowledge_rag::KnowledgeBase;

use super::preview;

pub fn run(paths: &DataPaths, recent: usize, json: bool) -> Result<()> {
    let kb = KnowledgeBase::open(paths)?;
    let stats = kb.stats()?;
    let training = kb.training_stats()?;
    let recent_entries = kb.recent(recent)?;

    if json {
        let output = serde_json::json!({
            "entries": stats,
            "training": training,
            "recent": recent_entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Knowledge Base Statistics".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("Entries:   {}", stats.total.to_string().cyan().bold());
    println!("  {} from documents", stats.documents);
    println!("  {} from users", stats.user);
    println!("  {} popular (used more than 5 times)", stats.popular);
    if let Some(last) = stats.last_used {
        println!("Last used: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if !stats.top_questions.is_empty() {
        println!();
        println!("{}", "Top questions".cyan());
        for (question, count) in &stats.top_questions {
            println!("  {} {}", format!("{:>4}×", count).dimmed(), preview(question, 70));
        }
    }

    println!();
    println!(
        "{} {} files processed, {} chunks",
        "Documents:".cyan(),
        training.files,
        training.chunks
    );
    for file in &training.recent {
        println!(
            "  {} {} ({}, {} chunks)",
            file.processed_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            file.filename,
            file.file_type,
            file.chunks_count
        );
    }

    if !recent_entries.is_empty() {
        println!();
        println!("{}", "Recently used".cyan());
        for entry in &recent_entries {
            let text = entry.comparison_text().unwrap_or("");
            println!(
                "  {} {} {}",
                format!("#{}", entry.id).dimmed(),
                preview(text, 70),
                format!("({}, {}×)", entry.source, entry.usage_count).dimmed()
            );
        }
    }

    Ok(())
}
