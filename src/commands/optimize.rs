use anyhow::Result;
use colored::Colorize;

use knowledge_rag::core::paths::DataPaths;
use knowledge_rag::KnowledgeBase;

pub fn run(
    paths: &DataPaths,
    min_usage: Option<i64>,
    max_items: Option<usize>,
    json: bool,
) -> Result<()> {
    let kb = KnowledgeBase::open(paths)?;
    let m = &kb.config().maintenance;
    let min_usage = min_usage.unwrap_or(m.min_usage);
    let max_items = max_items.unwrap_or(m.max_items).max(1);

    let report = kb.optimize_with(min_usage, max_items)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.skipped {
        println!(
            "{} {} entries, within limit of {}. Nothing to do.",
            "→".dimmed(),
            report.total,
            max_items
        );
    } else {
        println!(
            "{} Deleted {} of {} entries \
             (usage < {}, untagged, user-origin, not among {} most recent)",
            "✓".green(),
            report.deleted.to_string().yellow().bold(),
            report.total,
            min_usage,
            max_items
        );
        if report.remaining() > max_items {
            println!(
                "{} {} entries remain; the rest are protected",
                "!".yellow(),
                report.remaining()
            );
        }
    }
    Ok(())
}
