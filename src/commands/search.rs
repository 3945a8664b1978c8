//! Retrieval from the command line

use anyhow::{bail, Result};
use colored::Colorize;

use knowledge_rag::core::entry::Source;
use knowledge_rag::core::paths::DataPaths;
use knowledge_rag::{assemble_context, KnowledgeBase};

use super::{colored_score, preview};

pub struct SearchArgs {
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
    pub fallback_threshold: Option<f32>,
    pub json: bool,
    pub context: bool,
}

pub fn run(paths: &DataPaths, query: &str, args: SearchArgs) -> Result<()> {
    let kb = KnowledgeBase::open(paths)?;

    let mut params = kb.default_params();
    if let Some(k) = args.top_k {
        params.top_k = k.max(1);
    }
    if let Some(t) = args.threshold {
        params.primary_threshold = t;
    }
    if let Some(t) = args.fallback_threshold {
        params.fallback_threshold = t;
    }
    if params.fallback_threshold > params.primary_threshold {
        bail!(
            "--fallback-threshold ({}) must not exceed --threshold ({})",
            params.fallback_threshold,
            params.primary_threshold
        );
    }

    let results = kb.search(query, &params)?;

    if args.context {
        match assemble_context(&results) {
            Some(block) => println!("{}", block),
            None => println!("{} No relevant knowledge for: {}", "→".dimmed(), query.cyan()),
        }
        return Ok(());
    }

    if args.json {
        let json_results: Vec<_> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.entry.id,
                    "question": r.entry.question,
                    "answer": r.entry.answer,
                    "context": r.entry.context,
                    "source": r.entry.source,
                    "tags": r.entry.tags,
                    "usage_count": r.entry.usage_count,
                    "score": r.score,
                    "similarity": r.similarity,
                    "keyword_group": r.keyword_group,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    println!("{} {} results for: {}", "→".dimmed(), results.len(), query.cyan());
    println!();

    for (i, r) in results.iter().enumerate() {
        let entry = &r.entry;
        let title = entry
            .question
            .as_deref()
            .or(entry.context.as_deref())
            .or(entry.answer.as_deref())
            .unwrap_or("");
        let origin = match entry.source {
            Source::Document => "document".blue(),
            Source::User => "user".magenta(),
        };

        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            colored_score(r.score),
            preview(title, 80).cyan(),
            origin
        );
        if let (Some(_), Some(answer)) = (&entry.question, &entry.answer) {
            println!("   {}", preview(answer, 100).dimmed());
        }
        let mut meta = format!("similarity {:.2} | used {}×", r.similarity, entry.usage_count);
        if let Some(group) = &r.keyword_group {
            meta.push_str(&format!(" | topic {}", group));
        }
        if !entry.tags.is_empty() {
            meta.push_str(&format!(" | tags {}", entry.tags_joined()));
        }
        println!("   {}", meta.dimmed());
        println!();
    }

    Ok(())
}
