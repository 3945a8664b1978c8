use anyhow::Result;
use colored::Colorize;

use knowledge_rag::core::entry::Source;
use knowledge_rag::core::paths::DataPaths;
use knowledge_rag::{IngestRequest, KnowledgeBase};

pub struct LearnArgs {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub document: bool,
    pub tags: Vec<String>,
    pub json: bool,
}

pub fn run(paths: &DataPaths, args: LearnArgs) -> Result<()> {
    let source = if args.document { Source::Document } else { Source::User };
    let mut request = IngestRequest::new(source);
    if let Some(q) = args.question {
        request = request.question(q);
    }
    if let Some(a) = args.answer {
        request = request.answer(a);
    }
    if let Some(c) = args.context {
        request = request.context(c);
    }
    for tag in args.tags {
        request = request.tag(tag);
    }

    if request.question.is_none() && request.context.is_none() {
        anyhow::bail!("Provide --question or --context");
    }

    let kb = KnowledgeBase::open(paths)?;
    let report = kb.ingest(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.updated > 0 {
        println!("{} Updated existing entry for this question", "✓".green());
    }
    if report.inserted > 0 {
        println!(
            "{} Stored {} new {} entries ({} chunks)",
            "✓".green(),
            report.inserted.to_string().cyan(),
            source,
            report.chunks
        );
    }
    Ok(())
}
