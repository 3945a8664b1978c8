//! Ingest pre-extracted document text

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use knowledge_rag::core::paths::DataPaths;
use knowledge_rag::{DocumentKind, DocumentText, KnowledgeBase};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

pub fn run(
    paths: &DataPaths,
    path: &Path,
    kind: Option<&str>,
    no_tags: bool,
    json: bool,
) -> Result<()> {
    let kind = match kind {
        Some(k) => k.parse::<DocumentKind>().map_err(anyhow::Error::msg)?,
        None => DocumentKind::Txt,
    };

    let files = collect_files(path)?;
    if files.is_empty() {
        bail!("No .txt or .md files found in {}", path.display());
    }

    let kb = KnowledgeBase::open(paths)?;
    let mut rows = Vec::new();
    let mut total_chunks = 0;

    for file in &files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());

        let report = kb.ingest_document(&DocumentText { filename, kind, text }, !no_tags)?;
        total_chunks += report.chunks;

        if !json {
            if report.chunks == 0 {
                println!("{} {} (no text)", "!".yellow(), file.display());
            } else {
                println!(
                    "{} {} → {} chunks",
                    "✓".green(),
                    file.display(),
                    report.chunks.to_string().cyan()
                );
            }
        }
        rows.push(serde_json::json!({
            "file": file.display().to_string(),
            "type": kind.as_str(),
            "chunks": report.chunks,
        }));
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "files": rows,
                "total_chunks": total_chunks,
            }))?
        );
    } else {
        println!();
        println!(
            "{} Ingested {} files, {} chunks",
            "→".dimmed(),
            files.len(),
            total_chunks.to_string().green().bold()
        );
    }

    Ok(())
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Path not found: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
