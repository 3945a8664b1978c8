//! Knowledge base MCP server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use knowledge_rag::{assemble_context, DocumentKind, DocumentText, KnowledgeBase};

/// Parameters for knowledge_search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language question (e.g., "что помогает при бессоннице")
    #[schemars(description = "Natural language question")]
    pub query: String,
    /// Maximum number of results (default from config)
    #[schemars(description = "Maximum number of results (default from config, max 20)")]
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Also return the assembled prompt context block
    #[schemars(description = "Include the assembled prompt context block")]
    #[serde(default)]
    pub with_context: bool,
}

/// Parameters for knowledge_remember tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RememberParams {
    #[schemars(description = "Question as asked by the user")]
    pub question: String,
    #[schemars(description = "Answer to store for this question")]
    pub answer: String,
}

/// Parameters for knowledge_ingest tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestParams {
    #[schemars(description = "Name of the source document")]
    pub filename: String,
    #[schemars(description = "Extracted plain text of the document")]
    pub text: String,
    /// Declared document type: pdf or txt (default: txt)
    #[schemars(description = "Document type: pdf or txt (default: txt)")]
    #[serde(default)]
    pub kind: Option<String>,
}

/// Search hit for JSON output
#[derive(Debug, Serialize)]
struct SearchHitJson {
    id: i64,
    question: Option<String>,
    answer: Option<String>,
    context: Option<String>,
    source: String,
    tags: Vec<String>,
    score: f32,
    similarity: f32,
}

#[derive(Debug, Serialize)]
struct SearchResultJson {
    results: Vec<SearchHitJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

fn internal(what: &str, e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(format!("{}: {}", what, e), None)
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| internal("JSON serialization failed", e))?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

/// Knowledge base MCP service
#[derive(Clone)]
pub struct KnowledgeService {
    kb: Arc<KnowledgeBase>,
    tool_router: ToolRouter<Self>,
}

impl KnowledgeService {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self {
            kb,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl KnowledgeService {
    #[tool(
        description = "Search the knowledge base. Returns the most relevant stored answers and \
                       document passages, ranked by similarity with boosts for document sources \
                       and matching topics. An empty list means no relevant knowledge."
    )]
    async fn knowledge_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut search = self.kb.default_params();
        if let Some(k) = params.0.top_k {
            search.top_k = k.clamp(1, 20);
        }

        let results = self
            .kb
            .search(&params.0.query, &search)
            .map_err(|e| internal("Search failed", e))?;

        let context = if params.0.with_context {
            assemble_context(&results)
        } else {
            None
        };
        let hits = results
            .into_iter()
            .map(|r| SearchHitJson {
                id: r.entry.id,
                source: r.entry.source.to_string(),
                tags: r.entry.tags.into_iter().collect(),
                question: r.entry.question,
                answer: r.entry.answer,
                context: r.entry.context,
                score: r.score,
                similarity: r.similarity,
            })
            .collect();

        json_result(&SearchResultJson { results: hits, context })
    }

    #[tool(
        description = "Remember an answer for a question. Asking the same question again \
                       overwrites the stored answer."
    )]
    async fn knowledge_remember(
        &self,
        params: Parameters<RememberParams>,
    ) -> Result<CallToolResult, McpError> {
        let report = self
            .kb
            .remember(&params.0.question, &params.0.answer)
            .map_err(|e| internal("Remember failed", e))?;
        json_result(&report)
    }

    #[tool(
        description = "Ingest the extracted text of a document. The text is split into \
                       sentence-aligned chunks and tagged by topic."
    )]
    async fn knowledge_ingest(
        &self,
        params: Parameters<IngestParams>,
    ) -> Result<CallToolResult, McpError> {
        let kind = match params.0.kind.as_deref() {
            Some(k) => k
                .parse::<DocumentKind>()
                .map_err(|e| McpError::invalid_params(e, None))?,
            None => DocumentKind::Txt,
        };
        let doc = DocumentText {
            filename: params.0.filename,
            kind,
            text: params.0.text,
        };

        let report = self
            .kb
            .ingest_document(&doc, true)
            .map_err(|e| internal("Ingest failed", e))?;
        json_result(&report)
    }

    #[tool(
        description = "Knowledge base statistics: entry counts by source, popular questions \
                       and processed documents."
    )]
    async fn knowledge_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.kb.stats().map_err(|e| internal("Stats failed", e))?;
        let training = self
            .kb
            .training_stats()
            .map_err(|e| internal("Stats failed", e))?;
        json_result(&serde_json::json!({ "entries": stats, "training": training }))
    }
}

#[tool_handler]
impl ServerHandler for KnowledgeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Knowledge base MCP server. Search stored answers and documents before \
                 answering, and remember good answers."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server over stdio
///
/// An eviction pass runs before serving; with `interval_minutes` set, it
/// repeats on that interval for the lifetime of the server.
pub async fn run_mcp_server(kb: KnowledgeBase) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let kb = Arc::new(kb);
    kb.optimize()?;

    if let Some(minutes) = kb.config().maintenance.interval_minutes.filter(|m| *m > 0) {
        let kb = Arc::clone(&kb);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
            // first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = kb.optimize() {
                    error!(error = %e, "periodic optimization failed");
                }
            }
        });
        info!(minutes, "periodic optimization scheduled");
    }

    let service = KnowledgeService::new(kb);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
