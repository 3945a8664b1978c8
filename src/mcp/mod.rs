//! MCP server for the knowledge base
//!
//! Exposes search, remember, document ingestion and statistics as tools
//! over stdio.

mod server;

pub use server::run_mcp_server;
