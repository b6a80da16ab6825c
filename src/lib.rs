//! # ze-cookbook
//!
//! Integration pipelines on top of a hosted document-search API.
//!
//! The centrepiece is a folder monitor: new or modified files in a watched
//! directory are indexed into a collection, a fixed set of queries runs
//! against the collection, and a webhook alert fires when the best match
//! clears a relevance threshold.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌─────────┐   ┌─────────┐
//! │   Monitor   │──▶│  Ingest  │──▶│  Query  │──▶│  Alert  │
//! │ notify+pool │   │ gate(16) │   │ docs+snp│   │ webhook │
//! └─────────────┘   └────┬─────┘   └────┬────┘   └─────────┘
//!                        │              │
//!                        ▼              ▼
//!                   ┌──────────────────────┐      ┌──────────────┐
//!                   │  SearchService (HTTP) │◀─────│ Tools / MCP  │
//!                   └──────────────────────┘      └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! zec index ./example            # index every file in a directory
//! zec query "security vulnerability"
//! zec watch                      # monitor [monitor].dir and alert
//! zec serve mcp                  # deep-research MCP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Wire and domain types |
//! | [`error`] | Typed errors |
//! | [`client`] | Search service trait and HTTP client |
//! | [`ingest`] | File classification and bounded submission |
//! | [`query`] | Two-part collection query |
//! | [`alert`] | Webhook alert sink |
//! | [`monitor`] | Folder watcher and worker pool |
//! | [`progress`] | Bulk-index progress reporting |
//! | [`tools`] | Agent tools and registry |
//! | [`server`] | REST + MCP HTTP server |
//! | [`mcp`] | MCP protocol bridge |
//! | [`rerank`] | Rerank demo |
//! | [`seed`] | Company dataset loader |

pub mod alert;
pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod mcp;
pub mod models;
pub mod monitor;
pub mod progress;
pub mod query;
pub mod rerank;
pub mod seed;
pub mod server;
pub mod tools;

#[cfg(test)]
mod testing;
