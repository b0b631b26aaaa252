//! # statute-search
//!
//! Hybrid retrieval over Indian statute sections (IPC, BNS, IT Act) for a
//! legal-research assistant. Keyword and semantic retrieval are fused with
//! Reciprocal Rank Fusion, optionally followed by Maximal Marginal Relevance
//! to diversify the final list.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!                       │  User Query  │
//!                       └──────┬───────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  Query Normalization  │
//!                  │ (LLM translation of   │
//!                  │  non-English input)   │
//!                  └───────────┬───────────┘
//!                              │
//!                 ┌────────────┴────────────┐
//!                 ▼                         ▼
//!        ┌────────────────┐       ┌──────────────────┐
//!        │  BM25 (tantivy) │       │  Vector (cosine) │
//!        │   keyword_k     │       │    vector_k      │
//!        └───────┬────────┘       └────────┬─────────┘
//!                └────────────┬────────────┘
//!                             ▼
//!                 ┌───────────────────────┐
//!                 │   Weighted RRF, K=60  │
//!                 │  keyed by section_id  │
//!                 └───────────┬───────────┘
//!                             ▼
//!                 ┌───────────────────────┐
//!                 │  MMR (optional)       │
//!                 │  lambda * relevance - │
//!                 │  (1-lambda) * redund. │
//!                 └───────────┬───────────┘
//!                             ▼
//!                 ┌───────────────────────┐
//!                 │     Final Results     │
//!                 └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dirs, LLM and retrieval defaults
//! - [`models`] - Shared data types: `RetrievableDocument`, `ScoredDocument`, request/response types
//! - [`corpus`] - Statute JSON loading into searchable documents
//! - [`search::bm25`] - BM25 full-text index powered by tantivy
//! - [`search::vector`] - In-memory vector store with cosine similarity and disk persistence
//! - [`search::fusion`] - Weighted Reciprocal Rank Fusion
//! - [`search::mmr`] - Greedy Maximal Marginal Relevance selection
//! - [`search::hybrid`] - Retriever traits and the hybrid search pipeline
//! - [`llm::embeddings`] - Embedding generation via Ollama or OpenAI-compatible APIs, plus a cache
//! - [`llm::translate`] - LLM query translation to English
//! - [`api`] - Axum HTTP handlers for search, stats, reindex and config
//! - [`state`] - Shared application state holding indexes, embedder and searcher

pub mod api;
pub mod config;
pub mod corpus;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
