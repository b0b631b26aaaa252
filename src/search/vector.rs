use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{RetrievableDocument, ScoredDocument, ScoredList};
use crate::search::hybrid::{Embedder, VectorRetriever};

/// Added to the cosine denominator so zero vectors score 0 instead of NaN.
const COSINE_EPSILON: f32 = 1e-8;

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    document: RetrievableDocument,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity search.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
    max_entries: usize,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        Self::open_or_create_with_limit(vector_dir, 0)
    }

    /// Open the store; `max_entries == 0` means unlimited.
    pub fn open_or_create_with_limit(vector_dir: &Path, max_entries: usize) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries: Vec<VectorEntry> = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable vector store {}: {e}", persist_path.display());
                Vec::new()
            })
        } else {
            Vec::new()
        };
        tracing::info!("Vector store loaded with {} entries", entries.len());

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
            max_entries,
        })
    }

    /// Add documents with their embeddings. `embeddings` must be parallel with `documents`.
    pub fn add_documents(
        &self,
        documents: &[RetrievableDocument],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.extend(Self::pair(documents, embeddings)?);
        self.commit(&mut entries, next)
    }

    /// Replace every entry with `documents`. On error the store is unchanged.
    pub fn replace_all(
        &self,
        documents: &[RetrievableDocument],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        let next = Self::pair(documents, embeddings)?;
        let mut entries = self.entries.write();
        self.commit(&mut entries, next)
    }

    fn pair(
        documents: &[RetrievableDocument],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Vec<VectorEntry>> {
        if documents.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} embeddings for {} documents",
                embeddings.len(),
                documents.len()
            );
        }
        Ok(documents
            .iter()
            .zip(embeddings)
            .map(|(document, embedding)| VectorEntry {
                document: document.clone(),
                embedding,
            })
            .collect())
    }

    // Disk first, then memory, so a failed write leaves both on the old set
    fn commit(&self, entries: &mut Vec<VectorEntry>, next: Vec<VectorEntry>) -> Result<()> {
        if self.max_entries > 0 && next.len() > self.max_entries {
            anyhow::bail!(
                "Vector store limit reached ({} > {})",
                next.len(),
                self.max_entries
            );
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> ScoredList {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| ScoredDocument {
                document: e.document.clone(),
                score,
            })
            .collect()
    }

    /// Stored (content, embedding) pairs, used to warm the embedding cache.
    pub fn embeddings(&self) -> Vec<(String, Vec<f32>)> {
        self.entries
            .read()
            .iter()
            .map(|e| (e.document.content().to_string(), e.embedding.clone()))
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    // Atomic write via temp file + rename
    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp_path, &self.persist_path).context("Failed to replace vector store")?;
        Ok(())
    }
}

/// Vector retriever: embeds the query, then searches the store.
pub struct SemanticIndex {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl SemanticIndex {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl VectorRetriever for SemanticIndex {
    async fn vector_search(&self, query: &str, k: usize) -> Result<ScoredList> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;
        Ok(self.store.search(&query_embedding, k))
    }
}

/// `dot(a, b) / (|a| * |b| + 1e-8)`; 0 for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn doc(id: &str) -> RetrievableDocument {
        RetrievableDocument::new(format!("Section {id}"), id, BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_documents(
                &[doc("302"), doc("378"), doc("499")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .unwrap();

        let hits = store.search(&[0.9, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.section_id(), Some("302"));
        assert_eq!(hits[1].document.section_id(), Some("499"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open_or_create(dir.path()).unwrap();
            store.add_documents(&[doc("420")], vec![vec![0.5, 0.5]]).unwrap();
        }
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.embeddings()[0].0, "Section 420");
    }

    #[test]
    fn test_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create_with_limit(dir.path(), 1).unwrap();
        assert!(store
            .add_documents(&[doc("1"), doc("2")], vec![vec![1.0], vec![1.0]])
            .is_err());
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_mismatched_embeddings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert!(store.add_documents(&[doc("1")], vec![]).is_err());
    }

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            match text {
                "murder" => Ok(vec![1.0, 0.0]),
                "theft" => Ok(vec![0.0, 1.0]),
                _ => anyhow::bail!("unknown text"),
            }
        }
    }

    #[tokio::test]
    async fn test_semantic_index_embeds_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(VectorStore::open_or_create(dir.path()).unwrap());
        store
            .add_documents(&[doc("302"), doc("378")], vec![vec![1.0, 0.1], vec![0.1, 1.0]])
            .unwrap();

        let index = SemanticIndex::new(store, Arc::new(AxisEmbedder));
        let hits = index.vector_search("theft", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.section_id(), Some("378"));

        assert!(index.vector_search("forgery", 1).await.is_err());
    }

    #[test]
    fn test_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store.add_documents(&[doc("1"), doc("2")], vec![vec![1.0], vec![1.0]]).unwrap();
        store.replace_all(&[doc("3")], vec![vec![1.0]]).unwrap();
        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.search(&[1.0], 5)[0].document.section_id(), Some("3"));

        store.replace_all(&[], vec![]).unwrap();
        assert!(store.search(&[1.0], 5).is_empty());
    }

    #[test]
    fn test_failed_persist_keeps_memory_in_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store.add_documents(&[doc("1")], vec![vec![1.0]]).unwrap();

        // A directory where the temp file should go makes the write fail
        std::fs::create_dir(dir.path().join("vectors.json.tmp")).unwrap();
        assert!(store.add_documents(&[doc("2")], vec![vec![1.0]]).is_err());
        assert!(store.replace_all(&[doc("3")], vec![vec![1.0]]).is_err());
        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.embeddings()[0].0, "Section 1");

        let reopened = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.entry_count(), 1);
    }
}
