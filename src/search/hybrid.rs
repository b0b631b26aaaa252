use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{RankedCandidate, ScoredList};
use crate::search::fusion::{rrf_fuse, FusionWeights};
use crate::search::mmr::mmr_select;

/// Lexical retriever. Blocking; run off the async executor.
pub trait KeywordRetriever: Send + Sync {
    fn keyword_search(&self, query: &str, k: usize) -> Result<ScoredList>;
}

/// Semantic retriever backed by an embedding index.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn vector_search(&self, query: &str, k: usize) -> Result<ScoredList>;
}

/// Deterministic text embedding, same model as the vector index.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts; output is parallel with `texts`.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Rewrites a query before retrieval. Must return the input on failure.
#[async_trait]
pub trait QueryNormalizer: Send + Sync {
    async fn normalize(&self, text: &str) -> String;
}

/// Knobs for one hybrid search.
#[derive(Debug, Clone)]
pub struct HybridOptions {
    pub keyword_k: usize,
    pub vector_k: usize,
    /// Candidates kept after fusion
    pub fused_k: usize,
    /// Run MMR down to this many results
    pub mmr_k: Option<usize>,
    pub lambda: f32,
    pub weights: FusionWeights,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            keyword_k: 4,
            vector_k: 4,
            fused_k: 4,
            mmr_k: None,
            lambda: 0.5,
            weights: FusionWeights::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridResults {
    pub query: String,
    pub normalized_query: String,
    pub candidates: Vec<RankedCandidate>,
    pub keyword_hits: usize,
    pub vector_hits: usize,
    /// Whether MMR reordered the fused list
    pub diversified: bool,
}

/// Keyword + vector retrieval, RRF fusion, optional MMR.
///
/// All collaborators are injected; the searcher holds no per-query state.
#[derive(Clone)]
pub struct HybridSearcher {
    keyword: Arc<dyn KeywordRetriever>,
    vector: Arc<dyn VectorRetriever>,
    embedder: Arc<dyn Embedder>,
    normalizer: Option<Arc<dyn QueryNormalizer>>,
}

impl HybridSearcher {
    pub fn new(
        keyword: Arc<dyn KeywordRetriever>,
        vector: Arc<dyn VectorRetriever>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            keyword,
            vector,
            embedder,
            normalizer: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn QueryNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub async fn hybrid_search(&self, query: &str, options: &HybridOptions) -> HybridResults {
        let normalized_query = match &self.normalizer {
            Some(normalizer) => normalizer.normalize(query).await,
            None => query.to_string(),
        };
        if normalized_query != query {
            tracing::info!("Query normalized: '{query}' -> '{normalized_query}'");
        }

        // The two retrievers are independent; run them concurrently
        let (keyword_results, vector_results) = tokio::join!(
            self.run_keyword(&normalized_query, options.keyword_k),
            self.run_vector(&normalized_query, options.vector_k),
        );

        let fused = rrf_fuse(
            &keyword_results,
            &vector_results,
            options.weights,
            options.fused_k,
        );
        tracing::debug!(
            keyword = keyword_results.len(),
            vector = vector_results.len(),
            fused = fused.len(),
            "Fusion complete"
        );

        let (candidates, diversified) = match options.mmr_k {
            Some(m) => self.diversify(&normalized_query, fused, m, options.lambda).await,
            None => (fused, false),
        };

        HybridResults {
            query: query.to_string(),
            normalized_query,
            candidates,
            keyword_hits: keyword_results.len(),
            vector_hits: vector_results.len(),
            diversified,
        }
    }

    async fn run_keyword(&self, query: &str, k: usize) -> ScoredList {
        if k == 0 {
            return Vec::new();
        }
        let keyword = self.keyword.clone();
        let q = query.to_string();
        match tokio::task::spawn_blocking(move || keyword.keyword_search(&q, k)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!("Keyword search failed: {e:#}");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Keyword search task failed: {e}");
                Vec::new()
            }
        }
    }

    async fn run_vector(&self, query: &str, k: usize) -> ScoredList {
        if k == 0 {
            return Vec::new();
        }
        match self.vector.vector_search(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Vector search failed: {e:#}");
                Vec::new()
            }
        }
    }

    /// MMR over the fused list. If the query or every candidate fails to
    /// embed, the fused list is returned truncated to `m`.
    async fn diversify(
        &self,
        query: &str,
        mut fused: Vec<RankedCandidate>,
        m: usize,
        lambda: f32,
    ) -> (Vec<RankedCandidate>, bool) {
        if fused.is_empty() {
            return (fused, false);
        }

        let query_embedding = match self.embedder.embed(query).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Query embedding failed, skipping MMR: {e:#}");
                fused.truncate(m);
                return (fused, false);
            }
        };

        // One lookup per candidate, issued together
        let lookups = fused.iter().map(|c| {
            let embedder = self.embedder.clone();
            async move {
                let section_id = c.document.section_id().unwrap_or_default().to_string();
                match embedder.embed(c.document.content()).await {
                    Ok(e) => Some((section_id, e)),
                    Err(e) => {
                        tracing::warn!("Embedding failed for section {section_id}, excluding: {e:#}");
                        None
                    }
                }
            }
        });
        let mut embeddings: HashMap<String, Vec<f32>> =
            join_all(lookups).await.into_iter().flatten().collect();
        if embeddings.is_empty() {
            tracing::warn!("No candidate embeddings available, skipping MMR");
            fused.truncate(m);
            return (fused, false);
        }

        let selected = mmr_select(
            fused,
            &query_embedding,
            |c: &RankedCandidate| {
                c.document
                    .section_id()
                    .and_then(|id| embeddings.remove(id))
            },
            m,
            lambda,
        );
        (selected, true)
    }
}
