use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::Config;
use crate::corpus;
use crate::llm::embeddings::{CachedEmbedder, HttpEmbedder};
use crate::llm::translate::LlmTranslator;
use crate::models::IndexStats;
use crate::search::bm25::Bm25Index;
use crate::search::hybrid::{Embedder, HybridSearcher};
use crate::search::vector::{SemanticIndex, VectorStore};

/// Shared application state. Built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub bm25: Arc<Bm25Index>,
    pub vectors: Arc<VectorStore>,
    pub embedder: Arc<CachedEmbedder>,
    pub searcher: HybridSearcher,
    pub indexed_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    index_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    /// State backed by the configured HTTP embedding and chat providers.
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let embedder = Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone()));
        let mut state = Self::with_embedder(config, embedder)?;

        if state.config.translate_queries {
            let translator = LlmTranslator::new(http_client, state.config.llm.clone());
            state.searcher = state.searcher.with_normalizer(Arc::new(translator));
        }
        Ok(state)
    }

    /// State with a caller-supplied embedder and no query translation.
    pub fn with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(config.index_dir())?;
        std::fs::create_dir_all(config.vector_dir())?;

        let bm25 = Arc::new(Bm25Index::open_or_create(&config.index_dir())?);
        let vectors = Arc::new(VectorStore::open_or_create_with_limit(
            &config.vector_dir(),
            config.max_vector_entries,
        )?);

        let embedder = Arc::new(CachedEmbedder::new(embedder, config.embedding_cache_size));
        // Stored document vectors double as cache entries for MMR
        for (content, embedding) in vectors.embeddings() {
            embedder.insert(&content, embedding);
        }

        let semantic = SemanticIndex::new(vectors.clone(), embedder.clone());
        let searcher = HybridSearcher::new(bm25.clone(), Arc::new(semantic), embedder.clone());

        Ok(Self {
            config,
            bm25,
            vectors,
            embedder,
            searcher,
            indexed_at: Arc::new(RwLock::new(None)),
            index_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Whether either index has nothing in it.
    pub fn needs_indexing(&self) -> Result<bool> {
        Ok(self.bm25.num_docs()? == 0 || self.vectors.entry_count() == 0)
    }

    /// Rebuild both indexes from the corpus directory. Returns the number of
    /// sections indexed.
    ///
    /// Everything that can fail upstream (loading, embedding) runs before
    /// either index is touched; a failed reindex leaves the old indexes serving.
    pub async fn index_corpus(&self) -> Result<usize> {
        let _guard = self.index_lock.lock().await;

        let corpus_dir = self.config.corpus_dir.clone();
        let documents = tokio::task::spawn_blocking(move || corpus::load_dir(&corpus_dir))
            .await
            .context("Corpus loading task failed")??;
        tracing::info!("Indexing {} statute sections", documents.len());

        let texts: Vec<String> = documents.iter().map(|d| d.content().to_string()).collect();
        let embeddings = self
            .embedder
            .embed_many(&texts)
            .await
            .context("Failed to embed corpus")?;

        self.vectors.replace_all(&documents, embeddings)?;

        let bm25 = self.bm25.clone();
        let keyword_count = tokio::task::spawn_blocking(move || bm25.replace_all(&documents))
            .await
            .context("Keyword indexing task failed")??;

        *self.indexed_at.write() = Some(Utc::now());
        tracing::info!(
            "Indexed {keyword_count} sections for keyword search, {} vectors",
            self.vectors.entry_count()
        );
        Ok(keyword_count)
    }

    /// Index the corpus only when an index is empty. Returns sections indexed.
    pub async fn index_corpus_if_empty(&self) -> Result<usize> {
        if !self.needs_indexing()? {
            tracing::info!(
                "Indexes already populated ({} vectors), skipping corpus load",
                self.vectors.entry_count()
            );
            return Ok(0);
        }
        self.index_corpus().await
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            keyword_documents: self.bm25.num_docs()?,
            vector_entries: self.vectors.entry_count(),
            cached_embeddings: self.embedder.len(),
            indexed_at: *self.indexed_at.read(),
        })
    }
}
