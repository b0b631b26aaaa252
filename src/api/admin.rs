use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::models::IndexStats;
use crate::state::AppState;

/// GET /api/stats - Index sizes and last indexing time
pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<IndexStats>, (StatusCode, String)> {
    state.stats().map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read index stats: {e}"),
        )
    })
}

#[derive(Serialize)]
pub struct ReindexResponse {
    pub indexed: usize,
    pub stats: IndexStats,
}

/// POST /api/reindex - Reload the corpus directory into both indexes
pub async fn reindex(
    State(state): State<AppState>,
) -> Result<Json<ReindexResponse>, (StatusCode, String)> {
    let indexed = state.index_corpus().await.map_err(|e| {
        tracing::error!("Reindex failed: {e:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Reindex failed: {e}"),
        )
    })?;

    let stats = state.stats().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read index stats: {e}"),
        )
    })?;

    Ok(Json(ReindexResponse { indexed, stats }))
}

/// Config response with API key redacted
#[derive(Serialize)]
pub struct ConfigResponse {
    pub provider: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub has_api_key: bool,
    pub translate_queries: bool,
    pub retrieval: RetrievalConfig,
}

/// GET /api/config - Active provider and retrieval defaults
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        provider: config.llm.provider.clone(),
        base_url: config.llm.base_url.clone(),
        chat_model: config.llm.chat_model.clone(),
        embedding_model: config.llm.embedding_model.clone(),
        has_api_key: config.llm.api_key.is_some(),
        translate_queries: config.translate_queries,
        retrieval: config.retrieval.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::SearchRequest;
    use crate::search::hybrid::Embedder;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Bag-of-letters embedding, enough to make related sections close.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                v[(c - b'a') as usize] += 1.0;
            }
            Ok(v)
        }
    }

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let corpus_dir = dir.path().join("corpus");
        std::fs::create_dir_all(&corpus_dir).unwrap();
        std::fs::write(
            corpus_dir.join("ipc_data.json"),
            r#"[
                {"Section": 378, "section_title": "Theft", "section_desc": "Whoever intends to take dishonestly any movable property commits theft."},
                {"Section": 302, "section_title": "Punishment for murder", "section_desc": "Whoever commits murder shall be punished with death."}
            ]"#,
        )
        .unwrap();

        let config = Config {
            data_dir: dir.path().join("data"),
            corpus_dir,
            translate_queries: false,
            ..Config::default()
        };
        AppState::with_embedder(config, Arc::new(LetterEmbedder)).unwrap()
    }

    #[tokio::test]
    async fn test_reindex_then_stats() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let Json(before) = stats(State(state.clone())).await.unwrap();
        assert_eq!(before.keyword_documents, 0);
        assert!(before.indexed_at.is_none());

        let Json(resp) = reindex(State(state.clone())).await.unwrap();
        assert_eq!(resp.indexed, 2);
        assert_eq!(resp.stats.keyword_documents, 2);
        assert_eq!(resp.stats.vector_entries, 2);
        assert!(resp.stats.indexed_at.is_some());

        // Reindexing replaces rather than appends
        let Json(again) = reindex(State(state)).await.unwrap();
        assert_eq!(again.stats.keyword_documents, 2);
        assert_eq!(again.stats.vector_entries, 2);
    }

    #[tokio::test]
    async fn test_search_handler_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        state.index_corpus().await.unwrap();

        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "theft of movable property", "limit": 2}"#).unwrap();
        let Json(resp) = crate::api::search::search(State(state), Json(req)).await.unwrap();

        assert_eq!(resp.results[0].section_id, "378");
        assert_eq!(resp.results[0].source.as_deref(), Some("IPC"));
        assert!(resp.results.len() <= 2);
        assert!(resp.total_keyword_hits >= 1);
        assert!(!resp.diversified);
    }

    #[tokio::test]
    async fn test_search_handler_rejects_empty_query() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let req: SearchRequest = serde_json::from_str(r#"{"query": "   "}"#).unwrap();
        let (status, _) = crate::api::search::search(State(state), Json(req))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_config_redacts_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(&dir);
        state.config.llm.api_key = Some("sk-secret".to_string());

        let Json(resp) = get_config(State(state)).await;
        assert!(resp.has_api_key);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
