use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::models::{SearchRequest, SearchResponse, SearchResult};
use crate::search::fusion::FusionWeights;
use crate::search::hybrid::HybridOptions;
use crate::state::AppState;

/// Hard cap on results per request.
pub const MAX_LIMIT: usize = 50;

/// POST /api/search - Hybrid statute search:
///   1. Query normalization (translation of non-English input)
///   2. Keyword + vector retrieval, run concurrently
///   3. Weighted RRF fusion
///   4. Optional MMR diversification down to `limit`
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }

    let options = build_options(&req, &state.config.retrieval)
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let request_id = Uuid::new_v4();
    tracing::info!(
        %request_id,
        "Search '{query}' (keyword_k={}, vector_k={}, fused_k={}, mmr_k={:?})",
        options.keyword_k,
        options.vector_k,
        options.fused_k,
        options.mmr_k
    );

    let outcome = state.searcher.hybrid_search(&query, &options).await;

    Ok(Json(SearchResponse {
        request_id,
        query,
        normalized_query: outcome.normalized_query,
        results: outcome
            .candidates
            .into_iter()
            .map(SearchResult::from)
            .collect(),
        total_keyword_hits: outcome.keyword_hits,
        total_vector_hits: outcome.vector_hits,
        diversified: outcome.diversified,
    }))
}

/// Merge request overrides over configured defaults and validate them.
pub fn build_options(
    req: &SearchRequest,
    defaults: &RetrievalConfig,
) -> Result<HybridOptions, String> {
    let limit = req.limit.unwrap_or(defaults.limit).clamp(1, MAX_LIMIT);

    let lambda = req.lambda.unwrap_or(defaults.lambda);
    if !(0.0..=1.0).contains(&lambda) {
        return Err(format!("lambda must be within [0, 1], got {lambda}"));
    }

    let weights = FusionWeights {
        keyword: req.keyword_weight.unwrap_or(defaults.keyword_weight),
        vector: req.vector_weight.unwrap_or(defaults.vector_weight),
    };
    for (name, w) in [("keyword_weight", weights.keyword), ("vector_weight", weights.vector)] {
        if !w.is_finite() || w < 0.0 {
            return Err(format!("{name} must be a non-negative number, got {w}"));
        }
    }

    // With diversification MMR picks `limit` out of a wider fused pool
    let (fused_k, mmr_k) = if req.diversify {
        let fetch_k = req.fetch_k.unwrap_or(defaults.fetch_k).min(MAX_LIMIT * 4);
        (fetch_k.max(limit), Some(limit))
    } else {
        (limit, None)
    };

    Ok(HybridOptions {
        keyword_k: req.keyword_k.unwrap_or(defaults.keyword_k).min(MAX_LIMIT * 4),
        vector_k: req.vector_k.unwrap_or(defaults.vector_k).min(MAX_LIMIT * 4),
        fused_k,
        mmr_k,
        lambda,
        weights,
    })
}
