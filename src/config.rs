use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the keyword index and vector store are kept
    pub data_dir: PathBuf,
    /// Directory of statute JSON files to index
    pub corpus_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Default retrieval parameters for search requests
    pub retrieval: RetrievalConfig,
    /// Maximum total vector entries in memory (0 = unlimited)
    pub max_vector_entries: usize,
    /// Maximum cached embeddings (0 = unlimited)
    pub embedding_cache_size: usize,
    /// Translate non-English queries before retrieval
    pub translate_queries: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for translation
    pub chat_model: String,
    /// Model name for embeddings (must match the model used to build the vector store)
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

/// Defaults applied when a search request leaves a knob unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub keyword_k: usize,
    pub vector_k: usize,
    pub limit: usize,
    /// Fused candidates handed to MMR when diversifying
    pub fetch_k: usize,
    pub lambda: f32,
    pub keyword_weight: f64,
    pub vector_weight: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            corpus_dir: PathBuf::from("./corpus"),
            bind_addr: "127.0.0.1:8000".to_string(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            max_vector_entries: 200_000,
            embedding_cache_size: 10_000,
            translate_queries: true,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "bge-small-en-v1.5".to_string(),
            api_key: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            keyword_k: 4,
            vector_k: 4,
            limit: 4,
            fetch_k: 20,
            lambda: 0.5,
            keyword_weight: 1.0,
            vector_weight: 1.0,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!("Ignoring unparsable {key}={val}"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("STATUTE_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("STATUTE_SEARCH_CORPUS_DIR") {
            config.corpus_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("STATUTE_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        env_parse("STATUTE_SEARCH_MAX_VECTOR_ENTRIES", &mut config.max_vector_entries);
        env_parse("STATUTE_SEARCH_EMBEDDING_CACHE_SIZE", &mut config.embedding_cache_size);
        env_parse("STATUTE_SEARCH_TRANSLATE_QUERIES", &mut config.translate_queries);

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }

        let r = &mut config.retrieval;
        env_parse("RETRIEVAL_KEYWORD_K", &mut r.keyword_k);
        env_parse("RETRIEVAL_VECTOR_K", &mut r.vector_k);
        env_parse("RETRIEVAL_LIMIT", &mut r.limit);
        env_parse("RETRIEVAL_FETCH_K", &mut r.fetch_k);
        env_parse("RETRIEVAL_LAMBDA", &mut r.lambda);
        env_parse("RETRIEVAL_KEYWORD_WEIGHT", &mut r.keyword_weight);
        env_parse("RETRIEVAL_VECTOR_WEIGHT", &mut r.vector_weight);
        r.lambda = r.lambda.clamp(0.0, 1.0);

        config
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_top_four_retrieval() {
        let r = RetrievalConfig::default();
        assert_eq!((r.keyword_k, r.vector_k, r.limit), (4, 4, 4));
        assert_eq!(r.lambda, 0.5);
    }

    #[test]
    fn test_env_parse_keeps_default_on_garbage() {
        std::env::set_var("STATUTE_SEARCH_TEST_ENV_PARSE", "not-a-number");
        let mut v = 7usize;
        env_parse("STATUTE_SEARCH_TEST_ENV_PARSE", &mut v);
        assert_eq!(v, 7);

        std::env::set_var("STATUTE_SEARCH_TEST_ENV_PARSE", "12");
        env_parse("STATUTE_SEARCH_TEST_ENV_PARSE", &mut v);
        assert_eq!(v, 12);
    }

    #[test]
    fn test_dirs_under_data_dir() {
        let config = Config::default();
        assert_eq!(config.index_dir(), PathBuf::from("./data/index"));
        assert_eq!(config.vector_dir(), PathBuf::from("./data/vectors"));
    }
}
