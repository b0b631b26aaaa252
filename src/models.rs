use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata key that identifies a statute section across retrievers.
pub const SECTION_ID_KEY: &str = "section_id";

/// A retrievable statute section: text plus string metadata.
///
/// Immutable once built. `section_id` is the deduplication key used by fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievableDocument {
    content: String,
    metadata: BTreeMap<String, String>,
}

impl RetrievableDocument {
    /// Build a document with a required, non-blank `section_id`.
    pub fn new(
        content: impl Into<String>,
        section_id: impl Into<String>,
        mut metadata: BTreeMap<String, String>,
    ) -> Result<Self> {
        let section_id = section_id.into();
        let section_id = section_id.trim();
        if section_id.is_empty() {
            anyhow::bail!("section_id must not be empty");
        }
        metadata.insert(SECTION_ID_KEY.to_string(), section_id.to_string());
        Ok(Self {
            content: content.into(),
            metadata,
        })
    }

    /// Build a document without validation, as read back from an index.
    pub fn from_parts(content: impl Into<String>, metadata: BTreeMap<String, String>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The section id, or `None` when missing or blank.
    pub fn section_id(&self) -> Option<&str> {
        self.get(SECTION_ID_KEY)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// A document with the score its retriever assigned.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: RetrievableDocument,
    pub score: f32,
}

/// Retriever output in authoritative rank order (index 0 = most relevant).
pub type ScoredList = Vec<ScoredDocument>;

/// A fused result with its accumulated RRF score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub document: RetrievableDocument,
    pub fused_score: f64,
}

/// One record of a statute JSON file (IPC / BNS / IT Act exports).
#[derive(Debug, Clone, Deserialize)]
pub struct StatuteEntry {
    #[serde(rename = "Section", default, deserialize_with = "string_or_number")]
    pub section: String,
    #[serde(default)]
    pub section_title: String,
    #[serde(default)]
    pub section_desc: String,
    #[serde(default)]
    pub chapter_title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub law_type: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Final number of results
    pub limit: Option<usize>,
    pub keyword_k: Option<usize>,
    pub vector_k: Option<usize>,
    /// Run MMR over the fused list before truncating to `limit`
    #[serde(default)]
    pub diversify: bool,
    /// Fused candidates handed to MMR (only used with `diversify`)
    pub fetch_k: Option<usize>,
    pub lambda: Option<f32>,
    pub keyword_weight: Option<f64>,
    pub vector_weight: Option<f64>,
}

/// A single search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub section_id: String,
    pub source: Option<String>,
    pub title: Option<String>,
    pub chapter: Option<String>,
    pub content: String,
    pub fused_score: f64,
}

impl From<RankedCandidate> for SearchResult {
    fn from(candidate: RankedCandidate) -> Self {
        let doc = candidate.document;
        let owned = |key: &str| doc.get(key).filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            section_id: doc.section_id().unwrap_or_default().to_string(),
            source: owned("source"),
            title: owned("title"),
            chapter: owned("chapter"),
            content: doc.content().to_string(),
            fused_score: candidate.fused_score,
        }
    }
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub request_id: Uuid,
    pub query: String,
    pub normalized_query: String,
    pub results: Vec<SearchResult>,
    pub total_keyword_hits: usize,
    pub total_vector_hits: usize,
    pub diversified: bool,
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub keyword_documents: u64,
    pub vector_entries: usize,
    pub cached_embeddings: usize,
    pub indexed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_section_id() {
        assert!(RetrievableDocument::new("text", "  ", BTreeMap::new()).is_err());
    }

    #[test]
    fn test_new_stores_trimmed_section_id() {
        let doc = RetrievableDocument::new("text", " 302 ", BTreeMap::new()).unwrap();
        assert_eq!(doc.section_id(), Some("302"));
    }

    #[test]
    fn test_from_parts_without_section_id() {
        let doc = RetrievableDocument::from_parts("text", BTreeMap::new());
        assert_eq!(doc.section_id(), None);
    }

    #[test]
    fn test_statute_entry_numeric_section() {
        let entry: StatuteEntry = serde_json::from_str(
            r#"{"Section": 302, "section_title": "Punishment for murder", "section_desc": "Whoever commits murder..."}"#,
        )
        .unwrap();
        assert_eq!(entry.section, "302");
        assert!(entry.chapter_title.is_none());
    }

    #[test]
    fn test_statute_entry_string_section() {
        let entry: StatuteEntry =
            serde_json::from_str(r#"{"Section": "2(1)", "source": "BNS"}"#).unwrap();
        assert_eq!(entry.section, "2(1)");
        assert_eq!(entry.source.as_deref(), Some("BNS"));
        assert!(entry.section_desc.is_empty());
    }

    #[test]
    fn test_search_result_from_candidate() {
        let mut meta = BTreeMap::new();
        meta.insert("source".to_string(), "IPC".to_string());
        meta.insert("title".to_string(), "Theft".to_string());
        meta.insert("chapter".to_string(), String::new());
        let doc = RetrievableDocument::new("Section: 378", "378", meta).unwrap();
        let result = SearchResult::from(RankedCandidate {
            document: doc,
            fused_score: 0.5,
        });
        assert_eq!(result.section_id, "378");
        assert_eq!(result.source.as_deref(), Some("IPC"));
        assert_eq!(result.chapter, None);
    }
}
