use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};

use crate::models::{RetrievableDocument, ScoredDocument, ScoredList, SECTION_ID_KEY};
use crate::search::hybrid::KeywordRetriever;

/// Writer heap budget
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// BM25 keyword index of statute sections, built on tantivy.
pub struct Bm25Index {
    index: Index,
    f_section_id: Field,
    f_source: Field,
    f_title: Field,
    f_chapter: Field,
    f_content: Field,
}

impl Bm25Index {
    /// Create or open a BM25 index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_section_id = schema_builder.add_text_field(SECTION_ID_KEY, STRING | STORED);
        let f_source = schema_builder.add_text_field("source", STRING | STORED);
        let f_title = schema_builder.add_text_field("title", TEXT | STORED);
        let f_chapter = schema_builder.add_text_field("chapter", TEXT | STORED);
        let f_content = schema_builder.add_text_field("content", TEXT | STORED);

        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            f_section_id,
            f_source,
            f_title,
            f_chapter,
            f_content,
        })
    }

    fn writer(&self) -> Result<IndexWriter> {
        self.index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")
    }

    /// Index a batch of documents. Documents without a section id are skipped.
    pub fn index_documents(&self, documents: &[RetrievableDocument]) -> Result<usize> {
        let mut writer = self.writer()?;
        let indexed = self.add_all(&writer, documents)?;
        writer.commit().context("Failed to commit index")?;
        Ok(indexed)
    }

    /// Replace the whole index with `documents` in a single commit, so
    /// readers see either the old set or the new one.
    pub fn replace_all(&self, documents: &[RetrievableDocument]) -> Result<usize> {
        let mut writer = self.writer()?;
        writer
            .delete_all_documents()
            .context("Failed to delete documents")?;
        let indexed = self.add_all(&writer, documents)?;
        writer.commit().context("Failed to commit index")?;
        Ok(indexed)
    }

    fn add_all(&self, writer: &IndexWriter, documents: &[RetrievableDocument]) -> Result<usize> {
        let mut indexed = 0;
        for document in documents {
            let Some(section_id) = document.section_id() else {
                tracing::warn!("Not indexing document without section_id");
                continue;
            };
            let meta = |key: &str| document.get(key).unwrap_or_default().to_string();

            writer.add_document(doc!(
                self.f_section_id => section_id.to_string(),
                self.f_source => meta("source"),
                self.f_title => meta("title"),
                self.f_chapter => meta("chapter"),
                self.f_content => document.content().to_string(),
            ))?;
            indexed += 1;
        }
        Ok(indexed)
    }

    pub fn num_docs(&self) -> Result<u64> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;
        Ok(reader.searcher().num_docs())
    }

    /// Search the index and return hits in BM25 rank order.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<ScoredList> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.f_content, self.f_title, self.f_chapter],
        );
        // Statute queries carry parentheses and quotes ("302(1)"), so parse leniently
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Lenient parse of '{query_str}' dropped {} clause(s)", errors.len());
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let text = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };

            let mut metadata = BTreeMap::new();
            metadata.insert(SECTION_ID_KEY.to_string(), text(self.f_section_id));
            metadata.insert("source".to_string(), text(self.f_source));
            metadata.insert("title".to_string(), text(self.f_title));
            metadata.insert("chapter".to_string(), text(self.f_chapter));

            hits.push(ScoredDocument {
                document: RetrievableDocument::from_parts(text(self.f_content), metadata),
                score,
            });
        }

        Ok(hits)
    }
}

impl KeywordRetriever for Bm25Index {
    fn keyword_search(&self, query: &str, k: usize) -> Result<ScoredList> {
        self.search(query, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statute(id: &str, source: &str, title: &str, content: &str) -> RetrievableDocument {
        let mut meta = BTreeMap::new();
        meta.insert("source".to_string(), source.to_string());
        meta.insert("title".to_string(), title.to_string());
        RetrievableDocument::new(content, id, meta).unwrap()
    }

    fn sample_index(dir: &Path) -> Bm25Index {
        let index = Bm25Index::open_or_create(dir).unwrap();
        index
            .index_documents(&[
                statute("302", "IPC", "Punishment for murder", "Whoever commits murder shall be punished with death"),
                statute("378", "IPC", "Theft", "Whoever intending to take dishonestly any movable property"),
                statute("66C", "IT Act, 2000", "Identity theft", "Whoever fraudulently makes use of the electronic signature"),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_search_finds_matching_section() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index(dir.path());

        let hits = index.search("murder", 10).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].document.section_id(), Some("302"));
        assert_eq!(hits[0].document.get("source"), Some("IPC"));
    }

    #[test]
    fn test_title_is_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index(dir.path());

        let hits = index.search("theft", 10).unwrap();
        let ids: Vec<_> = hits.iter().filter_map(|h| h.document.section_id()).collect();
        assert!(ids.contains(&"378"));
        assert!(ids.contains(&"66C"));
    }

    #[test]
    fn test_special_characters_do_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index(dir.path());
        assert!(index.search("section 302(1) \"murder", 10).is_ok());
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index(dir.path());
        assert!(index.search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_skips_documents_without_section_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        let indexed = index
            .index_documents(&[RetrievableDocument::from_parts("orphan text", BTreeMap::new())])
            .unwrap();
        assert_eq!(indexed, 0);
        assert_eq!(index.num_docs().unwrap(), 0);
    }

    #[test]
    fn test_replace_with_nothing_empties_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index(dir.path());
        assert_eq!(index.num_docs().unwrap(), 3);
        assert_eq!(index.replace_all(&[]).unwrap(), 0);
        assert_eq!(index.num_docs().unwrap(), 0);
        assert!(index.search("murder", 10).unwrap().is_empty());
    }

    #[test]
    fn test_replace_all_swaps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index(dir.path());

        let replaced = index
            .replace_all(&[
                statute("103", "BNS", "Punishment for murder", "Whoever commits murder shall be punished with death"),
                statute("303", "BNS", "Theft", "Whoever intending to take dishonestly any movable property"),
            ])
            .unwrap();
        assert_eq!(replaced, 2);
        assert_eq!(index.num_docs().unwrap(), 2);

        let hits = index.search("murder", 10).unwrap();
        let ids: Vec<_> = hits.iter().filter_map(|h| h.document.section_id()).collect();
        assert_eq!(ids, vec!["103"]);
    }
}
