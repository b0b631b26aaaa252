//! Statute corpus loading.
//!
//! Each `*.json` file under the corpus directory holds an array of
//! [`StatuteEntry`] records; every record becomes one [`RetrievableDocument`].

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::models::{RetrievableDocument, StatuteEntry};

/// Load every statute JSON file under `dir`, sorted by path.
pub fn load_dir(dir: &Path) -> Result<Vec<RetrievableDocument>> {
    if !dir.exists() {
        tracing::warn!("Corpus directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect();
    files.sort();

    let mut documents = Vec::new();
    for path in files {
        match load_file(&path) {
            Ok(mut docs) => {
                tracing::info!("Loaded {} sections from {}", docs.len(), path.display());
                documents.append(&mut docs);
            }
            Err(e) => tracing::warn!("Skipping {}: {e:#}", path.display()),
        }
    }
    Ok(documents)
}

/// Load one statute JSON file.
pub fn load_file(path: &Path) -> Result<Vec<RetrievableDocument>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entries: Vec<StatuteEntry> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let fallback_law = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.split(['_', '-']).next().unwrap_or(s).to_uppercase())
        .unwrap_or_default();

    Ok(entries
        .iter()
        .filter_map(|entry| entry_to_document(entry, &fallback_law))
        .collect())
}

/// Law label for an entry: explicit `law_type`, then `source`, then the file name.
fn law_name(entry: &StatuteEntry, fallback: &str) -> String {
    if let Some(law) = entry.law_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return law.to_string();
    }
    match entry.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(source) if source.contains("BNS") => "BNS".to_string(),
        Some(source) => source.to_string(),
        None => fallback.to_string(),
    }
}

/// Build the searchable document for one entry; `None` if it has no section or text.
pub fn entry_to_document(entry: &StatuteEntry, fallback_law: &str) -> Option<RetrievableDocument> {
    let section = entry.section.trim();
    let desc = entry.section_desc.trim();
    if section.is_empty() || desc.is_empty() {
        return None;
    }

    let title = entry.section_title.trim();
    let chapter = entry.chapter_title.as_deref().map(str::trim).unwrap_or_default();
    let law = law_name(entry, fallback_law);
    let source = entry
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(law.as_str());

    let mut content = format!("Law: {law}\n");
    if !chapter.is_empty() {
        content.push_str(&format!("Context: Chapter on {chapter}\n"));
    }
    if title.is_empty() {
        content.push_str(&format!("Section: {section}\n"));
    } else {
        content.push_str(&format!("Section: {section} - {title}\n"));
    }
    content.push_str(&format!("Definition: {desc}"));

    let mut metadata = BTreeMap::new();
    metadata.insert("title".to_string(), title.to_string());
    metadata.insert("chapter".to_string(), chapter.to_string());
    metadata.insert("source".to_string(), source.to_string());

    RetrievableDocument::new(content, section, metadata).ok()
}
