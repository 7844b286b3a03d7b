//! Corpus loader
//!
//! Reads passages from YAML or JSON corpus files:
//!
//! ```yaml
//! version: "1"
//! passages:
//!   - id: kb-101
//!     document_id: payroll-runbook
//!     title: PAYROLL_01 ends RC=8
//!     job_name: PAYROLL_01
//!     content: The job ends RC=8 when the input dataset is locked...
//!     metadata:
//!       doc_type: manual
//!       last_updated: 2024-03-01T00:00:00Z
//!       platform: zos
//! ```
//!
//! A directory is scanned (non-recursively, in file name order) for `.yaml`,
//! `.yml` and `.json` files; other files are skipped with a warning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ops_assist_core::{Passage, PassageField, PassageMetadata};

use crate::RagError;

/// One passage as written in a corpus file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusPassage {
    pub id: String,
    /// Defaults to the passage id
    #[serde(default)]
    pub document_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub workstation: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl From<CorpusPassage> for Passage {
    fn from(raw: CorpusPassage) -> Self {
        let document_id = raw.document_id.unwrap_or_else(|| raw.id.clone());
        let mut passage = Passage::new(raw.id, document_id, raw.content).with_metadata(raw.metadata);

        let fields = [
            (PassageField::Title, raw.title),
            (PassageField::JobName, raw.job_name),
            (PassageField::Workstation, raw.workstation),
            (PassageField::ErrorCode, raw.error_code),
            (PassageField::MessageId, raw.message_id),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                passage = passage.with_field(field, value);
            }
        }
        passage
    }
}

/// Corpus file format
#[derive(Debug, Serialize, Deserialize)]
pub struct CorpusFile {
    #[serde(default)]
    pub version: Option<String>,
    pub passages: Vec<CorpusPassage>,
}

/// Load passages from a corpus file or a directory of them
pub fn load_corpus(path: &Path) -> Result<Vec<Passage>, RagError> {
    if path.is_dir() {
        load_directory(path)
    } else if path.is_file() {
        load_file(path)
    } else {
        Err(RagError::Corpus(format!(
            "corpus path does not exist: {}",
            path.display()
        )))
    }
}

fn load_directory(dir: &Path) -> Result<Vec<Passage>, RagError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| RagError::Corpus(format!("Failed to read directory: {}", e)))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RagError::Corpus(format!("Failed to read entry: {}", e)))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut passages = Vec::new();
    for path in files {
        if !is_supported(&path) {
            tracing::warn!(file = %path.display(), "Skipping unsupported corpus file");
            continue;
        }
        let loaded = load_file(&path)?;
        tracing::info!(file = %path.display(), passages = loaded.len(), "Loaded corpus file");
        passages.extend(loaded);
    }

    tracing::info!(
        directory = %dir.display(),
        total_passages = passages.len(),
        "Corpus loading complete"
    );
    Ok(passages)
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

fn is_supported(path: &Path) -> bool {
    matches!(extension(path), "yaml" | "yml" | "json")
}

/// Load a single corpus file
pub fn load_file(path: &Path) -> Result<Vec<Passage>, RagError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RagError::Corpus(format!("Failed to read {}: {}", path.display(), e)))?;

    let corpus: CorpusFile = match extension(path) {
        "json" => serde_json::from_str(&content).map_err(|e| {
            RagError::Corpus(format!("JSON parse error in {}: {}", path.display(), e))
        })?,
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| {
            RagError::Corpus(format!("YAML parse error in {}: {}", path.display(), e))
        })?,
        other => {
            return Err(RagError::Corpus(format!(
                "Unsupported file type: {}",
                other
            )))
        },
    };

    Ok(corpus.passages.into_iter().map(Passage::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_assist_core::DocType;
    use std::io::Write;

    const YAML: &str = r#"
version: "1"
passages:
  - id: kb-101
    document_id: payroll-runbook
    title: PAYROLL_01 ends RC=8
    job_name: PAYROLL_01
    content: The job ends RC=8 when the input dataset is locked.
    metadata:
      doc_type: manual
      authority_tier: 2
      last_updated: 2024-03-01T00:00:00Z
      platform: zos
  - id: kb-102
    content: Restart the agent after patching.
"#;

    fn write(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "runbook.yaml", YAML);

        let passages = load_corpus(&dir.path().join("runbook.yaml")).unwrap();
        assert_eq!(passages.len(), 2);

        let first = &passages[0];
        assert_eq!(first.document_id, "payroll-runbook");
        assert_eq!(first.title(), Some("PAYROLL_01 ends RC=8"));
        assert_eq!(first.field_text(PassageField::JobName), Some("PAYROLL_01"));
        assert_eq!(first.metadata.doc_type, Some(DocType::Manual));
        assert_eq!(first.metadata.platform.as_deref(), Some("zos"));
        assert!(first.metadata.last_updated.is_some());

        // document id defaults to the passage id
        assert_eq!(passages[1].document_id, "kb-102");
    }

    #[test]
    fn test_directory_skips_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", YAML);
        write(
            dir.path(),
            "b.json",
            r#"{"passages": [{"id": "kb-200", "content": "json passage", "metadata": {"doc_type": "kb"}}]}"#,
        );
        write(dir.path(), "notes.txt", "not a corpus");

        let passages = load_corpus(dir.path()).unwrap();
        let ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["kb-101", "kb-102", "kb-200"]);
        assert_eq!(passages[2].metadata.doc_type, Some(DocType::KnowledgeBase));
    }

    #[test]
    fn test_malformed_file_is_corpus_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.yaml", "passages: [ {id: 1");
        assert!(matches!(load_corpus(dir.path()), Err(RagError::Corpus(_))));
        assert!(matches!(
            load_corpus(&dir.path().join("missing")),
            Err(RagError::Corpus(_))
        ));
    }
}
