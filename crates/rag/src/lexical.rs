//! Lexical index using Tantivy (BM25)
//!
//! Every passage field is indexed into its own Tantivy field, so each field's
//! BM25 contribution can carry an independent boost. Text is pre-tokenized with
//! [`crate::text::tokenize`] and indexed through a whitespace analyzer, which
//! keeps compound identifiers searchable both whole and by their parts.

use std::collections::HashSet;

use tantivy::{
    collector::TopDocs,
    query::{BooleanQuery, BoostQuery, Occur, Query, TermQuery},
    schema::{
        Field, IndexRecordOption, OwnedValue, Schema, TextFieldIndexing, TextOptions, STORED,
        STRING,
    },
    tokenizer::{LowerCaser, RemoveLongFilter, TextAnalyzer, WhitespaceTokenizer},
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
};

use ops_assist_config::LexicalConfig;
use ops_assist_core::{Passage, PassageField};

use crate::text;
use crate::RagError;

const ANALYZER: &str = "ops_compound";

/// One lexical hit
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub passage_id: String,
    /// Boosted BM25 score
    pub score: f32,
}

/// Immutable field-boosted BM25 index over one passage set
pub struct LexicalIndex {
    reader: IndexReader,
    id_field: Field,
    fields: Vec<(PassageField, Field, f32)>,
    doc_count: u64,
}

impl LexicalIndex {
    /// Build an in-memory index over `passages`
    pub fn build(passages: &[Passage], config: &LexicalConfig) -> Result<Self, RagError> {
        let mut schema_builder = Schema::builder();

        let text_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(ANALYZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let fields: Vec<(PassageField, Field, f32)> = PassageField::ALL
            .iter()
            .map(|&field| {
                let handle = schema_builder.add_text_field(field.as_str(), text_options.clone());
                (field, handle, config.field_boosts.get(field.as_str()))
            })
            .collect();
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        index.tokenizers().register(
            ANALYZER,
            TextAnalyzer::builder(WhitespaceTokenizer::default())
                .filter(RemoveLongFilter::limit(100))
                .filter(LowerCaser)
                .build(),
        );

        // Single indexing thread keeps segment layout, and thus tie order, reproducible
        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, config.writer_heap_bytes)
            .map_err(|e| RagError::Index(e.to_string()))?;

        for passage in passages {
            let mut doc = TantivyDocument::default();
            doc.add_text(id_field, &passage.id);
            for &(field, handle, _) in &fields {
                if let Some(value) = passage.field_text(field) {
                    doc.add_text(handle, text::index_text(value));
                }
            }
            writer
                .add_document(doc)
                .map_err(|e| RagError::Index(e.to_string()))?;
        }

        writer.commit().map_err(|e| RagError::Index(e.to_string()))?;

        let reader = index.reader().map_err(|e| RagError::Index(e.to_string()))?;
        reader.reload().map_err(|e| RagError::Index(e.to_string()))?;
        let doc_count = reader.searcher().num_docs();

        tracing::info!(passages = doc_count, "Lexical index built");

        Ok(Self {
            reader,
            id_field,
            fields,
            doc_count,
        })
    }

    /// Boosted BM25 search over all fields
    ///
    /// Ordered by score descending, then passage id ascending. An empty index
    /// or a query without terms yields an empty list.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<LexicalHit>, RagError> {
        if self.doc_count == 0 || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = text::tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for &(_, field, boost) in &self.fields {
            if boost <= 0.0 {
                continue;
            }
            for term in &terms {
                let term_query = TermQuery::new(
                    Term::from_field_text(field, term),
                    IndexRecordOption::WithFreqs,
                );
                clauses.push((
                    Occur::Should,
                    Box::new(BoostQuery::new(Box::new(term_query), boost)),
                ));
            }
        }
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(top_k))
            .map_err(|e| RagError::Search(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| RagError::Search(e.to_string()))?;
            let passage_id = match doc.get_first(self.id_field) {
                Some(OwnedValue::Str(s)) => s.clone(),
                _ => continue,
            };
            hits.push(LexicalHit { passage_id, score });
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.passage_id.cmp(&b.passage_id))
        });
        Ok(hits)
    }

    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }
}
