//! The single caller-facing operation: `answer(question) -> ResponseEnvelope`.
//!
//! No failure in this module is fatal: data problems, unresolved entities, and
//! collaborator outages all degrade to a well-formed envelope, because the
//! calling surface must always render something.

use std::{sync::Arc, time::Duration};

use log::{debug, warn};

use crate::{
    envelope::{self, ResponseEnvelope},
    engine,
    intent::{self, Intent},
    narrative::{self, Narrator},
    snapshot::{Snapshot, Store},
};

/// Longest document excerpt quoted in a text-lookup summary.
const DOCUMENT_PREVIEW_CHARS: usize = 1200;

pub struct QueryService {
    store: Arc<Store>,
    narrator: Box<dyn Narrator>,
    narrative_timeout: Duration,
}

impl QueryService {
    pub fn new(store: Arc<Store>, narrator: Box<dyn Narrator>) -> QueryService {
        QueryService {
            store,
            narrator,
            narrative_timeout: narrative::DEFAULT_NARRATIVE_TIMEOUT,
        }
    }

    pub fn with_narrative_timeout(mut self, timeout: Duration) -> QueryService {
        self.narrative_timeout = timeout;
        self
    }

    /// Answer one question against the current snapshot. Each call works on an
    /// immutable snapshot taken up front, so a concurrent reload never affects
    /// an in-flight answer.
    pub fn answer(&self, question: &str) -> ResponseEnvelope {
        let snapshot = self.store.snapshot();
        let intent = intent::classify(question, &snapshot.dataset, &snapshot.documents.names());
        debug!("Classified question into {intent:?}");

        match &intent {
            Intent::TextLookup { document } => self.text_lookup(&snapshot, document),
            Intent::Fallback => self.delegate(question, &snapshot),
            _ => {
                if snapshot.dataset.is_empty() {
                    return ResponseEnvelope::message(
                        "No data is available: the dataset is empty or could not be parsed",
                    );
                }
                match engine::execute(&snapshot.dataset, &intent) {
                    Some(result) => envelope::shape(&result),
                    None => self.delegate(question, &snapshot),
                }
            }
        }
    }

    fn text_lookup(&self, snapshot: &Snapshot, document: &str) -> ResponseEnvelope {
        match snapshot.documents.get(document) {
            Some(body) => {
                let mut preview = body.to_string();
                if preview.chars().count() > DOCUMENT_PREVIEW_CHARS {
                    preview = preview.chars().take(DOCUMENT_PREVIEW_CHARS).collect();
                    preview.push('…');
                }
                ResponseEnvelope::message(format!("{document}: {preview}"))
            }
            None => ResponseEnvelope::message(format!("Document '{document}' is not available")),
        }
    }

    /// Forward an uninterpretable question to the narrative collaborator,
    /// degrading to the static guidance message when it fails or times out.
    fn delegate(&self, question: &str, snapshot: &Snapshot) -> ResponseEnvelope {
        let system = "Answer the user's question about the loaded dataset. Reply with a JSON \
                      object {\"ok\", \"general\", \"lists\", \"tables\"} and nothing else.";
        let context = describe_snapshot(snapshot, question);
        match self
            .narrator
            .generate(system, &context, self.narrative_timeout)
        {
            Ok(raw) => envelope::parse_envelope(&raw),
            Err(err) => {
                warn!("Narrative collaborator unavailable: {err}");
                ResponseEnvelope::message(narrative::guidance())
            }
        }
    }
}

fn describe_snapshot(snapshot: &Snapshot, question: &str) -> String {
    let columns = snapshot
        .dataset
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Question: {question}\nColumns: {columns}\nRows: {}\nDocuments: {}",
        snapshot.dataset.rows.len(),
        snapshot.documents.names().join(", ")
    )
}
