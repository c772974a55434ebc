//! The fixed response envelope and the shaping of engine results into it.
//!
//! Every answer the system produces, including degraded ones, is a
//! [`ResponseEnvelope`]. Collaborator output (the narrative service) is parsed
//! defensively into the same shape: direct JSON parse first, then the last
//! balanced `{...}` block, then the raw text wrapped as the summary.

use serde::{Deserialize, Serialize};

use crate::engine::{AggregationResult, ScoreEntry};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedList {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTable {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub general: String,
    #[serde(default)]
    pub lists: Vec<NamedList>,
    #[serde(default)]
    pub tables: Vec<NamedTable>,
}

impl ResponseEnvelope {
    pub fn message(general: impl Into<String>) -> ResponseEnvelope {
        ResponseEnvelope {
            ok: true,
            general: general.into(),
            lists: Vec::new(),
            tables: Vec::new(),
        }
    }
}

/// Shape an engine result into the envelope. Always `ok: true`: missing data
/// and unresolved entities are answers, not faults.
pub fn shape(result: &AggregationResult) -> ResponseEnvelope {
    match result {
        AggregationResult::Scalar {
            measure,
            mean,
            count,
        } => match mean {
            Some(mean) => {
                let rounded = crate::engine::round1(*mean);
                ResponseEnvelope {
                    ok: true,
                    general: format!("Average {measure}: {} over {count} value(s)", num(rounded)),
                    lists: Vec::new(),
                    tables: vec![NamedTable {
                        title: format!("Average of {measure}"),
                        columns: vec!["measure".into(), "mean".into(), "count".into()],
                        rows: vec![vec![measure.clone(), num(rounded), count.to_string()]],
                    }],
                }
            }
            None => ResponseEnvelope::message(format!(
                "No numeric values available for {measure}; nothing to average"
            )),
        },
        AggregationResult::Grouped {
            measure,
            group,
            means,
        } => ResponseEnvelope {
            ok: true,
            general: format!("Average {measure} by {group} across {} group(s)", means.len()),
            lists: Vec::new(),
            tables: vec![NamedTable {
                title: format!("Average of {measure} by {group}"),
                columns: vec![group.clone(), measure.clone()],
                rows: means
                    .iter()
                    .map(|(label, mean)| vec![label.clone(), num(*mean)])
                    .collect(),
            }],
        },
        AggregationResult::Rows {
            title,
            headers,
            rows,
        } => ResponseEnvelope {
            ok: true,
            general: title.clone(),
            lists: Vec::new(),
            tables: vec![NamedTable {
                title: title.clone(),
                columns: headers.clone(),
                rows: rows.clone(),
            }],
        },
        AggregationResult::Percentile {
            entity,
            measure,
            value,
            percentile,
            bucket,
            cohort_size,
            suggestions,
        } => {
            let mut envelope = match (entity, value, percentile) {
                (Some(name), Some(value), Some(rank)) => ResponseEnvelope {
                    ok: true,
                    general: format!(
                        "{name} is at percentile {rank} of {measure} ({}) within a cohort of {cohort_size}",
                        bucket.label()
                    ),
                    lists: Vec::new(),
                    tables: vec![NamedTable {
                        title: format!("Percentile in {measure}"),
                        columns: vec![
                            "student".into(),
                            "value".into(),
                            "percentile".into(),
                            "band".into(),
                        ],
                        rows: vec![vec![
                            name.clone(),
                            num(*value),
                            rank.to_string(),
                            bucket.label().to_string(),
                        ]],
                    }],
                },
                (Some(name), Some(_), None) => ResponseEnvelope::message(format!(
                    "Percentile unavailable: no {measure} cohort values to rank {name} against"
                )),
                (Some(name), ..) => ResponseEnvelope::message(format!(
                    "Percentile unavailable: no numeric {measure} value for {name}"
                )),
                _ => ResponseEnvelope::message(format!(
                    "Percentile unavailable: student not found for {measure}"
                )),
            };
            push_suggestions(&mut envelope, suggestions);
            envelope
        }
        AggregationResult::Report {
            query,
            card,
            suggestions,
        } => match card {
            Some(card) => {
                let mut envelope = ResponseEnvelope {
                    ok: true,
                    general: format!("Full report of {}", card.name),
                    lists: vec![
                        score_list("Strengths", &card.strengths),
                        score_list("Growth areas", &card.growth_areas),
                    ],
                    tables: vec![NamedTable {
                        title: format!("Scores of {}", card.name),
                        columns: vec!["indicator".into(), "value".into(), "band".into()],
                        rows: card
                            .scores
                            .iter()
                            .map(|s| {
                                vec![s.column.clone(), num(s.value), s.bucket.label().to_string()]
                            })
                            .collect(),
                    }],
                };
                push_suggestions(&mut envelope, suggestions);
                envelope
            }
            None => {
                let mut envelope =
                    ResponseEnvelope::message(format!("Student '{query}' not found"));
                push_suggestions(&mut envelope, suggestions);
                envelope
            }
        },
    }
}

fn score_list(title: &str, entries: &[ScoreEntry]) -> NamedList {
    NamedList {
        title: title.to_string(),
        items: entries
            .iter()
            .map(|s| format!("{}: {} ({})", s.column, num(s.value), s.bucket.label()))
            .collect(),
    }
}

fn push_suggestions(envelope: &mut ResponseEnvelope, suggestions: &[String]) {
    if !suggestions.is_empty() {
        envelope.lists.push(NamedList {
            title: "Did you mean".to_string(),
            items: suggestions.to_vec(),
        });
    }
}

fn num(value: f64) -> String {
    crate::dataset::Value::Number(value).as_display()
}

/// Defensive parse of collaborator output into the envelope.
pub fn parse_envelope(raw: &str) -> ResponseEnvelope {
    let trimmed = raw.trim();
    if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope>(trimmed) {
        return envelope;
    }
    if let Some(block) = last_json_block(trimmed) {
        if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope>(block) {
            return envelope;
        }
    }
    ResponseEnvelope::message(trimmed)
}

/// The last balanced top-level `{...}` block, ignoring braces inside strings.
fn last_json_block(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut found = None;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        found = start.map(|s| &text[s..=idx]);
                    }
                }
            }
            _ => {}
        }
    }
    found
}
