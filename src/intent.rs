//! Intent classifier: maps a raw question string to a structured intent.
//!
//! Recognition is an ordered rule table tested top to bottom; the first rule
//! that fires wins. Order matters because some phrasings are substrings of
//! others ("full report of X" contains words that would otherwise look like a
//! lookup). Anything unmatched becomes `Fallback`, which the service routes to
//! the narrative collaborator.

use std::sync::OnceLock;

use regex::Regex;

use crate::{dataset::Dataset, normalize};

pub const SAMPLE_DEFAULT: usize = 3;
pub const TOP_N_DEFAULT: usize = 5;
pub const ROW_REQUEST_MAX: usize = 50;

/// Measure columns tried when the question names no known column.
const PREFERRED_MEASURES: &[&str] = &[
    "autoestima",
    "promedio",
    "nota",
    "calificacion",
    "puntaje",
    "score",
    "total",
];

/// Column aliases a group/filter token may refer to.
const GROUP_COLUMNS: &[&str] = &["paralelo", "curso", "seccion", "grado", "grupo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn holds(self, value: f64, limit: f64) -> bool {
        match self {
            Comparator::Gt => value > limit,
            Comparator::Ge => value >= limit,
            Comparator::Lt => value < limit,
            Comparator::Le => value <= limit,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Desc,
    Asc,
}

/// Exact-match row restriction, e.g. PARALELO = "A". Values compare
/// case/accent-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub column: String,
    pub value: String,
}

pub type Filter = Vec<FilterClause>;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Sample {
        n: usize,
    },
    Average {
        measure: Option<usize>,
        group: Option<usize>,
        filter: Filter,
    },
    TopN {
        measure: Option<usize>,
        k: usize,
        order: SortOrder,
        filter: Filter,
    },
    Threshold {
        measure: Option<usize>,
        comparator: Comparator,
        value: f64,
        filter: Filter,
    },
    Percentile {
        entity: String,
        measure: Option<usize>,
        filter: Filter,
    },
    Report {
        entity: String,
    },
    TextLookup {
        document: String,
    },
    Fallback,
}

/// Everything a rule may consult, computed once per question.
struct Question<'a> {
    folded: String,
    dataset: &'a Dataset,
    documents: &'a [String],
    filter: Filter,
}

type RuleFn = for<'a> fn(&Question<'a>) -> Option<Intent>;

/// Priority-ordered recognizers; the first to return `Some` wins.
const RULES: &[(&str, RuleFn)] = &[
    ("report", match_report),
    ("sample", match_sample),
    ("percentile", match_percentile),
    ("average", match_average),
    ("top-n", match_top_n),
    ("threshold", match_threshold),
    ("text-lookup", match_text_lookup),
];

pub fn classify(question: &str, dataset: &Dataset, documents: &[String]) -> Intent {
    let ctx = Question {
        folded: normalize::fold(question),
        dataset,
        documents,
        filter: extract_filter(question, dataset),
    };
    for (name, rule) in RULES {
        if let Some(intent) = rule(&ctx) {
            log::debug!("Question matched rule '{name}'");
            return intent;
        }
    }
    Intent::Fallback
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("intent pattern must compile"))
}

fn match_report(q: &Question) -> Option<Intent> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"(?:full report|complete report|informe completo|reporte completo|ficha completa)\s+(?:of|del|de la|de)?\s*(.+)",
    );
    let captures = re.captures(&q.folded)?;
    let entity = captures[1].trim_matches(['?', '.', '!', ' ']).to_string();
    if entity.is_empty() {
        return None;
    }
    Some(Intent::Report { entity })
}

fn match_sample(q: &Question) -> Option<Intent> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"\b(?:show|display|muestra(?:me)?|ver|ensena(?:me)?)\s+(?:the\s+first\s+|las?\s+primeras?\s+)?(\d+)?\s*(?:rows|records|filas|registros|datos)",
    );
    let captures = re.captures(&q.folded)?;
    let n = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .unwrap_or(SAMPLE_DEFAULT)
        .clamp(1, ROW_REQUEST_MAX);
    Some(Intent::Sample { n })
}

fn match_percentile(q: &Question) -> Option<Intent> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"percentil(?:e)?\s+(?:of|del|de la|de)\s+(.+?)\s+(?:in|en)\s+(.+)",
    );
    let captures = re.captures(&q.folded)?;
    let entity = captures[1].trim().to_string();
    let measure = resolve_measure(&captures[2], q.dataset);
    Some(Intent::Percentile {
        entity,
        measure,
        filter: q.filter.clone(),
    })
}

fn match_average(q: &Question) -> Option<Intent> {
    let mentions_average = ["average", "mean", "promedio", "media"]
        .iter()
        .any(|kw| word_present(&q.folded, kw));
    if !mentions_average {
        return None;
    }
    Some(Intent::Average {
        measure: resolve_measure(&q.folded, q.dataset),
        group: resolve_group(&q.folded, q.dataset),
        filter: q.filter.clone(),
    })
}

fn match_top_n(q: &Question) -> Option<Intent> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"\btop\s+(\d+)?");
    let captures = re.captures(&q.folded)?;
    let k = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .unwrap_or(TOP_N_DEFAULT)
        .clamp(1, ROW_REQUEST_MAX);
    let ascending = ["lowest", "worst", "bottom", "peor", "peores", "mas bajo", "mas bajos"]
        .iter()
        .any(|kw| q.folded.contains(kw));
    Some(Intent::TopN {
        measure: resolve_measure(&q.folded, q.dataset),
        k,
        order: if ascending {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        },
        filter: q.filter.clone(),
    })
}

fn match_threshold(q: &Question) -> Option<Intent> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r"(>=|<=|>|<|greater than or equal to|greater than|more than|at least|less than|fewer than|at most|below|above|mayor(?:es)? o igual(?: que| a)?|mayor(?:es)?(?: que| a| de)?|menor(?:es)? o igual(?: que| a)?|menor(?:es)?(?: que| a| de)?|al menos|como maximo|por encima de|por debajo de)\s+(-?\d+(?:[.,]\d+)?)",
    );
    let captures = re.captures(&q.folded)?;
    let token = captures[1].trim();
    let comparator = match token {
        ">" | "greater than" | "more than" | "above" | "por encima de" => Comparator::Gt,
        "<" | "less than" | "fewer than" | "below" | "por debajo de" => Comparator::Lt,
        ">=" | "greater than or equal to" | "at least" | "al menos" => Comparator::Ge,
        "<=" | "at most" | "como maximo" => Comparator::Le,
        other if other.starts_with("mayor") => {
            if other.contains("igual") {
                Comparator::Ge
            } else {
                Comparator::Gt
            }
        }
        other if other.starts_with("menor") => {
            if other.contains("igual") {
                Comparator::Le
            } else {
                Comparator::Lt
            }
        }
        _ => return None,
    };
    let value = crate::dataset::parse_number(&captures[2])?;
    Some(Intent::Threshold {
        measure: resolve_measure(&q.folded, q.dataset),
        comparator,
        value,
        filter: q.filter.clone(),
    })
}

fn match_text_lookup(q: &Question) -> Option<Intent> {
    q.documents
        .iter()
        .find(|doc| {
            let folded = normalize::fold(doc);
            !folded.is_empty() && q.folded.contains(&folded)
        })
        .map(|doc| Intent::TextLookup {
            document: doc.clone(),
        })
}

/// Resolve the measure column a question refers to: longest column name
/// mentioned verbatim, else the preference list, else the first numeric column.
pub fn resolve_measure(text: &str, dataset: &Dataset) -> Option<usize> {
    let folded = normalize::fold(text);
    let mut best: Option<(usize, usize)> = None;
    for (idx, column) in dataset.numeric_columns() {
        let name = normalize::fold(&column.name);
        if name.len() >= 3 && folded.contains(&name) {
            if best.is_none_or(|(len, _)| name.len() > len) {
                best = Some((name.len(), idx));
            }
        }
    }
    if let Some((_, idx)) = best {
        return Some(idx);
    }
    for preferred in PREFERRED_MEASURES {
        if let Some((idx, _)) = dataset
            .numeric_columns()
            .find(|(_, c)| normalize::fold(&c.name).contains(preferred))
        {
            return Some(idx);
        }
    }
    dataset.numeric_columns().next().map(|(idx, _)| idx)
}

fn resolve_group(folded: &str, dataset: &Dataset) -> Option<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"(?:\bby\b|\bpor\b)\s+([a-z0-9_]+)");
    let token = re.captures(folded)?.get(1)?.as_str().to_string();
    // The named column directly, else a well-known group column.
    if let Some(idx) = dataset
        .columns
        .iter()
        .position(|c| normalize::fold(&c.name).contains(&token))
    {
        return Some(idx);
    }
    GROUP_COLUMNS.iter().find_map(|alias| {
        dataset
            .columns
            .iter()
            .position(|c| normalize::fold(&c.name).contains(alias))
    })
}

/// Capture "paralelo X" / "curso X" style restrictions anywhere in the text,
/// independent of which top-level rule matches.
fn extract_filter(question: &str, dataset: &Dataset) -> Filter {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &RE,
        r#"(paralelo|curso|seccion|grado|grupo)\s+"?([a-z0-9]+)"?"#,
    );
    let folded = normalize::fold(question);
    let mut filter = Filter::new();
    for captures in re.captures_iter(&folded) {
        let alias = &captures[1];
        let value = captures[2].to_string();
        // Skip grouping phrases such as "by paralelo" where the "value" is
        // another keyword rather than a group label.
        if ["by", "por", "de", "del", "en", "in", "of"].contains(&value.as_str()) {
            continue;
        }
        let Some(idx) = dataset
            .columns
            .iter()
            .position(|c| normalize::fold(&c.name).contains(alias))
        else {
            continue;
        };
        let column = dataset.columns[idx].name.clone();
        if !filter.iter().any(|c: &FilterClause| c.column == column) {
            filter.push(FilterClause { column, value });
        }
    }
    filter
}

fn word_present(folded: &str, word: &str) -> bool {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}
