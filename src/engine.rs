//! Aggregation engine: executes a classified intent against the dataset.
//!
//! Every operation works on an immutable dataset snapshot and produces a
//! structured [`AggregationResult`]; nothing here mutates shared state, so a
//! cancelled or concurrent query has no side effects. Missing data degrades to
//! "no value" results rather than errors.

use itertools::Itertools;
use log::debug;

use crate::{
    dataset::Dataset,
    intent::{Filter, Intent, SortOrder},
    normalize, resolve,
};

/// Safety bound on rows returned by a threshold scan.
pub const THRESHOLD_ROW_CAP: usize = 200;
/// Strength / growth-area entries shown on a report.
const REPORT_SECTION_CAP: usize = 5;

/// Columns excluded from report score listings even when numeric.
const IDENTITY_COLUMNS: &[&str] = &["id", "cedula", "edad", "telefono", "age", "phone"];

/// Ordinal band a score falls into, for interpretive display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Low,
    Average,
    High,
    NoData,
}

impl Bucket {
    pub fn of(value: f64) -> Bucket {
        if !value.is_finite() {
            Bucket::NoData
        } else if value <= 40.0 {
            Bucket::Low
        } else if value >= 71.0 {
            Bucket::High
        } else {
            Bucket::Average
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Low => "LOW",
            Bucket::Average => "AVERAGE",
            Bucket::High => "HIGH",
            Bucket::NoData => "no data",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub column: String,
    pub value: f64,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    pub name: String,
    pub scores: Vec<ScoreEntry>,
    pub strengths: Vec<ScoreEntry>,
    pub growth_areas: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResult {
    /// Global mean. `mean` is None when the filtered cohort holds no numbers.
    Scalar {
        measure: String,
        mean: Option<f64>,
        count: usize,
    },
    /// Per-group means, sorted by group label, rounded to one decimal.
    Grouped {
        measure: String,
        group: String,
        means: Vec<(String, f64)>,
    },
    /// Row listing (sample, ranking, threshold scan) in dataset column order.
    Rows {
        title: String,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Mid-rank percentile of one entity within its cohort.
    Percentile {
        entity: Option<String>,
        measure: String,
        value: Option<f64>,
        percentile: Option<u32>,
        bucket: Bucket,
        cohort_size: usize,
        suggestions: Vec<String>,
    },
    /// Per-entity report; `card` is None when the entity was not resolved.
    Report {
        query: String,
        card: Option<ReportCard>,
        suggestions: Vec<String>,
    },
}

/// Execute a data intent. Returns None for intents the engine does not own
/// (text lookup and fallback are routed to collaborators by the service).
pub fn execute(dataset: &Dataset, intent: &Intent) -> Option<AggregationResult> {
    let result = match intent {
        Intent::Sample { n } => sample(dataset, *n),
        Intent::Average {
            measure,
            group,
            filter,
        } => average(dataset, *measure, *group, filter),
        Intent::TopN {
            measure,
            k,
            order,
            filter,
        } => top_n(dataset, *measure, *k, *order, filter),
        Intent::Threshold {
            measure,
            comparator,
            value,
            filter,
        } => threshold(dataset, *measure, *comparator, *value, filter),
        Intent::Percentile {
            entity,
            measure,
            filter,
        } => percentile(dataset, entity, *measure, filter),
        Intent::Report { entity } => report(dataset, entity),
        Intent::TextLookup { .. } | Intent::Fallback => return None,
    };
    Some(result)
}

/// Row indices surviving the filter clauses (case/accent-insensitive equality).
fn filtered_rows(dataset: &Dataset, filter: &Filter) -> Vec<usize> {
    (0..dataset.rows.len())
        .filter(|&idx| {
            filter.iter().all(|clause| {
                dataset
                    .column_index(&clause.column)
                    .map(|col| {
                        normalize::eq_fold(
                            &dataset.display_value(&dataset.rows[idx], col),
                            &clause.value,
                        )
                    })
                    .unwrap_or(false)
            })
        })
        .collect()
}

fn measure_name(dataset: &Dataset, measure: Option<usize>) -> String {
    measure
        .and_then(|idx| dataset.columns.get(idx))
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "(no measure)".to_string())
}

fn row_cells(dataset: &Dataset, idx: usize) -> Vec<String> {
    dataset
        .columns
        .iter()
        .enumerate()
        .map(|(col, _)| dataset.display_value(&dataset.rows[idx], col))
        .collect()
}

fn headers(dataset: &Dataset) -> Vec<String> {
    dataset.columns.iter().map(|c| c.name.clone()).collect()
}

fn sample(dataset: &Dataset, n: usize) -> AggregationResult {
    let rows = (0..dataset.rows.len().min(n))
        .map(|idx| row_cells(dataset, idx))
        .collect::<Vec<_>>();
    AggregationResult::Rows {
        title: format!("First {} row(s)", rows.len()),
        headers: headers(dataset),
        rows,
    }
}

fn average(
    dataset: &Dataset,
    measure: Option<usize>,
    group: Option<usize>,
    filter: &Filter,
) -> AggregationResult {
    let name = measure_name(dataset, measure);
    let cohort = filtered_rows(dataset, filter);
    let Some(measure) = measure else {
        return AggregationResult::Scalar {
            measure: name,
            mean: None,
            count: 0,
        };
    };

    match group {
        None => {
            let values: Vec<f64> = cohort
                .iter()
                .filter_map(|&idx| dataset.numeric_value(&dataset.rows[idx], measure))
                .collect();
            let mean = (!values.is_empty())
                .then(|| values.iter().sum::<f64>() / values.len() as f64);
            AggregationResult::Scalar {
                measure: name,
                mean,
                count: values.len(),
            }
        }
        Some(group_col) => {
            let mut partitions: Vec<(String, Vec<f64>)> = Vec::new();
            for &idx in &cohort {
                let Some(value) = dataset.numeric_value(&dataset.rows[idx], measure) else {
                    continue;
                };
                let label = dataset.display_value(&dataset.rows[idx], group_col);
                match partitions.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, values)) => values.push(value),
                    None => partitions.push((label, vec![value])),
                }
            }
            partitions.sort_by(|a, b| a.0.cmp(&b.0));
            let means = partitions
                .into_iter()
                .map(|(label, values)| {
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    (label, round1(mean))
                })
                .collect();
            AggregationResult::Grouped {
                measure: name,
                group: dataset.columns[group_col].name.clone(),
                means,
            }
        }
    }
}

fn top_n(
    dataset: &Dataset,
    measure: Option<usize>,
    k: usize,
    order: SortOrder,
    filter: &Filter,
) -> AggregationResult {
    let name = measure_name(dataset, measure);
    let mut ranked: Vec<(usize, f64)> = Vec::new();
    if let Some(measure) = measure {
        ranked = filtered_rows(dataset, filter)
            .into_iter()
            .filter_map(|idx| {
                dataset
                    .numeric_value(&dataset.rows[idx], measure)
                    .map(|v| (idx, v))
            })
            .collect();
        // Stable sort keeps original row order between equal values.
        match order {
            SortOrder::Desc => ranked.sort_by(|a, b| b.1.total_cmp(&a.1)),
            SortOrder::Asc => ranked.sort_by(|a, b| a.1.total_cmp(&b.1)),
        }
        ranked.truncate(k);
    }
    debug!("Ranked {} row(s) by {}", ranked.len(), name);
    let direction = match order {
        SortOrder::Desc => "highest",
        SortOrder::Asc => "lowest",
    };
    AggregationResult::Rows {
        title: format!("Top {} {direction} by {name}", ranked.len()),
        headers: headers(dataset),
        rows: ranked
            .into_iter()
            .map(|(idx, _)| row_cells(dataset, idx))
            .collect(),
    }
}

fn threshold(
    dataset: &Dataset,
    measure: Option<usize>,
    comparator: crate::intent::Comparator,
    limit: f64,
    filter: &Filter,
) -> AggregationResult {
    let name = measure_name(dataset, measure);
    let mut hits: Vec<(usize, f64)> = Vec::new();
    if let Some(measure) = measure {
        hits = filtered_rows(dataset, filter)
            .into_iter()
            .filter_map(|idx| {
                dataset
                    .numeric_value(&dataset.rows[idx], measure)
                    .filter(|&v| comparator.holds(v, limit))
                    .map(|v| (idx, v))
            })
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(THRESHOLD_ROW_CAP);
    }
    AggregationResult::Rows {
        title: format!(
            "{} row(s) with {name} {} {}",
            hits.len(),
            comparator.symbol(),
            crate::dataset::Value::Number(limit).as_display()
        ),
        headers: headers(dataset),
        rows: hits
            .into_iter()
            .map(|(idx, _)| row_cells(dataset, idx))
            .collect(),
    }
}

fn percentile(
    dataset: &Dataset,
    entity: &str,
    measure: Option<usize>,
    filter: &Filter,
) -> AggregationResult {
    let name = measure_name(dataset, measure);
    let resolution = resolve::resolve(dataset, entity);
    let unavailable = |suggestions: Vec<String>, entity_name: Option<String>| {
        AggregationResult::Percentile {
            entity: entity_name,
            measure: name.clone(),
            value: None,
            percentile: None,
            bucket: Bucket::NoData,
            cohort_size: 0,
            suggestions,
        }
    };

    let Some(row_idx) = resolution.matched else {
        return unavailable(resolution.suggestions, None);
    };
    let entity_name = dataset.entity_name(&dataset.rows[row_idx]);
    let Some(measure) = measure else {
        return unavailable(resolution.suggestions, entity_name);
    };
    let Some(value) = dataset.numeric_value(&dataset.rows[row_idx], measure) else {
        return unavailable(resolution.suggestions, entity_name);
    };

    let cohort: Vec<f64> = filtered_rows(dataset, filter)
        .into_iter()
        .filter_map(|idx| dataset.numeric_value(&dataset.rows[idx], measure))
        .collect();
    let rank = (!cohort.is_empty()).then(|| mid_rank_percentile(value, &cohort));

    AggregationResult::Percentile {
        entity: entity_name,
        measure: name,
        value: Some(value),
        percentile: rank,
        bucket: Bucket::of(value),
        cohort_size: cohort.len(),
        suggestions: resolution.suggestions,
    }
}

/// Mid-rank percentile: ties count half, result rounded and clamped to [1, 100].
pub fn mid_rank_percentile(value: f64, cohort: &[f64]) -> u32 {
    let below = cohort.iter().filter(|&&v| v < value).count() as f64;
    let equal = cohort.iter().filter(|&&v| v == value).count() as f64;
    let raw = 100.0 * (below + 0.5 * equal) / cohort.len() as f64;
    (raw.round() as i64).clamp(1, 100) as u32
}

fn report(dataset: &Dataset, entity: &str) -> AggregationResult {
    let resolution = resolve::resolve(dataset, entity);
    let Some(row_idx) = resolution.matched else {
        return AggregationResult::Report {
            query: entity.to_string(),
            card: None,
            suggestions: resolution
                .suggestions
                .into_iter()
                .take(resolve::MAX_SUGGESTIONS_ON_HIT)
                .collect(),
        };
    };

    let row = &dataset.rows[row_idx];
    let name = dataset
        .entity_name(row)
        .unwrap_or_else(|| entity.to_string());
    let scores: Vec<ScoreEntry> = dataset
        .numeric_columns()
        .filter(|(_, c)| {
            let folded = normalize::fold(&c.name);
            !IDENTITY_COLUMNS.iter().any(|alias| folded.contains(alias))
        })
        .filter_map(|(idx, c)| {
            dataset.numeric_value(row, idx).map(|value| ScoreEntry {
                column: c.name.clone(),
                value,
                bucket: Bucket::of(value),
            })
        })
        .collect();

    let strengths = scores
        .iter()
        .filter(|s| s.value >= 71.0)
        .sorted_by(|a, b| b.value.total_cmp(&a.value))
        .take(REPORT_SECTION_CAP)
        .cloned()
        .collect();
    let growth_areas = scores
        .iter()
        .filter(|s| s.value <= 40.0)
        .sorted_by(|a, b| a.value.total_cmp(&b.value))
        .take(REPORT_SECTION_CAP)
        .cloned()
        .collect();

    AggregationResult::Report {
        query: entity.to_string(),
        card: Some(ReportCard {
            name,
            scores,
            strengths,
            growth_areas,
        }),
        suggestions: resolution.suggestions,
    }
}

/// Round to one decimal, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
