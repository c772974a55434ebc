//! Fuzzy entity lookup: finds the dataset row a free-text name refers to,
//! tolerant of accents, casing, and partial names.

use crate::{dataset::Dataset, normalize};

pub const MAX_SUGGESTIONS_ON_MISS: usize = 10;
pub const MAX_SUGGESTIONS_ON_HIT: usize = 5;

/// Outcome of a lookup. `matched` is a row index into the dataset;
/// `suggestions` carries ranked alternative names either way, for
/// "did you mean" display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub matched: Option<usize>,
    pub suggestions: Vec<String>,
}

/// Pure and deterministic: identical inputs always produce identical output.
pub fn resolve(dataset: &Dataset, raw_query: &str) -> Resolution {
    let query_folded = normalize::fold(raw_query);
    let query_tokens = normalize::tokens(raw_query);

    let candidates: Vec<(usize, String)> = dataset
        .rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| dataset.entity_name(row).map(|name| (idx, name)))
        .collect();

    // Exact match short-circuits with no suggestions.
    for (idx, name) in &candidates {
        if normalize::fold(name) == query_folded {
            return Resolution {
                matched: Some(*idx),
                suggestions: Vec::new(),
            };
        }
    }

    // Token-overlap scoring, ties broken by shorter normalized name.
    let mut scored: Vec<(usize, usize, String, String)> = candidates
        .into_iter()
        .map(|(idx, name)| {
            let folded = normalize::fold(&name);
            let name_tokens = normalize::tokens(&name);
            let score = query_tokens
                .iter()
                .filter(|t| name_tokens.contains(t))
                .count();
            (score, idx, name, folded)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.3.len().cmp(&b.3.len())));

    let required = query_tokens.len().min(2);
    let accepted = scored
        .first()
        .filter(|(score, ..)| required > 0 && *score >= required)
        .map(|&(_, idx, ..)| idx);

    let (skip, cap) = if accepted.is_some() {
        (1, MAX_SUGGESTIONS_ON_HIT)
    } else {
        (0, MAX_SUGGESTIONS_ON_MISS)
    };
    let suggestions = scored
        .iter()
        .skip(skip)
        .filter(|(score, ..)| *score > 0)
        .take(cap)
        .map(|(_, _, name, _)| name.clone())
        .collect();

    Resolution {
        matched: accepted,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn roster() -> Dataset {
        Dataset::parse(
            "NOMBRE,PARALELO\n\
             Ana Ruiz,A\n\
             Carla Nuñez,B\n\
             Carla Maria Jimenez,A\n\
             Beto Paz,B\n",
            None,
        )
    }

    #[test]
    fn exact_match_ignores_accents_and_case() {
        let data = roster();
        let result = resolve(&data, "carla nunez");
        assert_eq!(result.matched, Some(1));
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn single_token_query_needs_one_hit() {
        let data = roster();
        let result = resolve(&data, "Beto");
        assert_eq!(result.matched, Some(3));
    }

    #[test]
    fn tie_prefers_shorter_name() {
        let data = roster();
        // "Carla" hits both Carla rows with score 1; the shorter name wins.
        let result = resolve(&data, "Carla");
        assert_eq!(result.matched, Some(1));
        assert!(result.suggestions.contains(&"Carla Maria Jimenez".to_string()));
    }

    #[test]
    fn multi_token_query_needs_two_hits() {
        let data = roster();
        // Only one token ("carla") overlaps, so a two-token query is rejected.
        let result = resolve(&data, "Carla Fernandez");
        assert_eq!(result.matched, None);
        assert!(!result.suggestions.is_empty());
    }

    #[test]
    fn unknown_name_returns_no_match_and_no_noise() {
        let data = roster();
        let result = resolve(&data, "Zoraida");
        assert_eq!(result.matched, None);
        assert!(result.suggestions.is_empty());
    }

    fn large_roster() -> Dataset {
        let mut table = String::from("NOMBRE,NOTA\n");
        for c in 'a'..='l' {
            table.push_str(&format!("Maria Apellido{c},50\n"));
        }
        Dataset::parse(&table, None)
    }

    #[test]
    fn suggestions_cap_at_ten_on_miss() {
        let data = large_roster();
        // Two tokens, one hit each: below the acceptance score for all rows.
        let result = resolve(&data, "Maria Zapata");
        assert_eq!(result.matched, None);
        assert_eq!(result.suggestions.len(), MAX_SUGGESTIONS_ON_MISS);
    }

    #[test]
    fn suggestions_cap_at_five_on_hit() {
        let data = large_roster();
        let result = resolve(&data, "Maria");
        assert!(result.matched.is_some());
        assert_eq!(result.suggestions.len(), MAX_SUGGESTIONS_ON_HIT);
    }

    #[test]
    fn resolve_is_deterministic() {
        let data = roster();
        assert_eq!(resolve(&data, "Carla"), resolve(&data, "Carla"));
    }
}
