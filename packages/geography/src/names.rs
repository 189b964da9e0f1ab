//! Neighborhood name normalization.
//!
//! Names from the survey store and from the geometry source are typed by
//! different people and rarely agree on case or spacing, e.g. `"RIOMAR"`
//! vs `" Riomar"`. Comparison always happens on normalized keys.

use std::collections::{BTreeMap, BTreeSet};

/// Lowercases, trims, and collapses internal whitespace.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether one normalized key contains the other.
///
/// Used only as a fallback after exact key comparison fails.
#[must_use]
pub fn partial_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Finds the candidate matching `key`.
///
/// Both `key` and the candidates must already be normalized. An exact
/// match wins. Otherwise the single candidate that partially matches is
/// returned; when several do, the match is ambiguous and `None` is
/// returned.
#[must_use]
pub fn match_name<'a, I>(key: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut partial = None;
    let mut ambiguous = false;
    for candidate in candidates {
        if candidate == key {
            return Some(candidate);
        }
        if partial_match(key, candidate) {
            ambiguous |= partial.is_some_and(|p| p != candidate);
            partial = Some(candidate);
        }
    }
    if ambiguous {
        log::debug!("Ambiguous partial match for '{key}'");
        return None;
    }
    partial
}

/// Pairs every outline key with at most one statistic key.
///
/// Exact matches are settled first across all outlines. An outline left
/// without one takes a partial match only when it is unique in both
/// directions: the outline partially matches exactly one statistic, that
/// statistic has no exact outline, and no other outline name partially
/// matches it. Anything else is a miss. Outlines sharing a name share
/// the result.
#[must_use]
pub fn join_keys<'s>(outlines: &[&str], stats: &[&'s str]) -> Vec<Option<&'s str>> {
    let exact: BTreeSet<&str> = stats
        .iter()
        .copied()
        .filter(|stat| outlines.contains(stat))
        .collect();

    let mut claims: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for &outline in outlines {
        for &stat in stats {
            if outline != stat && partial_match(outline, stat) {
                claims.entry(stat).or_default().insert(outline);
            }
        }
    }

    outlines
        .iter()
        .map(|&outline| {
            if let Some(&stat) = stats.iter().find(|&&stat| stat == outline) {
                return Some(stat);
            }
            let mut candidates = stats
                .iter()
                .copied()
                .filter(|&stat| partial_match(outline, stat));
            let (Some(stat), None) = (candidates.next(), candidates.next()) else {
                return None;
            };
            let sole_claim = claims
                .get(stat)
                .is_some_and(|owners| owners.len() == 1 && owners.contains(outline));
            if exact.contains(stat) || !sole_claim {
                log::debug!("Partial match '{outline}' ~ '{stat}' is not unique; treating as a miss");
                return None;
            }
            Some(stat)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_spacing() {
        assert_eq!(normalize_name("  LAS   Flores "), "las flores");
        assert_eq!(normalize_name("Barrio Abajo"), normalize_name("barrio  abajo"));
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn partial_match_either_direction() {
        assert!(partial_match("villa country", "country"));
        assert!(partial_match("country", "villa country"));
        assert!(!partial_match("riomar", "el prado"));
        assert!(!partial_match("", "riomar"));
    }

    #[test]
    fn exact_match_beats_partial() {
        let candidates = ["villa country", "country"];
        assert_eq!(match_name("country", candidates), Some("country"));
    }

    #[test]
    fn unique_partial_match_is_accepted() {
        let candidates = ["riomar", "villa country"];
        assert_eq!(match_name("country", candidates), Some("villa country"));
    }

    #[test]
    fn ambiguous_partial_match_is_a_miss() {
        let candidates = ["villa country", "country club"];
        assert_eq!(match_name("country", candidates), None);
        assert_eq!(match_name("el prado", ["riomar"]), None);
    }

    #[test]
    fn join_prefers_exact_names() {
        let joined = join_keys(&["villa", "villa santos", "villa country"], &["villa"]);
        assert_eq!(joined, vec![Some("villa"), None, None]);
    }

    #[test]
    fn join_accepts_partial_match_unique_both_ways() {
        let joined = join_keys(&["riomar", "villa country"], &["riomar", "country"]);
        assert_eq!(joined, vec![Some("riomar"), Some("country")]);
    }

    #[test]
    fn join_rejects_stat_claimed_by_several_outlines() {
        let joined = join_keys(&["villa country", "country club"], &["country"]);
        assert_eq!(joined, vec![None, None]);
    }

    #[test]
    fn join_rejects_outline_with_several_candidates() {
        let joined = join_keys(&["country"], &["villa country", "country club"]);
        assert_eq!(joined, vec![None]);
    }

    #[test]
    fn duplicate_outline_names_share_a_partial_match() {
        let joined = join_keys(&["villa country", "villa country"], &["country"]);
        assert_eq!(joined, vec![Some("country"), Some("country")]);
    }
}
