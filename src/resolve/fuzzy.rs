//! Confidence-scored resolution of loose path fragments to indexed paths.

use std::collections::HashSet;

use crate::domain::{FileMatch, MatchStrategy};
use crate::error::{SpliceError, SpliceResult};
use crate::index::IndexStore;
use crate::utils::normalize_path;

/// Below this a match is never handed out.
pub const MIN_CONFIDENCE: f64 = 0.3;
/// At or above this the remaining strategies are skipped.
pub const EARLY_STOP: f64 = 0.95;

const SUFFIX_WEIGHT: f64 = 0.8;
const FILENAME_WEIGHT: f64 = 0.4;
const FUZZY_WEIGHT: f64 = 0.6;
const FUZZY_FLOOR: f64 = 0.5;

type Strategy = fn(&FileResolver, &str) -> Option<FileMatch>;

const STRATEGIES: &[Strategy] = &[
    FileResolver::exact_match,
    FileResolver::suffix_match,
    FileResolver::filename_match,
    FileResolver::fuzzy_match,
];

#[derive(Debug, Clone)]
pub struct FileResolver {
    paths: Vec<String>,
}

impl FileResolver {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths: Vec<String> = paths.into_iter().map(|p| normalize_path(p.as_ref())).collect();
        paths.sort();
        paths.dedup();
        Self { paths }
    }

    pub fn from_store(store: &IndexStore) -> SpliceResult<Self> {
        Ok(Self::new(store.file_paths()?))
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Best match across all strategies, or `None` when nothing clears
    /// [`MIN_CONFIDENCE`].
    pub fn resolve(&self, fragment: &str) -> Option<FileMatch> {
        let normalized = normalize_path(fragment.trim());
        if normalized.is_empty() {
            return None;
        }

        let mut best: Option<FileMatch> = None;
        for strategy in STRATEGIES {
            let Some(candidate) = strategy(self, &normalized) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                let stop = candidate.score >= EARLY_STOP;
                best = Some(candidate);
                if stop {
                    break;
                }
            }
        }

        match best {
            Some(found) if found.score < MIN_CONFIDENCE => {
                tracing::warn!("Low confidence match for: {}", normalized);
                None
            }
            other => other,
        }
    }

    pub fn resolve_required(&self, fragment: &str) -> SpliceResult<FileMatch> {
        self.resolve(fragment).ok_or_else(|| SpliceError::Resolution(fragment.to_string()))
    }

    fn exact_match(&self, fragment: &str) -> Option<FileMatch> {
        self.paths.binary_search_by(|p| p.as_str().cmp(fragment)).ok().map(|idx| FileMatch {
            path: self.paths[idx].clone(),
            score: 1.0,
            strategy: MatchStrategy::Exact,
        })
    }

    fn suffix_match(&self, fragment: &str) -> Option<FileMatch> {
        best_of(
            self.paths.iter().filter(|p| p.ends_with(fragment)),
            |p| path_similarity(fragment, p),
        )
        .map(|(path, sim)| FileMatch { path, score: SUFFIX_WEIGHT * sim, strategy: MatchStrategy::Suffix })
    }

    fn filename_match(&self, fragment: &str) -> Option<FileMatch> {
        let filename = fragment.rsplit('/').next().unwrap_or(fragment);
        let fragment_parts: HashSet<&str> = fragment.split('/').collect();
        best_of(self.paths.iter().filter(|p| p.ends_with(filename)), |p| {
            let shared = p.split('/').collect::<HashSet<_>>().intersection(&fragment_parts).count();
            shared as f64 / fragment_parts.len() as f64
        })
        .map(|(path, ratio)| FileMatch {
            path,
            score: FILENAME_WEIGHT * ratio,
            strategy: MatchStrategy::Filename,
        })
    }

    fn fuzzy_match(&self, fragment: &str) -> Option<FileMatch> {
        best_of(self.paths.iter(), |p| char_similarity(fragment, p))
            .filter(|(_, raw)| *raw >= FUZZY_FLOOR)
            .map(|(path, raw)| FileMatch { path, score: FUZZY_WEIGHT * raw, strategy: MatchStrategy::Fuzzy })
    }
}

/// Highest-scoring candidate; equal scores go to the shorter path, then the
/// lexicographically smaller one, so results are reproducible.
fn best_of<'a, I, F>(candidates: I, score: F) -> Option<(String, f64)>
where
    I: Iterator<Item = &'a String>,
    F: Fn(&str) -> f64,
{
    let mut best: Option<(&String, f64)> = None;
    for path in candidates {
        let s = score(path);
        let better = match best {
            None => true,
            Some((current, current_score)) => {
                s > current_score
                    || (s == current_score
                        && (path.len(), path.as_str()) < (current.len(), current.as_str()))
            }
        };
        if better {
            best = Some((path, s));
        }
    }
    best.map(|(p, s)| (p.clone(), s))
}

/// Shared path segments over the longer segment count.
pub fn path_similarity(a: &str, b: &str) -> f64 {
    let parts_a: Vec<&str> = a.split('/').collect();
    let parts_b: Vec<&str> = b.split('/').collect();
    let set_a: HashSet<&str> = parts_a.iter().copied().collect();
    let set_b: HashSet<&str> = parts_b.iter().copied().collect();
    let longest = parts_a.len().max(parts_b.len());
    if longest == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / longest as f64
}

/// 1.0 on substring containment, else shared distinct characters over the
/// larger character set.
pub fn char_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(b) || b.contains(a) {
        return 1.0;
    }
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    set_a.intersection(&set_b).count() as f64 / set_a.len().max(set_b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_path_wins_outright() {
        let resolver = FileResolver::new(["core/scanner.py", "core/graph.py"]);
        let found = resolver.resolve("core\\graph.py").expect("match");
        assert_eq!(found.path, "core/graph.py");
        assert_eq!(found.strategy, MatchStrategy::Exact);
        assert!((found.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bare_filename_prefers_true_file_over_lookalike() {
        let resolver = FileResolver::new(["core/scanner_old.py", "core/scanner.py"]);
        let found = resolver.resolve("scanner.py").expect("match");
        assert_eq!(found.path, "core/scanner.py");
        assert!(found.score >= MIN_CONFIDENCE);
    }

    #[test]
    fn ties_go_to_the_shortest_path() {
        let resolver = FileResolver::new(["b/deep/util.py", "a/util.py"]);
        let found = resolver.resolve("util.py").expect("match");
        assert_eq!(found.path, "a/util.py");
    }

    #[test]
    fn suffix_match_scores_by_shared_segments() {
        let resolver = FileResolver::new(["src/app/models/user.py", "src/app/views.py"]);
        let found = resolver.suffix_match("models/user.py").expect("suffix");
        assert_eq!(found.path, "src/app/models/user.py");
        assert!((found.score - 0.8 * 2.0 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn weak_matches_are_refused() {
        let resolver = FileResolver::new(["alpha/beta.rs"]);
        assert!(resolver.resolve("zzqq").is_none());
        assert!(resolver.resolve("").is_none());

        // Filename hit worth 0.4 * 1/3 is still under the floor.
        let resolver = FileResolver::new(["k/m"]);
        assert!(resolver.filename_match("WXYZ/QRST/m").is_some());
        assert!(resolver.resolve("WXYZ/QRST/m").is_none());
        assert!(matches!(resolver.resolve_required("zzqq"), Err(SpliceError::Resolution(_))));
    }

    #[test]
    fn similarity_helpers() {
        assert!((path_similarity("a/b.py", "x/a/b.py") - 2.0 / 3.0).abs() < 1e-9);
        assert!((char_similarity("abc", "xxabcxx") - 1.0).abs() < f64::EPSILON);
        assert!((char_similarity("abcd", "abxy") - 0.5).abs() < f64::EPSILON);
        assert_eq!(char_similarity("", "a"), 0.0);
    }
}
