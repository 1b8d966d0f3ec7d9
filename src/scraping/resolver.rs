//! Fuzzy participant name resolution against a department roster

use crate::types::{Member, PersonId};
use crate::util::truncate_str;
use tracing::warn;

/// Default minimum Dice score for a name to resolve
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.75;

/// Maps free-text participant names onto roster member identifiers.
///
/// Scores are Sørensen–Dice bigram coefficients over lowercased, trimmed
/// names. The best candidate is accepted when its score reaches the threshold;
/// on equal scores the member listed first in the roster wins.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    candidates: Vec<Candidate>,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    key: String,
    id: PersonId,
}

/// Best roster candidate for a name, whether or not it passed the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome<'a> {
    pub name: &'a str,
    pub id: &'a str,
    pub score: f64,
}

impl EntityResolver {
    /// Build a resolver over `members`; members without an identifier are skipped.
    pub fn new(members: &[Member], threshold: f64) -> Self {
        let candidates = members
            .iter()
            .filter_map(|m| {
                let id = m.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
                Some(Candidate {
                    name: m.name.clone(),
                    key: normalize(&m.name),
                    id: id.to_string(),
                })
            })
            .collect();

        Self {
            candidates,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Highest scoring roster member for `name`, ignoring the threshold
    pub fn best_match(&self, name: &str) -> Option<MatchOutcome<'_>> {
        let key = normalize(name);
        let mut best: Option<MatchOutcome<'_>> = None;

        for candidate in &self.candidates {
            let score = strsim::sorensen_dice(&key, &candidate.key);
            // strict comparison keeps the earliest member on ties
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(MatchOutcome {
                    name: &candidate.name,
                    id: &candidate.id,
                    score,
                });
            }
        }

        best
    }

    /// Resolve a name to a member identifier, or `None` if nothing scores
    /// at or above the threshold.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        match self.best_match(name) {
            Some(outcome) if outcome.score >= self.threshold => Some(outcome.id),
            Some(outcome) => {
                warn!(
                    "Unresolved participant {:?}: best candidate {:?} scored {:.3} (threshold {})",
                    truncate_str(name.trim(), 80),
                    outcome.name,
                    outcome.score,
                    self.threshold
                );
                None
            }
            None => {
                warn!(
                    "Unresolved participant {:?}: roster is empty",
                    truncate_str(name.trim(), 80)
                );
                None
            }
        }
    }

    /// Resolve every fragment, dropping the ones that do not match.
    pub fn resolve_all<'a, I>(&self, fragments: I) -> Vec<PersonId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        fragments
            .into_iter()
            .filter_map(|f| self.resolve(f))
            .map(str::to_string)
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
