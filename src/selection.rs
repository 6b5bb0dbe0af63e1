//! Top/bottom feature selection shared by the bootstrap stage and the panel
//! truncation policy.

use std::str::FromStr;

use crate::error::AssocError;
use crate::stats;

/// How many features to select from a score-sorted table: a fixed count of
/// top and bottom rows, or symmetric quantile tails of the score
/// distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    /// Top `n` and bottom `n` rows in sort order (all rows if `2n` covers
    /// the table).
    Count(usize),
    /// Rows with score at or above the `f` quantile, or at or below the
    /// `1 - f` quantile.
    Fraction(f64),
}

impl Selection {
    /// Row positions selected from `sorted_scores` (which must be in the
    /// table's final sort order), ascending by position.
    pub fn pick(&self, sorted_scores: &[f64]) -> Vec<usize> {
        let n = sorted_scores.len();
        match *self {
            Selection::Count(count) => {
                if 2 * count >= n {
                    (0..n).collect()
                } else {
                    (0..count).chain(n - count..n).collect()
                }
            }
            Selection::Fraction(fraction) => {
                if n == 0 {
                    return Vec::new();
                }
                let upper = stats::quantile(sorted_scores, fraction);
                let lower = stats::quantile(sorted_scores, 1.0 - fraction);
                (0..n)
                    .filter(|&i| sorted_scores[i] >= upper || sorted_scores[i] <= lower)
                    .collect()
            }
        }
    }
}

impl FromStr for Selection {
    type Err = AssocError;

    /// `"20"` selects the top and bottom 20 rows; `"0.95"` selects the
    /// quantile tails. Values of 1 or more are counts, values below 1 are
    /// fractions.
    fn from_str(s: &str) -> Result<Self, AssocError> {
        let value: f64 = s.parse().map_err(|_| {
            AssocError::InvalidConfiguration(format!(
                "selection threshold '{}' is not numeric",
                s
            ))
        })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(AssocError::InvalidConfiguration(format!(
                "selection threshold must be positive and finite; got {}",
                s
            )));
        }
        if value >= 1.0 {
            Ok(Selection::Count(value as usize))
        } else {
            Ok(Selection::Fraction(value))
        }
    }
}

/// Truncation policy applied before the panel handoff: a request selecting
/// more than 100 features is clamped to the top and bottom 100.
pub fn panel_rows(selection: &Selection, sorted_scores: &[f64]) -> Vec<usize> {
    const MAX_PANEL_FEATURES: usize = 100;
    let clamped = match *selection {
        Selection::Count(n) if n > MAX_PANEL_FEATURES => Selection::Count(MAX_PANEL_FEATURES),
        Selection::Fraction(_) => {
            let picked = selection.pick(sorted_scores);
            if picked.len() <= MAX_PANEL_FEATURES {
                return picked;
            }
            Selection::Count(MAX_PANEL_FEATURES)
        }
        other => other,
    };
    clamped.pick(sorted_scores)
}
