//! Scoring a query signature against a labeled corpus.
//!
//! Distance is the Bhattacharyya form used by common histogram libraries,
//! applied to the raw normalized cells (they need not sum to one):
//!
//! ```text
//! d(a, b) = sqrt(max(0, 1 - Σ sqrt(a_i * b_i) / sqrt(Σa * Σb)))
//! ```
//!
//! When `Σa * Σb` is within `f32::EPSILON` of zero the normalizer is taken as 1,
//! so two all-zero signatures sit at distance 1.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::corpus::{Category, Corpus};
use crate::error::{Error, Result};
use crate::signature::Signature;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    /// Mean distance from the query to every reference in the category
    pub distance: f64,
    pub samples: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum MatchResult {
    Matched { category: Category, score: f64 },
    /// No category had any reference signature
    Unknown,
}

impl MatchResult {
    /// Distance of the match; `Unknown` reports positive infinity.
    pub fn score(&self) -> f64 {
        match self {
            MatchResult::Matched { score, .. } => *score,
            MatchResult::Unknown => f64::INFINITY,
        }
    }

    pub fn category(&self) -> Option<&Category> {
        match self {
            MatchResult::Matched { category, .. } => Some(category),
            MatchResult::Unknown => None,
        }
    }

    /// Label for display, `unknown` when nothing matched.
    pub fn label(&self) -> &str {
        self.category().map(Category::as_str).unwrap_or("unknown")
    }
}

fn check_len(first: &Signature, second: &Signature) -> Result<()> {
    if first.len() != second.len() {
        return Err(Error::SignatureLength {
            expected: first.len(),
            found: second.len(),
        });
    }
    Ok(())
}

pub fn bhattacharyya(first: &Signature, second: &Signature) -> Result<f64> {
    check_len(first, second)?;
    let (mut s1, mut s2, mut overlap) = (0_f64, 0_f64, 0_f64);
    for (&a, &b) in first.as_slice().iter().zip(second.as_slice()) {
        let (a, b) = (a as f64, b as f64);
        s1 += a;
        s2 += b;
        overlap += (a * b).sqrt();
    }
    let product = s1 * s2;
    let norm = if product.abs() > f32::EPSILON as f64 {
        1. / product.sqrt()
    } else {
        1.
    };
    Ok((1. - overlap * norm).max(0.).sqrt())
}

/// Mean distance from `query` to each reference, summed in reference order.
fn mean_distance(query: &Signature, references: &[Signature]) -> Result<f64> {
    let mut total = 0.;
    for reference in references {
        total += bhattacharyya(query, reference)?;
    }
    Ok(total / references.len() as f64)
}

/**
 * Scores every populated category and sorts them best first.
 *
 * Categories are scored in parallel, each on its own, and the sort is stable so
 * equal distances keep the corpus order. Empty categories are left out.
 */
pub fn rank(query: &Signature, corpus: &Corpus) -> Result<Vec<CategoryScore>> {
    let groups: Vec<_> = corpus.iter().filter(|(_, refs)| !refs.is_empty()).collect();

    let mut scores = groups
        .par_iter()
        .map(|(category, refs)| -> Result<CategoryScore> {
            Ok(CategoryScore {
                category: (*category).clone(),
                distance: mean_distance(query, refs)?,
                samples: refs.len(),
            })
        })
        .collect::<Result<Vec<CategoryScore>>>()?;

    for score in &scores {
        debug!(
            "{}: {:.4} over {} samples",
            score.category, score.distance, score.samples
        );
    }

    scores.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(scores)
}

/// Classification carried by a ranking from [`rank`]: its head, or `Unknown`
/// when the ranking is empty.
pub fn best(ranking: &[CategoryScore]) -> MatchResult {
    match ranking.first() {
        Some(best) => MatchResult::Matched {
            category: best.category.clone(),
            score: best.distance,
        },
        None => MatchResult::Unknown,
    }
}

pub fn classify(query: &Signature, corpus: &Corpus) -> Result<MatchResult> {
    Ok(best(&rank(query, corpus)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(values: &[f32]) -> Signature {
        Signature::try_from(values.to_vec()).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    /// Two-cell signature `[1, x]` at a given distance from `[1, 0]`.
    fn at_distance(d: f64) -> Signature {
        // d^2 = 1 - 1/sqrt(1 + x)  =>  x = 1/(1 - d^2)^2 - 1
        let x = 1. / (1. - d * d).powi(2) - 1.;
        sig(&[1., x as f32])
    }

    #[test]
    fn self_distance_is_zero() {
        let a = sig(&[0., 0.25, 1., 0.5, 0.75]);
        assert!(close(bhattacharyya(&a, &a).unwrap(), 0.));
    }

    #[test]
    fn distance_is_symmetric() {
        let a = sig(&[0., 0.25, 1., 0.5, 0.75]);
        let b = sig(&[1., 0., 0.3, 0.1, 0.]);
        assert_eq!(
            bhattacharyya(&a, &b).unwrap(),
            bhattacharyya(&b, &a).unwrap()
        );
    }

    #[test]
    fn disjoint_signatures_are_maximally_distant() {
        let a = sig(&[1., 0., 0.]);
        let b = sig(&[0., 0., 1.]);
        assert!(close(bhattacharyya(&a, &b).unwrap(), 1.));
    }

    #[test]
    fn zero_signatures_are_distance_one() {
        let a = sig(&[0., 0., 0.]);
        assert!(close(bhattacharyya(&a, &a).unwrap(), 1.));
    }

    #[test]
    fn known_value() {
        // overlap = sqrt(0.5) + 0, sums 1.5 and 1
        let a = sig(&[1., 0.5]);
        let b = sig(&[0.5, 0.]);
        let expected = (1. - 0.5_f64.sqrt() / (1.5_f64 * 0.5).sqrt()).sqrt();
        assert!(close(bhattacharyya(&a, &b).unwrap(), expected));
    }

    #[test]
    fn length_mismatch_fails() {
        let a = sig(&[1., 0.]);
        let b = sig(&[1., 0., 0.]);
        assert!(matches!(
            bhattacharyya(&a, &b),
            Err(Error::SignatureLength {
                expected: 2,
                found: 3
            })
        ));

        let mut corpus = Corpus::new();
        corpus.insert("healthy".into(), b).unwrap();
        assert!(classify(&a, &corpus).is_err());
    }

    #[test]
    fn empty_category_never_wins() {
        let s1 = sig(&[1., 0., 0.]);
        let s2 = sig(&[0.8, 0.2, 0.]);
        let s3 = sig(&[0., 0., 1.]);
        let mut corpus = Corpus::with_categories(["healthy", "rust", "blight"]);
        corpus.extend("healthy".into(), vec![s1, s2]).unwrap();
        corpus.insert("blight".into(), s3).unwrap();

        for query in [sig(&[1., 0., 0.]), sig(&[0., 1., 0.]), sig(&[0., 0., 1.])] {
            let result = classify(&query, &corpus).unwrap();
            assert_ne!(result.label(), "rust");
            let ranked = rank(&query, &corpus).unwrap();
            assert_eq!(ranked.len(), 2);
            assert!(ranked.iter().all(|s| s.category.as_str() != "rust"));
        }
    }

    #[test]
    fn parallel_ranking_matches_serial_scoring() {
        let mut corpus = Corpus::new();
        for (i, label) in ["healthy", "rust", "blight", "mildew", "scab"].iter().enumerate() {
            let refs: Vec<Signature> = (0..7)
                .map(|j| {
                    let cells: Vec<f32> = (0..16)
                        .map(|k| ((i * 31 + j * 17 + k * 7) % 23) as f32 / 22.)
                        .collect();
                    sig(&cells)
                })
                .collect();
            corpus.extend((*label).into(), refs).unwrap();
        }
        let query = sig(&(0..16).map(|k| (k % 5) as f32 / 4.).collect::<Vec<f32>>());

        let mut serial: Vec<(String, f64)> = corpus
            .iter()
            .map(|(category, refs)| {
                let total = refs.iter().fold(0., |acc, r| {
                    acc + bhattacharyya(&query, r).unwrap()
                });
                (category.to_string(), total / refs.len() as f64)
            })
            .collect();
        serial.sort_by(|a, b| a.1.total_cmp(&b.1));

        for _ in 0..10 {
            let ranked: Vec<(String, f64)> = rank(&query, &corpus)
                .unwrap()
                .into_iter()
                .map(|s| (s.category.to_string(), s.distance))
                .collect();
            assert_eq!(ranked, serial);
        }
    }

    #[test]
    fn nan_reference_cannot_enter_corpus() {
        assert!(Signature::try_from(vec![f32::NAN, 1.]).is_err());
        let mut corpus = Corpus::new();
        corpus.insert("b".into(), sig(&[0.5, 1.])).unwrap();
        let result = classify(&sig(&[1., 0.]), &corpus).unwrap();
        assert_eq!(result.label(), "b");
        assert!(result.score() > 0.);
    }

    #[test]
    fn best_of_empty_ranking_is_unknown() {
        assert_eq!(best(&[]), MatchResult::Unknown);
    }

    #[test]
    fn all_empty_is_unknown() {
        let corpus = Corpus::with_categories(["healthy", "rust", "blight"]);
        let result = classify(&sig(&[1., 0.]), &corpus).unwrap();
        assert_eq!(result, MatchResult::Unknown);
        assert_eq!(result.score(), f64::INFINITY);
        assert_eq!(result.label(), "unknown");
        assert!(rank(&sig(&[1., 0.]), &Corpus::new()).unwrap().is_empty());
    }

    #[test]
    fn lowest_average_wins() {
        let query = sig(&[1., 0.]);
        let mut corpus = Corpus::new();
        corpus.insert("b".into(), at_distance(0.35)).unwrap();
        corpus.insert("a".into(), at_distance(0.10)).unwrap();

        let result = classify(&query, &corpus).unwrap();
        assert_eq!(result.label(), "a");
        assert!((result.score() - 0.10).abs() < 1e-4);

        let ranked = rank(&query, &corpus).unwrap();
        assert_eq!(ranked[1].category.as_str(), "b");
        assert!((ranked[1].distance - 0.35).abs() < 1e-4);
    }

    #[test]
    fn scores_are_averaged() {
        let query = sig(&[1., 0.]);
        let mut corpus = Corpus::new();
        corpus
            .extend("a".into(), vec![at_distance(0.1), at_distance(0.5)])
            .unwrap();
        corpus.insert("b".into(), at_distance(0.25)).unwrap();

        let ranked = rank(&query, &corpus).unwrap();
        assert_eq!(ranked[0].category.as_str(), "b");
        assert_eq!(ranked[1].samples, 2);
        assert!((ranked[1].distance - 0.3).abs() < 1e-4);
    }

    #[test]
    fn ties_go_to_first_declared() {
        let query = sig(&[1., 0.5]);
        let reference = sig(&[0.5, 1.]);
        let mut corpus = Corpus::with_categories(["rust", "healthy"]);
        corpus.insert("healthy".into(), reference.clone()).unwrap();
        corpus.insert("rust".into(), reference).unwrap();
        assert_eq!(classify(&query, &corpus).unwrap().label(), "rust");
    }

    #[test]
    fn exact_reference_matches_with_zero_score() {
        let sig_a = sig(&[0.2, 1., 0., 0.4]);
        let sig_b = sig(&[1., 0., 0.6, 0.]);
        let mut corpus = Corpus::new();
        corpus.insert("healthy".into(), sig_a.clone()).unwrap();
        corpus.insert("rust".into(), sig_b).unwrap();

        let result = classify(&sig_a, &corpus).unwrap();
        assert_eq!(result.label(), "healthy");
        assert!(result.score() < 1e-6);
    }

    #[test]
    fn result_serializes_with_tag() {
        let result = MatchResult::Matched {
            category: "rust".into(),
            score: 0.25,
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"result":"matched","category":"rust","score":0.25}"#
        );
        assert_eq!(
            serde_json::to_string(&MatchResult::Unknown).unwrap(),
            r#"{"result":"unknown"}"#
        );
    }
}
