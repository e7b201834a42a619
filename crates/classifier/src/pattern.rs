use crate::error::{ClassifierError, Result};
use crate::taxonomy::Taxonomy;
use regex::Regex;

struct WeightedKeyword {
    pattern: Regex,
    weight: f32,
}

/// Weighted keyword scoring against a taxonomy's lexicons.
///
/// Every whole-word (or whole-phrase) occurrence of a keyword adds
/// `1 + chars(keyword) / divisor` to its category, so specific phrases outweigh generic words.
/// Matching is case-insensitive; keywords are lowercased when the scorer is built.
pub struct PatternScorer {
    lexicons: Vec<Vec<WeightedKeyword>>,
}

impl PatternScorer {
    pub fn new(taxonomy: &Taxonomy, weight_divisor: f32) -> Result<Self> {
        let divisor = if weight_divisor > 0.0 {
            weight_divisor
        } else {
            1.0
        };
        let lexicons = taxonomy
            .categories
            .iter()
            .map(|category| {
                category
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .map(|keyword| {
                        let pattern = Regex::new(&whole_word_pattern(&keyword)).map_err(
                            |source| ClassifierError::Pattern {
                                keyword: keyword.clone(),
                                source,
                            },
                        )?;
                        Ok(WeightedKeyword {
                            pattern,
                            weight: 1.0 + keyword.chars().count() as f32 / divisor,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { lexicons })
    }

    #[must_use]
    pub fn category_count(&self) -> usize {
        self.lexicons.len()
    }

    /// Score of every category, in declaration order.
    #[must_use]
    pub fn scores(&self, corpus: &str) -> Vec<f32> {
        let lowered = corpus.to_lowercase();
        self.lexicons
            .iter()
            .map(|lexicon| score_lexicon(lexicon, &lowered))
            .collect()
    }

    #[must_use]
    pub fn score_category(&self, corpus: &str, index: usize) -> f32 {
        self.lexicons
            .get(index)
            .map_or(0.0, |lexicon| score_lexicon(lexicon, &corpus.to_lowercase()))
    }

    /// The highest-scoring category, or `None` when no keyword matched at all.
    ///
    /// Ties go to the category declared first.
    #[must_use]
    pub fn best_match(&self, corpus: &str) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, score) in self.scores(corpus).into_iter().enumerate() {
            if score <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }
}

fn score_lexicon(lexicon: &[WeightedKeyword], lowered: &str) -> f32 {
    lexicon
        .iter()
        .map(|keyword| keyword.pattern.find_iter(lowered).count() as f32 * keyword.weight)
        .sum()
}

/// `\b` only makes sense next to word characters; keywords such as `c++` keep an open edge.
fn whole_word_pattern(keyword: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let escaped = regex::escape(keyword);
    let start = if keyword.chars().next().is_some_and(is_word) {
        r"\b"
    } else {
        ""
    };
    let end = if keyword.chars().last().is_some_and(is_word) {
        r"\b"
    } else {
        ""
    };
    format!("{start}{escaped}{end}")
}
