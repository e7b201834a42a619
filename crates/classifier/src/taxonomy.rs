use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MAX_CATEGORIES: usize = 16;

/// One required label together with the evidence used to recognise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Natural-language exemplar compared against item text by the semantic fallback.
    #[serde(default)]
    pub prototype: String,
}

/// An ordered set of categories. Declaration order is the tie-break everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Taxonomy {
    pub name: String,
    /// Label for items with usable text but no pattern signal and no semantic capability.
    pub general_label: String,
    /// Label for items whose corpus is too short to classify.
    pub unclassified_label: String,
    pub categories: Vec<Category>,
}

/// Per-item assignment against a [`Taxonomy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Category(usize),
    General,
    Unclassified,
}

impl Label {
    #[must_use]
    pub const fn category(self) -> Option<usize> {
        match self {
            Self::Category(index) => Some(index),
            Self::General | Self::Unclassified => None,
        }
    }
}

impl Taxonomy {
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    #[must_use]
    pub fn label_name(&self, label: Label) -> &str {
        match label {
            Label::Category(index) => self
                .categories
                .get(index)
                .map_or(self.general_label.as_str(), |c| c.name.as_str()),
            Label::General => &self.general_label,
            Label::Unclassified => &self.unclassified_label,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(ClassifierError::Taxonomy {
                taxonomy: self.name.clone(),
                reason,
            })
        };

        if self.categories.is_empty() || self.categories.len() > MAX_CATEGORIES {
            return fail(format!(
                "expected 1..={MAX_CATEGORIES} categories, got {}",
                self.categories.len()
            ));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() {
                return fail("category names must not be empty".to_string());
            }
            if !seen.insert(name) {
                return fail(format!("duplicate category '{name}'"));
            }
            let has_keyword = category.keywords.iter().any(|k| !k.trim().is_empty());
            if !has_keyword && category.prototype.trim().is_empty() {
                return fail(format!("category '{name}' has neither keywords nor a prototype"));
            }
        }

        for sentinel in [&self.general_label, &self.unclassified_label] {
            if seen.contains(sentinel.trim()) {
                return fail(format!("sentinel label '{sentinel}' collides with a category"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn category(name: &str, keywords: &[&str], prototype: &str) -> Category {
        Category {
            name: name.to_string(),
            keywords: keywords.iter().map(ToString::to_string).collect(),
            prototype: prototype.to_string(),
        }
    }

    /// Five single-letter categories with disjoint lexicons.
    pub(crate) fn letters() -> Taxonomy {
        Taxonomy {
            name: "letters".to_string(),
            general_label: "General".to_string(),
            unclassified_label: "Unclassified".to_string(),
            categories: vec![
                category("A", &["alpha"], "first letter"),
                category("B", &["bravo"], "second letter"),
                category("C", &["charlie"], "third letter"),
                category("D", &["delta"], "fourth letter"),
                category("E", &["echo"], "fifth letter"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{category, letters};
    use super::*;

    #[test]
    fn label_names() {
        let taxonomy = letters();
        assert_eq!(taxonomy.label_name(Label::Category(2)), "C");
        assert_eq!(taxonomy.label_name(Label::General), "General");
        assert_eq!(taxonomy.label_name(Label::Unclassified), "Unclassified");
        assert_eq!(taxonomy.label_name(Label::Category(9)), "General");
    }

    #[test]
    fn validation_rejects_duplicates_and_empty_evidence() {
        let mut taxonomy = letters();
        taxonomy.categories.push(category("A", &["again"], ""));
        assert!(taxonomy.validate().unwrap_err().to_string().contains("duplicate"));

        let mut taxonomy = letters();
        taxonomy.categories.push(category("F", &[" "], ""));
        assert!(taxonomy
            .validate()
            .unwrap_err()
            .to_string()
            .contains("neither keywords nor a prototype"));

        let mut taxonomy = letters();
        taxonomy.general_label = "B".to_string();
        assert!(taxonomy.validate().is_err());

        assert!(letters().validate().is_ok());
    }
}
