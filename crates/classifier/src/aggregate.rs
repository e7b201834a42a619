use crate::item::{Item, ItemField};

/// Placeholder strings that spreadsheet and ORM exports leave in empty cells.
const NULL_MARKERS: [&str; 3] = ["none", "null", "nan"];

/// Aggregated text of one item, or the marker that it is too short to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Corpus {
    Text(String),
    TooShort,
}

/// Concatenates the configured item fields into one corpus string.
#[derive(Debug, Clone)]
pub struct TextAggregator {
    fields: Vec<ItemField>,
    min_chars: usize,
}

impl TextAggregator {
    #[must_use]
    pub fn new(fields: Vec<ItemField>, min_chars: usize) -> Self {
        Self { fields, min_chars }
    }

    /// Field values in configured order, trimmed, with empty and null-marker values dropped.
    #[must_use]
    pub fn join(&self, item: &Item) -> String {
        self.fields
            .iter()
            .filter_map(|field| item.field(*field))
            .map(str::trim)
            .filter(|value| is_meaningful(value))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn aggregate(&self, item: &Item) -> Corpus {
        let text = self.join(item);
        if text.chars().count() < self.min_chars {
            Corpus::TooShort
        } else {
            Corpus::Text(text)
        }
    }
}

fn is_meaningful(value: &str) -> bool {
    !value.is_empty()
        && !NULL_MARKERS
            .iter()
            .any(|marker| value.eq_ignore_ascii_case(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aggregator() -> TextAggregator {
        TextAggregator::new(ItemField::ALL.to_vec(), 15)
    }

    #[test]
    fn joins_fields_in_configured_order() {
        let item = Item::new(1)
            .with(ItemField::Keywords, "bluetooth")
            .with(ItemField::Title, "  Exposure notification  ")
            .with(ItemField::Abstract, "NaN")
            .with(ItemField::Methodology, "   ")
            .with(ItemField::Results, "None");

        assert_eq!(aggregator().join(&item), "Exposure notification bluetooth");
    }

    #[test]
    fn short_corpus_is_marked() {
        let item = Item::new(1).with(ItemField::Title, "short title");
        assert_eq!(aggregator().aggregate(&item), Corpus::TooShort);
        assert_eq!(aggregator().aggregate(&Item::default()), Corpus::TooShort);

        let item = Item::new(2).with(ItemField::Title, "a long enough title");
        assert_eq!(
            aggregator().aggregate(&item),
            Corpus::Text("a long enough title".to_string())
        );
    }

    #[test]
    fn respects_field_selection() {
        let only_title = TextAggregator::new(vec![ItemField::Title], 1);
        let item = Item::new(1)
            .with(ItemField::Title, "Title")
            .with(ItemField::Abstract, "Abstract");
        assert_eq!(only_title.join(&item), "Title");
    }
}
