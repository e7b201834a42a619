use anyhow::{Context, Result};
use litmap_classifier::Item;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsDocument {
    List(Vec<Item>),
    Wrapped { items: Vec<Item> },
}

/// Reads items from a file, or from stdin when `source` is `-`.
pub(crate) fn read_items(source: &Path) -> Result<Vec<Item>> {
    let bytes = if source == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read items from stdin")?;
        buf
    } else {
        std::fs::read(source)
            .with_context(|| format!("Failed to read items file {}", source.display()))?
    };
    parse_items(&bytes).with_context(|| format!("Invalid items input {}", source.display()))
}

fn parse_items(bytes: &[u8]) -> Result<Vec<Item>> {
    let document: ItemsDocument = serde_json::from_slice(bytes)
        .context("expected a JSON array of items or an object with an \"items\" array")?;
    Ok(match document {
        ItemsDocument::List(items) | ItemsDocument::Wrapped { items } => items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_and_wrapped_lists() {
        let bare = parse_items(br#"[{"title": "a"}, {"title": "b"}]"#).unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped = parse_items(br#"{"items": [{"titulo": "c"}]}"#).unwrap();
        assert_eq!(wrapped[0].title.as_deref(), Some("c"));
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_items(br#"{"articles": []}"#).is_err());
        assert!(parse_items(b"not json").is_err());
    }
}
