use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable identifier supplied by the caller. Articles arrive keyed by number or by string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Text attributes of an article record that can feed the classification corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemField {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "abstract")]
    Abstract,
    #[serde(rename = "answer_1")]
    Answer1,
    #[serde(rename = "answer_2")]
    Answer2,
    #[serde(rename = "answer_3")]
    Answer3,
    #[serde(rename = "methodology")]
    Methodology,
    #[serde(rename = "keywords")]
    Keywords,
    #[serde(rename = "conclusions")]
    Conclusions,
    #[serde(rename = "results")]
    Results,
}

impl ItemField {
    pub const ALL: [Self; 9] = [
        Self::Title,
        Self::Abstract,
        Self::Answer1,
        Self::Answer2,
        Self::Answer3,
        Self::Methodology,
        Self::Keywords,
        Self::Conclusions,
        Self::Results,
    ];
}

/// An article record as handed over by the caller. The engine only reads it.
///
/// Field values may be strings, numbers, booleans, arrays of those (joined with spaces) or
/// null. The Spanish keys used by the mapping-study backend are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    #[serde(default, alias = "titulo", deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(
        default,
        rename = "abstract",
        alias = "resumen",
        deserialize_with = "lenient_text"
    )]
    pub abstract_text: Option<String>,
    #[serde(
        default,
        alias = "respuesta_subpregunta_1",
        deserialize_with = "lenient_text"
    )]
    pub answer_1: Option<String>,
    #[serde(
        default,
        alias = "respuesta_subpregunta_2",
        deserialize_with = "lenient_text"
    )]
    pub answer_2: Option<String>,
    #[serde(
        default,
        alias = "respuesta_subpregunta_3",
        deserialize_with = "lenient_text"
    )]
    pub answer_3: Option<String>,
    #[serde(default, alias = "metodologia", deserialize_with = "lenient_text")]
    pub methodology: Option<String>,
    #[serde(default, alias = "palabras_clave", deserialize_with = "lenient_text")]
    pub keywords: Option<String>,
    #[serde(default, alias = "conclusiones", deserialize_with = "lenient_text")]
    pub conclusions: Option<String>,
    #[serde(default, alias = "resultados", deserialize_with = "lenient_text")]
    pub results: Option<String>,
}

impl Item {
    #[must_use]
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with(mut self, field: ItemField, text: impl Into<String>) -> Self {
        *self.slot_mut(field) = Some(text.into());
        self
    }

    #[must_use]
    pub fn field(&self, field: ItemField) -> Option<&str> {
        match field {
            ItemField::Title => self.title.as_deref(),
            ItemField::Abstract => self.abstract_text.as_deref(),
            ItemField::Answer1 => self.answer_1.as_deref(),
            ItemField::Answer2 => self.answer_2.as_deref(),
            ItemField::Answer3 => self.answer_3.as_deref(),
            ItemField::Methodology => self.methodology.as_deref(),
            ItemField::Keywords => self.keywords.as_deref(),
            ItemField::Conclusions => self.conclusions.as_deref(),
            ItemField::Results => self.results.as_deref(),
        }
    }

    fn slot_mut(&mut self, field: ItemField) -> &mut Option<String> {
        match field {
            ItemField::Title => &mut self.title,
            ItemField::Abstract => &mut self.abstract_text,
            ItemField::Answer1 => &mut self.answer_1,
            ItemField::Answer2 => &mut self.answer_2,
            ItemField::Answer3 => &mut self.answer_3,
            ItemField::Methodology => &mut self.methodology,
            ItemField::Keywords => &mut self.keywords,
            ItemField::Conclusions => &mut self.conclusions,
            ItemField::Results => &mut self.results,
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ItemId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<usize> for ItemId {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Number)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_text))
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(values) => {
            let parts: Vec<String> = values.iter().filter_map(value_to_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
    }
}
