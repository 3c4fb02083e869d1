//! Composite query items from the search box.
//!
//! Each item is free text or a tagged reference: `m_<ref>` for a manufacturer,
//! `c_<ref>` for a color, where `<ref>` is an id or a name.

use crate::reference::{ReferenceInput, ReferenceTag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Text(String),
    Manufacturer(String),
    Color(String),
}

impl QueryToken {
    #[must_use]
    pub fn parse(item: &str) -> Self {
        let item = item.trim();
        for tag in [ReferenceTag::Manufacturer, ReferenceTag::Color] {
            if let Some(reference) = item.strip_prefix(tag.token_prefix()) {
                let reference = reference.trim().to_string();
                return match tag {
                    ReferenceTag::Manufacturer => Self::Manufacturer(reference),
                    ReferenceTag::Color => Self::Color(reference),
                };
            }
        }
        Self::Text(item.to_string())
    }
}

/// Query items split by kind in a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedQuery {
    /// Untagged items joined with spaces; `None` when there were none.
    pub text: Option<String>,
    pub manufacturers: Vec<ReferenceInput>,
    pub colors: Vec<ReferenceInput>,
}

impl TokenizedQuery {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        let mut text = Vec::new();
        let mut tokenized = Self::default();
        for token in items.into_iter().map(QueryToken::parse) {
            match token {
                QueryToken::Text(t) if t.is_empty() => {}
                QueryToken::Text(t) => text.push(t),
                QueryToken::Manufacturer(m) => tokenized.manufacturers.push(m.into()),
                QueryToken::Color(c) => tokenized.colors.push(c.into()),
            }
        }
        tokenized.text = (!text.is_empty()).then(|| text.join(" "));
        tokenized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(QueryToken::parse("m_14"), QueryToken::Manufacturer("14".into()));
        assert_eq!(QueryToken::parse(" c_3 "), QueryToken::Color("3".into()));
        assert_eq!(QueryToken::parse("m_Surly"), QueryToken::Manufacturer("Surly".into()));
        assert_eq!(QueryToken::parse("blue bike"), QueryToken::Text("blue bike".into()));
        // Tags are case sensitive and must lead
        assert_eq!(QueryToken::parse("M_14"), QueryToken::Text("M_14".into()));
        assert_eq!(QueryToken::parse("xm_14"), QueryToken::Text("xm_14".into()));
    }

    #[test]
    fn test_split_items() {
        let tokenized = TokenizedQuery::from_items(["blue bike", "m_14", "c_3", "", "basket"]);
        assert_eq!(tokenized.text.as_deref(), Some("blue bike basket"));
        assert_eq!(tokenized.manufacturers, vec![ReferenceInput::from("14")]);
        assert_eq!(tokenized.colors, vec![ReferenceInput::from("3")]);
    }

    #[test]
    fn test_only_tagged_items_leave_no_text() {
        let tokenized = TokenizedQuery::from_items(["m_1", "m_2"]);
        assert_eq!(tokenized.text, None);
        assert_eq!(tokenized.manufacturers.len(), 2);
    }
}
