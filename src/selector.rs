//! Minimal selector grammar for the markup query provider.
//!
//! The pipeline is configured with selectors identifying module, style,
//! script, template and import elements. Only the subset of CSS those
//! selectors actually need is supported: a tag name (or `*`), zero or more
//! attribute conditions (`[attr]` / `[attr=value]`), and comma-separated
//! alternatives.

use markup5ever_rcdom::{Handle, NodeData};

/// A parsed selector: one or more comma-separated alternatives.
#[derive(Debug, Clone)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone)]
struct Compound {
    tag: Option<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone)]
struct AttrCondition {
    name: String,
    value: Option<String>,
}

impl Selector {
    /// Parse a selector string. Returns a human-readable message on
    /// malformed input; callers wrap it into a configuration error.
    pub fn parse(input: &str) -> Result<Selector, String> {
        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("empty alternative in selector '{}'", input));
            }
            alternatives.push(Compound::parse(part)?);
        }
        Ok(Selector { alternatives })
    }

    /// Test a single element node against this selector.
    pub fn matches(&self, handle: &Handle) -> bool {
        let NodeData::Element { name, attrs, .. } = &handle.data else {
            return false;
        };
        let tag = name.local.as_ref();
        let attrs = attrs.borrow();

        self.alternatives.iter().any(|alt| {
            if let Some(expected) = &alt.tag {
                if expected != tag {
                    return false;
                }
            }
            alt.attrs.iter().all(|cond| {
                attrs
                    .iter()
                    .find(|a| a.name.local.as_ref() == cond.name)
                    .map_or(false, |a| match &cond.value {
                        Some(v) => a.value.as_ref() == v,
                        None => true,
                    })
            })
        })
    }
}

impl Compound {
    fn parse(input: &str) -> Result<Compound, String> {
        let bytes = input.as_bytes();
        let mut pos = 0;

        // leading tag name or universal
        while pos < bytes.len() && bytes[pos] != b'[' {
            pos += 1;
        }
        let head = input[..pos].trim();
        let tag = match head {
            "" | "*" => None,
            name if name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-') =>
            {
                Some(name.to_ascii_lowercase())
            }
            other => return Err(format!("invalid tag name '{}' in selector", other)),
        };

        let mut attrs = Vec::new();
        let mut rest = &input[pos..];
        while !rest.is_empty() {
            if !rest.starts_with('[') {
                return Err(format!("unexpected '{}' in selector '{}'", rest, input));
            }
            let end = rest
                .find(']')
                .ok_or_else(|| format!("unterminated attribute condition in '{}'", input))?;
            let body = &rest[1..end];
            let (name, value) = match body.split_once('=') {
                Some((n, v)) => {
                    let v = v.trim_matches(|c| c == '"' || c == '\'');
                    (n.trim(), Some(v.to_string()))
                }
                None => (body.trim(), None),
            };
            if name.is_empty() {
                return Err(format!("empty attribute name in selector '{}'", input));
            }
            attrs.push(AttrCondition {
                name: name.to_ascii_lowercase(),
                value,
            });
            rest = &rest[end + 1..];
        }

        Ok(Compound { tag, attrs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn first_element(doc: &Document, tag: &str) -> Handle {
        let sel = Selector::parse(tag).unwrap();
        doc.select(&sel).into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_tag_only() {
        let sel = Selector::parse("template").unwrap();
        let doc = Document::parse("<template></template>");
        assert_eq!(doc.select(&sel).len(), 1);
    }

    #[test]
    fn test_parse_attribute_conditions() {
        let sel = Selector::parse("link[rel=import][href]").unwrap();
        let doc = Document::parse(
            "<link rel=\"import\" href=\"x.html\">\
             <link rel=\"stylesheet\" href=\"x.css\">\
             <link rel=\"import\">",
        );
        let hits = doc.select(&sel);
        assert_eq!(hits.len(), 1);
        assert_eq!(crate::dom::attr(&hits[0], "href").as_deref(), Some("x.html"));
    }

    #[test]
    fn test_parse_alternatives() {
        let sel = Selector::parse("template, link[rel=template][href]").unwrap();
        let doc = Document::parse(
            "<template id=\"a\"></template><link rel=\"template\" href=\"b.html\">",
        );
        assert_eq!(doc.select(&sel).len(), 2);
    }

    #[test]
    fn test_quoted_attribute_value() {
        let sel = Selector::parse("link[rel=\"import\"]").unwrap();
        let doc = Document::parse("<link rel=\"import\" href=\"x.html\">");
        assert_eq!(doc.select(&sel).len(), 1);
    }

    #[test]
    fn test_malformed_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("a, ").is_err());
        assert!(Selector::parse("link[rel").is_err());
        assert!(Selector::parse("li nk").is_err());
    }

    #[test]
    fn test_matches_non_element() {
        let doc = Document::parse("<div>text</div>");
        let div = first_element(&doc, "div");
        let text = div.children.borrow()[0].clone();
        let sel = Selector::parse("*").unwrap();
        assert!(!sel.matches(&text));
    }
}
