//! Typed rich-text tree and plain-text extraction.
//!
//! Source documents (Atlassian Document Format) are parsed once into a small
//! [`RichText`] tree. Flattening is a pure function over that tree.

use serde_json::Value;

use crate::error::{Error, Result};

/// Node types rendered on their own line by [`RichText::render_lines`].
const BLOCK_TYPES: &[&str] = &["paragraph", "heading", "codeBlock", "rule"];

/// A parsed rich-text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichText {
    /// Leaf text segment.
    Text(String),
    /// Node holding children. `block` marks paragraph-like nodes.
    Container {
        /// Whether the node is a line-level block.
        block: bool,
        /// Child nodes in document order.
        children: Vec<RichText>,
    },
}

impl RichText {
    /// Parses a rich-text document.
    ///
    /// Accepts ADF node objects and bare strings (legacy plain-text bodies).
    /// Nodes that carry neither text nor a type, non-array `content`, and
    /// scalar nodes are rejected with [`Error::ContentParse`].
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Object(node) => {
                if let Some(text) = node.get("text").and_then(Value::as_str) {
                    return Ok(Self::Text(text.to_string()));
                }

                let node_type = node
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::ContentParse("node has no type".to_string()))?;

                match node_type {
                    "hardBreak" => return Ok(Self::Text("\n".to_string())),
                    "mention" | "emoji" | "inlineCard" => {
                        let attrs = node.get("attrs");
                        let text = attrs
                            .and_then(|a| a.get("text").or_else(|| a.get("url")))
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        return Ok(Self::Text(text.to_string()));
                    }
                    _ => {}
                }

                let children = match node.get("content") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => {
                        items.iter().map(Self::parse).collect::<Result<Vec<_>>>()?
                    }
                    Some(_) => {
                        return Err(Error::ContentParse(format!(
                            "content of '{}' node is not an array",
                            node_type
                        )))
                    }
                };

                Ok(Self::Container {
                    block: BLOCK_TYPES.contains(&node_type),
                    children,
                })
            }
            other => Err(Error::ContentParse(format!(
                "expected a document node, found {}",
                json_kind(other)
            ))),
        }
    }

    /// Concatenates every leaf text segment in document order.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    /// Renders the tree with each block node on its own line.
    pub fn render_lines(&self) -> String {
        let mut out = String::new();
        self.collect_lines(&mut out);
        out.trim_end_matches('\n').to_string()
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Container { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    fn collect_lines(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Container { block, children } => {
                for child in children {
                    child.collect_lines(out);
                }
                if *block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
