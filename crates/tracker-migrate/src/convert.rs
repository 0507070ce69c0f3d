//! Description conversion into the destination's text format.

use serde_json::Value;

use crate::error::Result;
use crate::richtext::RichText;

/// Converts a source description document into destination text.
pub trait DescriptionConverter: Send + Sync {
    /// Renders `document`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ContentParse`] for malformed documents.
    fn convert(&self, document: &Value) -> Result<String>;
}

/// Renders each paragraph-like node on its own line, dropping formatting.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextConverter;

impl DescriptionConverter for PlainTextConverter {
    fn convert(&self, document: &Value) -> Result<String> {
        RichText::parse(document).map(|tree| tree.render_lines())
    }
}
