//! Comment rollup: a source thread becomes one attributed text block.

use crate::model::SourceComment;
use crate::report::{Failure, Operation};
use crate::richtext::RichText;

/// Result of rolling up a comment thread.
#[derive(Debug, Clone, Default)]
pub struct CommentRollup {
    /// Rendered text. Empty when there was nothing to post.
    pub text: String,
    /// Number of comments included.
    pub included: usize,
    /// Comments skipped because their body could not be parsed.
    pub failures: Vec<Failure>,
}

impl CommentRollup {
    /// Whether there is anything to post.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Renders comments as `"{author}: {text}\n"` lines in source order.
///
/// A comment whose body cannot be parsed is skipped and reported; the rest are
/// still rendered.
pub fn aggregate(comments: &[SourceComment]) -> CommentRollup {
    let mut rollup = CommentRollup::default();

    for (index, comment) in comments.iter().enumerate() {
        match RichText::parse(&comment.body) {
            Ok(body) => {
                rollup.text.push_str(&comment.author);
                rollup.text.push_str(": ");
                rollup.text.push_str(&body.plain_text());
                rollup.text.push('\n');
                rollup.included += 1;
            }
            Err(e) => {
                let mut failure = Failure::from_error(Operation::AggregateComments, &e);
                failure.message = format!(
                    "comment #{} by {} skipped: {}",
                    index + 1,
                    comment.author,
                    failure.message
                );
                rollup.failures.push(failure);
            }
        }
    }

    rollup
}
