pub mod annotation_parser;
pub mod grammar;
pub mod line_rewriter;

pub use annotation_parser::{Annotation, parse_line, parse_records};
pub use grammar::AnnotationGrammar;
pub use line_rewriter::{LineEdit, RewriteError, set_priority, toggle_pin};
