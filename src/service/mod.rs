pub mod extractor;
pub mod matcher;
pub mod parser;
pub mod prompt;

pub use extractor::{ExtractError, GeminiExtractor};
pub use matcher::{error_results, evaluate, evaluate_batch};
pub use parser::{normalize_response, ParseStats, ParseStrategy};
