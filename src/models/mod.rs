pub mod extraction;
pub mod verification;

pub use extraction::{sanitize_batch, ExtractionRecord};
pub use verification::{BatchSummary, EntryVerification, MatchResult, MatchStatus};
