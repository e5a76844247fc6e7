pub mod handlers;

pub use handlers::{health, verify, verify_batch, AppState};
