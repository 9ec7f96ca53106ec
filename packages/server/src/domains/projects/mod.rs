//! Projects and tasks, plus intent analysis over their descriptions.

pub mod intent;
pub mod models;

pub use intent::{IntentAnalyzer, IntentOutcome, IntentSource, RuleBasedIntentAnalyzer};
pub use models::project::{Project, Task};
