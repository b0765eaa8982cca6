//! The LEAP orchestration loop.
//!
//! A planning model picks one tool per turn from a minimal catalogue; a
//! smaller execution model trims the tool's result down to the fields the
//! planner asked for; the planning model then folds the trimmed result
//! into a rolling summary. The next plan sees only the catalogue, the
//! query and that summary, so the prompt stays the same size no matter
//! how many turns have run.
//!
//! 1. **Plan**: one JSON tool call, or `{"tool": null}` to stop
//! 2. **Execute**: run the tool, then filter its output
//! 3. **Update state**: merge the filtered result into the summary
//! 4. Repeat until the planner stops or the turn limit is hit, then
//!    answer from the summary alone

pub mod catalogue;
pub mod filter;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod stream;
pub mod summarizer;
pub mod text;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use catalogue::{Catalogue, estimate_tokens};
pub use filter::{FilterMethod, Filtered, ResultFilter};
pub use orchestrator::{AnswerSink, Orchestrator, OrchestratorSettings, RunOutcome, Terminal};
pub use parser::{ParsedResponse, parse as parse_response, strip_reasoning};
pub use stream::ReasoningFilter;
pub use summarizer::{INITIAL_SUMMARY, RollingSummarizer};
