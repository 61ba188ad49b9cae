//! Shire evaluator -- runs compiled scripts against a project.
//!
//! The evaluator consumes [`shire_core::CompiledDocument`]s (not raw text),
//! enumerates candidate items from an [`ItemSource`], runs pattern
//! pipelines, expands inline commands and optionally hands the result to
//! an agent.
//!
//! Failures inside pipelines and inline commands never abort a run; they
//! surface as diagnostic strings (see [`diagnostic`]).

pub mod actions;
pub mod agent;
pub mod cancel;
pub mod command;
pub mod diagnostic;
pub mod pipeline;
pub mod runner;
pub mod source;

pub use actions::{ActionRegistry, ActionSummary, ShireAction};
pub use agent::{
    AgentError, AgentExecutor, AgentRegistry, BufferConsole, Console, EchoAgent, NullConsole,
    ResponseCache, StdoutConsole,
};
pub use cancel::CancellationToken;
pub use command::{parse_call, Call, CommandDispatcher, CommandError, FileFunc};
pub use diagnostic::{diagnostic, is_diagnostic, SHIRE_ERROR};
pub use pipeline::{
    select_candidates, InvokeError, ItemFailure, PipelineEngine, PipelineError, PipelineOutput,
    XargsInvoker,
};
pub use runner::{DocumentRunner, RunContext, RunError, RunOutput};
pub use source::{FileSystemSource, ItemSource, SourceError, StaticItemSource};

/// Dispatch one inline command against `source`.
///
/// Convenience wrapper over [`CommandDispatcher::execute`]; the result is
/// either the command's output or a diagnostic string.
pub async fn execute_command(source: std::sync::Arc<dyn ItemSource>, text: &str) -> String {
    CommandDispatcher::new(source).execute(text).await
}
