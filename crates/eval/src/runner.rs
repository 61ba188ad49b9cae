//! Document runner: turns a compiled document into its final text.
//!
//! 1. Each declared variable is rendered in declaration order. Scalars are
//!    printed, strings and pattern actions go through the pipeline engine,
//!    case matches pick an arm by the runtime value of their subject.
//! 2. `@file-func:<call>` inline commands written in the body are
//!    dispatched, and the text around them is interpolated with the
//!    rendered variables and the context. Substituted values are never
//!    scanned for commands.
//! 3. If the header names an agent, the text is streamed through it.
//!
//! Failures in steps 1 and 2 become diagnostic strings in place; only
//! cancellation aborts a run.

use regex::Regex;
use serde::Serialize;
use shire_core::symbols::canonical_name;
use shire_core::{interpolate, CompiledDocument, FrontMatterValue, PatternAction, PatternFun};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::agent::{stream_response, AgentError, AgentRegistry, Console, NullConsole, ResponseCache};
use crate::cancel::CancellationToken;
use crate::command::CommandDispatcher;
use crate::diagnostic::diagnostic;
use crate::pipeline::{
    render_bindings, select_candidates, InvokeError, ItemFailure, PipelineEngine, PipelineError,
    XargsInvoker,
};
use crate::source::{ItemSource, SourceError};

/// Prefix introducing an inline command in a document body.
pub const FILE_FUNC_PREFIX: &str = "@file-func:";

static FILE_FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@file-func:(\w+\([^)\n]*\))").expect("static inline command regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("run cancelled")]
    Cancelled,
}

// ──────────────────────────────────────────────
// RunContext
// ──────────────────────────────────────────────

/// Runtime values for built-in variables (`language`, `selection`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    values: BTreeMap<String, String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let key = canonical_name(name).to_string();
        self.values.insert(key, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(canonical_name(name))
            .map(String::as_str)
    }
}

// ──────────────────────────────────────────────
// RunOutput
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    /// Rendered text of every declared variable.
    pub variables: BTreeMap<String, String>,
    /// Body after interpolation and inline-command expansion.
    pub text: String,
    /// Per-item xargs failures across all variables.
    pub failures: Vec<ItemFailure>,
    /// Agent response, when the document names an agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

// ──────────────────────────────────────────────
// Xargs resolution
// ──────────────────────────────────────────────

/// Xargs invoker used by the runner: each item must still be eligible in
/// the item source; the result is its bindings as `name=value` pairs.
struct ResolveInvoker<'a> {
    source: &'a dyn ItemSource,
}

#[async_trait::async_trait]
impl XargsInvoker for ResolveInvoker<'_> {
    async fn invoke(
        &self,
        item: &str,
        bindings: &BTreeMap<String, String>,
    ) -> Result<String, InvokeError> {
        if !self.source.is_eligible(item).await {
            return Err(InvokeError::Unresolved(item.to_string()));
        }
        Ok(render_bindings(bindings))
    }
}

// ──────────────────────────────────────────────
// DocumentRunner
// ──────────────────────────────────────────────

pub struct DocumentRunner {
    source: Arc<dyn ItemSource>,
    agents: AgentRegistry,
    console: Arc<dyn Console>,
    cache: ResponseCache,
    cancel: CancellationToken,
}

impl DocumentRunner {
    pub fn new(source: Arc<dyn ItemSource>) -> Self {
        Self {
            source,
            agents: AgentRegistry::empty(),
            console: Arc::new(NullConsole),
            cache: ResponseCache::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_agents(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Run `doc`, loaded from `script_path`, against `ctx`.
    #[tracing::instrument(level = "debug", skip(self, doc, ctx))]
    pub async fn run(
        &self,
        script_path: &str,
        doc: &CompiledDocument,
        ctx: &RunContext,
    ) -> Result<RunOutput, RunError> {
        let mut out = RunOutput::default();
        let mut items: Option<Result<Vec<String>, SourceError>> = None;
        let invoker = ResolveInvoker {
            source: self.source.as_ref(),
        };
        let engine = PipelineEngine::new(&invoker).with_cancellation(self.cancel.clone());

        for decl in &doc.front_matter.variables {
            let rendered = match &decl.value {
                FrontMatterValue::Pattern(action) => {
                    self.run_action(&engine, action, &mut items, &out.variables, ctx)
                        .await
                }
                FrontMatterValue::CaseMatch(cm) => {
                    let observed = resolve_text(&cm.subject, &out.variables, ctx);
                    match cm.select(&observed) {
                        Some(action) => {
                            self.run_action(&engine, action, &mut items, &out.variables, ctx)
                                .await
                        }
                        None => {
                            tracing::debug!(variable = %decl.name, observed = %observed, "no case selected");
                            Ok(Rendered::default())
                        }
                    }
                }
                FrontMatterValue::String(_) => match PatternFun::from_value(&decl.value) {
                    Ok(processors) => match PatternAction::new(".*", processors) {
                        Ok(action) => {
                            let action = interpolate_prompts(&action, &out.variables, ctx);
                            run_engine(&engine, &action, Vec::new()).await
                        }
                        Err(e) => Ok(Rendered::text(diagnostic(e.message))),
                    },
                    Err(e) => Ok(Rendered::text(diagnostic(e.message))),
                },
                other => Ok(Rendered::text(render_plain(other))),
            };
            let rendered = rendered?;
            out.failures.extend(rendered.failures);
            out.variables
                .insert(canonical_name(&decl.name).to_string(), rendered.text);
        }

        out.text = self.expand_body(&doc.body, &out.variables, ctx).await?;

        if let Some(agent) = &doc.front_matter.agent {
            out.response = Some(self.hand_off(script_path, agent, &out.text).await?);
        }
        Ok(out)
    }

    async fn run_action(
        &self,
        engine: &PipelineEngine<'_>,
        action: &PatternAction,
        items: &mut Option<Result<Vec<String>, SourceError>>,
        variables: &BTreeMap<String, String>,
        ctx: &RunContext,
    ) -> Result<Rendered, RunError> {
        if items.is_none() {
            let enumerated = self
                .cancel
                .run_until_cancelled(self.source.enumerate())
                .await
                .ok_or(RunError::Cancelled)?;
            *items = Some(enumerated);
        }
        let all = match items.as_ref() {
            Some(Ok(all)) => all,
            Some(Err(e)) => return Ok(Rendered::text(diagnostic(e))),
            None => return Ok(Rendered::default()),
        };
        let candidates = match select_candidates(action.pattern(), all) {
            Ok(c) => c,
            Err(e) => return Ok(Rendered::text(diagnostic(e))),
        };
        let action = interpolate_prompts(action, variables, ctx);
        run_engine(engine, &action, candidates).await
    }

    /// Replace every `@file-func:<call>` in the authored `body` with its
    /// dispatch result and interpolate the text between calls.
    async fn expand_body(
        &self,
        body: &str,
        variables: &BTreeMap<String, String>,
        ctx: &RunContext,
    ) -> Result<String, RunError> {
        let dispatcher =
            CommandDispatcher::new(self.source.clone()).with_cancellation(self.cancel.clone());
        let mut expanded = String::with_capacity(body.len());
        let mut last = 0;
        for caps in FILE_FUNC_RE.captures_iter(body) {
            let (Some(whole), Some(call)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let result = dispatcher.execute(call.as_str()).await;
            if self.cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            expanded.push_str(&resolve_text(&body[last..whole.start()], variables, ctx));
            expanded.push_str(&result);
            last = whole.end();
        }
        expanded.push_str(&resolve_text(&body[last..], variables, ctx));
        Ok(expanded)
    }

    async fn hand_off(
        &self,
        script_path: &str,
        agent: &str,
        prompt: &str,
    ) -> Result<String, RunError> {
        let Some(executor) = self.agents.get(agent) else {
            tracing::warn!(agent, "no such agent");
            return Ok(diagnostic(AgentError::UnknownAgent(agent.to_string())));
        };
        let streamed = self
            .cancel
            .run_until_cancelled(stream_response(executor, prompt, self.console.as_ref()))
            .await
            .ok_or(RunError::Cancelled)?;
        match streamed {
            Ok(response) => {
                self.cache.put(script_path, response.clone());
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(agent, error = %e, "agent failed");
                Ok(diagnostic(e))
            }
        }
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct Rendered {
    text: String,
    failures: Vec<ItemFailure>,
}

impl Rendered {
    fn text(text: String) -> Self {
        Rendered {
            text,
            failures: Vec::new(),
        }
    }
}

async fn run_engine(
    engine: &PipelineEngine<'_>,
    action: &PatternAction,
    candidates: Vec<String>,
) -> Result<Rendered, RunError> {
    match engine.run(action, candidates).await {
        Ok(out) => Ok(Rendered {
            text: out.text,
            failures: out.failures,
        }),
        Err(PipelineError::Cancelled) => Err(RunError::Cancelled),
        Err(e) => {
            tracing::warn!(error = %e, "pipeline failed");
            Ok(Rendered::text(diagnostic(e)))
        }
    }
}

/// Interpolate against rendered variables first, then the context.
fn resolve_text(text: &str, variables: &BTreeMap<String, String>, ctx: &RunContext) -> String {
    interpolate(text, |name| {
        variables
            .get(name)
            .cloned()
            .or_else(|| ctx.get(name).map(str::to_string))
    })
}

fn interpolate_prompts(
    action: &PatternAction,
    variables: &BTreeMap<String, String>,
    ctx: &RunContext,
) -> PatternAction {
    action.map_processors(|p| match p {
        PatternFun::Prompt { message } => PatternFun::Prompt {
            message: resolve_text(message, variables, ctx),
        },
        other => other.clone(),
    })
}

/// Text form of a non-pipeline value.
fn render_plain(value: &FrontMatterValue) -> String {
    match value {
        FrontMatterValue::String(s) | FrontMatterValue::Date(s) => s.clone(),
        FrontMatterValue::Number(n) => n.to_string(),
        FrontMatterValue::Boolean(b) => b.to_string(),
        FrontMatterValue::Array(items) => items
            .iter()
            .map(render_plain)
            .collect::<Vec<_>>()
            .join(", "),
        FrontMatterValue::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, render_plain(v)))
            .collect::<Vec<_>>()
            .join(", "),
        FrontMatterValue::Pattern(action) => action
            .processors()
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" | "),
        FrontMatterValue::CaseMatch(cm) => format!("case {:?}", cm.subject),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
