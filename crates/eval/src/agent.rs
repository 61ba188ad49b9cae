//! Agent hand-off: streaming executors, console sink, response cache.
//!
//! A document whose header names an `agent` sends its final text to the
//! registered [`AgentExecutor`] of that name. Executors stream response
//! chunks over a tokio channel; the runner forwards each chunk to a
//! [`Console`] and stores the assembled response in a [`ResponseCache`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Buffer size of the chunk channel between an executor and the runner.
pub const CHUNK_BUFFER: usize = 32;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("agent '{agent}' failed: {message}")]
    Failed { agent: String, message: String },

    #[error("agent '{0}' stopped reading chunks")]
    Disconnected(String),
}

// ──────────────────────────────────────────────
// Executors
// ──────────────────────────────────────────────

/// A language-model backend (or stand-in) that answers a prompt.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Stream the response to `prompt` as chunks on `chunks`. The stream
    /// ends when the sender is dropped.
    async fn execute(&self, prompt: &str, chunks: mpsc::Sender<String>) -> Result<(), AgentError>;
}

/// Streams the prompt back line by line. Used for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoAgent;

impl EchoAgent {
    pub const NAME: &'static str = "echo";
}

#[async_trait]
impl AgentExecutor for EchoAgent {
    async fn execute(&self, prompt: &str, chunks: mpsc::Sender<String>) -> Result<(), AgentError> {
        for line in prompt.split_inclusive('\n') {
            chunks
                .send(line.to_string())
                .await
                .map_err(|_| AgentError::Disconnected(Self::NAME.to_string()))?;
        }
        Ok(())
    }
}

/// Executors by name.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Box<dyn AgentExecutor>>,
}

impl AgentRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding only [`EchoAgent`] under `"echo"`.
    pub fn with_echo() -> Self {
        let mut registry = Self::empty();
        registry.register(EchoAgent::NAME, Box::new(EchoAgent));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, executor: Box<dyn AgentExecutor>) {
        self.agents.insert(name.into(), executor);
    }

    pub fn get(&self, name: &str) -> Option<&dyn AgentExecutor> {
        self.agents.get(name).map(|a| a.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ──────────────────────────────────────────────
// Console
// ──────────────────────────────────────────────

/// Sink for streamed chunks as they arrive.
pub trait Console: Send + Sync {
    fn print(&self, chunk: &str);
}

/// Discards every chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn print(&self, _chunk: &str) {}
}

/// Writes chunks to stdout as they arrive.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn print(&self, chunk: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout only loses the live echo; the response is still cached.
        let _ = out.write_all(chunk.as_bytes()).and_then(|_| out.flush());
    }
}

/// Keeps every chunk in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<String> {
        self.chunks.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Console for BufferConsole {
    fn print(&self, chunk: &str) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(chunk.to_string());
        }
    }
}

// ──────────────────────────────────────────────
// ResponseCache
// ──────────────────────────────────────────────

/// Last agent response per script path. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, script_path: &str, response: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(script_path.to_string(), response);
        }
    }

    pub fn get(&self, script_path: &str) -> Option<String> {
        self.entries.lock().ok()?.get(script_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `executor` on `prompt`, forwarding chunks to `console` and
/// returning the assembled response.
pub async fn stream_response(
    executor: &dyn AgentExecutor,
    prompt: &str,
    console: &dyn Console,
) -> Result<String, AgentError> {
    let (tx, mut rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    let collect = async {
        let mut response = String::new();
        while let Some(chunk) = rx.recv().await {
            console.print(&chunk);
            response.push_str(&chunk);
        }
        response
    };
    let (result, response) = tokio::join!(executor.execute(prompt, tx), collect);
    result?;
    Ok(response)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
