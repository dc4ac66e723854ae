use std::{path::Path, sync::Mutex};

/// Structured events emitted by sessions and sequences.
///
/// Callers decide where these go by handing a [`DiagnosticSink`] to the session options; the
/// library never configures logging on its own.
#[derive(Debug)]
pub enum Diagnostic<'a> {
    /// A non-native input was converted to the native container before separation.
    Converted {
        /// Original input path.
        from: &'a Path,
        /// Path of the converted native file.
        to: &'a Path,
    },
    /// A session separated its input.
    Separated {
        /// Native input path.
        input: &'a Path,
        /// Header length in bytes.
        header_len: usize,
        /// Body length in bytes; fixed for the session lifetime.
        body_len: usize,
    },
    /// A bend is about to run.
    Bending {
        /// Native input path.
        input: &'a Path,
        /// Destination path.
        output: &'a Path,
        /// Number of effects in the chain.
        effects: usize,
    },
    /// The engine output had to be truncated or padded.
    Rescaled {
        /// Engine output length.
        from: usize,
        /// Session body length.
        to: usize,
    },
    /// The engine rejected the chain's parameters.
    ParameterRejected {
        /// Native input path.
        input: &'a Path,
        /// Engine message.
        message: &'a str,
        /// Dump of the attempted chain.
        chain: &'a str,
    },
    /// One frame of a sequence failed; its siblings keep going.
    FrameFailed {
        /// Frame position.
        index: usize,
        /// Rendered error.
        error: &'a str,
    },
    /// An animated container was written.
    Animated {
        /// Output path.
        output: &'a Path,
        /// Number of frames assembled.
        frames: usize,
    },
}

/// Receiver for [`Diagnostic`] events.
pub trait DiagnosticSink: Send + Sync {
    /// Handle one event.
    fn emit(&self, diagnostic: &Diagnostic<'_>);
}

/// Default sink: forwards every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic<'_>) {
        match diagnostic {
            Diagnostic::Converted { from, to } => {
                tracing::debug!(from = %from.display(), to = %to.display(), "converted to bmp");
            }
            Diagnostic::Separated {
                input,
                header_len,
                body_len,
            } => {
                tracing::debug!(input = %input.display(), header_len, body_len, "separated");
            }
            Diagnostic::Bending {
                input,
                output,
                effects,
            } => {
                tracing::info!(
                    input = %input.display(),
                    output = %output.display(),
                    effects,
                    "bending"
                );
            }
            Diagnostic::Rescaled { from, to } => {
                tracing::debug!(from, to, "rescaled body");
            }
            Diagnostic::ParameterRejected {
                input,
                message,
                chain,
            } => {
                tracing::error!(
                    input = %input.display(),
                    message,
                    chain,
                    "engine rejected effect parameters, probably out of range"
                );
            }
            Diagnostic::FrameFailed { index, error } => {
                tracing::error!(index, error, "frame failed");
            }
            Diagnostic::Animated { output, frames } => {
                tracing::info!(output = %output.display(), frames, "saved animation");
            }
        }
    }
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: &Diagnostic<'_>) {}
}

/// Sink that records the `Debug` rendering of every event, mostly for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<String> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: &Diagnostic<'_>) {
        let line = format!("{diagnostic:?}");
        match self.events.lock() {
            Ok(mut events) => events.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}
