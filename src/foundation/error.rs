use std::fmt;

/// Convenience result type used across sockbend.
pub type BendResult<T> = Result<T, BendError>;

/// Top-level error taxonomy used by the bending APIs.
#[derive(thiserror::Error, Debug)]
pub enum BendError {
    /// The input is not a usable fixed-header container (too short, bad payload offset).
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// An effect chain names an effect the engine does not provide.
    #[error("unknown effect '{name}'")]
    UnknownEffect {
        /// The unresolved effect name, as given.
        name: String,
    },

    /// The engine rejected the parameters of an effect chain.
    #[error("effect parameter error: {message} (chain: {chain})")]
    EffectParameter {
        /// What the engine reported.
        message: String,
        /// Dump of the chain that was attempted.
        chain: String,
    },

    /// A per-frame chain sequence does not line up with the frames available.
    #[error("frame count mismatch: expected {expected} effect chains, got {got}")]
    FrameCountMismatch {
        /// Number of frames in the sequence.
        expected: usize,
        /// Number of chains supplied.
        got: usize,
    },

    /// One or more frames of a sequence failed; every frame was still attempted.
    #[error("{} frame(s) failed: {}", .0.len(), FrameFailureList(.0))]
    Frames(Vec<FrameFailure>),

    /// Invalid user-provided input or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// The effect engine itself failed (spawn failure, timeout, broken pipe).
    #[error("engine error: {0}")]
    Engine(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BendError {
    /// Build a [`BendError::MalformedContainer`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedContainer(msg.into())
    }

    /// Build a [`BendError::UnknownEffect`] value.
    pub fn unknown_effect(name: impl Into<String>) -> Self {
        Self::UnknownEffect { name: name.into() }
    }

    /// Build a [`BendError::EffectParameter`] value without chain context.
    ///
    /// Engines attach the chain dump with [`BendError::with_chain`] once the failing chain is known.
    pub fn parameter(msg: impl Into<String>) -> Self {
        Self::EffectParameter {
            message: msg.into(),
            chain: String::new(),
        }
    }

    /// Build a [`BendError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BendError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Attach a chain dump to an [`BendError::EffectParameter`]; other variants pass through.
    pub fn with_chain(self, dump: impl Into<String>) -> Self {
        match self {
            Self::EffectParameter { message, .. } => Self::EffectParameter {
                message,
                chain: dump.into(),
            },
            other => other,
        }
    }
}

/// A single failed frame inside [`BendError::Frames`].
#[derive(Debug)]
pub struct FrameFailure {
    /// Position of the frame in the sequence.
    pub index: usize,
    /// Why the frame failed.
    pub error: BendError,
}

impl fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {}: {}", self.index, self.error)
    }
}

struct FrameFailureList<'a>(&'a [FrameFailure]);

impl fmt::Display for FrameFailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
