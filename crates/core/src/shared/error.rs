use thiserror::Error;

/// Failure kinds of a frame pipeline run.
///
/// Every variant is fatal for the run. The only non-error outcomes for
/// "nothing to do" are an empty detection set and a rescaled box that
/// collapsed to zero area, neither of which is represented here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnonymizeError {
    /// The execution backend is unavailable or returned unusable output.
    #[error("inference failed: {0}")]
    InferenceFailure(String),
    /// Output tensors do not match the stride/layout the decoder expects.
    #[error("decoder invariant violated: {0}")]
    DecodeInvariantViolation(String),
    #[error("frame source failed: {0}")]
    SourceFailure(String),
    #[error("frame sink failed: {0}")]
    SinkFailure(String),
}

impl AnonymizeError {
    pub fn inference(err: impl std::fmt::Display) -> Self {
        Self::InferenceFailure(err.to_string())
    }

    pub fn source(err: impl std::fmt::Display) -> Self {
        Self::SourceFailure(err.to_string())
    }

    pub fn sink(err: impl std::fmt::Display) -> Self {
        Self::SinkFailure(err.to_string())
    }
}

/// A halted run: the error that stopped it and the index of the last
/// frame the sink accepted (`None` if no frame made it through).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error} (last completed frame: {})", display_last(.last_completed))]
pub struct PipelineAbort {
    pub last_completed: Option<usize>,
    #[source]
    pub error: AnonymizeError,
}

fn display_last(last: &Option<usize>) -> String {
    match last {
        Some(i) => i.to_string(),
        None => "none".to_string(),
    }
}

/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("threshold must be between 0.0 and 1.0, got {0}")]
    Threshold(f64),
    #[error("mask scale must be a finite value >= 1.0, got {0}")]
    MaskScale(f64),
    #[error("inference size must be non-zero, got {0}x{1}")]
    ZeroSize(u32, u32),
    #[error("expected a size like 640x360, got '{0}'")]
    MalformedSize(String),
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
