/// Semantic error class. This is deliberately coarser than a
/// typed error hierarchy per component: every absorbed/counted failure path
/// in the core reports one of these four kinds, which is what drives
/// propagation policy (log-and-absorb vs DLQ vs process abort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Network blips, rate-limit, L2 timeout — retry class, never surfaced
    /// to the caller beyond a benign empty result.
    Transient,
    /// Malformed input: decoder failure, schema mismatch, out-of-range
    /// profit. Stream consumers move these to the DLQ.
    Invalid,
    /// Would exceed a budget: worker pool saturated, warming already
    /// in-flight.
    Capacity,
    /// Program-invariant violation. The process aborts after flushing logs;
    /// supervision restarts it.
    Fatal
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind:    ErrorKind,
    pub message: String,
    #[source]
    pub source:  Option<eyre::Report>
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: eyre::Report) -> Self {
        Self { kind, message: message.into(), source: Some(source) }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Capacity, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Fatal)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
