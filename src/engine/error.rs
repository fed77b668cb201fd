use ulid::Ulid;

use crate::model::AppointmentStatus;

#[derive(Debug)]
pub enum EngineError {
    InvalidTimeFormat(String),
    Validation(String),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    InUse(Ulid),
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    /// Commit-time guard tripped: the slot was taken by this appointment.
    ConcurrencyConflict(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Malformed or missing input, rejected before touching any state.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::InvalidTimeFormat(_) | EngineError::Validation(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidTimeFormat(s) => write!(f, "invalid time format: {s:?} (expected HH:MM)"),
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InUse(id) => write!(f, "cannot delete {id}: still reserved by appointments"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition {from} -> {to}")
            }
            EngineError::ConcurrencyConflict(id) => {
                write!(f, "slot already taken by appointment {id}; re-check conflicts")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
