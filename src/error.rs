//! Error taxonomy for route optimization.
//!
//! Only [`OptimizeError`] ever reaches the caller of the orchestrator.
//! [`SolverError`] is caught inside the orchestrator and turned into a
//! degraded (heuristic) result unless it is an invalid shift.

use std::fmt;

/// Depot resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepotError {
    /// No explicit location and no stop with a valid coordinate.
    NoValidStops,
}

impl fmt::Display for DepotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepotError::NoValidStops => write!(f, "No stops with valid coordinates to anchor a depot"),
        }
    }
}

impl std::error::Error for DepotError {}

/// Remote solver failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// Credentials missing or token acquisition failed.
    Auth(String),
    /// Non-success HTTP status from the solver service.
    Http { status: u16, body: String },
    /// No solution within the allotted time.
    Timeout { seconds: u64 },
    /// A vehicle shift is not longer than the minimum.
    InvalidShift { vehicle_id: String, minutes: i64 },
    /// Transport-level failure (connect, TLS, read).
    Network(String),
    /// Unexpected response shape.
    Protocol(String),
    /// The service reported the problem as failed.
    Failed { status: String },
    /// Polling was abandoned because the caller cancelled.
    Cancelled,
}

impl SolverError {
    /// Whether the orchestrator may fall back to the heuristic router.
    ///
    /// ```
    /// use route_optimizer::error::SolverError;
    ///
    /// assert!(SolverError::Timeout { seconds: 90 }.is_recoverable());
    /// assert!(!SolverError::InvalidShift { vehicle_id: "v1".into(), minutes: 10 }.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SolverError::InvalidShift { .. })
    }

    /// Short machine-friendly kind, used in logs and DTOs.
    pub fn kind(&self) -> &'static str {
        match self {
            SolverError::Auth(_) => "auth",
            SolverError::Http { .. } => "http",
            SolverError::Timeout { .. } => "timeout",
            SolverError::InvalidShift { .. } => "invalid-shift",
            SolverError::Network(_) => "network",
            SolverError::Protocol(_) => "protocol",
            SolverError::Failed { .. } => "failed",
            SolverError::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Auth(msg) => write!(f, "Solver authentication failed: {}", msg),
            SolverError::Http { status, body } => {
                write!(f, "Solver returned HTTP {}: {}", status, body)
            }
            SolverError::Timeout { seconds } => {
                write!(f, "Solver did not finish within {}s", seconds)
            }
            SolverError::InvalidShift { vehicle_id, minutes } => write!(
                f,
                "Shift for vehicle {} lasts {} minutes; it must be longer than 30",
                vehicle_id, minutes
            ),
            SolverError::Network(msg) => write!(f, "Network error: {}", msg),
            SolverError::Protocol(msg) => write!(f, "Unexpected solver response: {}", msg),
            SolverError::Failed { status } => write!(f, "Solver reported status {}", status),
            SolverError::Cancelled => write!(f, "Solve cancelled"),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<reqwest::Error> for SolverError {
    fn from(e: reqwest::Error) -> Self {
        SolverError::Network(e.to_string())
    }
}

/// Blocking failure returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    /// Zero stops with a finite, in-range coordinate.
    NoValidStops,
    /// Zero vehicles supplied.
    NoVehicles,
    /// A vehicle shift is too short to plan; the vehicle must be reconfigured.
    InvalidShift { vehicle_id: String, minutes: i64 },
    /// The solver refused the problem with an error no fallback can cover.
    Rejected(SolverError),
}

impl OptimizeError {
    /// The vehicle this error is about, if any.
    pub fn vehicle_id(&self) -> Option<&str> {
        match self {
            OptimizeError::InvalidShift { vehicle_id, .. } => Some(vehicle_id),
            OptimizeError::Rejected(SolverError::InvalidShift { vehicle_id, .. }) => Some(vehicle_id),
            _ => None,
        }
    }
}

impl fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeError::NoValidStops => write!(f, "No stops with valid coordinates"),
            OptimizeError::NoVehicles => write!(f, "No vehicles supplied"),
            OptimizeError::InvalidShift { vehicle_id, minutes } => write!(
                f,
                "Invalid shift for vehicle {}: {} minutes (must exceed 30)",
                vehicle_id, minutes
            ),
            OptimizeError::Rejected(e) => write!(f, "Solver rejected the problem: {}", e),
        }
    }
}

impl std::error::Error for OptimizeError {}

impl From<DepotError> for OptimizeError {
    fn from(e: DepotError) -> Self {
        match e {
            DepotError::NoValidStops => OptimizeError::NoValidStops,
        }
    }
}

/// Unparsable configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
