//! Unified error types for the analytics engine.
//!
//! Error codes:
//! - NF_001-004: Unknown KPI, dashboard, report template, or customer
//! - INPUT_001-004: Rejected before any computation
//! - QUERY_001-002: Query template or execution failures
//! - DB_001-002: Fact store / analytic store failures
//!
//! Insufficient data is deliberately absent: it is an expected steady state
//! and is modelled as a result variant (see `ForecastOutcome`).

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Not-found error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundCode {
    /// NF_001: KPI definition does not exist for the tenant
    Kpi,
    /// NF_002: Dashboard does not exist for the tenant
    Dashboard,
    /// NF_003: Report template does not exist for the tenant
    ReportTemplate,
    /// NF_004: Customer has no facts
    Customer,
}

impl NotFoundCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Kpi => "NF_001",
            Self::Dashboard => "NF_002",
            Self::ReportTemplate => "NF_003",
            Self::Customer => "NF_004",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        404
    }
}

/// Invalid input error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputErrorCode {
    /// INPUT_001: Unknown or inverted date range
    InvalidDateRange,
    /// INPUT_002: Unknown customer segment
    UnknownSegment,
    /// INPUT_003: Out-of-range request parameter
    InvalidParameter,
    /// INPUT_004: Definition failed validation
    InvalidDefinition,
}

impl InputErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDateRange => "INPUT_001",
            Self::UnknownSegment => "INPUT_002",
            Self::InvalidParameter => "INPUT_003",
            Self::InvalidDefinition => "INPUT_004",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Query error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    /// QUERY_001: Template is malformed or has unbound placeholders
    MalformedTemplate,
    /// QUERY_002: Store rejected or failed the query
    ExecutionFailed,
}

impl QueryErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedTemplate => "QUERY_001",
            Self::ExecutionFailed => "QUERY_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedTemplate => 400,
            Self::ExecutionFailed => 502,
        }
    }
}

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Failed to read facts or analytic records
    ReadFailed,
    /// DB_002: Failed to upsert analytic records
    WriteFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed => "DB_001",
            Self::WriteFailed => "DB_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Unified error type for the analytics engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown entity. Surfaced to the caller, never retried.
    #[error("[{code}] {message}")]
    NotFound {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Rejected before computation.
    #[error("[{code}] {message}")]
    InvalidInput {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Malformed query or underlying execution failure.
    #[error("[{code}] {message}")]
    QueryExecution {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Store read/write failure.
    #[error("[{code}] {message}")]
    Database {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(code: NotFoundCode, msg: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(code: InputErrorCode, msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a query error.
    pub fn query(code: QueryErrorCode, msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn invalid_tenant(msg: impl Into<String>) -> Self {
        Self::InvalidTenant(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is an `InvalidInput` error.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { http_status, .. } => *http_status,
            Self::InvalidInput { http_status, .. } => *http_status,
            Self::QueryExecution { http_status, .. } => *http_status,
            Self::Database { http_status, .. } => *http_status,
            Self::Serialization(_) => 500,
            Self::InvalidTenant(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { code, .. } => Some(code),
            Self::InvalidInput { code, .. } => Some(code),
            Self::QueryExecution { code, .. } => Some(code),
            Self::Database { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::invalid_input(InputErrorCode::InvalidDefinition, err.to_string())
    }
}
