use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Workflow error: {message}")]
    WorkflowError { message: String },

    #[error("Generation server returned {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("No images found in the generation history outputs")]
    NoImagesError,

    #[error("Generation did not finish after {waited_secs:.1}s ({polls} polls)")]
    TimeoutError { waited_secs: f64, polls: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Workflow,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CourierError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::ServerError { .. } | Self::TimeoutError { .. } => {
                ErrorCategory::Network
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::WorkflowError { .. } | Self::NoImagesError | Self::SerializationError(_) => {
                ErrorCategory::Workflow
            }
            Self::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TimeoutError { .. } => ErrorSeverity::Medium,
            Self::ApiError(_) | Self::ServerError { .. } => ErrorSeverity::Medium,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::WorkflowError { .. } | Self::NoImagesError | Self::SerializationError(_) => {
                ErrorSeverity::High
            }
            Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ApiError(_) => {
                "Check that the generation server is running and the URL is reachable".to_string()
            }
            Self::ServerError { status, .. } => format!(
                "The server rejected the request (HTTP {}). Inspect the server console for node errors",
                status
            ),
            Self::TimeoutError { .. } => {
                "Check the server console for errors (OOM/VRAM issues) and retry".to_string()
            }
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. }
            | Self::MissingConfigError { field } => {
                format!("Fix the '{}' setting and run again", field)
            }
            Self::WorkflowError { .. } => {
                "Verify the workflow file is API-format JSON with the expected marker titles"
                    .to_string()
            }
            Self::NoImagesError => {
                "The workflow ran but produced no image outputs; check its SaveImage node"
                    .to_string()
            }
            Self::SerializationError(_) => {
                "The workflow file or server response is not valid JSON".to_string()
            }
            Self::IoError(_) => "Check file paths and disk permissions".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) => "Could not reach the generation server".to_string(),
            Self::ServerError { message, .. } => format!("Generation server error: {}", message),
            Self::TimeoutError { waited_secs, .. } => format!(
                "The server did not return a result after {:.0}s",
                waited_secs
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CourierError>;
