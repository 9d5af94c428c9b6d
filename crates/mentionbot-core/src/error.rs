//! Error families shared by every mentionbot crate.
//!
//! Two kinds of failure travel through the command path and they are kept
//! structurally apart:
//!
//! - [`CommandSignal`]: expected control flow raised on purpose by handler
//!   code (unknown command, bad arguments, missing privilege, ...). The
//!   top-level pipeline turns each one into a canned reply.
//! - Faults: anything else, carried as [`anyhow::Error`]. Module faults are
//!   contained by the module wrapper; faults escaping the server instance are
//!   fatal.
//!
//! [`CommandError`] is the only place where the two meet, and callers are
//! expected to `match` on it rather than convert one family into the other.

use thiserror::Error;

// =============================================================================
// Command Signals
// =============================================================================

/// Expected, recoverable conditions raised deliberately by command handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandSignal {
    /// The first word did not name any command.
    #[error("unknown command")]
    UnknownCommand,

    /// Same as [`UnknownCommand`](Self::UnknownCommand), but no reply is sent.
    #[error("unknown command (silent)")]
    SilentUnknownCommand,

    /// The command exists but its arguments could not be understood.
    ///
    /// Carries an optional custom reply replacing the generic one.
    #[error("invalid command arguments")]
    InvalidArguments(Option<String>),

    /// The caller's privilege level is below the command's minimum.
    #[error("insufficient privilege")]
    PrivilegeError,

    /// A help lookup found nothing to show.
    #[error("no help content exists")]
    NoHelpContent,

    /// The handler already told the user what went wrong.
    #[error("operation aborted")]
    OperationAborted,
}

impl CommandSignal {
    /// Invalid arguments with a custom reply.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArguments(Some(message.into()))
    }

    /// The user-facing reply for this signal, or `None` for silent signals.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            Self::UnknownCommand => Some("Error: Unknown command.".to_string()),
            Self::SilentUnknownCommand | Self::OperationAborted => None,
            Self::InvalidArguments(None) => Some("Error: Invalid command arguments.".to_string()),
            Self::InvalidArguments(Some(message)) => Some(message.clone()),
            Self::PrivilegeError => Some("Error: Permission denied.".to_string()),
            Self::NoHelpContent => Some("No help content exists.".to_string()),
        }
    }
}

/// Error returned by anything on the command path.
#[derive(Debug, Error)]
pub enum CommandError {
    /// An expected signal to be converted into a reply.
    #[error(transparent)]
    Signal(#[from] CommandSignal),

    /// An unexpected fault.
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl CommandError {
    /// Wraps any error as a fault.
    pub fn fault<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Fault(anyhow::Error::new(err))
    }

    /// Returns the signal if this is one.
    pub fn as_signal(&self) -> Option<&CommandSignal> {
        match self {
            Self::Signal(signal) => Some(signal),
            Self::Fault(_) => None,
        }
    }

    /// Returns `true` for faults.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

impl From<TransportError> for CommandError {
    fn from(err: TransportError) -> Self {
        Self::fault(err)
    }
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        Self::fault(err)
    }
}

// =============================================================================
// Record Errors
// =============================================================================

/// Lookup failures on privilege tables and similar records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// No entry is known under the given name.
    #[error("'{0}' does not exist")]
    DoesNotExist(String),

    /// Removal was requested for a record that is not there.
    #[error("no record exists for '{0}'")]
    NoRecordExists(String),

    /// A numeric value is outside the accepted range.
    #[error("value {0} is out of range")]
    OutOfRange(i64),
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by a [`ChatClient`](crate::ChatClient) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Message send failed.
    #[error("failed to send message to '{destination}': {reason}")]
    SendFailed {
        /// Channel or user the message was addressed to.
        destination: String,
        /// Reason for failure.
        reason: String,
    },

    /// A server, channel or user could not be found.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// The client cannot perform this operation.
    #[error("operation '{0}' is not supported by this client")]
    Unsupported(&'static str),
}

impl TransportError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by a [`SettingsStore`](crate::SettingsStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document is not valid JSON.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The document parsed but does not have the expected shape.
    #[error("malformed settings for {key}: {reason}")]
    Malformed {
        /// Human-readable store key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl StorageError {
    /// Creates a malformed-document error.
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for command handlers and dispatch.
pub type CommandResult<T = ()> = Result<T, CommandError>;

/// Result type for record lookups.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
