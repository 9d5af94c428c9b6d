//! Error types for the framework layer.
//!
//! These cover configuration and lifecycle mistakes (duplicate aliases, double
//! activation, colliding modules). They never travel down the command path;
//! command handlers use [`CommandError`](mentionbot_core::CommandError).

use mentionbot_core::{CommandError, StorageError};
use thiserror::Error;

// =============================================================================
// Registry Errors
// =============================================================================

/// Raised while building a command registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A command was registered without any alias.
    #[error("command registered without aliases")]
    NoAliases,

    /// Two registrations claim the same alias.
    #[error("alias '{0}' is registered more than once")]
    DuplicateAlias(&'static str),

    /// Two registrations claim the same top-level alias.
    #[error("top-level alias '{0}' is registered more than once")]
    DuplicateTopLevel(&'static str),

    /// More than one command is marked as the default.
    #[error("both '{first}' and '{second}' are marked as the default command")]
    MultipleDefaults {
        first: &'static str,
        second: &'static str,
    },
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        CommandError::fault(err)
    }
}

// =============================================================================
// Wrapper Errors
// =============================================================================

/// Misuse of the module wrapper state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapperError {
    #[error("module '{0}' is already active")]
    AlreadyActive(&'static str),

    #[error("module '{0}' is not active")]
    NotActive(&'static str),

    /// The module's constructor failed; the wrapper stays inactive.
    #[error("failed to construct module '{module}': {reason}")]
    Construction {
        module: &'static str,
        reason: String,
    },
}

// =============================================================================
// Group Errors
// =============================================================================

/// Raised when installing or managing modules in a group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("module '{0}' is already installed")]
    AlreadyInstalled(String),

    #[error("module '{0}' is not installed")]
    NotInstalled(String),

    /// An alias of the new module is already routed to another module.
    #[error("alias '{alias}' of '{module}' is already used by '{existing}'")]
    AliasCollision {
        alias: String,
        module: &'static str,
        existing: &'static str,
    },

    /// Preprocessor triggers of two modules overlap.
    #[error("preprocessor trigger '{trigger}' of '{module}' overlaps '{existing_trigger}' of '{existing}'")]
    TriggerCollision {
        trigger: &'static str,
        module: &'static str,
        existing_trigger: &'static str,
        existing: &'static str,
    },

    #[error(transparent)]
    Wrapper(#[from] WrapperError),
}

// =============================================================================
// Factory Errors
// =============================================================================

/// Raised while assembling the module factory or creating instances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("module '{0}' is registered more than once")]
    DuplicateModule(&'static str),

    #[error("module '{0}' declares no command aliases")]
    NoAliases(&'static str),

    #[error("module '{0}' does not exist")]
    UnknownModule(String),

    #[error("command registry of module '{module}' is invalid: {source}")]
    Registry {
        module: &'static str,
        #[source]
        source: RegistryError,
    },
}

// =============================================================================
// Instance Errors
// =============================================================================

/// Raised while constructing a server instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core command registry is invalid: {0}")]
    Registry(#[from] RegistryError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type RegistryResult<T> = Result<T, RegistryError>;

pub type WrapperResult<T> = Result<T, WrapperError>;

pub type GroupResult<T> = Result<T, GroupError>;

pub type FactoryResult<T> = Result<T, FactoryError>;

pub type InstanceResult<T> = Result<T, InstanceError>;
