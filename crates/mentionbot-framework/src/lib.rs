//! # mentionbot framework
//!
//! Command dispatch and module lifecycle for one bot process.
//!
//! This layer provides:
//! - [`CommandRegistry`]: alias-keyed command tables with privilege gating and
//!   help rendering, shared by the core commands and by every module
//! - [`PrivilegeManager`]: per-server resolution of user privilege levels
//! - [`ServerModule`] and [`ServerModuleWrapper`]: pluggable modules whose
//!   faults are contained and, unless suppressed, deactivate the module
//! - [`ServerModuleGroup`]: routing from aliases, shortcuts and preprocessor
//!   triggers to installed modules
//! - [`ServerModuleFactory`]: module types registered at link time through
//!   [`MODULE_REGISTRY`]
//! - [`ServerBotInstance`]: the per-server command pipeline and the core
//!   commands
//!
//! ```text
//! ┌───────────────────┐   ┌──────────────────────┐   ┌──────────────────────┐
//! │ ServerBotInstance │──▶│ ServerModuleGroup    │──▶│ ServerModuleWrapper  │──▶ dyn ServerModule
//! │  core commands    │   │  cmd / help routing  │   │  fault containment   │
//! └───────────────────┘   └──────────────────────┘   └──────────────────────┘
//! ```
//!
//! Module crates register themselves with:
//!
//! ```rust,ignore
//! use mentionbot_framework::linkme::distributed_slice;
//! use mentionbot_framework::{MODULE_REGISTRY, ModuleDescriptor};
//!
//! #[distributed_slice(MODULE_REGISTRY)]
//! #[linkme(crate = mentionbot_framework::linkme)]
//! static RANDOM: ModuleDescriptor = ModuleDescriptor { /* ... */ };
//! ```

pub mod command;
pub mod error;
pub mod factory;
pub mod fault;
pub mod group;
pub mod instance;
pub mod module;
pub mod privilege;
pub mod settings;
pub mod wrapper;

pub use linkme;

pub use command::{
    CommandContext, CommandEntry, CommandFn, CommandMeta, CommandRegistry, HelpEntry, HelpNode,
    Shortcut, StaticRegistry, TopLevel, compose_help_summary,
};
pub use error::{
    FactoryError, FactoryResult, GroupError, GroupResult, InstanceError, InstanceResult,
    RegistryError, RegistryResult, WrapperError, WrapperResult,
};
pub use factory::{MODULE_REGISTRY, ServerModuleFactory};
pub use fault::FaultSite;
pub use group::ServerModuleGroup;
pub use instance::{InstanceOptions, ServerBotInstance, core_commands};
pub use module::{
    ModuleConstructor, ModuleDescriptor, ModuleEnv, ModuleResources, ServerModule, no_shortcuts,
};
pub use privilege::{PrivilegeManager, PrivilegeSettings};
pub use settings::{ServerSettings, ServerSettingsDoc};
pub use wrapper::ServerModuleWrapper;

/// Prelude for module authors.
pub mod prelude {
    pub use super::command::{CommandContext, CommandMeta, CommandRegistry, Shortcut, StaticRegistry};
    pub use super::error::RegistryResult;
    pub use super::module::{ModuleDescriptor, ModuleResources, ServerModule, no_shortcuts};
    pub use mentionbot_core::prelude::*;
}
