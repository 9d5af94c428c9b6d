//! # mentionbot modules
//!
//! The server modules bundled with the bot. Each one registers its
//! [`ModuleDescriptor`](mentionbot_framework::ModuleDescriptor) in
//! [`MODULE_REGISTRY`](mentionbot_framework::MODULE_REGISTRY) at link time,
//! so linking this crate is enough to make them installable.
//!
//! | Module             | Aliases                          |
//! |--------------------|----------------------------------|
//! | `Random`           | `random`, `rng`, `rnd`, `rand`   |
//! | `Dynamic Channels` | `dchannel`                       |
//! | `Debugging`        | `debugging`, `debug`, `db`       |

pub mod debugging;
pub mod dynamic_channels;
pub mod random;

use mentionbot_framework::{FactoryResult, ServerModuleFactory};

pub use debugging::DEBUGGING;
pub use dynamic_channels::DYNAMIC_CHANNELS;
pub use random::RANDOM;

/// A factory holding every module linked into the binary.
pub fn factory() -> FactoryResult<ServerModuleFactory> {
    ServerModuleFactory::collect_all()
}
