//! Coordination layer between a host application and an interchangeable ad
//! backend.
//!
//! Host code talks to an [`AdManager`]; the manager forwards to whichever
//! [`AdProvider`] is attached, mutes host audio around ad playback and relays
//! lifecycle signals the provider emits through [`AdSignals`].

pub mod args;
pub mod audio;
pub mod config;
pub mod events;
pub mod logging;
pub mod manager;
pub mod paths;
pub mod provider;
pub mod provider_contract;
pub mod signal;

pub use args::AdArgs;
pub use audio::{HostAudio, MuteFlag};
pub use config::{
    Config, ConfigError, LogLevel, LoggingConfig, ProviderConfig, ProviderSelection,
    ValidationError,
};
pub use events::{AdEmitter, AdEvent, AdProgress, AdSignals, Observer};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use manager::{AdError, AdManager, AdOperation, AdResult};
pub use paths::{AppDirs, DirsError};
pub use provider::{AdProvider, ProviderError, ProviderResult};
pub use signal::{Signal, SubscriptionId};

pub const APP_NAME: &str = "adrelay";
pub const APP_AUTHOR: &str = "Adrelay";
pub const APP_QUALIFIER: &str = "io";
