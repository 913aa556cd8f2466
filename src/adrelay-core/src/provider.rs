use crate::args::AdArgs;
use crate::events::AdEmitter;
use thiserror::Error;

/// Common categories of provider failures. The manager hands these back to
/// the host untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider is not attached to an ad manager")]
    NotAttached,
    #[error("ads are disabled: {reason}")]
    AdsDisabled { reason: String },
    #[error("no ad loaded for {unit}")]
    NotLoaded { unit: String },
    #[error("invalid ad arguments: {message}")]
    InvalidArgs { message: String },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("{message}")]
    Other { message: String },
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Ad backend interface.
///
/// Operations are fire-and-forget: a provider reports lifecycle progress
/// through the [`AdEmitter`] it receives in [`AdProvider::attach`], never
/// through return values. What goes into [`AdArgs`] is up to the provider.
pub trait AdProvider: Send + Sync {
    /// Stable provider identifier (e.g., "scripted").
    fn id(&self) -> &str;

    /// Receives the emission points of the manager this provider now belongs to.
    /// Called exactly once per attachment.
    fn attach(&self, emitter: AdEmitter);

    /// Called when the manager lets go of this provider. Providers should drop
    /// the emitter they were given.
    fn detach(&self) {}

    /// Begins showing an ad.
    fn request_ad(&self, args: &AdArgs) -> ProviderResult<()>;

    /// Loads an ad ahead of display, for backends with a separate load step.
    fn preload_ad(&self, _args: &AdArgs) -> ProviderResult<()> {
        Ok(())
    }

    /// Releases whatever a previous request/preload allocated.
    fn destroy_ad(&self, _args: &AdArgs) -> ProviderResult<()> {
        Ok(())
    }

    /// Hides a visible ad without destroying it (persistent banners).
    fn hide_ad(&self, _args: &AdArgs) -> ProviderResult<()> {
        Ok(())
    }

    /// Whether this provider currently permits ads (not blocked, under the
    /// frequency cap, network reachable, ...).
    fn ads_enabled(&self) -> bool;
}
