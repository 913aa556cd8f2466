//! Host-facing coordinator between the game and whichever ad provider is attached.

use crate::args::AdArgs;
use crate::audio::HostAudio;
use crate::events::{AdEmitter, AdSignals};
use crate::provider::{AdProvider, ProviderError};
use crate::signal::SubscriptionId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Manager operations that need an attached provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdOperation {
    Request,
    Preload,
    Destroy,
    Hide,
    CheckEnabled,
}

impl fmt::Display for AdOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdOperation::Request => "request an ad",
            AdOperation::Preload => "preload an ad",
            AdOperation::Destroy => "destroy an ad",
            AdOperation::Hide => "hide an ad",
            AdOperation::CheckEnabled => "check whether ads are enabled",
        })
    }
}

#[derive(Debug, Error)]
pub enum AdError {
    #[error("cannot {operation} without an ad provider, attach one first")]
    NoProvider { operation: AdOperation },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type AdResult<T> = Result<T, AdError>;

struct Attached {
    provider: Box<dyn AdProvider>,
    emitter: AdEmitter,
    resume_listener: SubscriptionId,
}

/// Single point of contact for host code, independent of the ad backend.
///
/// Owns the mute policy: [`AdManager::request_ad`] records whether host audio
/// was already muted and then mutes it; when the provider signals content
/// resumed, audio is unmuted only if it was not muted at that last request.
pub struct AdManager {
    audio: Arc<dyn HostAudio>,
    signals: AdSignals,
    was_muted: Arc<AtomicBool>,
    attached: Option<Attached>,
}

impl fmt::Debug for AdManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdManager")
            .field("provider", &self.provider_id())
            .field("was_muted", &self.was_muted())
            .field("signals", &self.signals)
            .finish()
    }
}

impl AdManager {
    /// Creates the manager for a host session.
    pub fn new(audio: Arc<dyn HostAudio>) -> Self {
        Self {
            audio,
            signals: AdSignals::new(),
            was_muted: Arc::new(AtomicBool::new(false)),
            attached: None,
        }
    }

    /// Channels host code subscribes to.
    pub fn signals(&self) -> &AdSignals {
        &self.signals
    }

    /// The handle given to the attached provider, if there is one.
    pub fn emitter(&self) -> Option<&AdEmitter> {
        self.attached.as_ref().map(|a| &a.emitter)
    }

    pub fn audio(&self) -> &Arc<dyn HostAudio> {
        &self.audio
    }

    pub fn has_provider(&self) -> bool {
        self.attached.is_some()
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.attached.as_ref().map(|a| a.provider.id())
    }

    /// Mute state captured by the most recent [`AdManager::request_ad`].
    pub fn was_muted(&self) -> bool {
        self.was_muted.load(Ordering::SeqCst)
    }

    /// Attaches `provider`, replacing (and returning) the previous one.
    ///
    /// The previous provider is detached first: its emitter is revoked, its
    /// `detach` hook runs and the resume listener registered for it is removed.
    pub fn set_ad_provider(
        &mut self,
        provider: Box<dyn AdProvider>,
    ) -> Option<Box<dyn AdProvider>> {
        let previous = self.take_ad_provider();

        let emitter = AdEmitter::new(self.signals.clone());
        provider.attach(emitter.clone());
        let resume_listener = {
            let audio = Arc::clone(&self.audio);
            let was_muted = Arc::clone(&self.was_muted);
            self.signals.content_resumed().subscribe(move |_| {
                if !was_muted.load(Ordering::SeqCst) {
                    audio.set_muted(false);
                }
            })
        };
        tracing::debug!(provider = provider.id(), "ad provider attached");

        self.attached = Some(Attached {
            provider,
            emitter,
            resume_listener,
        });
        previous
    }

    /// Detaches and returns the current provider, if any.
    ///
    /// Signals the provider emits afterwards are dropped, whether or not it
    /// overrides `detach`.
    pub fn take_ad_provider(&mut self) -> Option<Box<dyn AdProvider>> {
        let Attached {
            provider,
            emitter,
            resume_listener,
        } = self.attached.take()?;
        emitter.revoke();
        self.signals.content_resumed().unsubscribe(resume_listener);
        provider.detach();
        tracing::debug!(provider = provider.id(), "ad provider detached");
        Some(provider)
    }

    /// Shows an ad. Mutes host audio before handing off to the provider.
    pub fn request_ad(&self, args: &AdArgs) -> AdResult<()> {
        let provider = self.provider_for(AdOperation::Request)?;

        let muted = self.audio.is_muted();
        self.was_muted.store(muted, Ordering::SeqCst);
        self.audio.set_muted(true);

        tracing::debug!(
            provider = provider.id(),
            was_muted = muted,
            args = args.len(),
            "requesting ad"
        );
        provider.request_ad(args)?;
        Ok(())
    }

    /// Some providers need an ad loaded before it can be shown.
    pub fn preload_ad(&self, args: &AdArgs) -> AdResult<()> {
        let provider = self.provider_for(AdOperation::Preload)?;
        tracing::debug!(provider = provider.id(), "preloading ad");
        provider.preload_ad(args)?;
        Ok(())
    }

    /// Some providers need an ad destroyed after it was shown.
    pub fn destroy_ad(&self, args: &AdArgs) -> AdResult<()> {
        let provider = self.provider_for(AdOperation::Destroy)?;
        tracing::debug!(provider = provider.id(), "destroying ad");
        provider.destroy_ad(args)?;
        Ok(())
    }

    /// Hides a visible ad, e.g. a banner, without destroying it.
    pub fn hide_ad(&self, args: &AdArgs) -> AdResult<()> {
        let provider = self.provider_for(AdOperation::Hide)?;
        tracing::debug!(provider = provider.id(), "hiding ad");
        provider.hide_ad(args)?;
        Ok(())
    }

    /// Whether the attached provider currently allows ads.
    pub fn ads_enabled(&self) -> AdResult<bool> {
        let provider = self.provider_for(AdOperation::CheckEnabled)?;
        Ok(provider.ads_enabled())
    }

    fn provider_for(&self, operation: AdOperation) -> AdResult<&dyn AdProvider> {
        match &self.attached {
            Some(attached) => Ok(attached.provider.as_ref()),
            None => {
                tracing::warn!(%operation, "no ad provider attached");
                Err(AdError::NoProvider { operation })
            }
        }
    }
}
