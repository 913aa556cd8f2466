use crate::args::AdArgs;
use crate::audio::{HostAudio, MuteFlag};
use crate::events::{AdEvent, AdProgress};
use crate::manager::AdManager;
use crate::provider::AdProvider;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Expectations supplied by a provider implementation to run the shared contract suite.
///
/// The suite only observes what happens before `request_ad` returns, so the
/// provider under test must play its lifecycle synchronously (a test double,
/// or a real provider wired to a mocked backend).
#[derive(Debug, Clone)]
pub struct ProviderContractExpectations {
    /// The id the provider should report.
    pub provider_id: String,
    /// What `ads_enabled` should report for this setup.
    pub ads_enabled: bool,
    /// Arguments passed to every operation.
    pub args: AdArgs,
}

/// Errors surfaced by the provider contract test harness.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderContractError {
    #[error("provider id mismatch: expected {expected}, got {actual}")]
    ProviderIdMismatch { expected: String, actual: String },
    #[error("ads_enabled returned {actual}, expected {expected}")]
    EnabledMismatch { expected: bool, actual: bool },
    #[error("request_ad did not emit any signal")]
    NoSignals,
    #[error("ad lifecycle did not start with content paused, first signal was {first}")]
    MissingContentPaused { first: AdEvent },
    #[error("ad lifecycle did not end with content resumed, last signal was {last}")]
    MissingContentResumed { last: AdEvent },
    #[error("ad progression went from {previous} back to {next}")]
    ProgressOutOfOrder {
        previous: AdProgress,
        next: AdProgress,
    },
    #[error("ad progression never reported {missing}")]
    IncompleteProgression { missing: AdProgress },
    #[error("provider reports ads disabled but never emitted ads disabled")]
    MissingAdsDisabled,
    #[error("provider reports ads disabled but emitted {event}")]
    UnexpectedSignal { event: AdEvent },
    #[error("host audio was not muted while the ad was requested")]
    AudioNotMuted,
    #[error("host audio stayed muted after content resumed")]
    AudioNotRestored,
    #[error("host audio was unmuted although the host had muted it")]
    AudioUnmutedUnexpectedly,
    #[error("provider error while running contract: {0}")]
    ProviderFailure(String),
}

/// Run the shared provider contract suite against a provider implementation.
///
/// The provider is attached to a fresh [`AdManager`] backed by a [`MuteFlag`]
/// and detached again when the suite finishes.
pub fn run_provider_contract(
    provider: Box<dyn AdProvider>,
    expectations: &ProviderContractExpectations,
) -> Result<(), ProviderContractError> {
    if provider.id() != expectations.provider_id {
        return Err(ProviderContractError::ProviderIdMismatch {
            expected: expectations.provider_id.clone(),
            actual: provider.id().to_string(),
        });
    }

    let audio = Arc::new(MuteFlag::default());
    let mut manager = AdManager::new(audio.clone());
    manager.set_ad_provider(provider);

    let result = verify_enabled(&manager, expectations)
        .and_then(|_| verify_lifecycle(&manager, &audio, expectations))
        .and_then(|_| verify_host_mute_respected(&manager, &audio, expectations));
    manager.take_ad_provider();
    result
}

fn verify_enabled(
    manager: &AdManager,
    expectations: &ProviderContractExpectations,
) -> Result<(), ProviderContractError> {
    let actual = manager
        .ads_enabled()
        .map_err(|e| ProviderContractError::ProviderFailure(e.to_string()))?;
    if actual != expectations.ads_enabled {
        return Err(ProviderContractError::EnabledMismatch {
            expected: expectations.ads_enabled,
            actual,
        });
    }
    Ok(())
}

fn verify_lifecycle(
    manager: &AdManager,
    audio: &MuteFlag,
    expectations: &ProviderContractExpectations,
) -> Result<(), ProviderContractError> {
    let args = &expectations.args;
    manager
        .preload_ad(args)
        .map_err(|e| ProviderContractError::ProviderFailure(e.to_string()))?;

    let muted_during_ad = Arc::new(Mutex::new(None));
    let paused_listener = {
        let host_audio = Arc::clone(manager.audio());
        let muted_during_ad = Arc::clone(&muted_during_ad);
        manager.signals().content_paused().subscribe(move |_| {
            *lock(&muted_during_ad) = Some(host_audio.is_muted());
        })
    };
    let events = record(manager, |m| m.request_ad(args));
    manager.signals().content_paused().unsubscribe(paused_listener);
    let events = events?;

    if *lock(&muted_during_ad) == Some(false) {
        return Err(ProviderContractError::AudioNotMuted);
    }

    if expectations.ads_enabled {
        verify_played_sequence(&events)?;
    } else {
        verify_disabled_sequence(&events)?;
    }

    if audio.is_muted() {
        return Err(ProviderContractError::AudioNotRestored);
    }

    manager
        .destroy_ad(args)
        .map_err(|e| ProviderContractError::ProviderFailure(e.to_string()))?;
    Ok(())
}

fn verify_host_mute_respected(
    manager: &AdManager,
    audio: &MuteFlag,
    expectations: &ProviderContractExpectations,
) -> Result<(), ProviderContractError> {
    audio.set_muted(true);
    record(manager, |m| m.request_ad(&expectations.args))?;
    if !audio.is_muted() {
        return Err(ProviderContractError::AudioUnmutedUnexpectedly);
    }
    audio.set_muted(false);
    Ok(())
}

fn verify_played_sequence(events: &[AdEvent]) -> Result<(), ProviderContractError> {
    let first = *events.first().ok_or(ProviderContractError::NoSignals)?;
    if first != AdEvent::ContentPaused {
        return Err(ProviderContractError::MissingContentPaused { first });
    }
    let last = *events.last().ok_or(ProviderContractError::NoSignals)?;
    if last != AdEvent::ContentResumed {
        return Err(ProviderContractError::MissingContentResumed { last });
    }

    let progression: Vec<AdProgress> = events
        .iter()
        .filter_map(|event| match event {
            AdEvent::Progression(progress) => Some(*progress),
            _ => None,
        })
        .collect();
    for pair in progression.windows(2) {
        if pair[1] <= pair[0] {
            return Err(ProviderContractError::ProgressOutOfOrder {
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    for required in [AdProgress::Start, AdProgress::Complete] {
        if !progression.contains(&required) {
            return Err(ProviderContractError::IncompleteProgression { missing: required });
        }
    }
    Ok(())
}

fn verify_disabled_sequence(events: &[AdEvent]) -> Result<(), ProviderContractError> {
    if !events.contains(&AdEvent::AdsDisabled) {
        return Err(ProviderContractError::MissingAdsDisabled);
    }
    if let Some(event) = events
        .iter()
        .find(|event| matches!(event, AdEvent::Progression(_) | AdEvent::AdClicked))
    {
        return Err(ProviderContractError::UnexpectedSignal { event: *event });
    }
    let last = *events.last().ok_or(ProviderContractError::NoSignals)?;
    if last != AdEvent::ContentResumed {
        return Err(ProviderContractError::MissingContentResumed { last });
    }
    Ok(())
}

fn record<F, E>(manager: &AdManager, op: F) -> Result<Vec<AdEvent>, ProviderContractError>
where
    F: FnOnce(&AdManager) -> Result<(), E>,
    E: std::fmt::Display,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let seen = Arc::clone(&seen);
        manager
            .signals()
            .observe(move |event| lock(&seen).push(event))
    };
    let outcome = op(manager);
    manager.signals().forget(observer);
    outcome.map_err(|e| ProviderContractError::ProviderFailure(e.to_string()))?;

    let events = std::mem::take(&mut *lock(&seen));
    Ok(events)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AdEmitter;
    use crate::provider::{ProviderError, ProviderResult};

    struct FakeProvider {
        enabled: bool,
        script: Vec<AdEvent>,
        emitter: Mutex<Option<AdEmitter>>,
    }

    impl FakeProvider {
        fn playing() -> Self {
            let mut script = vec![AdEvent::ContentPaused];
            script.extend(AdProgress::ALL.iter().copied().map(AdEvent::Progression));
            script.push(AdEvent::ContentResumed);
            Self::with_script(true, script)
        }

        fn blocked() -> Self {
            Self::with_script(false, vec![AdEvent::AdsDisabled, AdEvent::ContentResumed])
        }

        fn with_script(enabled: bool, script: Vec<AdEvent>) -> Self {
            Self {
                enabled,
                script,
                emitter: Mutex::new(None),
            }
        }
    }

    impl AdProvider for FakeProvider {
        fn id(&self) -> &str {
            "fake"
        }

        fn attach(&self, emitter: AdEmitter) {
            *self.emitter.lock().unwrap() = Some(emitter);
        }

        fn detach(&self) {
            self.emitter.lock().unwrap().take();
        }

        fn request_ad(&self, _args: &AdArgs) -> ProviderResult<()> {
            let emitter = self
                .emitter
                .lock()
                .unwrap()
                .clone()
                .ok_or(ProviderError::NotAttached)?;
            for event in &self.script {
                emitter.emit(*event);
            }
            Ok(())
        }

        fn ads_enabled(&self) -> bool {
            self.enabled
        }
    }

    fn expectations(ads_enabled: bool) -> ProviderContractExpectations {
        ProviderContractExpectations {
            provider_id: "fake".into(),
            ads_enabled,
            args: AdArgs::new().with("unit-1"),
        }
    }

    #[test]
    fn contract_passes_for_full_playback() {
        let result = run_provider_contract(Box::new(FakeProvider::playing()), &expectations(true));
        assert!(result.is_ok(), "expected contract to pass: {result:?}");
    }

    #[test]
    fn contract_passes_when_ads_blocked() {
        let result = run_provider_contract(Box::new(FakeProvider::blocked()), &expectations(false));
        assert!(result.is_ok(), "expected contract to pass: {result:?}");
    }

    #[test]
    fn contract_rejects_wrong_id() {
        let mut expectations = expectations(true);
        expectations.provider_id = "other".into();
        let result = run_provider_contract(Box::new(FakeProvider::playing()), &expectations);
        assert!(matches!(
            result,
            Err(ProviderContractError::ProviderIdMismatch { .. })
        ));
    }

    #[test]
    fn contract_fails_when_content_never_resumes() {
        let provider = FakeProvider::with_script(
            true,
            vec![
                AdEvent::ContentPaused,
                AdEvent::Progression(AdProgress::Start),
                AdEvent::Progression(AdProgress::Complete),
            ],
        );
        let result = run_provider_contract(Box::new(provider), &expectations(true));
        assert_eq!(
            result,
            Err(ProviderContractError::MissingContentResumed {
                last: AdEvent::Progression(AdProgress::Complete)
            })
        );
    }

    #[test]
    fn contract_fails_on_backwards_progression() {
        let provider = FakeProvider::with_script(
            true,
            vec![
                AdEvent::ContentPaused,
                AdEvent::Progression(AdProgress::Start),
                AdEvent::Progression(AdProgress::MidPoint),
                AdEvent::Progression(AdProgress::FirstQuartile),
                AdEvent::Progression(AdProgress::Complete),
                AdEvent::ContentResumed,
            ],
        );
        let result = run_provider_contract(Box::new(provider), &expectations(true));
        assert_eq!(
            result,
            Err(ProviderContractError::ProgressOutOfOrder {
                previous: AdProgress::MidPoint,
                next: AdProgress::FirstQuartile,
            })
        );
    }

    #[test]
    fn contract_fails_when_disabled_provider_plays_anyway() {
        let provider = FakeProvider {
            enabled: false,
            ..FakeProvider::playing()
        };
        let result = run_provider_contract(Box::new(provider), &expectations(false));
        assert_eq!(result, Err(ProviderContractError::MissingAdsDisabled));
    }

    #[test]
    fn contract_fails_on_enabled_mismatch() {
        let result = run_provider_contract(Box::new(FakeProvider::blocked()), &expectations(true));
        assert_eq!(
            result,
            Err(ProviderContractError::EnabledMismatch {
                expected: true,
                actual: false
            })
        );
    }
}
