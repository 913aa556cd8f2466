use crate::signal::{Signal, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Playback milestones reported while an ad is running.
///
/// Variants are declared in playback order, so `Ord` follows the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdProgress {
    Start,
    FirstQuartile,
    MidPoint,
    ThirdQuartile,
    Complete,
}

impl AdProgress {
    pub const ALL: [AdProgress; 5] = [
        AdProgress::Start,
        AdProgress::FirstQuartile,
        AdProgress::MidPoint,
        AdProgress::ThirdQuartile,
        AdProgress::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdProgress::Start => "start",
            AdProgress::FirstQuartile => "firstQuartile",
            AdProgress::MidPoint => "midPoint",
            AdProgress::ThirdQuartile => "thirdQuartile",
            AdProgress::Complete => "complete",
        }
    }
}

impl fmt::Display for AdProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged view over the five channels, for observers that want every signal
/// through one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "progress", rename_all = "camelCase")]
pub enum AdEvent {
    ContentPaused,
    ContentResumed,
    Progression(AdProgress),
    AdsDisabled,
    AdClicked,
}

impl fmt::Display for AdEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdEvent::ContentPaused => f.write_str("content paused"),
            AdEvent::ContentResumed => f.write_str("content resumed"),
            AdEvent::Progression(progress) => write!(f, "ad progression: {progress}"),
            AdEvent::AdsDisabled => f.write_str("ads disabled"),
            AdEvent::AdClicked => f.write_str("ad clicked"),
        }
    }
}

/// The manager's event channels. Clones share the same channels.
#[derive(Debug, Clone, Default)]
pub struct AdSignals {
    content_paused: Signal<()>,
    content_resumed: Signal<()>,
    ad_progression: Signal<AdProgress>,
    ads_disabled: Signal<()>,
    ad_clicked: Signal<()>,
}

/// Subscriptions created by [`AdSignals::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    content_paused: SubscriptionId,
    content_resumed: SubscriptionId,
    ad_progression: SubscriptionId,
    ads_disabled: SubscriptionId,
    ad_clicked: SubscriptionId,
}

impl AdSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host should pause gameplay/audio-dependent logic.
    pub fn content_paused(&self) -> &Signal<()> {
        &self.content_paused
    }

    /// Host may resume; the manager restores audio on this channel.
    pub fn content_resumed(&self) -> &Signal<()> {
        &self.content_resumed
    }

    pub fn ad_progression(&self) -> &Signal<AdProgress> {
        &self.ad_progression
    }

    pub fn ads_disabled(&self) -> &Signal<()> {
        &self.ads_disabled
    }

    pub fn ad_clicked(&self) -> &Signal<()> {
        &self.ad_clicked
    }

    /// Subscribes one callback to all five channels.
    pub fn observe<F>(&self, callback: F) -> Observer
    where
        F: Fn(AdEvent) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let on = |event: AdEvent| {
            let callback = Arc::clone(&callback);
            move |_: &()| callback(event)
        };
        let content_paused = self.content_paused.subscribe(on(AdEvent::ContentPaused));
        let content_resumed = self.content_resumed.subscribe(on(AdEvent::ContentResumed));
        let ads_disabled = self.ads_disabled.subscribe(on(AdEvent::AdsDisabled));
        let ad_clicked = self.ad_clicked.subscribe(on(AdEvent::AdClicked));
        let ad_progression = {
            let callback = Arc::clone(&callback);
            self.ad_progression
                .subscribe(move |progress: &AdProgress| callback(AdEvent::Progression(*progress)))
        };

        Observer {
            content_paused,
            content_resumed,
            ad_progression,
            ads_disabled,
            ad_clicked,
        }
    }

    /// An emitter that is never revoked, for hosts that drive signals
    /// themselves. Providers get theirs from the manager on attach.
    pub fn emitter(&self) -> AdEmitter {
        AdEmitter::new(self.clone())
    }

    /// Removes every subscription made by [`AdSignals::observe`].
    pub fn forget(&self, observer: Observer) {
        self.content_paused.unsubscribe(observer.content_paused);
        self.content_resumed.unsubscribe(observer.content_resumed);
        self.ad_progression.unsubscribe(observer.ad_progression);
        self.ads_disabled.unsubscribe(observer.ads_disabled);
        self.ad_clicked.unsubscribe(observer.ad_clicked);
    }
}

/// Emission side of [`AdSignals`], handed to a provider when it is attached.
///
/// Once the manager detaches that provider the handle is revoked: every
/// emission through it (or its clones) is dropped.
#[derive(Debug, Clone)]
pub struct AdEmitter {
    signals: AdSignals,
    live: Arc<AtomicBool>,
}

impl AdEmitter {
    pub(crate) fn new(signals: AdSignals) -> Self {
        Self {
            signals,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether emissions still reach subscribers.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn revoke(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn accepts(&self, signal: &str) -> bool {
        let live = self.is_live();
        if !live {
            tracing::debug!(signal, "dropping signal from detached provider");
        }
        live
    }

    pub fn content_paused(&self) {
        if self.accepts("content paused") {
            tracing::trace!("signal: content paused");
            self.signals.content_paused.emit(&());
        }
    }

    pub fn content_resumed(&self) {
        if self.accepts("content resumed") {
            tracing::trace!("signal: content resumed");
            self.signals.content_resumed.emit(&());
        }
    }

    pub fn ad_progression(&self, progress: AdProgress) {
        if self.accepts("ad progression") {
            tracing::trace!(%progress, "signal: ad progression");
            self.signals.ad_progression.emit(&progress);
        }
    }

    pub fn ads_disabled(&self) {
        if self.accepts("ads disabled") {
            tracing::trace!("signal: ads disabled");
            self.signals.ads_disabled.emit(&());
        }
    }

    pub fn ad_clicked(&self) {
        if self.accepts("ad clicked") {
            tracing::trace!("signal: ad clicked");
            self.signals.ad_clicked.emit(&());
        }
    }

    /// Emits the channel matching `event`.
    pub fn emit(&self, event: AdEvent) {
        match event {
            AdEvent::ContentPaused => self.content_paused(),
            AdEvent::ContentResumed => self.content_resumed(),
            AdEvent::Progression(progress) => self.ad_progression(progress),
            AdEvent::AdsDisabled => self.ads_disabled(),
            AdEvent::AdClicked => self.ad_clicked(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(signals: &AdSignals) -> (Observer, Arc<Mutex<Vec<AdEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = signals.observe(move |event| sink.lock().unwrap().push(event));
        (observer, seen)
    }

    #[test]
    fn progress_orders_along_the_timeline() {
        let mut shuffled = vec![
            AdProgress::Complete,
            AdProgress::Start,
            AdProgress::ThirdQuartile,
            AdProgress::MidPoint,
            AdProgress::FirstQuartile,
        ];
        shuffled.sort();
        assert_eq!(shuffled, AdProgress::ALL.to_vec());
    }

    #[test]
    fn progress_serializes_as_camel_case() {
        let json = serde_json::to_string(&AdProgress::FirstQuartile).unwrap();
        assert_eq!(json, "\"firstQuartile\"");
        assert_eq!(AdProgress::ThirdQuartile.to_string(), "thirdQuartile");
    }

    #[test]
    fn observer_sees_every_channel() {
        let signals = AdSignals::new();
        let (_observer, seen) = recorder(&signals);
        let emitter = AdEmitter::new(signals.clone());

        emitter.content_paused();
        emitter.ad_progression(AdProgress::Start);
        emitter.ad_clicked();
        emitter.ads_disabled();
        emitter.content_resumed();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                AdEvent::ContentPaused,
                AdEvent::Progression(AdProgress::Start),
                AdEvent::AdClicked,
                AdEvent::AdsDisabled,
                AdEvent::ContentResumed,
            ]
        );
    }

    #[test]
    fn forget_detaches_observer() {
        let signals = AdSignals::new();
        let (observer, seen) = recorder(&signals);
        signals.forget(observer);

        AdEmitter::new(signals.clone()).emit(AdEvent::ContentPaused);

        assert!(seen.lock().unwrap().is_empty());
        assert!(signals.content_paused().is_empty());
        assert!(signals.ad_progression().is_empty());
    }

    #[test]
    fn progression_subscribers_receive_payload_once_each_in_order() {
        let signals = AdSignals::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in ["host", "analytics"] {
            let seen = Arc::clone(&seen);
            signals
                .ad_progression()
                .subscribe(move |progress| seen.lock().unwrap().push((name, *progress)));
        }

        AdEmitter::new(signals).ad_progression(AdProgress::Start);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("host", AdProgress::Start), ("analytics", AdProgress::Start)]
        );
    }

    #[test]
    fn revoked_emitter_and_its_clones_go_quiet() {
        let signals = AdSignals::new();
        let (_observer, seen) = recorder(&signals);
        let emitter = AdEmitter::new(signals.clone());
        let clone = emitter.clone();

        emitter.revoke();
        clone.content_resumed();
        clone.emit(AdEvent::Progression(AdProgress::Start));

        assert!(!clone.is_live());
        assert!(seen.lock().unwrap().is_empty());

        signals.emitter().ad_clicked();
        assert_eq!(*seen.lock().unwrap(), vec![AdEvent::AdClicked]);
    }
}
