//! Deterministic, in-process ad provider.
//!
//! Plays a complete ad lifecycle synchronously inside `request_ad`: content
//! paused, progression milestones, an optional click, then content resumed.
//! Nothing is fetched; it stands in for a real ad network in tests, demos and
//! headless builds.
//!
//! # Arguments
//!
//! Every operation takes an optional ad unit name as its first argument
//! (a string). Without it the configured `ad_unit` is used, then `"default"`.

use adrelay_core::{AdArgs, AdEmitter, AdProgress, AdProvider, ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const SCRIPTED_PROVIDER_ID: &str = "scripted";

const FALLBACK_UNIT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedOptions {
    /// Simulates an ad blocker or exhausted frequency cap when false.
    pub ads_enabled: bool,
    /// Emit an ad-clicked signal while each ad plays.
    pub emit_click: bool,
    /// Report every quartile rather than only start and complete.
    pub quartiles: bool,
    pub ad_unit: Option<String>,
}

impl Default for ScriptedOptions {
    fn default() -> Self {
        Self {
            ads_enabled: true,
            emit_click: false,
            quartiles: true,
            ad_unit: None,
        }
    }
}

impl ScriptedOptions {
    /// Reads options from a `[providers.<id>.settings]` table.
    pub fn from_settings(settings: &BTreeMap<String, Value>) -> ProviderResult<Self> {
        let table: serde_json::Map<String, Value> = settings
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        serde_json::from_value(Value::Object(table)).map_err(|e| ProviderError::InvalidArgs {
            message: format!("scripted provider settings: {e}"),
        })
    }
}

/// Observable bookkeeping, mainly for tests and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedState {
    pub preloaded: Option<String>,
    pub visible: Option<String>,
    pub shown: u32,
}

#[derive(Debug, Default)]
struct Inner {
    emitter: Option<AdEmitter>,
    state: ScriptedState,
}

#[derive(Debug)]
pub struct ScriptedProvider {
    options: ScriptedOptions,
    enabled: AtomicBool,
    inner: Mutex<Inner>,
}

impl ScriptedProvider {
    pub fn new(options: ScriptedOptions) -> Self {
        Self {
            enabled: AtomicBool::new(options.ads_enabled),
            options,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn options(&self) -> &ScriptedOptions {
        &self.options
    }

    /// Flips ad availability at runtime, e.g. after a simulated block.
    pub fn set_ads_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn state(&self) -> ScriptedState {
        self.lock().state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unit(&self, args: &AdArgs) -> ProviderResult<String> {
        match args.get(0) {
            None => Ok(self
                .options
                .ad_unit
                .clone()
                .unwrap_or_else(|| FALLBACK_UNIT.to_string())),
            Some(Value::String(unit)) if !unit.trim().is_empty() => Ok(unit.clone()),
            Some(other) => Err(ProviderError::InvalidArgs {
                message: format!("expected an ad unit name as first argument, got {other}"),
            }),
        }
    }

    fn emitter(&self) -> ProviderResult<AdEmitter> {
        self.lock().emitter.clone().ok_or(ProviderError::NotAttached)
    }

    fn milestones(&self) -> Vec<AdProgress> {
        if self.options.quartiles {
            AdProgress::ALL.to_vec()
        } else {
            vec![AdProgress::Start, AdProgress::Complete]
        }
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new(ScriptedOptions::default())
    }
}

impl AdProvider for ScriptedProvider {
    fn id(&self) -> &str {
        SCRIPTED_PROVIDER_ID
    }

    fn attach(&self, emitter: AdEmitter) {
        self.lock().emitter = Some(emitter);
    }

    fn detach(&self) {
        self.lock().emitter = None;
    }

    fn request_ad(&self, args: &AdArgs) -> ProviderResult<()> {
        let unit = self.unit(args)?;
        // Signals go out with the lock released; subscribers may call back in.
        let emitter = self.emitter()?;

        if !self.ads_enabled() {
            tracing::info!(%unit, "ads disabled, skipping ad");
            emitter.ads_disabled();
            emitter.content_resumed();
            return Ok(());
        }

        tracing::debug!(%unit, "playing scripted ad");
        {
            let mut inner = self.lock();
            if inner.state.preloaded.as_deref() == Some(unit.as_str()) {
                inner.state.preloaded = None;
            }
            inner.state.visible = Some(unit);
            inner.state.shown += 1;
        }

        let click_after = if self.options.quartiles {
            AdProgress::MidPoint
        } else {
            AdProgress::Start
        };
        emitter.content_paused();
        for progress in self.milestones() {
            emitter.ad_progression(progress);
            if self.options.emit_click && progress == click_after {
                emitter.ad_clicked();
            }
        }
        emitter.content_resumed();
        Ok(())
    }

    fn preload_ad(&self, args: &AdArgs) -> ProviderResult<()> {
        let unit = self.unit(args)?;
        if !self.ads_enabled() {
            tracing::debug!(%unit, "ads disabled, nothing to preload");
            return Ok(());
        }
        tracing::debug!(%unit, "preloaded scripted ad");
        self.lock().state.preloaded = Some(unit);
        Ok(())
    }

    fn destroy_ad(&self, args: &AdArgs) -> ProviderResult<()> {
        let unit = self.unit(args)?;
        let mut inner = self.lock();
        if inner.state.visible.as_deref() == Some(unit.as_str()) {
            inner.state.visible = None;
        }
        if inner.state.preloaded.as_deref() == Some(unit.as_str()) {
            inner.state.preloaded = None;
        }
        Ok(())
    }

    fn hide_ad(&self, args: &AdArgs) -> ProviderResult<()> {
        let unit = self.unit(args)?;
        let mut inner = self.lock();
        if inner.state.visible.as_deref() != Some(unit.as_str()) {
            return Err(ProviderError::NotLoaded { unit });
        }
        inner.state.visible = None;
        Ok(())
    }

    fn ads_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
