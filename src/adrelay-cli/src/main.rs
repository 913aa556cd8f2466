use adrelay_core::{
    init_logging, AdArgs, AdError, AdEvent, AdManager, AdProvider, AppDirs, Config, HostAudio,
    MuteFlag, ProviderError, ProviderSelection, ValidationError,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use scripted_provider::{ScriptedOptions, ScriptedProvider, SCRIPTED_PROVIDER_ID};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Provider kinds this binary can construct.
const KNOWN_PROVIDERS: &[&str] = &[SCRIPTED_PROVIDER_ID];

#[derive(Debug, Parser)]
#[command(name = "adrelay", version, about = "Ad provider coordination harness")]
struct Cli {
    /// Provider override (takes precedence over config)
    #[arg(long, global = true)]
    provider: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Attach a provider and drive ad requests through the manager
    Simulate(SimulateCommand),
    /// Provider management commands
    #[command(subcommand)]
    Providers(ProvidersCommand),
}

#[derive(Debug, Subcommand)]
enum ProvidersCommand {
    /// List available and configured providers
    List,
}

#[derive(Debug, Parser, Clone)]
struct SimulateCommand {
    /// Start the session with host audio already muted
    #[arg(long)]
    muted: bool,
    /// Number of ads to request
    #[arg(short = 'n', long, default_value_t = 1)]
    requests: u32,
    /// Ad unit passed as the first argument to every operation
    #[arg(long)]
    unit: Option<String>,
    /// Preload before each request
    #[arg(long)]
    preload: bool,
    /// Simulate blocked ads (scripted provider only)
    #[arg(long)]
    disabled: bool,
    /// Simulate a click during each ad (scripted provider only)
    #[arg(long)]
    click: bool,
    /// Print relayed signals as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown provider kind '{kind}' (available: {available})")]
    UnknownProvider { kind: String, available: String },
    #[error("{0}")]
    Selection(#[from] ValidationError),
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Ad(#[from] AdError),
}

/// One relayed signal and the host mute flag at the moment it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct Observed {
    request: u32,
    event: AdEvent,
    muted: bool,
}

#[derive(Debug)]
struct SessionReport {
    provider_id: String,
    ads_enabled: bool,
    observed: Vec<Observed>,
    muted_at_end: bool,
}

impl Default for SimulateCommand {
    fn default() -> Self {
        Self {
            muted: false,
            requests: 1,
            unit: None,
            preload: false,
            disabled: false,
            click: false,
            json: false,
        }
    }
}

impl SimulateCommand {
    fn args(&self) -> AdArgs {
        self.unit.iter().cloned().collect()
    }

    fn build_provider(
        &self,
        selection: &ProviderSelection,
    ) -> Result<Box<dyn AdProvider>, CliError> {
        match selection.kind.as_str() {
            SCRIPTED_PROVIDER_ID => {
                let mut options = ScriptedOptions::from_settings(&selection.settings)?;
                if self.disabled {
                    options.ads_enabled = false;
                }
                if self.click {
                    options.emit_click = true;
                }
                tracing::debug!(
                    provider = %selection.provider_id,
                    ?options,
                    "building scripted provider"
                );
                Ok(Box::new(ScriptedProvider::new(options)))
            }
            other => Err(CliError::UnknownProvider {
                kind: other.to_string(),
                available: KNOWN_PROVIDERS.join(", "),
            }),
        }
    }

    fn run(&self, provider: Box<dyn AdProvider>) -> Result<SessionReport, CliError> {
        let audio = Arc::new(MuteFlag::new(self.muted));
        let mut manager = AdManager::new(audio.clone());
        manager.set_ad_provider(provider);

        let current_request = Arc::new(Mutex::new(0u32));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let audio = audio.clone();
            let current_request = Arc::clone(&current_request);
            let observed = Arc::clone(&observed);
            manager.signals().observe(move |event| {
                let request = *current_request.lock().unwrap_or_else(|e| e.into_inner());
                observed
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(Observed {
                        request,
                        event,
                        muted: audio.is_muted(),
                    });
            })
        };

        let ads_enabled = manager.ads_enabled()?;
        let args = self.args();
        for request in 1..=self.requests {
            *current_request.lock().unwrap_or_else(|e| e.into_inner()) = request;
            if self.preload {
                manager.preload_ad(&args)?;
            }
            manager.request_ad(&args)?;
            manager.destroy_ad(&args)?;
        }

        manager.signals().forget(observer);
        let provider_id = manager
            .take_ad_provider()
            .map(|p| p.id().to_string())
            .unwrap_or_default();
        let observed = std::mem::take(&mut *observed.lock().unwrap_or_else(|e| e.into_inner()));

        Ok(SessionReport {
            provider_id,
            ads_enabled,
            observed,
            muted_at_end: audio.is_muted(),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    match cli.command {
        Some(Command::Providers(ProvidersCommand::List)) => {
            print_providers(&config);
        }
        Some(Command::Simulate(simulate)) => {
            simulate_session(&config, cli.provider.as_deref(), &simulate)?;
        }
        None => {
            simulate_session(&config, cli.provider.as_deref(), &SimulateCommand::default())?;
        }
    }

    Ok(())
}

fn simulate_session(
    config: &Config,
    cli_provider: Option<&str>,
    simulate: &SimulateCommand,
) -> Result<(), CliError> {
    let selection = config.resolve_provider(cli_provider, SCRIPTED_PROVIDER_ID)?;
    tracing::info!(
        "Simulating {} ad request(s) with provider '{}' (kind '{}')",
        simulate.requests,
        selection.provider_id,
        selection.kind
    );
    let provider = simulate.build_provider(&selection)?;
    let report = simulate.run(provider)?;

    if simulate.json {
        for observed in &report.observed {
            match json_line(observed) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!("failed to encode {}: {}", observed.event, err),
            }
        }
        return Ok(());
    }

    println!(
        "Provider '{}' (ads enabled: {})",
        report.provider_id, report.ads_enabled
    );
    let mut last_request = 0;
    for observed in &report.observed {
        if observed.request != last_request {
            println!("Request #{}", observed.request);
            last_request = observed.request;
        }
        println!("  {} (audio muted: {})", observed.event, observed.muted);
    }
    println!("Host audio muted at end: {}", report.muted_at_end);
    Ok(())
}

/// `{"request":1,"event":{"signal":"contentPaused"},"muted":true}`
fn json_line(observed: &Observed) -> serde_json::Result<String> {
    serde_json::to_string(observed)
}

fn print_providers(config: &Config) {
    for kind in KNOWN_PROVIDERS {
        let marker = if config.default_provider.as_deref() == Some(*kind) {
            " (default)"
        } else {
            ""
        };
        println!("Provider: {kind}{marker} (built-in)");
    }

    for (id, provider) in &config.providers {
        let marker = if config.default_provider.as_deref() == Some(id.as_str()) {
            " (default)"
        } else {
            ""
        };
        let kind = provider.kind.as_deref().unwrap_or(id);
        println!("Provider: {id}{marker}");
        println!("  kind: {kind}");
        if provider.settings.is_empty() {
            println!("  settings: (none configured)");
        } else {
            for key in provider.settings.keys() {
                println!("  - {key}");
            }
        }
    }
}
