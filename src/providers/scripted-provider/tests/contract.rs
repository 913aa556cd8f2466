use adrelay_core::provider_contract::{run_provider_contract, ProviderContractExpectations};
use adrelay_core::AdArgs;
use scripted_provider::{ScriptedOptions, ScriptedProvider, SCRIPTED_PROVIDER_ID};

fn expectations(ads_enabled: bool) -> ProviderContractExpectations {
    ProviderContractExpectations {
        provider_id: SCRIPTED_PROVIDER_ID.into(),
        ads_enabled,
        args: AdArgs::new().with("contract-unit"),
    }
}

#[test]
fn scripted_provider_contract() {
    let provider = ScriptedProvider::default();
    if let Err(e) = run_provider_contract(Box::new(provider), &expectations(true)) {
        panic!("Contract test failed: {}", e);
    }
}

#[test]
fn scripted_provider_contract_with_clicks_and_sparse_progress() {
    let provider = ScriptedProvider::new(ScriptedOptions {
        emit_click: true,
        quartiles: false,
        ..ScriptedOptions::default()
    });
    if let Err(e) = run_provider_contract(Box::new(provider), &expectations(true)) {
        panic!("Contract test failed: {}", e);
    }
}

#[test]
fn scripted_provider_contract_when_blocked() {
    let provider = ScriptedProvider::new(ScriptedOptions {
        ads_enabled: false,
        ..ScriptedOptions::default()
    });
    if let Err(e) = run_provider_contract(Box::new(provider), &expectations(false)) {
        panic!("Contract test failed: {}", e);
    }
}
