//! Common test setup shared across integration tests.
#![allow(dead_code)]

use alloy_dyn_abi::{DynSolValue, FunctionExt};
use binding::Contract;
use serde_json::{json, Value};
use std::sync::Arc;
use transport::{mock::MockTransport, LocalSigner, Signer};

pub const ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Well-known development key, address 0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf
pub const PRIVATE_KEY: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000001";

/// Descriptor of a contract storing a single string.
pub fn storage_descriptor() -> Value {
    json!([
        {
            "type": "function",
            "name": "value",
            "inputs": [],
            "outputs": [{ "name": "", "type": "string", "internalType": "string" }],
            "stateMutability": "view"
        },
        {
            "type": "function",
            "name": "setValue",
            "inputs": [{ "name": "_value", "type": "string", "internalType": "string" }],
            "outputs": [],
            "stateMutability": "nonpayable"
        },
        {
            "type": "event",
            "name": "ValueChanged",
            "inputs": [
                { "name": "author", "type": "address", "indexed": true },
                { "name": "oldValue", "type": "string", "indexed": false },
                { "name": "newValue", "type": "string", "indexed": false }
            ],
            "anonymous": false
        }
    ])
}

pub fn signer() -> Arc<dyn Signer> {
    Arc::new(LocalSigner::from_private_key(PRIVATE_KEY).expect("valid development key"))
}

/// Storage contract on a fresh mock transport, optionally with a signer.
pub fn storage_contract(with_signer: bool) -> Contract<MockTransport> {
    let transport = Arc::new(MockTransport::new());
    let signer = with_signer.then(signer);

    Contract::new(ADDRESS, &storage_descriptor(), transport, signer)
        .expect("Failed to bind storage contract")
}

/// Make `value()` return `stored`.
pub fn stub_value(contract: &Contract<MockTransport>, stored: &str) {
    let function = &contract.method("value").unwrap().function;
    let output = function
        .abi_encode_output(&[DynSolValue::String(stored.to_string())])
        .unwrap();
    contract
        .transport()
        .set_call_result(function.selector(), output);
}
