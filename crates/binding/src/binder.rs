use crate::{
    validation::{is_address, is_descriptor},
    BindingError,
};
use alloy_json_abi::{Function, JsonAbi, StateMutability};
use alloy_primitives::Address;
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::debug;

/// How a descriptor entry is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStrategy {
    /// Executed locally by the node, returns decoded values
    Read,
    /// Signed and broadcast, returns a subscription
    Write,
}

impl CallStrategy {
    pub const fn classify(mutability: StateMutability) -> Self {
        match mutability {
            StateMutability::Pure | StateMutability::View => Self::Read,
            StateMutability::NonPayable | StateMutability::Payable => Self::Write,
        }
    }
}

impl fmt::Display for CallStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub function: Function,
    pub strategy: CallStrategy,
}

/// Method table derived from a descriptor for one address.
#[derive(Debug, Clone)]
pub struct BoundSurface {
    address: Address,
    abi: Arc<JsonAbi>,
    methods: BTreeMap<String, Method>,
}

/// Validate `address` and `descriptor` and derive the method table.
pub fn bind(address: &str, descriptor: &Value) -> Result<BoundSurface, BindingError> {
    if !is_address(address) {
        return Err(BindingError::InvalidArgument(format!(
            "address must be 0x followed by 40 hex digits, got {address:?}"
        )));
    }

    if !is_descriptor(descriptor) {
        return Err(BindingError::InvalidArgument(
            "descriptor must be a JSON array".to_string(),
        ));
    }

    let address = address
        .parse::<Address>()
        .map_err(|e| BindingError::InvalidArgument(format!("address {address}: {e}")))?;
    let entries = descriptor
        .as_array()
        .into_iter()
        .flatten()
        .filter(|entry| is_known_entry(entry))
        .cloned()
        .collect::<Vec<_>>();
    let abi = serde_json::from_value::<JsonAbi>(Value::Array(entries))
        .map_err(|e| BindingError::InvalidArgument(format!("malformed descriptor: {e}")))?;

    Ok(BoundSurface::from_abi(address, Arc::new(abi)))
}

/// Entry kinds a JSON ABI can hold. Entries without a `type` are parsed as
/// functions.
const ENTRY_KINDS: [&str; 6] = [
    "function",
    "event",
    "constructor",
    "fallback",
    "receive",
    "error",
];

fn is_known_entry(entry: &Value) -> bool {
    match entry.get("type") {
        None => true,
        Some(Value::String(kind)) if ENTRY_KINDS.contains(&kind.as_str()) => true,
        Some(kind) => {
            debug!(%kind, name = ?entry.get("name"), "Skipping descriptor entry");
            false
        }
    }
}

impl BoundSurface {
    /// Derive the method table from an already parsed descriptor.
    ///
    /// Overloaded names are also reachable by full signature, e.g.
    /// `transfer(address,uint256)`. The bare name resolves to the first
    /// overload in descriptor order.
    pub fn from_abi(address: Address, abi: Arc<JsonAbi>) -> Self {
        let mut methods = BTreeMap::new();

        for (name, overloads) in &abi.functions {
            let Some(first) = overloads.first() else {
                continue;
            };
            methods.insert(name.clone(), Method::new(first.clone()));

            if overloads.len() > 1 {
                for function in overloads {
                    methods.insert(function.signature(), Method::new(function.clone()));
                }
            }
        }

        debug!(
            address = %address,
            methods = methods.len(),
            events = abi.events.len(),
            "Bound contract surface"
        );

        Self {
            address,
            abi,
            methods,
        }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Arc<JsonAbi> {
        &self.abi
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Bound methods keyed by name or signature.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &Method)> {
        self.methods.iter().map(|(name, method)| (name.as_str(), method))
    }
}

impl Method {
    fn new(function: Function) -> Self {
        let strategy = CallStrategy::classify(function.state_mutability);
        Self { function, strategy }
    }
}
