use crate::BindingError;
use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::B256;
use std::collections::BTreeMap;
use tracing::debug;

/// Set of event names validated against a descriptor.
#[derive(Debug, Clone)]
pub struct EventSubscription {
    events: BTreeMap<String, Event>,
}

impl EventSubscription {
    /// Fails with [`BindingError::UnknownEvent`] if any name is not declared.
    pub fn new(abi: &JsonAbi, names: &[&str]) -> Result<Self, BindingError> {
        let events = names
            .iter()
            .map(|&name| {
                abi.events
                    .get(name)
                    .and_then(|overloads| overloads.first())
                    .map(|event| (name.to_string(), event.clone()))
                    .ok_or_else(|| BindingError::UnknownEvent(name.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self { events })
    }

    /// Register `callback` for `name`.
    ///
    /// Only checks that `name` was requested; no log is ever delivered.
    pub fn on<F>(&self, name: &str, _callback: F) -> Result<(), BindingError>
    where
        F: Fn(Vec<DynSolValue>) + Send + Sync + 'static,
    {
        if !self.events.contains_key(name) {
            return Err(BindingError::NotSubscribed(name.to_string()));
        }

        // TODO: attach to a log filter on the transport and decode with `Event::decode_log`
        debug!(event = name, "Event listener accepted");
        Ok(())
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    /// First topic of logs emitted by `name`.
    pub fn topic(&self, name: &str) -> Option<B256> {
        self.events.get(name).map(Event::selector)
    }
}
