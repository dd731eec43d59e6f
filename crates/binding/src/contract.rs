use crate::{bind, BindingError, BoundSurface, CallStrategy, EventSubscription, Method};
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy_json_abi::JsonAbi;
use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types::TransactionRequest;
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use subscription::{PendingOperation, TransactionSubscription, DEFAULT_CONFIRMATION_TIMEOUT};
use tracing::debug;
use transport::{LocalSigner, Signer, Transport};

/// Result of dispatching a bound method.
pub enum CallOutcome<T: Transport> {
    /// Decoded outputs of a read call
    Value(Vec<DynSolValue>),
    /// Handle on a submitted write call
    Subscription(TransactionSubscription<T>),
}

impl<T: Transport> CallOutcome<T> {
    pub fn into_value(self) -> Option<Vec<DynSolValue>> {
        match self {
            Self::Value(values) => Some(values),
            Self::Subscription(_) => None,
        }
    }

    pub fn into_subscription(self) -> Option<TransactionSubscription<T>> {
        match self {
            Self::Value(_) => None,
            Self::Subscription(subscription) => Some(subscription),
        }
    }
}

impl<T: Transport> fmt::Debug for CallOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(values) => f.debug_tuple("Value").field(values).finish(),
            Self::Subscription(subscription) => {
                f.debug_tuple("Subscription").field(subscription).finish()
            }
        }
    }
}

/// A deployed contract bound to a transport and, optionally, a signer.
pub struct Contract<T: Transport> {
    surface: BoundSurface,
    transport: Arc<T>,
    signer: Option<Arc<dyn Signer>>,
    confirmation_timeout: Duration,
}

impl<T: Transport> Contract<T> {
    /// Bind `descriptor` at `address`.
    ///
    /// Fails with [`BindingError::InvalidArgument`] before any transport
    /// interaction if the address or descriptor is malformed.
    pub fn new(
        address: &str,
        descriptor: &Value,
        transport: Arc<T>,
        signer: Option<Arc<dyn Signer>>,
    ) -> Result<Self, BindingError> {
        let surface = bind(address, descriptor)?;

        Ok(Self {
            surface,
            transport,
            signer,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        })
    }

    /// Timeout handed to every subscription created from now on.
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Same contract bound to `signer`.
    pub fn connect(&self, signer: Arc<dyn Signer>) -> Self {
        self.rebind(Some(signer))
    }

    /// Same contract bound to a signer built from a hex private key.
    pub fn connect_private_key(&self, private_key: &str) -> Result<Self, BindingError> {
        let signer = LocalSigner::from_private_key(private_key)
            .map_err(|e| BindingError::InvalidArgument(e.to_string()))?;
        Ok(self.connect(Arc::new(signer)))
    }

    /// Same contract without a signer. Write calls fail afterwards.
    pub fn disconnect(&self) -> Self {
        self.rebind(None)
    }

    fn rebind(&self, signer: Option<Arc<dyn Signer>>) -> Self {
        Self {
            surface: BoundSurface::from_abi(self.surface.address(), self.surface.abi().clone()),
            transport: self.transport.clone(),
            signer,
            confirmation_timeout: self.confirmation_timeout,
        }
    }

    pub const fn address(&self) -> Address {
        self.surface.address()
    }

    pub fn abi(&self) -> &JsonAbi {
        self.surface.abi()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    pub const fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    pub fn method(&self, name: &str) -> Result<&Method, BindingError> {
        self.surface
            .method(name)
            .ok_or_else(|| BindingError::UnknownMethod(name.to_string()))
    }

    /// Bound methods with their dispatch strategy.
    pub fn methods(&self) -> impl Iterator<Item = (&str, CallStrategy)> {
        self.surface
            .methods()
            .map(|(name, method)| (name, method.strategy))
    }

    /// Event names declared by the descriptor.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.surface.abi().events.keys().map(String::as_str)
    }

    /// Dispatch `name` with `args`.
    ///
    /// Read methods resolve to their decoded outputs. Write methods return a
    /// subscription as soon as the submission is started, without waiting
    /// for the transaction hash.
    pub async fn call(
        &self,
        name: &str,
        args: &[DynSolValue],
    ) -> Result<CallOutcome<T>, BindingError> {
        let method = self.method(name)?;
        let input = method
            .function
            .abi_encode_input(args)
            .map_err(|e| BindingError::InvalidArgument(format!("{name}: {e}")))?;

        match method.strategy {
            CallStrategy::Read => self.read(name, method, input.into()).await.map(CallOutcome::Value),
            CallStrategy::Write => self.write(name, input.into()).map(CallOutcome::Subscription),
        }
    }

    /// Dispatch `name` with arguments parsed from strings according to the
    /// descriptor's parameter types.
    pub async fn call_str(
        &self,
        name: &str,
        args: &[&str],
    ) -> Result<CallOutcome<T>, BindingError> {
        let inputs = &self.method(name)?.function.inputs;
        if inputs.len() != args.len() {
            return Err(BindingError::InvalidArgument(format!(
                "{name} expects {} arguments, got {}",
                inputs.len(),
                args.len()
            )));
        }

        let values = inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                param
                    .resolve()
                    .and_then(|ty| ty.coerce_str(arg))
                    .map_err(|e| BindingError::InvalidArgument(format!("{name}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.call(name, &values).await
    }

    /// Validate `names` against the descriptor's events.
    pub fn subscribe(&self, names: &[&str]) -> Result<EventSubscription, BindingError> {
        EventSubscription::new(self.surface.abi(), names)
    }

    async fn read(
        &self,
        name: &str,
        method: &Method,
        input: Bytes,
    ) -> Result<Vec<DynSolValue>, BindingError> {
        let mut tx = TransactionRequest::default()
            .with_to(self.address())
            .with_input(input);
        if let Some(signer) = &self.signer {
            tx = tx.with_from(signer.address());
        }

        debug!(address = %self.address(), method = name, "Read call");
        let output = self.transport.call(tx).await?;

        method
            .function
            .abi_decode_output(&output)
            .map_err(|e| BindingError::Decode {
                method: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn write(&self, name: &str, input: Bytes) -> Result<TransactionSubscription<T>, BindingError> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| BindingError::MissingSigner(name.to_string()))?;

        let tx = TransactionRequest::default()
            .with_to(self.address())
            .with_input(input);

        debug!(
            address = %self.address(),
            method = name,
            from = %signer.address(),
            "Submitting write call"
        );

        let transport = self.transport.clone();
        let pending =
            PendingOperation::spawn(async move { transport.submit(tx, signer.as_ref()).await });

        Ok(TransactionSubscription::with_timeout(
            pending,
            self.transport.clone(),
            self.confirmation_timeout,
        ))
    }
}

impl<T: Transport> Clone for Contract<T> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            transport: self.transport.clone(),
            signer: self.signer.clone(),
            confirmation_timeout: self.confirmation_timeout,
        }
    }
}

impl<T: Transport> fmt::Debug for Contract<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.address())
            .field("methods", &self.surface.methods().count())
            .field("signer", &self.signer.as_ref().map(|signer| signer.address()))
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use transport::mock::MockTransport;

    const ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn contract() -> Contract<MockTransport> {
        let descriptor = json!([
            {
                "type": "function",
                "name": "add",
                "inputs": [
                    { "name": "a", "type": "uint256" },
                    { "name": "b", "type": "uint256" }
                ],
                "outputs": [{ "name": "", "type": "uint256" }],
                "stateMutability": "pure"
            },
            {
                "type": "event",
                "name": "Added",
                "inputs": [],
                "anonymous": false
            }
        ]);
        Contract::new(ADDRESS, &descriptor, Arc::new(MockTransport::new()), None).unwrap()
    }

    #[test]
    fn test_unknown_method() {
        assert!(matches!(
            contract().method("subtract"),
            Err(BindingError::UnknownMethod(name)) if name == "subtract"
        ));
    }

    #[test]
    fn test_listing() {
        let contract = contract();
        assert_eq!(
            contract.methods().collect::<Vec<_>>(),
            [("add", CallStrategy::Read)]
        );
        assert_eq!(contract.events().collect::<Vec<_>>(), ["Added"]);
    }

    #[test]
    fn test_connect_and_disconnect_return_new_instances() {
        let contract = contract().with_confirmation_timeout(Duration::from_secs(5));

        let connected = contract.connect_private_key(KEY).unwrap();
        assert!(contract.signer().is_none());
        assert_eq!(
            connected.signer().unwrap().address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse::<Address>().unwrap()
        );
        assert_eq!(connected.confirmation_timeout(), Duration::from_secs(5));
        assert!(Arc::ptr_eq(connected.transport(), contract.transport()));

        let disconnected = connected.disconnect();
        assert!(disconnected.signer().is_none());
        assert!(connected.signer().is_some());
        assert_eq!(disconnected.methods().count(), 1);
    }

    #[test]
    fn test_malformed_private_key_is_invalid_argument() {
        assert!(matches!(
            contract().connect_private_key("0xnope"),
            Err(BindingError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_argument_count_checked() {
        let result = contract().call_str("add", &["1"]).await;
        assert!(matches!(result, Err(BindingError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_argument_type_checked() {
        let contract = contract();

        let result = contract.call_str("add", &["1", "two"]).await;
        assert!(matches!(result, Err(BindingError::InvalidArgument(_))));

        let result = contract
            .call("add", &[DynSolValue::String("1".to_string())])
            .await;
        assert!(matches!(result, Err(BindingError::InvalidArgument(_))));
        assert_eq!(contract.transport().interactions(), 0);
    }

    #[tokio::test]
    async fn test_call_str_coerces_arguments() {
        let contract = contract();
        let function = &contract.method("add").unwrap().function;
        contract.transport().set_call_result(
            function.selector(),
            function
                .abi_encode_output(&[DynSolValue::Uint(alloy_primitives::U256::from(3), 256)])
                .unwrap(),
        );

        let values = contract
            .call_str("add", &["1", "2"])
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(values, [DynSolValue::Uint(alloy_primitives::U256::from(3), 256)]);
    }

    #[tokio::test]
    async fn test_undecodable_output() {
        let contract = contract();
        let selector = contract.method("add").unwrap().function.selector();
        contract.transport().set_call_result(selector, vec![0x01]);

        let result = contract.call_str("add", &["1", "2"]).await;
        assert!(matches!(result, Err(BindingError::Decode { method, .. }) if method == "add"));
    }
}
