//! Transaction signing capability.

use crate::TransportError;
use alloy_consensus::TxEnvelope;
use alloy_network::{eip2718::Encodable2718, EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use std::{fmt, future::Future, pin::Pin};

/// Future returned by [`Signer::sign_transaction`].
pub type SignFuture<'a> = Pin<Box<dyn Future<Output = eyre::Result<Bytes>> + Send + 'a>>;

/// A credential holder able to authorize write calls.
///
/// Bindings only accept writes when a `Signer` is attached; the capability is
/// checked through this trait rather than by inspecting the credential.
pub trait Signer: Send + Sync {
    /// Address transactions are sent from.
    fn address(&self) -> Address;

    /// Sign a fully populated transaction request.
    ///
    /// Returns the EIP-2718 encoded transaction, ready for broadcast.
    fn sign_transaction(&self, tx: TransactionRequest) -> SignFuture<'_>;
}

/// Signer holding a private key in memory.
#[derive(Clone)]
pub struct LocalSigner {
    address: Address,
    wallet: EthereumWallet,
}

impl LocalSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            address: signer.address(),
            wallet: EthereumWallet::from(signer),
        }
    }

    /// Parse a hex private key, with or without `0x` prefix.
    pub fn from_private_key(private_key: &str) -> Result<Self, TransportError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| TransportError::InvalidPrivateKey(format!("{}", e)))?;

        Ok(Self::new(signer))
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_transaction(&self, tx: TransactionRequest) -> SignFuture<'_> {
        Box::pin(async move {
            let tx_envelope: TxEnvelope = tx
                .build(&self.wallet)
                .await
                .map_err(|e| eyre::eyre!("{}", e))?;

            let mut encoded = Vec::new();
            tx_envelope.encode_2718(&mut encoded);
            Ok(Bytes::from(encoded))
        })
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_from_private_key() {
        let signer = LocalSigner::from_private_key(KEY_ONE).unwrap();
        assert_eq!(
            signer.address(),
            address!("7E5F4552091A69125d5DfCb7b8C2659029395Bdf")
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = LocalSigner::from_private_key("not a key");
        assert!(matches!(result, Err(TransportError::InvalidPrivateKey(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = LocalSigner::from_private_key(KEY_ONE).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("LocalSigner"));
        assert!(!debug.contains("0000000000000000000000000000000000000000000000000000000000000001"));
    }

    #[tokio::test]
    async fn test_sign_eip1559_transaction() {
        let signer = LocalSigner::from_private_key(KEY_ONE).unwrap();
        let tx = TransactionRequest::default()
            .with_from(signer.address())
            .with_to(Address::repeat_byte(1))
            .with_value(U256::from(1))
            .with_chain_id(1)
            .with_nonce(0)
            .with_gas_limit(21_000)
            .with_max_fee_per_gas(2_000_000_000)
            .with_max_priority_fee_per_gas(1_000_000_000);

        let raw = signer.sign_transaction(tx).await.unwrap();

        // EIP-1559 transaction type byte
        assert_eq!(raw[0], 0x02);
    }
}
