//! Helpers shared by the `contract` binary.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::hex;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;
use transport::Receipt;

/// Install the global tracing subscriber, `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to `addr`.
pub fn install_prometheus_exporter(addr: SocketAddr) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    subscription::metrics::describe();
    Ok(())
}

/// Render a decoded value the way it would be written in Solidity source.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Address(address) => address.to_string(),
        DynSolValue::Function(function) => function.to_string(),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => format!("{s:?}"),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            format!("[{}]", join(values))
        }
        DynSolValue::Tuple(values) => format!("({})", join(values)),
        #[allow(unreachable_patterns)]
        other => format!("{other:?}"),
    }
}

fn join(values: &[DynSolValue]) -> String {
    values.iter().map(format_value).collect::<Vec<_>>().join(", ")
}

pub fn format_receipt(receipt: &Receipt) -> String {
    format!(
        "{} {} in block {} ({} confirmations, gas used {})",
        receipt.transaction_hash,
        if receipt.status { "succeeded" } else { "reverted" },
        receipt.block_number,
        receipt.confirmations,
        receipt.gas_used
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, I256, U256};

    #[test]
    fn test_format_scalars() {
        assert_eq!(format_value(&DynSolValue::Bool(true)), "true");
        assert_eq!(
            format_value(&DynSolValue::Uint(U256::from(42), 256)),
            "42"
        );
        assert_eq!(
            format_value(&DynSolValue::Int(I256::try_from(-7i64).unwrap(), 32)),
            "-7"
        );
        assert_eq!(
            format_value(&DynSolValue::String("hello".to_string())),
            "\"hello\""
        );
        assert_eq!(
            format_value(&DynSolValue::Address(Address::ZERO)),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(
            format_value(&DynSolValue::FixedBytes(B256::repeat_byte(0xab), 2)),
            "0xabab"
        );
        assert_eq!(
            format_value(&DynSolValue::Bytes(vec![0xde, 0xad])),
            "0xdead"
        );
    }

    #[test]
    fn test_format_nested() {
        let value = DynSolValue::Tuple(vec![
            DynSolValue::Bool(false),
            DynSolValue::Array(vec![
                DynSolValue::Uint(U256::from(1), 8),
                DynSolValue::Uint(U256::from(2), 8),
            ]),
        ]);
        assert_eq!(format_value(&value), "(false, [1, 2])");
        assert_eq!(format_value(&DynSolValue::Array(vec![])), "[]");
    }

    #[test]
    fn test_format_receipt() {
        let receipt = Receipt {
            transaction_hash: B256::ZERO,
            block_number: 7,
            status: false,
            gas_used: 21_000,
            confirmations: 1,
        };
        assert!(format_receipt(&receipt).ends_with("reverted in block 7 (1 confirmations, gas used 21000)"));
    }
}
