use binding::Contract;
use clap::{Parser, Subcommand};
use config::Config;
use contract_cli::{format_receipt, format_value, init_tracing, install_prometheus_exporter};
use eyre::{bail, eyre};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use subscription::SubscriptionError;
use tokio::sync::mpsc;
use tracing::info;
use transport::{create_provider, LocalSigner, Receipt, RpcTransport, Signer, Transport};

/// Call any deployed contract through its JSON ABI.
#[derive(Debug, Parser)]
#[command(name = "contract", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    /// Hex private key used to sign write calls
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List bound methods and declared events
    Methods,

    /// Run a read call and print the decoded outputs
    Read { method: String, args: Vec<String> },

    /// Submit a write call and wait for its confirmation
    Send {
        method: String,
        args: Vec<String>,

        /// Wait for inclusion without a confirmation listener
        #[arg(long)]
        wait: bool,
    },

    /// Validate event names and print their topics
    Events {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Some(addr) = cli.metrics_addr {
        install_prometheus_exporter(addr)?;
        info!(%addr, "Serving metrics");
    }

    let config = Config::from_file(&cli.config)?;
    info!(
        config = %cli.config.display(),
        rpc_url = %config.rpc_url,
        address = %config.address,
        "Loaded config"
    );

    let descriptor = config.load_descriptor()?;
    let provider = create_provider(&config.rpc_url)?;
    let transport = RpcTransport::new(provider, config.poll_interval());

    let signer = cli
        .private_key
        .as_deref()
        .map(LocalSigner::from_private_key)
        .transpose()?
        .map(|signer| Arc::new(signer) as Arc<dyn Signer>);
    if let Some(signer) = &signer {
        info!(from = %signer.address(), "Using signer");
    }

    let contract = Contract::new(&config.address, &descriptor, transport, signer)?
        .with_confirmation_timeout(config.confirmation_timeout());

    match cli.command {
        Command::Methods => {
            for (name, strategy) in contract.methods() {
                println!("{:<5} {name}", strategy.to_string());
            }
            for name in contract.events() {
                println!("event {name}");
            }
        }
        Command::Read { method, args } => {
            let args = args.iter().map(String::as_str).collect::<Vec<_>>();
            let values = contract
                .call_str(&method, &args)
                .await?
                .into_value()
                .ok_or_else(|| eyre!("{method} sends a transaction, use `send`"))?;

            for value in &values {
                println!("{}", format_value(value));
            }
        }
        Command::Send { method, args, wait } => {
            let args = args.iter().map(String::as_str).collect::<Vec<_>>();
            let receipt = send(&contract, &method, &args, wait).await?;
            println!("{}", format_receipt(&receipt));
        }
        Command::Events { names } => {
            let names = names.iter().map(String::as_str).collect::<Vec<_>>();
            let subscription = contract.subscribe(&names)?;

            for name in subscription.events() {
                if let Some(topic) = subscription.topic(name) {
                    println!("{name} {topic}");
                }
            }
        }
    }

    Ok(())
}

async fn send<T: Transport>(
    contract: &Contract<T>,
    method: &str,
    args: &[&str],
    wait: bool,
) -> eyre::Result<Receipt> {
    let subscription = contract
        .call_str(method, args)
        .await?
        .into_subscription()
        .ok_or_else(|| eyre!("{method} is a read call, use `read`"))?;

    if wait {
        return Ok(subscription.wait_for_settlement().await?);
    }

    let (sender, mut outcomes) = mpsc::unbounded_channel::<Result<Receipt, SubscriptionError>>();
    let failures = sender.clone();
    subscription.on_failure(move |e| {
        let _ = failures.send(Err(e));
    });
    subscription
        .on_confirmation(move |receipt| {
            sender.send(Ok(receipt.clone()))?;
            Ok(())
        })
        .await?;

    info!(
        hash = ?subscription.hash(),
        timeout_ms = subscription.timeout().as_millis() as u64,
        "Waiting for confirmation"
    );

    match outcomes.recv().await {
        Some(Ok(receipt)) => Ok(receipt),
        Some(Err(e)) => Err(e.into()),
        None => bail!("subscription closed without an outcome"),
    }
}
