//! The run pipeline: signer → requirements → authorizations → dispatch → report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chainclaim_core::{BatchReport, ClaimStats, Dispatcher, ReceiptInspector, Task};
use chainclaim_evm::{
    unlimited_approval_calldata, AuthorizationBuilder, AuthorizationSigner, CategoryMap,
    Erc721TransferDecoder, LocalSigner, SignedAuthorization,
};
use chainclaim_http::{
    ClaimClient, ClaimClientConfig, HttpClientConfig, HttpRpcClient, LocalSender, RemoteSigner,
    RetryConfig, TransactionSender,
};

use crate::config::{Cli, SigningMode};

const APPROVAL_POLL: Duration = Duration::from_secs(3);
const APPROVAL_TIMEOUT: Duration = Duration::from_secs(180);

/// Authorization signer plus the sender used for the approval transaction.
struct Payer {
    signer: Arc<dyn AuthorizationSigner>,
    sender: Box<dyn TransactionSender>,
}

/// Clients that send transactions never retry.
fn sending_client(url: &str) -> anyhow::Result<HttpRpcClient> {
    let config = HttpClientConfig {
        retry: RetryConfig::none(),
        ..HttpClientConfig::default()
    };
    Ok(HttpRpcClient::new(url, config)?)
}

fn payer(cli: &Cli, chain_id: u64) -> anyhow::Result<Payer> {
    match cli.signing_mode()? {
        SigningMode::Local { private_key } => {
            let signer = Arc::new(
                LocalSigner::from_private_key(&private_key).context("reading PRIVATE_KEY")?,
            );
            if let Some(wallet) = cli.wallet.as_deref().filter(|w| !w.trim().is_empty()) {
                if !wallet.eq_ignore_ascii_case(signer.address()) {
                    tracing::warn!(
                        wallet,
                        derived = signer.address(),
                        "WALLET does not match PRIVATE_KEY; using the key's address"
                    );
                }
            }
            let sender = LocalSender::new(sending_client(&cli.rpc)?, Arc::clone(&signer), chain_id);
            Ok(Payer {
                signer,
                sender: Box::new(sender),
            })
        }
        SigningMode::Remote { wallet, signer_url } => {
            tracing::info!(signer_url = %signer_url, "signing through remote endpoint");
            let remote = |url: &str| -> anyhow::Result<RemoteSigner> {
                Ok(RemoteSigner::new(sending_client(url)?, wallet.as_str()))
            };
            Ok(Payer {
                signer: Arc::new(remote(&signer_url)?),
                sender: Box::new(remote(&signer_url)?),
            })
        }
    }
}

pub async fn execute(cli: &Cli) -> anyhow::Result<BatchReport> {
    let node = Arc::new(HttpRpcClient::new(&cli.rpc, HttpClientConfig::default())?);
    let chain_id = node.chain_id().await.context("reading chain id")?;

    let payer = payer(cli, chain_id)?;
    let wallet = payer.signer.address().to_string();
    let recipient = cli.recipient(&wallet);
    tracing::info!(
        wallet = %wallet,
        recipient,
        chain_id,
        relay_contract = %cli.relay_contract,
        nft_contract = %cli.nft_contract,
        claims = cli.mint_count,
        workers = cli.worker_count,
        "chainclaim starting"
    );

    if cli.approve {
        approve_relayer(payer.sender.as_ref(), &node, cli).await?;
    }

    let claims = ClaimClient::new(&cli.api_base, &cli.jwt, ClaimClientConfig::default())?;
    tracing::info!(endpoint = claims.endpoint(), "fetching payment requirements");
    let requirements = claims
        .payment_requirements(recipient)
        .await
        .context("credential rejected or payment requirements unreadable")?;

    let builder = AuthorizationBuilder::new(payer.signer, &cli.token, &cli.relay_contract, chain_id)
        .with_domain(&cli.domain_name, &cli.domain_version);
    tracing::info!(count = cli.mint_count, chain_id, "building authorizations");
    let signed = builder
        .build_batch(cli.mint_count, &requirements.amount, &requirements.relayer_contract)
        .await
        .context("building authorizations")?;
    let tasks = Task::batch(signed.iter().map(SignedAuthorization::to_payload));

    let categories = CategoryMap::tiers();
    let stats = ClaimStats::new(recipient).with_categories(categories.categories());
    let inspector = ReceiptInspector::new(
        node,
        Arc::new(Erc721TransferDecoder::new(categories)),
        &cli.nft_contract,
        recipient,
    );

    let session = claims.session(recipient, &cli.token, &requirements);
    tracing::info!(workers = cli.worker_count, "dispatching claims");
    let report = Dispatcher::new(Arc::new(session), stats, cli.dispatch_config())
        .with_inspector(Arc::new(inspector))
        .run(tasks)
        .await?;
    Ok(report)
}

async fn approve_relayer(
    sender: &dyn TransactionSender,
    node: &HttpRpcClient,
    cli: &Cli,
) -> anyhow::Result<()> {
    tracing::info!(
        from = sender.account(),
        relayer = %cli.relayer,
        token = %cli.token,
        "approving unlimited allowance"
    );
    let data = unlimited_approval_calldata(&cli.relayer)?;
    let tx = sender
        .send_transaction(&cli.token, &data)
        .await
        .context("sending approval")?;
    tracing::info!(tx = %tx, "approval sent");

    let receipt = node
        .wait_for_receipt(&tx, APPROVAL_POLL, APPROVAL_TIMEOUT)
        .await
        .context("waiting for approval")?;
    if !receipt.succeeded() {
        bail!("approval transaction {tx} reverted");
    }
    tracing::info!(tx = %tx, "allowance approved");
    Ok(())
}
