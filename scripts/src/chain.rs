//! The chain endpoint the orchestrator submits transactions to

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    time::Duration,
};

use alloy::{
    network::{ReceiptResponse, TransactionBuilder},
    primitives::{keccak256, Address, TxHash},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use tracing::debug;

use crate::{
    constants::RECEIPT_POLL_INTERVAL_MS,
    errors::ScriptError,
    types::{Receipt, SignerContext, TxRequest},
};

/// A network endpoint accepting transactions from a single signer
#[allow(async_fn_in_trait)]
pub trait Chain {
    /// Fetch the signer's address, chain id and next nonce.
    ///
    /// Called once per run; the returned context is then threaded through
    /// every submission of the run.
    async fn signer_context(&self) -> Result<SignerContext, ScriptError>;

    /// Submit a transaction using the context's next nonce, advancing the
    /// nonce once the network has accepted the transaction
    async fn submit(
        &self,
        tx: &TxRequest,
        signer: &mut SignerContext,
    ) -> Result<TxHash, ScriptError>;

    /// Block until the transaction is included
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, ScriptError>;
}

/// A JSON-RPC endpoint with a local private-key signer
pub struct RpcChain {
    /// The provider, with the deployer's wallet attached
    provider: DynProvider,
    /// The deployer's address
    deployer: Address,
    /// The interval at which receipts are polled
    poll_interval: Duration,
}

impl RpcChain {
    /// Connect to the given RPC URL, signing with the given key
    pub fn connect(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, ScriptError> {
        let url =
            Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        let deployer = signer.address();
        let provider = ProviderBuilder::new().wallet(signer).connect_http(url);

        Ok(Self::from_provider(DynProvider::new(provider), deployer))
    }

    /// Wrap a provider that signs for the given deployer
    pub fn from_provider(provider: DynProvider, deployer: Address) -> Self {
        Self {
            provider,
            deployer,
            poll_interval: Duration::from_millis(RECEIPT_POLL_INTERVAL_MS),
        }
    }

    /// The deployer's address
    pub fn deployer(&self) -> Address {
        self.deployer
    }
}

impl Chain for RpcChain {
    async fn signer_context(&self) -> Result<SignerContext, ScriptError> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        // Count transactions still in the mempool, so the run does not
        // replace them
        let nonce = self
            .provider
            .get_transaction_count(self.deployer)
            .pending()
            .await
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

        Ok(SignerContext::new(self.deployer, chain_id, nonce))
    }

    async fn submit(
        &self,
        tx: &TxRequest,
        signer: &mut SignerContext,
    ) -> Result<TxHash, ScriptError> {
        let request = TransactionRequest::default()
            .with_from(signer.address)
            .with_chain_id(signer.chain_id)
            .with_nonce(signer.next_nonce);
        let request = match tx {
            TxRequest::Create { code } => request.with_deploy_code(code.clone()),
            TxRequest::Call { to, input } => request.with_to(*to).with_input(input.clone()),
        };

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| ScriptError::Submission(e.to_string()))?;
        signer.advance();

        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, ScriptError> {
        // Poll rather than watch the pending transaction, which some nodes
        // do not support
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| ScriptError::Submission(e.to_string()))?;

            match receipt {
                Some(receipt) => {
                    return Ok(Receipt {
                        tx_hash: ReceiptResponse::transaction_hash(&receipt),
                        contract_address: ReceiptResponse::contract_address(&receipt),
                        success: ReceiptResponse::status(&receipt),
                    })
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

/// A chain that never touches the network: creations land at the address
/// the deployer's nonce predicts, and every transaction succeeds.
///
/// Used to preview a plan before running it.
pub struct SimulatedChain {
    /// The deployer's address
    deployer: Address,
    /// The chain id reported to the run
    chain_id: u64,
    /// The nonce of the next transaction, carried across runs
    nonce: Cell<u64>,
    /// Receipts of submitted transactions
    receipts: RefCell<HashMap<TxHash, Receipt>>,
    /// Every submitted transaction, in order
    submitted: RefCell<Vec<TxRequest>>,
}

impl SimulatedChain {
    /// Constructor
    pub fn new(deployer: Address, chain_id: u64, start_nonce: u64) -> Self {
        Self {
            deployer,
            chain_id,
            nonce: Cell::new(start_nonce),
            receipts: RefCell::new(HashMap::new()),
            submitted: RefCell::new(Vec::new()),
        }
    }

    /// The transactions submitted so far
    pub fn submitted(&self) -> Vec<TxRequest> {
        self.submitted.borrow().clone()
    }
}

impl Chain for SimulatedChain {
    async fn signer_context(&self) -> Result<SignerContext, ScriptError> {
        Ok(SignerContext::new(self.deployer, self.chain_id, self.nonce.get()))
    }

    async fn submit(
        &self,
        tx: &TxRequest,
        signer: &mut SignerContext,
    ) -> Result<TxHash, ScriptError> {
        let nonce = signer.next_nonce;
        let mut preimage = nonce.to_be_bytes().to_vec();
        let contract_address = match tx {
            TxRequest::Create { code } => {
                preimage.extend_from_slice(code);
                Some(signer.address.create(nonce))
            }
            TxRequest::Call { to, input } => {
                preimage.extend_from_slice(to.as_slice());
                preimage.extend_from_slice(input);
                None
            }
        };

        let tx_hash = keccak256(&preimage);
        debug!(nonce, tx_hash = %tx_hash, "simulated transaction");
        self.receipts.borrow_mut().insert(
            tx_hash,
            Receipt {
                tx_hash,
                contract_address,
                success: true,
            },
        );
        self.submitted.borrow_mut().push(tx.clone());
        signer.advance();
        self.nonce.set(signer.next_nonce);

        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, ScriptError> {
        self.receipts
            .borrow()
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| ScriptError::Submission(format!("unknown transaction {tx_hash:#x}")))
    }
}
