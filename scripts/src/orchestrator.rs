//! Sequential execution of a deployment plan
//!
//! Steps run strictly in plan order: each step may depend on the addresses of
//! the steps before it, and all transactions share the signer's nonce. The
//! first failure aborts the run; confirmed steps stay deployed and are
//! reported as partial progress.

use std::{collections::BTreeMap, future::Future, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    artifacts::ArtifactSource,
    chain::Chain,
    errors::{ScriptError, StepFailure},
    plan::DeploymentPlan,
    solidity::AddressBook,
    types::{
        DeployedArtifact, DeploymentReport, DeploymentStep, ExternalAddresses, Receipt, RunStatus,
        SignerContext, StepStatus, TxRequest,
    },
};

/// Executes deployment plans against a chain
pub struct Orchestrator<'a, C, A> {
    /// The chain to deploy to
    chain: &'a C,
    /// The source of contract bytecode
    artifacts: &'a A,
    /// Addresses supplied by configuration
    externals: ExternalAddresses,
    /// How long to wait for each receipt
    confirmation_timeout: Duration,
}

impl<'a, C: Chain, A: ArtifactSource> Orchestrator<'a, C, A> {
    /// Constructor
    pub fn new(
        chain: &'a C,
        artifacts: &'a A,
        externals: ExternalAddresses,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            artifacts,
            externals,
            confirmation_timeout,
        }
    }

    /// Execute every step of the plan.
    ///
    /// Returns an error only if the run could not start; step failures are
    /// recorded in the report.
    pub async fn execute(&self, plan: &DeploymentPlan) -> Result<DeploymentReport, ScriptError> {
        self.execute_until(plan, std::future::pending::<()>()).await
    }

    /// Execute every step of the plan, aborting if `shutdown` resolves first
    pub async fn execute_until<F: Future>(
        &self,
        plan: &DeploymentPlan,
        shutdown: F,
    ) -> Result<DeploymentReport, ScriptError> {
        let mut signer = self.chain.signer_context().await?;
        info!(
            deployer = %signer.address,
            chain_id = signer.chain_id,
            nonce = signer.next_nonce,
            steps = plan.len(),
            "starting deployment"
        );

        let mut report = DeploymentReport {
            status: RunStatus::Pending,
            steps: vec![StepStatus::Pending; plan.len()],
            artifacts: Vec::with_capacity(plan.len()),
            failure: None,
        };

        tokio::pin!(shutdown);
        report.status = RunStatus::Running;
        for (index, step) in plan.steps().iter().enumerate() {
            let status = &mut report.steps[index];
            let result = tokio::select! {
                res = self.run_step(step, &report.artifacts, &mut signer, status) => res,
                _ = &mut shutdown => Err(ScriptError::Cancelled),
            };

            match result {
                Ok(artifact) => {
                    report.steps[index] = StepStatus::Confirmed;
                    report.artifacts.push(artifact);
                }
                Err(error) => {
                    warn!(step = index + 1, label = %step.label, %error, "aborting deployment");
                    report.steps[index] = StepStatus::Failed;
                    report.status = RunStatus::Aborted;
                    report.failure = Some(StepFailure {
                        index,
                        label: step.label.clone(),
                        contract: step.contract.clone(),
                        error,
                    });
                    return Ok(report);
                }
            }
        }

        report.status = RunStatus::Completed;
        info!(deployed = report.artifacts.len(), "deployment complete");
        Ok(report)
    }

    /// Deploy a single step, then call its initializer if it has one
    async fn run_step(
        &self,
        step: &DeploymentStep,
        deployed: &[DeployedArtifact],
        signer: &mut SignerContext,
        status: &mut StepStatus,
    ) -> Result<DeployedArtifact, ScriptError> {
        let book = AddressBook::new(deployed, &self.externals);
        let artifact = self.artifacts.resolve(&step.contract)?;

        let libraries = step
            .libraries
            .iter()
            .map(|(library, id)| Ok((library.clone(), book.step(*id)?)))
            .collect::<Result<BTreeMap<_, _>, ScriptError>>()?;
        let code = artifact.link(&libraries)?;
        let ctor_args = book.encode_constructor_args(&artifact, &step.args)?;
        let init_code = [&code[..], &ctor_args[..]].concat();

        let receipt = self
            .transact(TxRequest::Create { code: init_code.into() }, signer, status)
            .await?;
        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::Submission(format!(
                "receipt of {:#x} has no contract address",
                receipt.tx_hash
            ))
        })?;

        println!("[{}] {} deployed to: {:#x}", step.kind, step.label, address);
        info!(label = %step.label, %address, tx_hash = %receipt.tx_hash, "step confirmed");

        let mut initializer_tx_hash = None;
        if let Some(call) = &step.initializer {
            let input = book.encode_call(call)?;
            let init_receipt = self
                .transact(TxRequest::Call { to: address, input }, signer, status)
                .await?;
            println!("[initializer] {} called on {}", call.signature, step.label);
            initializer_tx_hash = Some(init_receipt.tx_hash);
        }

        Ok(DeployedArtifact {
            label: step.label.clone(),
            contract: step.contract.clone(),
            kind: step.kind,
            address,
            tx_hash: receipt.tx_hash,
            initializer_tx_hash,
        })
    }

    /// Submit a transaction and wait for it to be included successfully
    async fn transact(
        &self,
        tx: TxRequest,
        signer: &mut SignerContext,
        status: &mut StepStatus,
    ) -> Result<Receipt, ScriptError> {
        let tx_hash = self.bounded(self.chain.submit(&tx, signer)).await?;
        *status = StepStatus::Submitted;
        debug!(tx_hash = %tx_hash, "transaction submitted");

        let receipt = self.bounded(self.chain.wait_for_receipt(tx_hash)).await?;
        if !receipt.success {
            return Err(ScriptError::Revert(tx_hash));
        }

        Ok(receipt)
    }

    /// Await a chain operation, bounded by the confirmation timeout
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, ScriptError>>,
    ) -> Result<T, ScriptError> {
        tokio::time::timeout(self.confirmation_timeout, operation)
            .await
            .map_err(|_| ScriptError::ConfirmationTimeout(self.confirmation_timeout))?
    }
}
