//! Implementations of the various deploy scripts

use std::{fs, path::Path};

use tracing::{info, warn};

use crate::{
    artifacts::HardhatArtifacts,
    chain::{Chain, RpcChain, SimulatedChain},
    cli::{Cli, DryRunArgs, PlanArgs, RemapArgs},
    deployments::write_deployments,
    errors::ScriptError,
    orchestrator::Orchestrator,
    remappings::Remappings,
    types::DeploymentReport,
};

/// Deploy the selected plan to the network
pub async fn deploy(args: &PlanArgs, cli: &Cli) -> Result<(), ScriptError> {
    let plan = args.load()?;
    let externals = cli.externals()?;
    let rpc_url = cli.rpc_url();

    let chain = RpcChain::connect(&rpc_url, cli.signer()?)?;
    let artifacts = HardhatArtifacts::new(&cli.artifacts);
    info!(
        plan = %args.name(),
        %rpc_url,
        deployer = %chain.deployer(),
        "deploying plan"
    );

    let orchestrator =
        Orchestrator::new(&chain, &artifacts, externals, cli.confirmation_timeout());
    let report = orchestrator.execute_until(&plan, shutdown_signal()).await?;

    record_and_conclude(report, cli.deployments_path.as_deref())
}

/// Execute the selected plan against a simulated chain, printing the
/// addresses its steps would be deployed to
pub async fn dry_run(args: &DryRunArgs, cli: &Cli) -> Result<(), ScriptError> {
    let plan = args.plan.load()?;
    let externals = cli.externals()?;

    let chain = match args.nonce {
        Some(nonce) => SimulatedChain::new(args.deployer(cli)?, 0 /* chain_id */, nonce),
        None => {
            let context = RpcChain::connect(&cli.rpc_url(), cli.signer()?)?
                .signer_context()
                .await?;
            SimulatedChain::new(context.address, context.chain_id, context.next_nonce)
        }
    };
    let artifacts = HardhatArtifacts::new(&cli.artifacts);
    info!(plan = %args.plan.name(), "simulating plan");

    let orchestrator =
        Orchestrator::new(&chain, &artifacts, externals, cli.confirmation_timeout());
    let report = orchestrator.execute(&plan).await?;

    println!("Dry run: {} transactions, nothing was sent", chain.submitted().len());
    conclude(report)
}

/// Print the steps of the selected plan
pub fn show_plan(args: &PlanArgs) -> Result<(), ScriptError> {
    let plan = args.load()?;
    for line in plan.summary() {
        println!("{line}");
    }

    Ok(())
}

/// Rewrite import paths in the given Solidity sources, in place
pub fn remap(args: &RemapArgs) -> Result<(), ScriptError> {
    let remappings = Remappings::from_file(&args.remappings)?;

    for file in args.files() {
        let source = fs::read_to_string(file)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", file.display(), e)))?;
        let remapped = remappings.apply(&source);

        if remapped != source {
            fs::write(file, remapped)
                .map_err(|e| ScriptError::WriteFile(format!("{}: {}", file.display(), e)))?;
            println!("Remapped {}", file.display());
        }
    }

    Ok(())
}

/// Record the run's addresses if requested, then conclude it.
///
/// A step failure takes precedence over an error recording the addresses.
fn record_and_conclude(
    report: DeploymentReport,
    deployments_path: Option<&Path>,
) -> Result<(), ScriptError> {
    let mut recorded = Ok(());
    if let Some(path) = deployments_path.filter(|_| !report.artifacts.is_empty()) {
        recorded = write_deployments(path, &report.artifacts);
        match &recorded {
            Ok(()) => info!(path = %path.display(), "recorded deployed addresses"),
            Err(error) => warn!(path = %path.display(), %error, "could not record addresses"),
        }
    }

    conclude(report)?;
    recorded
}

/// Print the partial progress of an aborted run, and surface its failure
fn conclude(report: DeploymentReport) -> Result<(), ScriptError> {
    if !report.is_complete() {
        println!(
            "Deployed {} of {} steps before aborting",
            report.artifacts.len(),
            report.steps.len()
        );
        for artifact in &report.artifacts {
            println!("\t{}: {:#x}", artifact.label, artifact.address);
        }
    }

    report.into_result().map(|_| ())
}

/// Resolves when the operator interrupts the process
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("could not listen for interrupts: {e}");
        std::future::pending::<()>().await;
    }
}
