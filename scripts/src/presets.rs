//! Built-in plans for the identity-registry contract families

use std::fmt::{self, Display};

use alloy::sol_types::SolCall;
use clap::ValueEnum;

use crate::{
    constants::{ADMIN_ADDRESS_KEY, PROXY_CONTRACT_NAME, UTILS_LIBRARY_NAME},
    errors::ScriptError,
    plan::DeploymentPlan,
    solidity::initializeCall,
    types::{Argument, DeploymentStep},
};

/// The identity-registry families that can be deployed without a plan file
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Preset {
    /// The E2EWallet account, key manager and registry
    E2eWallet,
    /// The FuturePass account, key manager and registry
    FuturePass,
}

impl Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::E2eWallet => write!(f, "e2e-wallet"),
            Preset::FuturePass => write!(f, "future-pass"),
        }
    }
}

/// The contract names making up a registry family
struct RegistryFamily {
    /// The account implementation
    account: &'static str,
    /// The key manager implementation
    key_manager: &'static str,
    /// The registry implementation, linked against the utilities library
    registry: &'static str,
}

impl Preset {
    /// The contracts of this family
    fn family(self) -> RegistryFamily {
        match self {
            Preset::E2eWallet => RegistryFamily {
                account: "E2EWallet",
                key_manager: "E2EWalletKeyManager",
                registry: "E2EWalletRegistry",
            },
            Preset::FuturePass => RegistryFamily {
                account: "FuturePass",
                key_manager: "FuturePassKeyManager",
                registry: "FuturePassIdentityRegistry",
            },
        }
    }

    /// Build the plan for this family.
    ///
    /// The registry is deployed behind a `TransparentUpgradeableProxy` whose
    /// upgrade admin is the configured `admin` address, and which initializes
    /// the registry with the account and key manager implementations.
    pub fn plan(self) -> Result<DeploymentPlan, ScriptError> {
        let family = self.family();
        let mut plan = DeploymentPlan::new();

        let account = plan.push(DeploymentStep::contract(family.account))?;
        let key_manager = plan.push(DeploymentStep::contract(family.key_manager))?;
        let utils = plan.push(DeploymentStep::library(UTILS_LIBRARY_NAME))?;
        let registry = plan.push(
            DeploymentStep::contract(family.registry).link(UTILS_LIBRARY_NAME, utils),
        )?;
        plan.push(
            DeploymentStep::contract(PROXY_CONTRACT_NAME)
                .arg(Argument::step(registry))
                .arg(Argument::external(ADMIN_ADDRESS_KEY))
                .arg(Argument::call(
                    initializeCall::SIGNATURE,
                    vec![Argument::step(account), Argument::step(key_manager)],
                )),
        )?;

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;

    #[test]
    fn test_future_pass_plan() {
        let plan = Preset::FuturePass.plan().unwrap();
        let labels: Vec<_> = plan.steps().iter().map(|s| s.label.as_str()).collect();

        assert_eq!(
            labels,
            [
                "FuturePass",
                "FuturePassKeyManager",
                "Utils",
                "FuturePassIdentityRegistry",
                "TransparentUpgradeableProxy"
            ]
        );
        assert_eq!(plan.steps()[2].kind, ArtifactKind::Library);
    }

    #[test]
    fn test_e2e_wallet_summary() {
        let summary = Preset::E2eWallet.plan().unwrap().summary();

        assert_eq!(summary[3], "4. [contract] E2EWalletRegistry links: Utils=<Utils>");
        assert_eq!(
            summary[4],
            "5. [contract] TransparentUpgradeableProxy args: <E2EWalletRegistry>, $admin, \
             initialize(<E2EWallet>, <E2EWalletKeyManager>)"
        );
    }
}
