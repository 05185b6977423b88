//! ABI encoding of constructor arguments and function calls made during deployment

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, Param},
    primitives::{Address, Bytes},
    sol,
};

use crate::{
    artifacts::Artifact,
    errors::ScriptError,
    types::{Argument, DeployedArtifact, ExternalAddresses, FunctionCall, StepId},
};

sol! {
    /// The initializer shared by the identity registries
    function initialize(address account_impl, address key_manager_impl) external;
}

/// The addresses available to a step: those of earlier steps and those
/// supplied by configuration
pub struct AddressBook<'a> {
    /// The artifacts confirmed so far, in plan order
    deployed: &'a [DeployedArtifact],
    /// The configured addresses
    externals: &'a ExternalAddresses,
}

impl<'a> AddressBook<'a> {
    /// Constructor
    pub fn new(deployed: &'a [DeployedArtifact], externals: &'a ExternalAddresses) -> Self {
        Self { deployed, externals }
    }

    /// The address deployed by the given step
    pub fn step(&self, id: StepId) -> Result<Address, ScriptError> {
        self.deployed.get(id.index()).map(|a| a.address).ok_or_else(|| {
            ScriptError::InvalidPlan(format!("step {} has not been deployed", id.index() + 1))
        })
    }

    /// The configured address with the given name
    pub fn external(&self, name: &str) -> Result<Address, ScriptError> {
        self.externals
            .get(name)
            .copied()
            .ok_or_else(|| {
                ScriptError::Configuration(format!("no address configured for `{name}`"))
            })
    }

    /// Resolve an argument to a concrete ABI value
    pub fn resolve(&self, arg: &Argument) -> Result<DynSolValue, ScriptError> {
        match arg {
            Argument::Step(id) => self.step(*id).map(DynSolValue::Address),
            Argument::External(name) => self.external(name).map(DynSolValue::Address),
            Argument::Value(value) => Ok(value.clone()),
            Argument::Call(call) => self
                .encode_call(call)
                .map(|data| DynSolValue::Bytes(data.to_vec())),
        }
    }

    /// Encode a function call: selector followed by the encoded arguments
    pub fn encode_call(&self, call: &FunctionCall) -> Result<Bytes, ScriptError> {
        let function = Function::parse(&call.signature)
            .map_err(|e| ScriptError::CalldataConstruction(format!("{}: {}", call.signature, e)))?;
        let values = self.resolve_params(&function.inputs, &call.args, &call.signature)?;

        function
            .abi_encode_input(&values)
            .map(Bytes::from)
            .map_err(|e| ScriptError::CalldataConstruction(format!("{}: {}", call.signature, e)))
    }

    /// Encode constructor arguments for the given artifact.
    ///
    /// When the artifact declares a constructor the arguments are checked
    /// against it; otherwise they are encoded by their own types.
    pub fn encode_constructor_args(
        &self,
        artifact: &Artifact,
        args: &[Argument],
    ) -> Result<Bytes, ScriptError> {
        let context = format!("{} constructor", artifact.name);
        match artifact.constructor() {
            Some(constructor) => {
                let values = self.resolve_params(&constructor.inputs, args, &context)?;
                constructor
                    .abi_encode_input(&values)
                    .map(Bytes::from)
                    .map_err(|e| ScriptError::CalldataConstruction(format!("{context}: {e}")))
            }
            None if args.is_empty() => Ok(Bytes::new()),
            None => {
                let values = args.iter().map(|a| self.resolve(a)).collect::<Result<Vec<_>, _>>()?;
                Ok(DynSolValue::Tuple(values).abi_encode_params().into())
            }
        }
    }

    /// Resolve arguments against declared parameters, checking arity and
    /// narrowing integer literals to the declared width
    fn resolve_params(
        &self,
        params: &[Param],
        args: &[Argument],
        context: &str,
    ) -> Result<Vec<DynSolValue>, ScriptError> {
        if params.len() != args.len() {
            return Err(ScriptError::CalldataConstruction(format!(
                "{context} takes {} arguments, {} given",
                params.len(),
                args.len()
            )));
        }

        params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty = param
                    .resolve()
                    .map_err(|e| ScriptError::CalldataConstruction(format!("{context}: {e}")))?;
                Ok(fit_to_type(self.resolve(arg)?, &ty))
            })
            .collect()
    }
}

/// Integer literals default to 256 bits; give them the declared width instead
fn fit_to_type(value: DynSolValue, ty: &DynSolType) -> DynSolValue {
    match (value, ty) {
        (DynSolValue::Uint(v, _), DynSolType::Uint(bits)) => DynSolValue::Uint(v, *bits),
        (DynSolValue::Int(v, _), DynSolType::Int(bits)) => DynSolValue::Int(v, *bits),
        (value, _) => value,
    }
}
