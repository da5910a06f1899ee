use {
    crate::artifact::ContractArtifact,
    alloy::{
        dyn_abi::{DynSolType, DynSolValue, Specifier},
        primitives::Bytes,
    },
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("constructor of {contract} takes {expected} arguments but {actual} were given")]
    Arity {
        contract: String,
        expected: usize,
        actual: usize,
    },
    #[error("argument #{index} `{name}` of type {ty}: {reason}")]
    Type {
        index: usize,
        name: String,
        ty: String,
        reason: String,
    },
}

/// Coerces the textual constructor arguments to the types declared by the
/// artifact's constructor. A contract without an explicit constructor takes no
/// arguments.
pub fn constructor_args(
    artifact: &ContractArtifact,
    args: &[String],
) -> Result<Vec<DynSolValue>, EncodingError> {
    let inputs = artifact
        .abi
        .constructor
        .as_ref()
        .map(|constructor| constructor.inputs.as_slice())
        .unwrap_or_default();
    if inputs.len() != args.len() {
        return Err(EncodingError::Arity {
            contract: artifact.name.clone(),
            expected: inputs.len(),
            actual: args.len(),
        });
    }

    inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (param, arg))| {
            let type_error = |reason: String| EncodingError::Type {
                index,
                name: param.name.clone(),
                ty: param.ty.clone(),
                reason,
            };
            let ty: DynSolType = param.resolve().map_err(|err| type_error(err.to_string()))?;
            // Surrounding whitespace is part of string and bytes values.
            let arg = match &ty {
                DynSolType::String | DynSolType::Bytes => arg.as_str(),
                _ => arg.trim(),
            };
            ty.coerce_str(arg).map_err(|err| type_error(err.to_string()))
        })
        .collect()
}

/// Builds the data of a contract creation transaction: the creation code
/// followed by the ABI encoded constructor arguments.
pub fn creation_payload(
    artifact: &ContractArtifact,
    args: &[String],
) -> Result<Bytes, EncodingError> {
    let encoded = DynSolValue::Tuple(constructor_args(artifact, args)?).abi_encode_params();
    let mut payload = Vec::with_capacity(artifact.bytecode.len() + encoded.len());
    payload.extend_from_slice(&artifact.bytecode);
    payload.extend_from_slice(&encoded);
    Ok(payload.into())
}
