//! Resolution of compiled contracts from build output.
//!
//! Two layouts are supported:
//! - Hardhat's `artifacts/` tree where every contract has a
//!   `<Source>.sol/<Name>.json` file containing (among others) the `abi` and
//!   the creation `bytecode`.
//! - Plain `solc --abi --bin -o <dir>` output with separate `.abi` and `.bin`
//!   files per contract, named either `<Name>.abi` or `<File>_sol_<Name>.abi`.

use {
    alloy::{json_abi::JsonAbi, primitives::Bytes},
    serde::Deserialize,
    std::{
        ffi::OsStr,
        fmt::{self, Display, Formatter},
        fs,
        path::{Path, PathBuf},
    },
    walkdir::WalkDir,
};

/// A compiled contract ready to be deployed. The bytecode is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("no build output for contract {0:?}")]
    NotFound(String),
    #[error("contract {name:?} matches multiple artifacts: {}", display_paths(.candidates))]
    Ambiguous {
        name: String,
        candidates: Vec<PathBuf>,
    },
    #[error("contract {name:?}: {reason}")]
    Malformed { name: String, reason: String },
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Something that can produce the artifact of a contract by its name.
pub trait ArtifactSource: Send + Sync {
    fn get(&self, name: &str) -> Result<ContractArtifact, ArtifactError>;
}

/// The on-disk layout of the build output.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, clap::ValueEnum)]
pub enum ArtifactFormat {
    #[default]
    Hardhat,
    Solc,
}

impl Display for ArtifactFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardhat => f.write_str("hardhat"),
            Self::Solc => f.write_str("solc"),
        }
    }
}

impl ArtifactFormat {
    pub fn source(self, root: PathBuf) -> Box<dyn ArtifactSource> {
        match self {
            Self::Hardhat => Box::new(HardhatArtifacts::new(root)),
            Self::Solc => Box::new(SolcOutput::new(root)),
        }
    }
}

pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, name: &str) -> Result<(String, PathBuf), ArtifactError> {
        // Fully qualified names (`contracts/Lock.sol:Lock`) map to exactly
        // one file.
        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = self.root.join(source).join(format!("{contract}.json"));
            if !path.is_file() {
                return Err(ArtifactError::NotFound(name.to_string()));
            }
            return Ok((contract.to_string(), path));
        }

        let candidates = find_files(&self.root, &format!("{name}.json"))?;
        single_candidate(name, candidates).map(|path| (name.to_string(), path))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: String,
}

impl ArtifactSource for HardhatArtifacts {
    fn get(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        let (contract, path) = self.locate(name)?;
        let content = read(&path)?;
        let artifact: HardhatArtifact =
            serde_json::from_str(&content).map_err(|err| ArtifactError::Malformed {
                name: contract.clone(),
                reason: format!("invalid artifact {}: {err}", path.display()),
            })?;
        if let Some(actual) = artifact.contract_name.as_deref()
            && actual != contract
        {
            return Err(ArtifactError::Malformed {
                name: contract,
                reason: format!("{} describes contract {actual:?}", path.display()),
            });
        }
        let bytecode = decode_bytecode(&contract, &artifact.bytecode)?;
        tracing::debug!(path = %path.display(), "loaded hardhat artifact");
        Ok(ContractArtifact {
            name: contract,
            abi: artifact.abi,
            bytecode,
        })
    }
}

pub struct SolcOutput {
    dir: PathBuf,
}

impl SolcOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn locate_abi(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let exact = self.dir.join(format!("{name}.abi"));
        if exact.is_file() {
            return Ok(exact);
        }

        let suffix = format!("_{name}.abi");
        let entries = fs::read_dir(&self.dir).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::NotFound(name.to_string()),
            _ => ArtifactError::Io {
                path: self.dir.clone(),
                source: err,
            },
        })?;
        let mut candidates = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| ArtifactError::Io {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            let matches = path
                .file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f.ends_with(&suffix));
            if matches {
                candidates.push(path);
            }
        }
        single_candidate(name, candidates)
    }
}

impl ArtifactSource for SolcOutput {
    fn get(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        let abi_path = self.locate_abi(name)?;
        let bin_path = abi_path.with_extension("bin");
        if !bin_path.is_file() {
            return Err(ArtifactError::NotFound(name.to_string()));
        }

        let abi = serde_json::from_str(&read(&abi_path)?).map_err(|err| {
            ArtifactError::Malformed {
                name: name.to_string(),
                reason: format!("invalid ABI {}: {err}", abi_path.display()),
            }
        })?;
        let bytecode = decode_bytecode(name, &read(&bin_path)?)?;
        tracing::debug!(abi = %abi_path.display(), bin = %bin_path.display(), "loaded solc output");
        Ok(ContractArtifact {
            name: name.to_string(),
            abi,
            bytecode,
        })
    }
}

fn read(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn single_candidate(name: &str, mut candidates: Vec<PathBuf>) -> Result<PathBuf, ArtifactError> {
    match candidates.len() {
        0 => Err(ArtifactError::NotFound(name.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => {
            candidates.sort();
            Err(ArtifactError::Ambiguous {
                name: name.to_string(),
                candidates,
            })
        }
    }
}

/// Collects the files called `file_name` below `root`. Symlinks are followed,
/// a link pointing back to one of its ancestors is an error. Hardhat's
/// `build-info` directory only holds compiler input/output and is skipped.
fn find_files(root: &Path, file_name: &str) -> Result<Vec<PathBuf>, ArtifactError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let walk = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != OsStr::new("build-info"));

    let mut found = Vec::new();
    for entry in walk {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            ArtifactError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.file_type().is_file() && entry.file_name() == OsStr::new(file_name) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Decodes hex encoded creation code as emitted by solc and Hardhat.
fn decode_bytecode(name: &str, text: &str) -> Result<Bytes, ArtifactError> {
    let malformed = |reason: String| ArtifactError::Malformed {
        name: name.to_string(),
        reason,
    };
    let text = text.trim();
    let hex = text.strip_prefix("0x").unwrap_or(text);
    if hex.is_empty() {
        return Err(malformed(
            "bytecode is empty, the contract is abstract or an interface".to_string(),
        ));
    }
    if hex.contains("__") {
        return Err(malformed(
            "bytecode contains unlinked library placeholders".to_string(),
        ));
    }
    alloy::hex::decode(hex)
        .map(Bytes::from)
        .map_err(|err| malformed(format!("invalid bytecode: {err}")))
}
