//! Compiled contract artifacts (ABI + creation bytecode).

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::JsonAbi,
    primitives::Bytes,
};
use anyhow::Context;
use serde::Deserialize;

/// Hardhat writes the creation code as a hex string, Foundry nests it under `object`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Bytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

impl Bytecode {
    fn into_bytes(self) -> Bytes {
        match self {
            Self::Hex(bytes) | Self::Object { object: bytes } => bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ArtifactFile {
    abi: JsonAbi,
    bytecode: Bytecode,
}

/// A compiled contract.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn from_json(name: impl Into<String>, json: &str) -> anyhow::Result<Self> {
        let name = name.into();
        let file: ArtifactFile = serde_json::from_str(json)
            .with_context(|| format!("Failed to parse artifact for {}", name))?;

        Ok(Self {
            name,
            abi: file.abi,
            bytecode: file.bytecode.into_bytes(),
        })
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn deploy_code(&self, args: &[DynSolValue]) -> anyhow::Result<Bytes> {
        if self.bytecode.is_empty() {
            anyhow::bail!(
                "{} has no creation bytecode (abstract contract or interface?)",
                self.name
            );
        }

        let mut code = self.bytecode.to_vec();

        match self.abi.constructor() {
            Some(constructor) => {
                let encoded = constructor
                    .abi_encode_input(args)
                    .map_err(|e| anyhow::anyhow!("{}", e))
                    .with_context(|| {
                        format!("Failed to encode {} constructor arguments", self.name)
                    })?;
                code.extend_from_slice(&encoded);
            }
            None if args.is_empty() => {}
            None => anyhow::bail!(
                "{} has no constructor but {} arguments were given",
                self.name,
                args.len()
            ),
        }

        Ok(code.into())
    }

    /// Selector-prefixed calldata for `operation`, picking the overload matching the arity.
    pub fn encode_call(&self, operation: &str, args: &[DynSolValue]) -> anyhow::Result<Bytes> {
        let function = self
            .abi
            .function(operation)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
            .with_context(|| {
                format!(
                    "{} has no function {} taking {} arguments",
                    self.name,
                    operation,
                    args.len()
                )
            })?;

        function
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to encode {}.{} arguments", self.name, operation))
    }
}

/// Lazily loads `<Name>.json` artifacts from a build output directory.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    loaded: HashMap<String, Artifact>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: HashMap::new(),
        }
    }

    /// Get the artifact for `name`, reading it from disk on first use.
    pub fn get(&mut self, name: &str) -> anyhow::Result<&Artifact> {
        if !self.loaded.contains_key(name) {
            let path = find_file(&self.root, &format!("{}.json", name))?.with_context(|| {
                format!(
                    "No artifact named {}.json under {}",
                    name,
                    self.root.display()
                )
            })?;

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let artifact = Artifact::from_json(name, &content)?;

            tracing::debug!(artifact = name, path = %path.display(), "Artifact loaded");
            self.loaded.insert(name.to_string(), artifact);
        }

        self.loaded
            .get(name)
            .with_context(|| format!("Artifact {} vanished from cache", name))
    }
}

/// Depth-first search for a file called `file_name` under `dir`.
fn find_file(dir: &Path, file_name: &str) -> anyhow::Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|name| name == file_name) {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_file(&subdir, file_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
