// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sources of pipeline definitions.

use flow_core::{NodeDef, NodeTree, TreeError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from loading a flow's node tree
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("flow not found: {0}")]
    FlowNotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid flow definition: {0}")]
    Invalid(#[from] TreeError),
}

/// Resolves a flow name to its immutable node tree.
pub trait DefinitionSource: Send + Sync + 'static {
    fn load_tree(&self, flow: &str) -> Result<NodeTree, DefinitionError>;
}

/// Flow trees registered in memory, for embedding and tests.
#[derive(Clone, Default)]
pub struct MemoryDefinitions {
    trees: Arc<RwLock<HashMap<String, NodeTree>>>,
}

impl MemoryDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition, replacing any flow of the same name.
    pub fn insert(&self, def: &NodeDef) -> Result<(), TreeError> {
        let tree = NodeTree::build(def)?;
        self.insert_tree(tree);
        Ok(())
    }

    pub fn insert_tree(&self, tree: NodeTree) {
        self.trees.write().insert(tree.flow().to_string(), tree);
    }

    pub fn remove(&self, flow: &str) -> bool {
        self.trees.write().remove(flow).is_some()
    }
}

impl DefinitionSource for MemoryDefinitions {
    fn load_tree(&self, flow: &str) -> Result<NodeTree, DefinitionError> {
        let trees = self.trees.read();
        trees.get(flow).cloned().ok_or_else(|| DefinitionError::FlowNotFound(flow.into()))
    }
}

/// Flow files on disk: one `<flow>.toml` per flow in a directory.
///
/// ```toml
/// allow_failure = false
///
/// [env]
/// RUST_LOG = "info"
///
/// [[step]]
/// name = "build"
/// script = "cargo build"
///
/// [[step]]
/// name = "test"
/// timeout_secs = 600
///
///   [[step.step]]
///   name = "unit"
///   script = "cargo test"
/// ```
///
/// The file is re-read on every load, so edits apply to the next job.
#[derive(Clone, Debug)]
pub struct TomlDefinitions {
    dir: PathBuf,
}

impl TomlDefinitions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn flow_file(&self, flow: &str) -> Option<PathBuf> {
        let valid = !flow.is_empty()
            && !flow.starts_with('.')
            && !flow.contains(flow_core::PATH_SEPARATOR)
            && !flow.contains('\\');
        valid.then(|| self.dir.join(format!("{flow}.toml")))
    }
}

impl DefinitionSource for TomlDefinitions {
    fn load_tree(&self, flow: &str) -> Result<NodeTree, DefinitionError> {
        let path = self.flow_file(flow).ok_or_else(|| DefinitionError::FlowNotFound(flow.into()))?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DefinitionError::FlowNotFound(flow.into()));
            }
            Err(source) => return Err(DefinitionError::Io { path, source }),
        };

        let mut def: NodeDef = toml::from_str(&content)
            .map_err(|e| DefinitionError::Parse { path: path.clone(), message: e.to_string() })?;
        if def.name.is_empty() {
            def.name = flow.to_string();
        } else if def.name != flow {
            return Err(DefinitionError::Parse {
                path,
                message: format!("file declares flow {:?}, expected {:?}", def.name, flow),
            });
        }

        let tree = NodeTree::build(&def)?;
        tracing::debug!(flow, nodes = tree.len(), "loaded flow definition");
        Ok(tree)
    }
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
