// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline node definitions and the immutable, path-addressed node tree.
//!
//! A tree is built once from a [`NodeDef`] and never mutated afterwards.
//! Nodes are stored in pre-order, so iteration order is also the order in
//! which results are reported.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Separator between segments of a [`NodePath`].
pub const PATH_SEPARATOR: char = '/';

/// Errors from building or querying a node tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("invalid node name {name:?} under {parent}")]
    InvalidName { parent: String, name: String },
    #[error("duplicate node: {0}")]
    Duplicate(String),
    #[error("node {0} defines both a script and child steps")]
    ScriptWithChildren(String),
    #[error("step {0} has no script")]
    MissingScript(String),
    #[error("flow {0} cannot run a script itself; put it in a step")]
    FlowScript(String),
}

/// Slash-separated location of a node, e.g. `flow/build/test`.
///
/// The first segment is always the flow name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(SmolStr);

impl NodePath {
    pub fn new(path: impl Into<SmolStr>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a direct child named `name`
    pub fn child(&self, name: &str) -> NodePath {
        Self(SmolStr::new(format!("{}{}{}", self.0, PATH_SEPARATOR, name)))
    }

    /// Path of the enclosing node, `None` for a flow root.
    pub fn parent(&self) -> Option<NodePath> {
        self.0.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| Self::new(parent))
    }

    /// Last segment
    pub fn name(&self) -> &str {
        self.0.rsplit(PATH_SEPARATOR).next().unwrap_or(&self.0)
    }

    /// First segment
    pub fn flow(&self) -> &str {
        self.0.split(PATH_SEPARATOR).next().unwrap_or(&self.0)
    }

    pub fn depth(&self) -> usize {
        self.0.matches(PATH_SEPARATOR).count()
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodePath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NodePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodePath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodePath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What a node is. Only steps carry something to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Root of a pipeline
    Flow,
    /// Executable unit, or a group of nested steps when it has children
    Step {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script: Option<String>,
    },
}

/// One immutable node of a [`NodeTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub path: NodePath,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Direct children in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodePath>,
    /// When set, a failing child does not stop the following children
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Node {
    pub fn is_flow(&self) -> bool {
        matches!(self.kind, NodeKind::Flow)
    }

    /// Script to run when this node is dispatched as a command
    pub fn script(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Step { script } => script.as_deref(),
            NodeKind::Flow => None,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Declarative input for a node tree, as authored in a flow file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default, rename = "step")]
    pub steps: Vec<NodeDef>,
}

impl NodeDef {
    pub fn flow(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn step(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self { name: name.into(), script: Some(script.into()), ..Self::default() }
    }

    /// A step that only groups nested steps
    pub fn group(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_step(mut self, step: NodeDef) -> Self {
        self.steps.push(step);
        self
    }

    pub fn allow_failure(mut self, allow: bool) -> Self {
        self.allow_failure = allow;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Immutable, path-addressed tree of nodes. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTree {
    root: NodePath,
    nodes: Arc<IndexMap<NodePath, Node>>,
}

impl NodeTree {
    /// Validate a definition and build its tree.
    ///
    /// The root becomes a [`NodeKind::Flow`]; everything below it is a step.
    pub fn build(def: &NodeDef) -> Result<Self, TreeError> {
        check_name("", &def.name)?;
        let root = NodePath::new(def.name.as_str());
        let mut nodes = IndexMap::new();
        insert_def(&mut nodes, def, root.clone(), true)?;
        Ok(Self { root, nodes: Arc::new(nodes) })
    }

    pub fn root_path(&self) -> &NodePath {
        &self.root
    }

    /// Flow name (the root's name)
    pub fn flow(&self) -> &str {
        self.root.as_str()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn resolve(&self, path: &str) -> Result<&Node, TreeError> {
        self.get(path).ok_or_else(|| TreeError::NotFound(path.to_string()))
    }

    /// Direct children of `path`, in order
    pub fn children_of(&self, path: &str) -> Result<Vec<&Node>, TreeError> {
        let node = self.resolve(path)?;
        Ok(node.children.iter().filter_map(|c| self.get(c.as_str())).collect())
    }

    pub fn parent_of(&self, path: &NodePath) -> Option<&Node> {
        path.parent().and_then(|p| self.nodes.get(&p))
    }

    /// All siblings after `path`, in order
    pub fn following_siblings(&self, path: &NodePath) -> Vec<&Node> {
        let Some(parent) = self.parent_of(path) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .skip_while(|c| *c != path)
            .skip(1)
            .filter_map(|c| self.get(c.as_str()))
            .collect()
    }

    /// The sibling that ran right before `path`
    pub fn previous_sibling(&self, path: &NodePath) -> Option<&Node> {
        let parent = self.parent_of(path)?;
        let idx = parent.children.iter().position(|c| c == path)?;
        idx.checked_sub(1).and_then(|i| self.get(parent.children[i].as_str()))
    }

    pub fn pre_order(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Environment for a node: every ancestor's `env` merged root first, so
    /// the nearest definition wins.
    pub fn effective_env(&self, path: &NodePath) -> BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut cursor = Some(path.clone());
        while let Some(p) = cursor {
            cursor = p.parent();
            if let Some(node) = self.nodes.get(&p) {
                chain.push(node);
            }
        }
        let mut env = BTreeMap::new();
        for node in chain.into_iter().rev() {
            env.extend(node.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        env
    }

    /// Timeout of the node itself, falling back to the closest ancestor's.
    pub fn effective_timeout_secs(&self, path: &NodePath) -> Option<u64> {
        let mut cursor = Some(path.clone());
        while let Some(p) = cursor {
            if let Some(secs) = self.nodes.get(&p).and_then(|n| n.timeout_secs) {
                return Some(secs);
            }
            cursor = p.parent();
        }
        None
    }
}

fn check_name(parent: &str, name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name.trim() != name || name.contains(PATH_SEPARATOR) {
        return Err(TreeError::InvalidName { parent: parent.to_string(), name: name.to_string() });
    }
    Ok(())
}

fn insert_def(
    nodes: &mut IndexMap<NodePath, Node>,
    def: &NodeDef,
    path: NodePath,
    is_root: bool,
) -> Result<(), TreeError> {
    if nodes.contains_key(&path) {
        return Err(TreeError::Duplicate(path.to_string()));
    }
    if is_root && def.script.is_some() {
        return Err(TreeError::FlowScript(path.to_string()));
    }
    if !def.steps.is_empty() && def.script.is_some() {
        return Err(TreeError::ScriptWithChildren(path.to_string()));
    }
    if !is_root && def.steps.is_empty() && def.script.is_none() {
        return Err(TreeError::MissingScript(path.to_string()));
    }

    let mut children = Vec::with_capacity(def.steps.len());
    for step in &def.steps {
        check_name(path.as_str(), &step.name)?;
        let child = path.child(&step.name);
        if children.contains(&child) {
            return Err(TreeError::Duplicate(child.to_string()));
        }
        children.push(child);
    }

    let kind = if is_root { NodeKind::Flow } else { NodeKind::Step { script: def.script.clone() } };
    nodes.insert(
        path.clone(),
        Node {
            path,
            kind,
            children: children.clone(),
            allow_failure: def.allow_failure,
            env: def.env.clone(),
            timeout_secs: def.timeout_secs,
        },
    );

    for (step, child) in def.steps.iter().zip(children) {
        insert_def(nodes, step, child, false)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
