// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn nested_def() -> NodeDef {
    NodeDef::flow("demo")
        .env("STAGE", "ci")
        .with_step(NodeDef::step("build", "make"))
        .with_step(
            NodeDef::group("test")
                .allow_failure(true)
                .env("STAGE", "test")
                .timeout_secs(30)
                .with_step(NodeDef::step("unit", "make unit").env("FAST", "1"))
                .with_step(NodeDef::step("lint", "make lint")),
        )
        .with_step(NodeDef::step("deploy", "make deploy"))
}

#[test]
fn node_path_segments() {
    let path = NodePath::from("demo/test/unit");
    assert_eq!(path.name(), "unit");
    assert_eq!(path.flow(), "demo");
    assert_eq!(path.depth(), 2);
    assert_eq!(path.parent(), Some(NodePath::from("demo/test")));
    assert_eq!(NodePath::from("demo").parent(), None);
    assert_eq!(NodePath::from("demo").child("build"), "demo/build");
}

#[test]
fn build_stores_nodes_in_pre_order() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    let order: Vec<&str> = tree.pre_order().map(|n| n.path.as_str()).collect();
    assert_eq!(
        order,
        vec!["demo", "demo/build", "demo/test", "demo/test/unit", "demo/test/lint", "demo/deploy"]
    );
    assert_eq!(tree.flow(), "demo");
    assert_eq!(tree.len(), 6);
}

#[test]
fn root_is_flow_and_descendants_are_steps() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    assert!(tree.resolve("demo").unwrap().is_flow());
    let build = tree.resolve("demo/build").unwrap();
    assert!(!build.is_flow());
    assert_eq!(build.script(), Some("make"));
    let group = tree.resolve("demo/test").unwrap();
    assert!(group.has_children());
    assert_eq!(group.script(), None);
}

#[test]
fn resolve_unknown_path_fails() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    assert_eq!(tree.resolve("demo/nope"), Err(TreeError::NotFound("demo/nope".to_string())));
}

#[test]
fn children_and_siblings() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    let children: Vec<&str> =
        tree.children_of("demo").unwrap().iter().map(|n| n.path.as_str()).collect();
    assert_eq!(children, vec!["demo/build", "demo/test", "demo/deploy"]);

    let build = NodePath::from("demo/build");
    let following: Vec<&str> =
        tree.following_siblings(&build).iter().map(|n| n.path.as_str()).collect();
    assert_eq!(following, vec!["demo/test", "demo/deploy"]);
    assert_eq!(tree.previous_sibling(&build), None);
    assert_eq!(tree.parent_of(&build).unwrap().path, "demo");

    let deploy = NodePath::from("demo/deploy");
    assert!(tree.following_siblings(&deploy).is_empty());
    assert_eq!(tree.previous_sibling(&deploy).unwrap().path, "demo/test");
    assert!(tree.following_siblings(tree.root_path()).is_empty());
}

#[test]
fn nearest_env_wins() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    let env = tree.effective_env(&NodePath::from("demo/test/unit"));
    assert_eq!(env.get("STAGE").map(String::as_str), Some("test"));
    assert_eq!(env.get("FAST").map(String::as_str), Some("1"));

    let env = tree.effective_env(&NodePath::from("demo/build"));
    assert_eq!(env.get("STAGE").map(String::as_str), Some("ci"));
    assert!(!env.contains_key("FAST"));
}

#[test]
fn timeout_is_inherited_from_group() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    assert_eq!(tree.effective_timeout_secs(&NodePath::from("demo/test/lint")), Some(30));
    assert_eq!(tree.effective_timeout_secs(&NodePath::from("demo/build")), None);
}

#[yare::parameterized(
    empty      = { "" },
    slash      = { "a/b" },
    whitespace = { " padded" },
)]
fn invalid_step_names_are_rejected(name: &str) {
    let def = NodeDef::flow("demo").with_step(NodeDef::step(name, "true"));
    assert!(matches!(NodeTree::build(&def), Err(TreeError::InvalidName { .. })));
}

#[test]
fn duplicate_siblings_are_rejected() {
    let def = NodeDef::flow("demo")
        .with_step(NodeDef::step("build", "make"))
        .with_step(NodeDef::step("build", "make again"));
    assert_eq!(NodeTree::build(&def), Err(TreeError::Duplicate("demo/build".to_string())));
}

#[test]
fn script_with_children_is_rejected() {
    let mut group = NodeDef::step("group", "echo");
    group.steps.push(NodeDef::step("inner", "true"));
    let def = NodeDef::flow("demo").with_step(group);
    assert_eq!(
        NodeTree::build(&def),
        Err(TreeError::ScriptWithChildren("demo/group".to_string()))
    );
}

#[test]
fn leaf_step_without_script_is_rejected() {
    let def = NodeDef::flow("demo").with_step(NodeDef::group("empty"));
    assert_eq!(NodeTree::build(&def), Err(TreeError::MissingScript("demo/empty".to_string())));
}

#[test]
fn script_on_the_flow_itself_is_rejected() {
    let mut bare = NodeDef::flow("demo");
    bare.script = Some("exit 1".to_string());
    assert_eq!(NodeTree::build(&bare), Err(TreeError::FlowScript("demo".to_string())));

    let mut with_steps = NodeDef::flow("demo").with_step(NodeDef::step("a", "true"));
    with_steps.script = Some("true".to_string());
    assert_eq!(NodeTree::build(&with_steps), Err(TreeError::FlowScript("demo".to_string())));
}

#[test]
fn empty_flow_is_valid() {
    let tree = NodeTree::build(&NodeDef::flow("bare")).unwrap();
    assert_eq!(tree.len(), 1);
    assert!(!tree.resolve("bare").unwrap().has_children());
}

#[test]
fn tree_serde_roundtrip_keeps_order() {
    let tree = NodeTree::build(&nested_def()).unwrap();
    let json = serde_json::to_string(&tree).unwrap();
    let parsed: NodeTree = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, tree);
}
