// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Copy-on-write DAG patching: an ordered JSON-Patch-style operation set
//! applied against the DAG reachable from a URL's root CID, producing a
//! new URL pointing at the rewritten root.

use crate::adl::System;
use crate::node::Node;
use crate::params::Parameters;
use crate::resolver::{resolve_with, Resolved};
use crate::schema;
use crate::url::{IpldUrl, Segment};
use crate::Error;
use async_recursion::async_recursion;
use cid::Cid;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Remove,
    Replace,
    Copy,
    Move,
    Test,
}

/// One patch operation. `path` and `from` use the simplified RFC 6902
/// grammar: `/a/b/c`, leading/trailing `/` trimmed, `-` as the final
/// component of an `add` into a list means "append".
#[derive(Debug, Clone)]
pub struct Operation {
    pub op: OpKind,
    pub path: String,
    pub value: Option<Node>,
    pub from: Option<String>,
}

impl Operation {
    pub fn add(path: impl Into<String>, value: Node) -> Self {
        Self {
            op: OpKind::Add,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: OpKind::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Node) -> Self {
        Self {
            op: OpKind::Replace,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn copy(path: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            op: OpKind::Copy,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }

    pub fn r#move(path: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            op: OpKind::Move,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }

    pub fn test(path: impl Into<String>, value: Node) -> Self {
        Self {
            op: OpKind::Test,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }
}

fn parse_path(path: &str) -> Vec<String> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[derive(Debug, Clone)]
struct PathStep {
    name: String,
    parameters: Option<Parameters>,
}

fn base_steps(url: &IpldUrl) -> Vec<PathStep> {
    url.segments()
        .iter()
        .map(|segment| PathStep {
            name: segment.name.clone(),
            parameters: if segment.parameters.is_empty() {
                None
            } else {
                Some(segment.parameters.clone())
            },
        })
        .collect()
}

#[derive(Debug, Clone)]
enum Mutation {
    Set { value: Node, require_exists: bool },
    Remove,
}

/// Applies `operations` in order against the DAG rooted at `url`'s CID,
/// returning a new URL whose authority CID is the final rewritten root.
/// Root parameters and segments are preserved; only the CID changes.
#[tracing::instrument(skip(operations, system), fields(op_count = operations.len()))]
pub async fn patch(
    url: &IpldUrl,
    operations: &[Operation],
    system: &System,
) -> Result<IpldUrl, Error> {
    let base = base_steps(url);
    let root_params = url.parameters().clone();
    let mut root_cid = *url.cid();

    for operation in operations {
        tracing::debug!(op = ?operation.op, path = %operation.path, "applying patch operation");
        root_cid = apply_operation(root_cid, &base, &root_params, operation, system).await?;
    }

    let mut result = url.clone();
    result.set_cid(root_cid);
    Ok(result)
}

async fn apply_operation(
    root_cid: Cid,
    base: &[PathStep],
    root_params: &Parameters,
    operation: &Operation,
    system: &System,
) -> Result<Cid, Error> {
    match operation.op {
        OpKind::Test => {
            let actual = read_value(root_cid, base, root_params, &operation.path, system).await?;
            let expected = operation.value.clone().ok_or_else(|| {
                Error::InvalidPatchOp("test operation requires a value".to_owned())
            })?;
            if actual != expected {
                return Err(Error::TestFailed {
                    path: operation.path.clone(),
                    expected: format!("{expected:?}"),
                    actual: format!("{actual:?}"),
                });
            }
            Ok(root_cid)
        }
        OpKind::Add | OpKind::Replace => {
            let value = operation.value.clone().ok_or_else(|| {
                Error::InvalidPatchOp(format!("{:?} requires a value", operation.op))
            })?;
            let mutation = Mutation::Set {
                value,
                require_exists: operation.op == OpKind::Replace,
            };
            mutate_at(root_cid, base, root_params, &operation.path, &mutation, system).await
        }
        OpKind::Remove => {
            mutate_at(root_cid, base, root_params, &operation.path, &Mutation::Remove, system)
                .await
        }
        OpKind::Copy => {
            let from = operation
                .from
                .clone()
                .ok_or_else(|| Error::InvalidPatchOp("copy requires a from path".to_owned()))?;
            let value = read_value(root_cid, base, root_params, &from, system).await?;
            let mutation = Mutation::Set {
                value,
                require_exists: false,
            };
            mutate_at(root_cid, base, root_params, &operation.path, &mutation, system).await
        }
        OpKind::Move => {
            let from = operation
                .from
                .clone()
                .ok_or_else(|| Error::InvalidPatchOp("move requires a from path".to_owned()))?;
            // The value is captured before the remove so later mutation
            // doesn't observe its own deletion.
            let value = read_value(root_cid, base, root_params, &from, system).await?;
            let after_remove =
                mutate_at(root_cid, base, root_params, &from, &Mutation::Remove, system).await?;
            let mutation = Mutation::Set {
                value,
                require_exists: false,
            };
            mutate_at(after_remove, base, root_params, &operation.path, &mutation, system).await
        }
    }
}

/// Reads the raw value at `base` + `path` without following a terminal
/// link, by reusing the resolver with `resolve_final_cid = false` against
/// a synthetic URL built from the same root, root parameters, and steps.
async fn read_value(
    root_cid: Cid,
    base: &[PathStep],
    root_params: &Parameters,
    path: &str,
    system: &System,
) -> Result<Node, Error> {
    let mut url = IpldUrl::new(root_cid);
    url.set_parameters(root_params.clone());
    for step in base {
        url.push_segment(Segment::with_parameters(
            step.name.clone(),
            step.parameters.clone().unwrap_or_default(),
        ));
    }
    for name in parse_path(path) {
        url.push_segment(Segment::new(name));
    }
    url.set_resolve_final(false);

    match resolve_with(&url, system, false).await? {
        Resolved::Node(node) => Ok(node),
        Resolved::Link(cid) => Ok(Node::Link(cid)),
    }
}

async fn mutate_at(
    root_cid: Cid,
    base: &[PathStep],
    root_params: &Parameters,
    path: &str,
    mutation: &Mutation,
    system: &System,
) -> Result<Cid, Error> {
    let mut steps = base.to_vec();
    steps.extend(
        parse_path(path)
            .into_iter()
            .map(|name| PathStep { name, parameters: None }),
    );
    if steps.is_empty() {
        return Err(Error::InvalidPatchOp(
            "patch path must address at least one component".to_owned(),
        ));
    }
    rebuild_block(root_cid, &steps, 0, mutation, system, root_params).await
}

#[async_recursion]
async fn rebuild_block(
    cid: Cid,
    steps: &[PathStep],
    idx: usize,
    mutation: &Mutation,
    system: &System,
    root_params: &Parameters,
) -> Result<Cid, Error> {
    let codec = crate::codec::get_cid_encoding(&cid)?;
    let raw = system.get_node(&cid).await?;
    let new_raw = rebuild_node(raw, steps, idx, mutation, system, root_params).await?;
    system.save_node(&new_raw, codec).await
}

/// Lensing parameters in effect for the node currently held at `idx`: the
/// URL's own root parameters at `idx == 0` (lensing the root exactly once,
/// at entry, the way `resolver::resolve_with` does), or otherwise the
/// *previous* step's own segment parameters — matching `resolve_with`,
/// where a segment's parameters lens the node reached by following that
/// same segment, not the node used to perform its own lookup.
fn lens_params_for<'a>(
    idx: usize,
    steps: &'a [PathStep],
    root_params: &'a Parameters,
) -> Option<&'a Parameters> {
    if idx == 0 {
        return if root_params.is_empty() { None } else { Some(root_params) };
    }
    steps[idx - 1].parameters.as_ref().filter(|p| !p.is_empty())
}

#[async_recursion]
async fn rebuild_node(
    raw: Node,
    steps: &[PathStep],
    idx: usize,
    mutation: &Mutation,
    system: &System,
    root_params: &Parameters,
) -> Result<Node, Error> {
    let step = &steps[idx];
    let is_leaf = idx == steps.len() - 1;

    if let Some(params) = lens_params_for(idx, steps, root_params) {
        if let Some(adl_name) = params.get("adl") {
            // No embedder-defined inverse exists for an arbitrary ADL, so a
            // patch cannot round-trip a mutation back through one.
            return Err(Error::InvalidPatchOp(format!(
                "cannot patch through adl {adl_name:?}: no inverse mapping is defined"
            )));
        }

        if let Some(schema_cid_text) = params.get("schema") {
            let type_name = params.get("type").ok_or_else(|| Error::SchemaMismatch {
                type_name: String::new(),
                node: format!("{raw:?}"),
                schema_dsl: "schema parameter given without a type parameter".to_owned(),
            })?;
            let schema_cid = Cid::from_str(schema_cid_text).map_err(|e| Error::SchemaMismatch {
                type_name: type_name.to_owned(),
                node: format!("{raw:?}"),
                schema_dsl: format!("malformed schema cid: {e}"),
            })?;
            let dmt = system.get_node(&schema_cid).await?;
            let dsl = dmt.as_str().ok_or_else(|| Error::SchemaMismatch {
                type_name: type_name.to_owned(),
                node: format!("{dmt:?}"),
                schema_dsl: "schema block is not a DSL text node".to_owned(),
            })?;
            let compiled = schema::compile(dsl)?;
            let view = schema::apply(&compiled, type_name, raw)?;

            return if is_leaf {
                match mutation {
                    Mutation::Remove => view.without_field(&step.name),
                    Mutation::Set { value, require_exists } => {
                        if *require_exists && view.field(&step.name).is_none() {
                            return Err(Error::MissingKey(step.name.clone()));
                        }
                        view.with_field(&step.name, value.clone())
                    }
                }
            } else {
                let child = view
                    .field(&step.name)
                    .cloned()
                    .ok_or_else(|| Error::PathNotFound(step.name.clone()))?;
                let new_child =
                    descend(child, steps, idx + 1, mutation, system, root_params).await?;
                view.with_field(&step.name, new_child)
            };
        }
    }

    if is_leaf {
        apply_leaf_mutation(raw, &step.name, mutation)
    } else {
        let child = raw
            .lookup(&step.name)
            .cloned()
            .ok_or_else(|| Error::PathNotFound(step.name.clone()))?;
        let new_child = descend(child, steps, idx + 1, mutation, system, root_params).await?;
        replace_child(raw, &step.name, new_child)
    }
}

async fn descend(
    child: Node,
    steps: &[PathStep],
    idx: usize,
    mutation: &Mutation,
    system: &System,
    root_params: &Parameters,
) -> Result<Node, Error> {
    match child {
        Node::Link(cid) => {
            let new_cid = rebuild_block(cid, steps, idx, mutation, system, root_params).await?;
            Ok(Node::Link(new_cid))
        }
        other => rebuild_node(other, steps, idx, mutation, system, root_params).await,
    }
}

fn replace_child(parent: Node, name: &str, new_child: Node) -> Result<Node, Error> {
    match parent {
        Node::Map(mut map) => {
            map.insert(name.to_owned(), new_child);
            Ok(Node::Map(map))
        }
        Node::List(mut list) => {
            let idx: usize = name
                .parse()
                .map_err(|_| Error::PathNotFound(name.to_owned()))?;
            if idx >= list.len() {
                return Err(Error::PathNotFound(name.to_owned()));
            }
            list[idx] = new_child;
            Ok(Node::List(list))
        }
        _ => Err(Error::PathNotFound(name.to_owned())),
    }
}

/// The `remove`/`add`/`replace` leaf mutators named in the operations
/// table: map key set/delete, or list insert/remove/append/index-replace.
fn apply_leaf_mutation(parent: Node, name: &str, mutation: &Mutation) -> Result<Node, Error> {
    match mutation {
        Mutation::Remove => match parent {
            Node::Map(mut map) => {
                map.shift_remove(name)
                    .ok_or_else(|| Error::MissingKey(name.to_owned()))?;
                Ok(Node::Map(map))
            }
            Node::List(mut list) => {
                let idx: usize = name
                    .parse()
                    .map_err(|_| Error::MissingKey(name.to_owned()))?;
                if idx >= list.len() {
                    return Err(Error::MissingKey(name.to_owned()));
                }
                list.remove(idx);
                Ok(Node::List(list))
            }
            _ => Err(Error::MissingKey(name.to_owned())),
        },
        Mutation::Set { value, require_exists } => match parent {
            Node::Map(mut map) => {
                if *require_exists && !map.contains_key(name) {
                    return Err(Error::MissingKey(name.to_owned()));
                }
                map.insert(name.to_owned(), value.clone());
                Ok(Node::Map(map))
            }
            Node::List(mut list) => {
                if name == "-" {
                    if *require_exists {
                        return Err(Error::InvalidPatchOp(
                            "replace cannot target a list append".to_owned(),
                        ));
                    }
                    list.push(value.clone());
                    Ok(Node::List(list))
                } else {
                    let idx: usize = name.parse().map_err(|_| {
                        Error::InvalidPatchOp(format!("not a list index: {name:?}"))
                    })?;
                    if *require_exists {
                        if idx >= list.len() {
                            return Err(Error::MissingKey(name.to_owned()));
                        }
                        list[idx] = value.clone();
                    } else {
                        if idx > list.len() {
                            return Err(Error::MissingKey(name.to_owned()));
                        }
                        list.insert(idx, value.clone());
                    }
                    Ok(Node::List(list))
                }
            }
            _ => Err(Error::MissingKey(name.to_owned())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::AdlRegistry;
    use crate::codec::Codec;
    use crate::resolver::resolve;
    use crate::store::MemoryStore;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn system() -> (Arc<MemoryStore>, System) {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(AdlRegistry::new());
        let sys = System::new(store.clone(), registry);
        (store, sys)
    }

    #[tokio::test]
    async fn add_then_move_matches_scenario_s4() {
        let (store, system) = system();
        let mut root_map = IndexMap::new();
        root_map.insert(
            "hello".to_owned(),
            Node::List(vec![Node::from("world")]),
        );
        let root_cid = store.insert(&Node::Map(root_map), Codec::DagCbor).unwrap();
        let url = IpldUrl::new(root_cid);

        let operations = vec![
            Operation::add("/hello/0", Node::from("cruel")),
            Operation::r#move("/goodbye", "/hello"),
        ];
        let patched = patch(&url, &operations, &system).await.unwrap();

        let mut result_url = patched.clone();
        result_url.push_segment(Segment::new("goodbye"));
        result_url.set_resolve_final(true);
        let resolved = resolve(&result_url, &system).await.unwrap();
        assert_eq!(
            resolved.into_node().unwrap(),
            Node::List(vec![Node::from("cruel"), Node::from("world")])
        );
    }

    #[tokio::test]
    async fn patch_across_a_link_matches_scenario_s5() {
        let (store, system) = system();
        let mut inner = IndexMap::new();
        inner.insert("hello".to_owned(), Node::List(vec![Node::from("world")]));
        let inner_cid = store.insert(&Node::Map(inner), Codec::DagCbor).unwrap();

        let mut root_map = IndexMap::new();
        root_map.insert("example".to_owned(), Node::Link(inner_cid));
        let root_cid = store.insert(&Node::Map(root_map), Codec::DagCbor).unwrap();

        let url = IpldUrl::new(root_cid);
        let operations = vec![
            Operation::add("/example/hello/0", Node::from("cruel")),
            Operation::r#move("/example/goodbye", "/example/hello"),
        ];
        let patched = patch(&url, &operations, &system).await.unwrap();

        let mut result_url = patched.clone();
        result_url.push_segment(Segment::new("example"));
        result_url.push_segment(Segment::new("goodbye"));
        result_url.set_resolve_final(true);
        let resolved = resolve(&result_url, &system).await.unwrap();
        assert_eq!(
            resolved.into_node().unwrap(),
            Node::List(vec![Node::from("cruel"), Node::from("world")])
        );
    }

    #[tokio::test]
    async fn replace_under_schema_listpairs_matches_scenario_s6() {
        let (store, system) = system();
        let schema_cid = store
            .insert(
                &Node::from("struct Example {String:String} representation listpairs"),
                Codec::DagCbor,
            )
            .unwrap();
        let data = Node::List(vec![
            Node::List(vec![Node::from("Hello"), Node::from("World")]),
            Node::List(vec![Node::from("Goodbye"), Node::from("Cyberspace")]),
        ]);
        let data_cid = store.insert(&data, Codec::DagCbor).unwrap();

        let mut url = IpldUrl::new(data_cid);
        url.parameters_mut().set("schema", schema_cid.to_string());
        url.parameters_mut().set("type", "Example");

        let operations = vec![Operation::replace("/Goodbye", Node::from("Cruel World"))];
        let patched = patch(&url, &operations, &system).await.unwrap();

        let mut lensed_url = patched.clone();
        lensed_url.set_resolve_final(true);
        let resolved = resolve(&lensed_url, &system).await.unwrap();
        let node = resolved.into_node().unwrap();
        assert_eq!(node.lookup("Hello"), Some(&Node::from("World")));
        assert_eq!(node.lookup("Goodbye"), Some(&Node::from("Cruel World")));

        let mut raw_url = patched;
        raw_url.set_parameters(Parameters::new());
        raw_url.set_resolve_final(true);
        let raw_resolved = resolve(&raw_url, &system).await.unwrap();
        assert_eq!(
            raw_resolved.into_node().unwrap(),
            Node::List(vec![
                Node::List(vec![Node::from("Hello"), Node::from("World")]),
                Node::List(vec![Node::from("Goodbye"), Node::from("Cruel World")]),
            ])
        );
    }

    #[tokio::test]
    async fn remove_missing_key_is_an_error() {
        let (store, system) = system();
        let cid = store
            .insert(&Node::Map(IndexMap::new()), Codec::DagCbor)
            .unwrap();
        let url = IpldUrl::new(cid);
        let operations = vec![Operation::remove("/missing")];
        let result = patch(&url, &operations, &system).await;
        assert!(matches!(result, Err(Error::MissingKey(_))));
    }

    #[tokio::test]
    async fn test_operation_mismatch_aborts_the_patch() {
        let (store, system) = system();
        let mut map = IndexMap::new();
        map.insert("hello".to_owned(), Node::from("world"));
        let cid = store.insert(&Node::Map(map), Codec::DagCbor).unwrap();
        let url = IpldUrl::new(cid);

        let operations = vec![
            Operation::test("/hello", Node::from("not-world")),
            Operation::remove("/hello"),
        ];
        let result = patch(&url, &operations, &system).await;
        assert!(matches!(result, Err(Error::TestFailed { .. })));
    }

    #[tokio::test]
    async fn empty_patchset_is_identity() {
        let (store, system) = system();
        let mut map = IndexMap::new();
        map.insert("hello".to_owned(), Node::from("world"));
        let cid = store.insert(&Node::Map(map), Codec::DagCbor).unwrap();
        let url = IpldUrl::new(cid);

        let patched = patch(&url, &[], &system).await.unwrap();
        assert_eq!(patched, url);
    }
}
