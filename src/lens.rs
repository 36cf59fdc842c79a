// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The schema-then-adl lensing step applied to a node whenever a walk
//! carries `;schema=...;type=...` and/or `;adl=...` parameters.

use crate::adl::System;
use crate::node::Node;
use crate::params::Parameters;
use crate::schema::{self, Schema};
use crate::Error;
use cid::Cid;
use indexmap::IndexMap;
use std::str::FromStr;

/// Names the schema and target type a link should be reinterpreted
/// through once the resolver materializes it, without eagerly fetching
/// the linked block now.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTag {
    pub schema_cid: Cid,
    pub type_name: String,
}

/// The result of lensing one node: the view a walk continues with, the
/// tags to carry forward for any link-typed fields it exposes, and the
/// node's raw representation form for patch round-trips.
pub struct Lensed {
    pub node: Node,
    substrate: Node,
    pub link_tags: IndexMap<String, LinkTag>,
}

impl Lensed {
    /// The representation form that, re-encoded under the node's original
    /// codec, reproduces the same block — what the patcher saves back
    /// instead of the (possibly schema- or ADL-reshaped) view.
    pub fn to_representation(&self) -> &Node {
        &self.substrate
    }
}

async fn load_schema(schema_cid: &Cid, system: &System) -> Result<Schema, Error> {
    let dmt = system.get_node(schema_cid).await?;
    let dsl = dmt.as_str().ok_or_else(|| Error::SchemaMismatch {
        type_name: String::new(),
        node: format!("{dmt:?}"),
        schema_dsl: "schema block is not a DSL text node".to_owned(),
    })?;
    schema::compile(dsl)
}

fn link_tags_for(schema_cid: Cid, ty: &schema::StructType) -> IndexMap<String, LinkTag> {
    let mut tags = IndexMap::new();
    for field in &ty.fields {
        if let schema::Shape::Link(target) = &field.shape {
            tags.insert(
                field.name.clone(),
                LinkTag {
                    schema_cid,
                    type_name: target.clone(),
                },
            );
        }
    }
    tags
}

/// Applies the schema-before-adl lens pipeline to `(node, parameters)`.
///
/// If `node` is itself an unmaterialized link, it is fetched first. If
/// `schema` is present, `type` must be too; the typed view's fields
/// become the returned node (as a uniform map, regardless of wire
/// representation) and any link-typed fields are recorded in
/// `link_tags`. If `adl` is present, the named function runs on whatever
/// the schema step produced (or the raw node, if no schema was given)
/// and its result replaces the node.
pub async fn apply(node: Node, parameters: &Parameters, system: &System) -> Result<Lensed, Error> {
    let node = if let Node::Link(cid) = &node {
        system.get_node(cid).await?
    } else {
        node
    };

    let substrate = node.clone();
    let mut current = node;
    let mut link_tags = IndexMap::new();

    if let Some(schema_cid_text) = parameters.get("schema") {
        if !schema_cid_text.is_empty() {
            let type_name = parameters.get("type").ok_or_else(|| Error::SchemaMismatch {
                type_name: String::new(),
                node: format!("{current:?}"),
                schema_dsl: "schema parameter given without a type parameter".to_owned(),
            })?;
            let schema_cid = Cid::from_str(schema_cid_text).map_err(|e| Error::SchemaMismatch {
                type_name: type_name.to_owned(),
                node: format!("{current:?}"),
                schema_dsl: format!("malformed schema cid: {e}"),
            })?;
            let schema = load_schema(&schema_cid, system).await?;
            let ty = schema
                .get(type_name)
                .ok_or_else(|| Error::SchemaMismatch {
                    type_name: type_name.to_owned(),
                    node: format!("{current:?}"),
                    schema_dsl: "type not declared in schema".to_owned(),
                })?
                .clone();
            let view = schema::apply(&schema, type_name, current)?;
            link_tags = link_tags_for(schema_cid, &ty);
            current = view.to_map();
        }
    }

    if let Some(adl_name) = parameters.get("adl") {
        let adl = system.registry().get(adl_name).cloned().ok_or_else(|| {
            Error::UnknownAdl {
                name: adl_name.to_owned(),
                known: system.registry().names(),
            }
        })?;
        current = adl.apply(current, parameters, system).await?;
    }

    Ok(Lensed {
        node: current,
        substrate,
        link_tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::{AdlRegistry, ReverseAdl};
    use crate::codec::Codec;
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    fn system_with_registry() -> (Arc<MemoryStore>, System) {
        let mut registry = AdlRegistry::new();
        registry.register("reverse", Arc::new(ReverseAdl));
        let store = Arc::new(MemoryStore::new());
        let system = System::new(store.clone(), Arc::new(registry));
        (store, system)
    }

    #[tokio::test]
    async fn no_parameters_passes_node_through_unchanged() {
        let (_store, system) = system_with_registry();
        let node = Node::from("plain");
        let lensed = apply(node.clone(), &Parameters::new(), &system).await.unwrap();
        assert_eq!(lensed.node, node);
        assert_eq!(lensed.to_representation(), &node);
    }

    #[tokio::test]
    async fn schema_without_type_is_fatal() {
        let (store, system) = system_with_registry();
        let schema_cid = store
            .insert(
                &Node::from("struct Example { a Int } representation tuple"),
                Codec::DagCbor,
            )
            .unwrap();
        let mut params = Parameters::new();
        params.set("schema", schema_cid.to_string());
        let result = apply(Node::List(vec![Node::Integer(1)]), &params, &system).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn schema_listpairs_view_exposes_fields_by_name() {
        let (store, system) = system_with_registry();
        let schema_cid = store
            .insert(
                &Node::from("struct Example {String:String} representation listpairs"),
                Codec::DagCbor,
            )
            .unwrap();
        let data = Node::List(vec![Node::List(vec![
            Node::from("Hello"),
            Node::from("World"),
        ])]);

        let mut params = Parameters::new();
        params.set("schema", schema_cid.to_string());
        params.set("type", "Example");

        let lensed = apply(data.clone(), &params, &system).await.unwrap();
        assert_eq!(lensed.node.lookup("Hello"), Some(&Node::from("World")));
        assert_eq!(lensed.to_representation(), &data);
    }

    #[tokio::test]
    async fn adl_runs_after_schema_on_its_output() {
        let (_store, system) = system_with_registry();
        let mut params = Parameters::new();
        params.set("adl", "reverse");
        let node = Node::List(vec![Node::Integer(1), Node::Integer(2)]);
        let lensed = apply(node, &params, &system).await.unwrap();
        assert_eq!(
            lensed.node,
            Node::List(vec![Node::Integer(2), Node::Integer(1)])
        );
    }

    #[tokio::test]
    async fn unknown_adl_is_fatal() {
        let (_store, system) = system_with_registry();
        let mut params = Parameters::new();
        params.set("adl", "nonexistent");
        let result = apply(Node::Null, &params, &system).await;
        assert!(matches!(result, Err(Error::UnknownAdl { .. })));
    }
}
