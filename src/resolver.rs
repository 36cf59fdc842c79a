// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Walks an `ipld://` URL's path against the live DAG, applying the lens
//! pipeline at the root and at each segment.

use crate::adl::System;
use crate::lens::{self, LinkTag};
use crate::node::Node;
use crate::url::IpldUrl;
use crate::Error;
use cid::Cid;
use indexmap::IndexMap;

/// What a resolve terminates in: either a fully materialized node, or —
/// when the URL did not end in `/` and the final hop was itself a link —
/// the link's CID, unfollowed.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Node(Node),
    Link(Cid),
}

impl Resolved {
    pub fn into_node(self) -> Option<Node> {
        match self {
            Resolved::Node(n) => Some(n),
            Resolved::Link(_) => None,
        }
    }
}

/// Per-call knob on top of a URL's own grammar: lets a caller override
/// whether the final hop's link is followed without rewriting the URL's
/// trailing slash. Small `Default`-deriving option struct rather than a
/// bare extra argument, in the style of small option structs like
/// `Hamt::new_with_bit_width`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// `None` defers to the URL's own `resolve_final` (trailing slash).
    pub resolve_final_cid: Option<bool>,
}

/// Resolves `url` against `system`, following the walk described by its
/// root CID, root parameters, and segments, honoring the URL's own
/// `resolve_final` flag (whether it ended in `/`).
#[tracing::instrument(skip(system))]
pub async fn resolve(url: &IpldUrl, system: &System) -> Result<Resolved, Error> {
    resolve_with(url, system, url.resolve_final()).await
}

/// As [`resolve`], but `options.resolve_final_cid` can override the URL's
/// own trailing-slash flag for this call only.
#[tracing::instrument(skip(system))]
pub async fn resolve_opts(
    url: &IpldUrl,
    system: &System,
    options: ResolveOptions,
) -> Result<Resolved, Error> {
    let resolve_final_cid = options.resolve_final_cid.unwrap_or_else(|| url.resolve_final());
    resolve_with(url, system, resolve_final_cid).await
}

#[tracing::instrument(skip(system))]
pub(crate) async fn resolve_with(
    url: &IpldUrl,
    system: &System,
    resolve_final_cid: bool,
) -> Result<Resolved, Error> {
    let mut node = system.get_node(url.cid()).await?;
    let mut tags: IndexMap<String, LinkTag> = IndexMap::new();
    let mut last_cid: Option<Cid> = None;

    if !url.parameters().is_empty() {
        let lensed = lens::apply(node, url.parameters(), system).await?;
        node = lensed.node;
        tags = lensed.link_tags;
    }

    for segment in url.segments() {
        let child = node
            .lookup(&segment.name)
            .cloned()
            .ok_or_else(|| Error::PathNotFound(segment.name.clone()))?;

        if let Node::Link(cid) = child {
            last_cid = Some(cid);
            let mut fetched = system.get_node(&cid).await?;
            if let Some(tag) = tags.get(&segment.name) {
                let schema = load_tagged_schema(tag, system).await?;
                let view = crate::schema::apply(&schema, &tag.type_name, fetched)?;
                fetched = view.to_map();
            }
            node = fetched;
        } else {
            last_cid = None;
            node = child;
        }

        let lensed = lens::apply(node, &segment.parameters, system).await?;
        node = lensed.node;
        tags = lensed.link_tags;
    }

    if !resolve_final_cid {
        if let Some(cid) = last_cid {
            return Ok(Resolved::Link(cid));
        }
    }
    Ok(Resolved::Node(node))
}

async fn load_tagged_schema(
    tag: &LinkTag,
    system: &System,
) -> Result<crate::schema::Schema, Error> {
    let dmt = system.get_node(&tag.schema_cid).await?;
    let dsl = dmt.as_str().ok_or_else(|| Error::SchemaMismatch {
        type_name: tag.type_name.clone(),
        node: format!("{dmt:?}"),
        schema_dsl: "schema block is not a DSL text node".to_owned(),
    })?;
    crate::schema::compile(dsl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::AdlRegistry;
    use crate::codec::Codec;
    use crate::store::MemoryStore;
    use crate::url::Segment;
    use indexmap::IndexMap as Map;
    use std::sync::Arc;

    fn system() -> (Arc<MemoryStore>, System) {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(AdlRegistry::new());
        let sys = System::new(store.clone(), registry);
        (store, sys)
    }

    #[tokio::test]
    async fn scalar_read_through_a_segment() {
        let (store, system) = system();
        let mut map = Map::new();
        map.insert("hello".to_owned(), Node::from("world"));
        let cid = store.insert(&Node::Map(map), Codec::DagCbor).unwrap();

        let mut url = IpldUrl::new(cid);
        url.push_segment(Segment::new("hello"));
        url.set_resolve_final(true);

        let resolved = resolve(&url, &system).await.unwrap();
        assert_eq!(resolved, Resolved::Node(Node::from("world")));
    }

    #[tokio::test]
    async fn trailing_slash_follows_link_no_slash_returns_cid() {
        let (store, system) = system();
        let leaf_cid = store.insert(&Node::from("leaf"), Codec::DagCbor).unwrap();
        let mut root_map = Map::new();
        root_map.insert("child".to_owned(), Node::Link(leaf_cid));
        let root_cid = store.insert(&Node::Map(root_map), Codec::DagCbor).unwrap();

        let mut url = IpldUrl::new(root_cid);
        url.push_segment(Segment::new("child"));
        url.set_resolve_final(false);
        let resolved = resolve(&url, &system).await.unwrap();
        assert_eq!(resolved, Resolved::Link(leaf_cid));

        url.set_resolve_final(true);
        let resolved = resolve(&url, &system).await.unwrap();
        assert_eq!(resolved, Resolved::Node(Node::from("leaf")));
    }

    #[tokio::test]
    async fn resolve_opts_overrides_the_urls_own_trailing_slash() {
        let (store, system) = system();
        let leaf_cid = store.insert(&Node::from("leaf"), Codec::DagCbor).unwrap();
        let mut root_map = Map::new();
        root_map.insert("child".to_owned(), Node::Link(leaf_cid));
        let root_cid = store.insert(&Node::Map(root_map), Codec::DagCbor).unwrap();

        let mut url = IpldUrl::new(root_cid);
        url.push_segment(Segment::new("child"));
        url.set_resolve_final(false);

        let resolved = resolve_opts(
            &url,
            &system,
            ResolveOptions {
                resolve_final_cid: Some(true),
            },
        )
        .await
        .unwrap();
        assert_eq!(resolved, Resolved::Node(Node::from("leaf")));

        let resolved = resolve_opts(&url, &system, ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved, Resolved::Link(leaf_cid));
    }

    #[tokio::test]
    async fn missing_segment_is_path_not_found() {
        let (store, system) = system();
        let cid = store.insert(&Node::Map(Map::new()), Codec::DagCbor).unwrap();
        let mut url = IpldUrl::new(cid);
        url.push_segment(Segment::new("missing"));
        let result = resolve(&url, &system).await;
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }

    #[tokio::test]
    async fn root_level_schema_listpairs() {
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
        url.set_resolve_final(true);

        let resolved = resolve(&url, &system).await.unwrap();
        let node = resolved.into_node().unwrap();
        assert_eq!(node.lookup("Hello"), Some(&Node::from("World")));
        assert_eq!(node.lookup("Goodbye"), Some(&Node::from("Cyberspace")));
    }

    #[tokio::test]
    async fn tuple_struct_across_link_preserves_schema_tag() {
        let (store, system) = system();
        let schema_cid = store
            .insert(
                &Node::from(
                    "struct Example { Hello String, Goodbye &NestedExample } representation tuple\n\
                     struct NestedExample { region String } representation tuple",
                ),
                Codec::DagCbor,
            )
            .unwrap();
        let nested_cid = store
            .insert(
                &Node::List(vec![Node::from("Cyberspace")]),
                Codec::DagCbor,
            )
            .unwrap();
        let root = Node::List(vec![Node::from("Hello"), Node::Link(nested_cid)]);
        let root_cid = store.insert(&root, Codec::DagCbor).unwrap();

        let mut url = IpldUrl::new(root_cid);
        url.parameters_mut().set("schema", schema_cid.to_string());
        url.parameters_mut().set("type", "Example");
        url.push_segment(Segment::new("Goodbye"));
        url.set_resolve_final(true);

        let resolved = resolve(&url, &system).await.unwrap();
        let node = resolved.into_node().unwrap();
        assert_eq!(node.lookup("region"), Some(&Node::from("Cyberspace")));
    }
}
