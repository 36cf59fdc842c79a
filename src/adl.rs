// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::node::Node;
use crate::params::Parameters;
use crate::store::Store;
use crate::Error;
use async_trait::async_trait;
use cid::Cid;
use indexmap::IndexMap;
use multibase::Base;
use std::sync::Arc;

/// A named, user-supplied Abstract Data Layer function.
///
/// Reinterprets a node as another logical shape. Async because an ADL is
/// free to fetch further blocks through `system` before returning (e.g. an
/// ADL that stitches a sharded list back together).
#[async_trait]
pub trait Adl: Send + Sync {
    async fn apply(&self, node: Node, parameters: &Parameters, system: &System) -> Result<Node, Error>;
}

/// Ordered map from ADL name to function — threaded through explicitly
/// rather than kept as a process global, so a caller can run several
/// independently-configured resolvers in one process.
#[derive(Default)]
pub struct AdlRegistry {
    entries: IndexMap<String, Arc<dyn Adl>>,
}

impl AdlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, adl: Arc<dyn Adl>) {
        self.entries.insert(name.into(), adl);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Adl>> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// The handle passed to ADL functions and threaded through the lens
/// pipeline: the store, the registry itself (so an ADL can dispatch to
/// another named ADL while resolving its own shape), and the multibase
/// table a caller's CIDs may be rendered in.
pub struct System {
    store: Arc<dyn Store>,
    registry: Arc<AdlRegistry>,
    cid_bases: Vec<Base>,
}

impl System {
    pub fn new(store: Arc<dyn Store>, registry: Arc<AdlRegistry>) -> Self {
        Self {
            store,
            registry,
            cid_bases: vec![Base::Base32Lower, Base::Base36Lower],
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn get_node(&self, cid: &Cid) -> Result<Node, Error> {
        self.store.get_node(cid).await
    }

    pub async fn save_node(&self, node: &Node, codec: crate::codec::Codec) -> Result<Cid, Error> {
        self.store.save_node(node, codec).await
    }

    pub fn registry(&self) -> &AdlRegistry {
        &self.registry
    }

    pub fn cid_bases(&self) -> &[Base] {
        &self.cid_bases
    }
}

/// A reference ADL reversing a list node, included purely to exercise the
/// ADL dispatch path end to end. Real ADLs (sharded maps, HAMT-backed
/// directories, and so on) are supplied by embedders through the registry.
pub struct ReverseAdl;

#[async_trait]
impl Adl for ReverseAdl {
    async fn apply(&self, node: Node, _parameters: &Parameters, _system: &System) -> Result<Node, Error> {
        match node {
            Node::List(mut items) => {
                items.reverse();
                Ok(Node::List(items))
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn registry_dispatches_by_name() {
        let mut registry = AdlRegistry::new();
        registry.register("reverse", Arc::new(ReverseAdl));
        let registry = Arc::new(registry);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let system = System::new(store, registry);

        let adl = system.registry().get("reverse").unwrap();
        let node = Node::List(vec![Node::Integer(1), Node::Integer(2)]);
        let result = adl.apply(node, &Parameters::new(), &system).await.unwrap();
        assert_eq!(
            result,
            Node::List(vec![Node::Integer(2), Node::Integer(1)])
        );
    }

    #[test]
    fn unknown_name_not_in_registry() {
        let registry = AdlRegistry::new();
        assert!(registry.get("nope").is_none());
        assert!(registry.names().is_empty());
    }
}
