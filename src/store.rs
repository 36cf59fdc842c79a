// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::codec::{cid_for_bytes, Codec};
use crate::node::Node;
use crate::Error;
use async_trait::async_trait;
use cid::Cid;
use std::collections::HashMap;
use std::sync::RwLock;

/// The embedder-supplied block store.
///
/// Every method may suspend — store reads and writes are cooperative
/// suspension points, not guaranteed-synchronous calls — so the trait is
/// `async` via `async_trait` the way `forest_ipld::selector::walk::LinkResolver`
/// is. The resolver and patcher both hold a `&dyn Store` and await every
/// call rather than assuming synchronous access.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetches and decodes the block named by `cid`.
    async fn get_node(&self, cid: &Cid) -> Result<Node, Error>;

    /// Encodes and stores `node` under `codec`, returning the CID that
    /// corresponds to the exact bytes written.
    async fn save_node(&self, node: &Node, codec: Codec) -> Result<Cid, Error>;
}

/// Reference in-memory [`Store`], backing `get_node`/`save_node` with real
/// dag-cbor/dag-json codecs (via `libipld`). Grounded in
/// `forest_ipld_blockstore`'s `BlockStore` trait and `forest_db`'s
/// `MemoryDB` (an `Arc<RwLock<HashMap<..>>>` wrapper) — generalized
/// here to the async `Store` contract and keyed by `Cid` directly rather
/// than raw bytes, since this store only ever holds whole decoded blocks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a pre-encoded block, returning its CID. Useful
    /// for constructing fixtures whose CID must be known ahead of time,
    /// e.g. a schema block referenced by an `ipld://` URL's own parameters.
    pub fn insert(&self, node: &Node, codec: Codec) -> Result<Cid, Error> {
        let bytes = crate::libipld_bridge::encode(node, codec)?;
        let cid = cid_for_bytes(codec, &bytes);
        self.blocks
            .write()
            .map_err(|_| Error::store_msg("memory store lock poisoned"))?
            .insert(cid, bytes);
        Ok(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_node(&self, cid: &Cid) -> Result<Node, Error> {
        let bytes = self
            .blocks
            .read()
            .map_err(|_| Error::store_msg("memory store lock poisoned"))?
            .get(cid)
            .cloned()
            .ok_or_else(|| Error::store_msg(format!("cid not found: {cid}")))?;
        let codec = crate::codec::get_cid_encoding(cid)?;
        crate::libipld_bridge::decode(&bytes, codec)
    }

    async fn save_node(&self, node: &Node, codec: Codec) -> Result<Cid, Error> {
        let bytes = crate::libipld_bridge::encode(node, codec)?;
        let cid = cid_for_bytes(codec, &bytes);
        self.blocks
            .write()
            .map_err(|_| Error::store_msg("memory store lock poisoned"))?
            .insert(cid, bytes);
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[tokio::test]
    async fn roundtrip_through_store() {
        let store = MemoryStore::new();
        let mut map = IndexMap::new();
        map.insert("hello".to_owned(), Node::from("world"));
        let node = Node::Map(map);

        let cid = store.save_node(&node, Codec::DagCbor).await.unwrap();
        let back = store.get_node(&cid).await.unwrap();
        assert_eq!(back, node);
    }

    #[tokio::test]
    async fn missing_cid_is_store_error() {
        let store = MemoryStore::new();
        let cid = cid_for_bytes(Codec::DagCbor, b"nonexistent");
        assert!(store.get_node(&cid).await.is_err());
    }
}
