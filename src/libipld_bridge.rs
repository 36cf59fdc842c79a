// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Bridges [`Node`] to real codec implementations. `libipld` already ships
//! `dag-cbor`/`dag-json` codecs — the same crate `forest_ipld` depends on
//! for exactly this — so encoding/decoding delegates to its `Ipld` type
//! rather than reimplementing RFC 7049 canonical CBOR here.
//!
//! Note that `libipld::Ipld::Map` is a `BTreeMap`: both real codecs
//! canonicalize map-key order on the wire (that's what makes dag-cbor/
//! dag-json content-addressing deterministic independent of a producer's
//! insertion order), so converting through it on the way to bytes is
//! correct, not a loss. [`Node::Map`]'s insertion-ordered [`indexmap`]
//! is about the in-memory walk and lens views, not wire order.

use crate::codec::Codec;
use crate::node::Node;
use crate::Error;
use libipld::cbor::DagCborCodec;
use libipld::codec::Codec as LibipldCodecTrait;
use libipld::json::DagJsonCodec;
use libipld::Ipld as LibIpld;
use std::collections::BTreeMap;

fn to_libipld(node: &Node) -> LibIpld {
    match node {
        Node::Null => LibIpld::Null,
        Node::Bool(b) => LibIpld::Bool(*b),
        Node::Integer(i) => LibIpld::Integer(*i),
        Node::Float(f) => LibIpld::Float(*f),
        Node::String(s) => LibIpld::String(s.clone()),
        Node::Bytes(b) => LibIpld::Bytes(b.clone()),
        Node::List(l) => LibIpld::List(l.iter().map(to_libipld).collect()),
        Node::Map(m) => {
            let map: BTreeMap<String, LibIpld> =
                m.iter().map(|(k, v)| (k.clone(), to_libipld(v))).collect();
            LibIpld::Map(map)
        }
        Node::Link(cid) => LibIpld::Link(*cid),
    }
}

fn from_libipld(ipld: LibIpld) -> Node {
    match ipld {
        LibIpld::Null => Node::Null,
        LibIpld::Bool(b) => Node::Bool(b),
        LibIpld::Integer(i) => Node::Integer(i),
        LibIpld::Float(f) => Node::Float(f),
        LibIpld::String(s) => Node::String(s),
        LibIpld::Bytes(b) => Node::Bytes(b),
        LibIpld::List(l) => Node::List(l.into_iter().map(from_libipld).collect()),
        LibIpld::Map(m) => {
            Node::Map(m.into_iter().map(|(k, v)| (k, from_libipld(v))).collect())
        }
        LibIpld::Link(cid) => Node::Link(cid),
    }
}

pub fn encode(node: &Node, codec: Codec) -> Result<Vec<u8>, Error> {
    let ipld = to_libipld(node);
    match codec {
        Codec::DagCbor => DagCborCodec
            .encode(&ipld)
            .map_err(|e| Error::store_msg(format!("dag-cbor encode: {e}"))),
        Codec::DagJson => DagJsonCodec
            .encode(&ipld)
            .map_err(|e| Error::store_msg(format!("dag-json encode: {e}"))),
    }
}

pub fn decode(bytes: &[u8], codec: Codec) -> Result<Node, Error> {
    let ipld: LibIpld = match codec {
        Codec::DagCbor => DagCborCodec
            .decode(bytes)
            .map_err(|e| Error::store_msg(format!("dag-cbor decode: {e}")))?,
        Codec::DagJson => DagJsonCodec
            .decode(bytes)
            .map_err(|e| Error::store_msg(format!("dag-json decode: {e}")))?,
    };
    Ok(from_libipld(ipld))
}
