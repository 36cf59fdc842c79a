// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use indexmap::IndexMap;

/// The decoded in-memory form of one IPLD block.
///
/// `Map` uses an [`IndexMap`] rather than a `BTreeMap`: the resolver and
/// patcher preserve insertion order across copy-on-write reconstruction,
/// and an ordinary sorted map would silently reorder keys on every rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Node>),
    Map(IndexMap<String, Node>),
    /// A CID referencing another block. Links are never followed by the
    /// node itself; the resolver/patcher dereference them through a
    /// [`crate::store::Store`].
    Link(Cid),
}

impl Node {
    pub fn as_link(&self) -> Option<&Cid> {
        match self {
            Node::Link(cid) => Some(cid),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Node::List(_))
    }

    /// Look up a single step of a walk: a string key against a map, or a
    /// decimal string / literal index against a list. Mirrors
    /// `forest_ipld::Ipld::lookup_segment`, generalized to accept the
    /// name as a plain `&str` rather than a dedicated segment type, since
    /// both the URL walker and the patch walker need this lookup and use
    /// different segment representations.
    pub fn lookup(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Map(map) => map.get(name),
            Node::List(list) => name.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(s.to_owned())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i128> for Node {
    fn from(i: i128) -> Self {
        Node::Integer(i)
    }
}

impl From<Cid> for Node {
    fn from(cid: Cid) -> Self {
        Node::Link(cid)
    }
}
