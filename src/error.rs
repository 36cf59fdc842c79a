// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use thiserror::Error;

/// Errors produced while resolving or patching a URL-addressed IPLD DAG.
///
/// Variants correspond one-for-one with the error taxonomy of the resolver:
/// each carries the context its recovery story needs rather than a bare
/// string, so callers can match on the variant instead of parsing messages.
#[derive(Debug, Error)]
pub enum Error {
    /// Scheme wasn't `ipld:`, the CID was malformed, or the multibase was
    /// unrecognized.
    #[error("bad ipld:// url: {0}")]
    BadUrl(String),

    /// A walk step (resolve or patch descent) couldn't find the named key.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// A schema-typed view rejected the node at hand.
    #[error("schema mismatch for type {type_name}: node {node} does not fit {schema_dsl}")]
    SchemaMismatch {
        type_name: String,
        node: String,
        schema_dsl: String,
    },

    /// A segment named an `adl` not present in the registry.
    #[error("unknown adl {name:?}, known: {known:?}")]
    UnknownAdl { name: String, known: Vec<String> },

    /// A CID's codec isn't one this crate knows how to re-encode during a patch.
    #[error("unsupported codec 0x{0:x}")]
    UnsupportedCodec(u64),

    /// A patch operation named an `op` outside the enumerated set, or an
    /// operation whose path grammar was violated (e.g. an empty path).
    #[error("invalid patch operation: {0}")]
    InvalidPatchOp(String),

    /// `remove`/`replace` targeted an absent map key or out-of-range index.
    #[error("missing key: {0}")]
    MissingKey(String),

    /// A `test` operation's value didn't match what's at `path`.
    #[error("test failed at {path}: expected {expected}, got {actual}")]
    TestFailed {
        path: String,
        expected: String,
        actual: String,
    },

    /// The embedder's node store failed.
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A store failure reported only as text, for embedders whose backing
/// store error type isn't worth threading through as a type parameter.
#[derive(Debug, Error)]
#[error("{0}")]
struct StoreMessage(String);

impl Error {
    pub fn store<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Store(Box::new(e))
    }

    pub fn store_msg(msg: impl fmt::Display) -> Self {
        Error::Store(Box::new(StoreMessage(msg.to_string())))
    }
}

impl From<cid::Error> for Error {
    fn from(e: cid::Error) -> Self {
        Error::BadUrl(e.to_string())
    }
}

impl From<multibase::Error> for Error {
    fn from(e: multibase::Error) -> Self {
        Error::BadUrl(e.to_string())
    }
}
