// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Error;
use cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest};

/// `dag-cbor` multicodec code.
pub const DAG_CBOR: u64 = 0x71;
/// `dag-json` multicodec code.
pub const DAG_JSON: u64 = 0x0129;

/// Multicodec the legacy (CIDv0) `dag-pb` implicit codec carries, used only
/// to upgrade a v0 CID to its canonical v1 form.
const DAG_PB: u64 = 0x70;

/// The small, explicit set of codecs this crate knows how to re-encode
/// during a patch. Deliberately not an open `From<u64>` conversion:
/// widening it silently would mean a patch could start re-saving blocks
/// under a codec nobody asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    DagCbor,
    DagJson,
}

impl Codec {
    pub fn code(self) -> u64 {
        match self {
            Codec::DagCbor => DAG_CBOR,
            Codec::DagJson => DAG_JSON,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::DagCbor => "dag-cbor",
            Codec::DagJson => "dag-json",
        }
    }
}

impl TryFrom<u64> for Codec {
    type Error = Error;

    fn try_from(code: u64) -> Result<Self, Error> {
        match code {
            DAG_CBOR => Ok(Codec::DagCbor),
            DAG_JSON => Ok(Codec::DagJson),
            other => Err(Error::UnsupportedCodec(other)),
        }
    }
}

/// Returns the codec a CID's block must be (re-)encoded under when a
/// patch rewrites it. Any code outside `{dag-cbor, dag-json}` is fatal.
pub fn get_cid_encoding(cid: &Cid) -> Result<Codec, Error> {
    Codec::try_from(cid.codec())
}

/// Canonicalizes a CID to CIDv1. A CIDv0 CID is always sha2-256 `dag-pb`
/// with no explicit multicodec prefix; upgrading it means attaching the
/// `dag-pb` code explicitly and keeping the same multihash.
pub fn to_cidv1(cid: Cid) -> Cid {
    if cid.version() == Version::V1 {
        return cid;
    }
    Cid::new_v1(DAG_PB, *cid.hash())
}

/// Computes the CIDv1 for a block's bytes under a given codec, using
/// sha2-256 — the hash function the reference [`crate::store::MemoryStore`]
/// assumes throughout.
pub fn cid_for_bytes(codec: Codec, bytes: &[u8]) -> Cid {
    let hash = Code::Sha2_256.digest(bytes);
    Cid::new_v1(codec.code(), hash)
}
