// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{codec::to_cidv1, params::Parameters, Error};
use cid::Cid;
use multibase::Base;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "ipld";

/// Percent-encode set for segment names and parameter keys/values.
///
/// Everything non-alphanumeric is escaped. This is stricter than it needs
/// to be for plain ASCII text, but it guarantees that `;` — which a naive
/// "URL-safe" encoder would otherwise leave untouched as an RFC 3986
/// sub-delimiter — is always escaped as `%3B`, since `;` ∉ alphanumeric.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC;

/// A single path component: a decoded name plus whatever `;k=v` parameters
/// were attached to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub name: String,
    pub parameters: Parameters,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameters(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

impl<S: Into<String>> From<S> for Segment {
    fn from(name: S) -> Self {
        Segment::new(name)
    }
}

/// A parsed `ipld://` URL: a root CID, the parameters attached to it, and
/// the path that walks the DAG reachable from that root.
#[derive(Debug, Clone, PartialEq)]
pub struct IpldUrl {
    cid: Cid,
    base: Base,
    parameters: Parameters,
    segments: Vec<Segment>,
    resolve_final: bool,
}

impl IpldUrl {
    pub fn new(cid: Cid) -> Self {
        Self {
            cid: to_cidv1(cid),
            base: Base::Base32Lower,
            parameters: Parameters::new(),
            segments: Vec::new(),
            resolve_final: false,
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    /// Replaces the authority's CID prefix, preserving root parameters.
    pub fn set_cid(&mut self, cid: Cid) {
        self.cid = to_cidv1(cid);
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Replaces root parameters, preserving `cid`.
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Replaces the entire path. If `segments` is empty, the serialized
    /// path becomes `""` — no trailing slash is synthesized even if
    /// `resolve_final` had previously been requested, since there is no
    /// longer a terminal segment for it to describe.
    pub fn set_segments(&mut self, segments: Vec<Segment>) {
        if segments.is_empty() {
            self.resolve_final = false;
        }
        self.segments = segments;
    }

    pub fn push_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Whether the path ended (or was set to end) in a trailing `/`,
    /// requesting that the final link be followed to its node.
    pub fn resolve_final(&self) -> bool {
        self.resolve_final
    }

    pub fn set_resolve_final(&mut self, resolve_final: bool) {
        self.resolve_final = resolve_final;
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| Error::BadUrl(format!("expected scheme {SCHEME}://, got {s:?}")))?;

        // Authority block runs up to the first unescaped '/'.
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(Error::BadUrl("missing cid authority".to_owned()));
        }

        let mut authority_parts = authority.split(';');
        let cid_text = authority_parts.next().unwrap();
        let base = detect_base(cid_text)?;
        let cid = to_cidv1(Cid::from_str(cid_text).map_err(|e| Error::BadUrl(e.to_string()))?);

        let mut parameters = Parameters::new();
        for kv in authority_parts {
            let (k, v) = decode_param(kv)?;
            parameters.push_raw(k, v);
        }

        let resolve_final = !path.is_empty() && path.ends_with('/');
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        let mut segments = Vec::new();
        if !trimmed.is_empty() {
            for raw in trimmed.split('/') {
                segments.push(parse_segment(raw)?);
            }
        }

        Ok(Self {
            cid,
            base,
            parameters,
            segments,
            resolve_final,
        })
    }
}

impl FromStr for IpldUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::parse(s)
    }
}

impl fmt::Display for IpldUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://")?;
        let cid_text = self
            .cid
            .to_string_of_base(self.base)
            .map_err(|_| fmt::Error)?;
        write!(f, "{cid_text}")?;
        for (k, v) in self.parameters.iter() {
            write!(f, ";{}={}", encode(k), encode(v))?;
        }

        if self.segments.is_empty() {
            if self.resolve_final {
                write!(f, "/")?;
            }
            return Ok(());
        }

        for segment in &self.segments {
            write!(f, "/{}", encode(&segment.name))?;
            for (k, v) in segment.parameters.iter() {
                write!(f, ";{}={}", encode(k), encode(v))?;
            }
        }
        if self.resolve_final {
            write!(f, "/")?;
        }
        Ok(())
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_SET).to_string()
}

fn decode(s: &str) -> Result<String, Error> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| Error::BadUrl(e.to_string()))
}

fn decode_param(kv: &str) -> Result<(String, String), Error> {
    match kv.split_once('=') {
        Some((k, v)) => Ok((decode(k)?, decode(v)?)),
        None => Ok((decode(kv)?, String::new())),
    }
}

fn parse_segment(raw: &str) -> Result<Segment, Error> {
    let mut parts = raw.split(';');
    let name = decode(parts.next().unwrap_or_default())?;
    let mut parameters = Parameters::new();
    for kv in parts {
        let (k, v) = decode_param(kv)?;
        parameters.push_raw(k, v);
    }
    Ok(Segment { name, parameters })
}

fn detect_base(cid_text: &str) -> Result<Base, Error> {
    match cid_text.chars().next() {
        Some('b') => Ok(Base::Base32Lower),
        Some('k') => Ok(Base::Base36Lower),
        // CIDv0 (bare base58btc, no multibase prefix byte) — canonicalized
        // to v1 on parse, serialized back out as base32.
        Some('Q') | Some('z') => Ok(Base::Base32Lower),
        Some(_) => Ok(Base::Base32Lower),
        None => Err(Error::BadUrl("empty cid".to_owned())),
    }
}
