// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Resolves and patches content-addressed IPLD DAGs through `ipld://`
//! URLs: a CID authority, optional root/segment parameters selecting a
//! schema type or a named ADL, and a path walked one link hop at a time.
//!
//! ```no_run
//! use ipld_url_resolve::adl::{AdlRegistry, System};
//! use ipld_url_resolve::store::MemoryStore;
//! use ipld_url_resolve::{resolve, IpldUrl};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), ipld_url_resolve::Error> {
//! let store = Arc::new(MemoryStore::new());
//! let system = System::new(store, Arc::new(AdlRegistry::new()));
//! let url: IpldUrl = "ipld://bafyreigyr2tttnlthhsxyvbwyvm6scqaewt3r7e2z3vav7d63xu2ngmsny/hello"
//!     .parse()?;
//! let _ = resolve(&url, &system).await?;
//! # Ok(())
//! # }
//! ```

pub mod adl;
pub mod codec;
mod error;
mod lens;
mod libipld_bridge;
pub mod node;
pub mod params;
pub mod patch;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod url;

pub use crate::error::Error;
pub use crate::node::Node;
pub use crate::patch::{patch, OpKind, Operation};
pub use crate::resolver::{resolve, resolve_opts, ResolveOptions, Resolved};
pub use crate::url::IpldUrl;
