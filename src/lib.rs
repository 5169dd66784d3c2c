// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cyc-access
//!
//! Client-side access layer to a deductive knowledge-base server.
//!
//! ## Architecture
//!
//! - **Entity model** (`term`): constants, NARTs, assertions, variables and formula lists
//! - **Transport boundary** (`transport`): the `Transport`/`Connector` traits a wire implementation provides
//! - **Canonicalization** (`registry`): one in-memory instance per entity, shared by all sessions
//! - **Sessions** (`session`): typed dispatch, lazy completion of id-only replies,
//!   cached queries and bookkeeping mutations
//! - **Result caches** (`cache`): bounded LRU memoization of ask, genl, collection and count queries
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cyc_access::config::SessionConfig;
//! use cyc_access::registry::Registry;
//! use cyc_access::session::Session;
//! # fn connector() -> Arc<dyn cyc_access::transport::Connector> { unimplemented!() }
//!
//! let registry = Registry::shared();
//! let session = Session::open(SessionConfig::default(), connector(), registry).unwrap();
//! let dog = session.constant_by_name("Dog").unwrap().expect("Dog exists");
//! let again = session.constant_by_name("#$Dog").unwrap().unwrap();
//! assert!(Arc::ptr_eq(&dog, &again));
//! ```

pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod parse;
pub mod registry;
pub mod session;
pub mod term;
pub mod transport;
pub mod well_known;
