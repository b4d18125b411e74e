//! Phishguard - DNS filtering over a virtual network interface.
//!
//! Phishguard presents itself as a TUN device that carries the host's
//! traffic, inspects every DNS query passing through it and refuses to
//! resolve domains found on a blocklist or flagged by a classifier. All
//! other queries are relayed to a real resolver.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`]: Configuration loading and validation
//! - [`network`]: IPv4/UDP decoding, response framing and the virtual interface
//! - [`dns`]: DNS name decoding, filtering policy and upstream forwarding
//! - [`blocklist`]: The blocklist set and its file loaders
//! - [`tunnel`]: The capture loop and the connect/disconnect state machine
//! - [`error`]: Error types
//!
//! # Testing
//!
//! The interface, the upstream forwarder and the event sink are traits, so
//! the whole pipeline runs in tests without a TUN device or network access:
//!
//! ```rust
//! use std::sync::Arc;
//! use phishguard::blocklist::Blocklist;
//! use phishguard::dns::PolicyEngine;
//!
//! let policy = PolicyEngine::new(Arc::new(Blocklist::new(["example.com"])));
//! assert!(policy.decide(&"ads.example.com".parse().unwrap()).is_blocked());
//! ```

pub mod blocklist;
pub mod config;
pub mod dns;
pub mod error;
pub mod metrics;
pub mod network;
pub mod tunnel;

pub use config::Config;
pub use error::{Error, Result};
