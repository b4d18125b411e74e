//! DNS wire decoding, filtering policy and upstream forwarding.

pub mod classifier;
pub mod forwarder;
pub mod message;
pub mod name;
pub mod policy;

pub use classifier::{BLOCK_THRESHOLD, Classifier, DomainEncoding};
pub use forwarder::{UdpForwarder, UpstreamForwarder};
pub use message::{DnsHeader, DnsQuestion};
pub use name::{DomainName, decode_name};
pub use policy::{BlockReason, FilterDecision, PolicyEngine, decide};
