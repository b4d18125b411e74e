//! Allow/block decisions for queried domains.

use std::fmt;
use std::sync::Arc;

use super::classifier::{BLOCK_THRESHOLD, Classifier, DomainEncoding};
use super::name::DomainName;
use crate::blocklist::Blocklist;

/// Why a domain was blocked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockReason {
    Blocklist,
    Classifier { score: f32 },
    Both { score: f32 },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocklist => f.write_str("blocklist"),
            Self::Classifier { score } => write!(f, "classifier score {score:.3}"),
            Self::Both { score } => write!(f, "blocklist and classifier score {score:.3}"),
        }
    }
}

/// Result of evaluating a domain.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Allow,
    /// `domain` is the lowercase name that was evaluated.
    Block { domain: String, reason: BlockReason },
}

impl FilterDecision {
    #[inline]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Decide whether `domain` is allowed.
///
/// The blocklist match and the classifier verdict are both computed and
/// OR-combined.
pub fn decide(
    domain: &DomainName,
    blocklist: &Blocklist,
    classifier: Option<&dyn Classifier>,
) -> FilterDecision {
    let domain = domain.to_lowercase();
    let listed = blocklist.is_blocked_normalized(&domain);
    let score = classifier
        .map(|classifier| classifier.predict(&DomainEncoding::new(&domain)))
        .filter(|&score| score > BLOCK_THRESHOLD);

    let reason = match (listed, score) {
        (false, None) => return FilterDecision::Allow,
        (true, None) => BlockReason::Blocklist,
        (false, Some(score)) => BlockReason::Classifier { score },
        (true, Some(score)) => BlockReason::Both { score },
    };

    FilterDecision::Block { domain, reason }
}

/// The blocklist and optional classifier bundled for the capture loop.
#[derive(Clone)]
pub struct PolicyEngine {
    blocklist: Arc<Blocklist>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl PolicyEngine {
    pub fn new(blocklist: Arc<Blocklist>) -> Self {
        Self {
            blocklist,
            classifier: None,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn decide(&self, domain: &DomainName) -> FilterDecision {
        decide(domain, &self.blocklist, self.classifier.as_deref())
    }

    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("blocklist_entries", &self.blocklist.len())
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}
