//! Domain classifier capability and its input encoding.
//!
//! The model itself lives outside this crate. What is fixed here is the
//! input layout the model was trained on: the lowercase domain as a
//! 100-element `f32` vector holding each recognized character's code point.

/// Number of units in the classifier input.
pub const ENCODING_LEN: usize = 100;

/// Scores above this value mark a domain as malicious.
pub const BLOCK_THRESHOLD: f32 = 0.5;

const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789.-_";

/// Fixed-length numeric encoding of a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEncoding([f32; ENCODING_LEN]);

impl DomainEncoding {
    /// Encode `domain`.
    ///
    /// Position `i` holds the code point of the `i`-th character of the
    /// lowercase domain when it is in `a-z`, `0-9`, `.`, `-` or `_`, and
    /// `0.0` otherwise. Shorter domains are zero-padded, longer ones truncated.
    pub fn new(domain: &str) -> Self {
        let mut units = [0.0; ENCODING_LEN];
        for (unit, c) in units.iter_mut().zip(domain.chars().flat_map(char::to_lowercase)) {
            if ALPHABET.contains(c) {
                *unit = u32::from(c) as f32;
            }
        }
        Self(units)
    }

    #[inline]
    pub const fn as_slice(&self) -> &[f32; ENCODING_LEN] {
        &self.0
    }
}

/// A black-box model scoring how likely a domain is malicious.
pub trait Classifier: Send + Sync {
    /// Return a score, where values above [`BLOCK_THRESHOLD`] mean "block".
    fn predict(&self, input: &DomainEncoding) -> f32;
}

impl<F> Classifier for F
where
    F: Fn(&DomainEncoding) -> f32 + Send + Sync,
{
    fn predict(&self, input: &DomainEncoding) -> f32 {
        self(input)
    }
}
