use crate::defaults::DEFAULT_TAG;
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt, sync::Arc};
use thiserror::Error;

/// Label carried by every request, used to select routing rules
/// (`"read"`, `"write"`, `"checkout"`...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Arc<str>);

/// One entry of an entry component's tag distribution.
///
/// The probability of a generated request receiving `tag` is `weight`
/// over the sum of all the weights of the distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWeight {
    pub tag: Tag,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
#[error("tag weight must be finite and non-negative, got {0}")]
pub struct TagWeightError(f64);

impl Tag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(Arc::from(tag.as_ref()))
    }

    /// The tag given to requests when nothing else was configured.
    pub fn default_tag() -> Self {
        Self::new(DEFAULT_TAG)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::default_tag()
    }
}

impl TagWeight {
    /// # Errors
    ///
    /// Returns [`TagWeightError`] for NaN, infinite or negative weights.
    pub fn new(tag: impl AsRef<str>, weight: f64) -> Result<Self, TagWeightError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(TagWeightError(weight));
        }
        Ok(Self {
            tag: Tag::new(tag),
            weight,
        })
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
