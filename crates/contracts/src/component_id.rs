//! ComponentId - cheap-to-clone identifier for pipeline nodes
//!
//! Sources, providers, transformers and consumers are all addressed by a
//! `ComponentId`. Internally an `Arc<str>`: ids are created once at
//! registration time and cloned on every log line, metric label and window,
//! so cloning must not allocate.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier for a pipeline node
///
/// # Examples
/// ```
/// use contracts::ComponentId;
///
/// let id: ComponentId = "imu_raw".into();
/// let id2 = id.clone(); // refcount bump only
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "imu_raw");
/// ```
#[derive(Clone, Default)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    /// Create a new id from a string slice
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// The underlying string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ComponentId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ComponentId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ComponentId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ComponentId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({:?})", self.0)
    }
}

impl PartialEq for ComponentId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Same allocation short-circuits the string compare
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ComponentId {}

impl PartialEq<str> for ComponentId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ComponentId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Hashes like the underlying str, so HashMap<ComponentId, _> lookups work
// with plain &str keys via Borrow.
impl Hash for ComponentId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ComponentId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ComponentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
