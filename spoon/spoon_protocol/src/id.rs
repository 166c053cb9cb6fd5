//! Identifiers for the actors contending over the resource.
//!
//! Actors refer to each other only through these ids (looked up in the
//! shared registry), never through owning pointers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one contending actor.
///
/// # Examples
///
/// ```
/// use spoon_protocol::ActorId;
///
/// let id = ActorId::new(3);
/// assert_eq!(id.to_string(), "actor-3");
/// assert_eq!("actor-3".parse::<ActorId>().unwrap(), id);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(u32);

impl ActorId {
    /// Create an id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for ActorId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Error returned when an [`ActorId`] cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid actor id: {0}")]
pub struct ParseActorIdError(String);

impl FromStr for ActorId {
    type Err = ParseActorIdError;

    /// Accepts both the display form (`actor-7`) and a bare number (`7`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("actor-").unwrap_or(s);
        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ParseActorIdError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("actor-12".parse::<ActorId>().unwrap(), ActorId::new(12));
        assert_eq!("12".parse::<ActorId>().unwrap(), ActorId::new(12));
        assert!("actor-".parse::<ActorId>().is_err());
        assert!("spoon".parse::<ActorId>().is_err());
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        assert!(ActorId::new(1) < ActorId::new(2));
        assert_eq!(ActorId::from(4).raw(), 4);
    }
}
