use derive_new::new;
use serde::{Deserialize, Serialize};

pub use count::*;
pub use timestamp::*;
pub use view::*;

mod count;
mod timestamp;
mod view;

/// Identifier of a counted item (a video).
///
/// Reading one from the wire only accepts the non-negative `i64` range, which is what
/// the storage layer's integer columns hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, new)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        u64::try_from(raw)
            .map(Self)
            .map_err(|_| serde::de::Error::custom(format!("item id {raw} must not be negative")))
    }
}

impl ItemId {
    /// The canonical key a row is stored and sharded under.
    pub fn row_key(self) -> String {
        self.0.to_string()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, new,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_read_within_the_stored_range() {
        assert_eq!(serde_json::from_str::<ItemId>("42").unwrap(), ItemId(42));
        assert_eq!(serde_json::to_string(&ItemId(42)).unwrap(), "42");

        assert!(serde_json::from_str::<ItemId>("-1").is_err());
        assert!(serde_json::from_str::<ItemId>("18446744073709551615").is_err());
    }
}
