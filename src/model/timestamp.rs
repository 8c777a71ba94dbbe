use chrono::{DateTime, TimeZone as _, Utc};
use serde::{Deserialize, Serialize};

pub fn now() -> Timestamp {
    Timestamp(Utc::now())
}

/// A point in time, written as RFC 3339. Reading also accepts epoch milliseconds,
/// which is how older clients send their `timeStamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for Timestamp {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_rfc3339().serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(millis) => Self::from_millis(millis).ok_or_else(|| {
                serde::de::Error::custom(format!("timestamp {millis} is out of range"))
            }),
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Self(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
