use snafu::OptionExt as _;

use crate::validation::{self, MissingFieldSnafu, NegativeIdSnafu, ValidationError};

use super::*;

/// One observed view, validated and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
    video_id: ItemId,
    user_id: UserId,
    location: String,
    device: String,
    timestamp: Timestamp,
}

impl ViewRecord {
    pub fn new(
        video_id: ItemId, user_id: UserId, location: impl Into<String>, device: impl Into<String>,
    ) -> Self {
        Self::at(video_id, user_id, location, device, now())
    }

    pub fn at(
        video_id: ItemId, user_id: UserId, location: impl Into<String>, device: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            video_id,
            user_id,
            location: location.into(),
            device: device.into(),
            timestamp,
        }
    }

    pub fn video_id(&self) -> ItemId {
        self.video_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A view as it arrives on the wire, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPayload {
    pub video_id: Option<i64>,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default, alias = "timeStamp")]
    pub timestamp: Option<Timestamp>,
}

fn non_negative(field: &'static str, value: Option<i64>) -> validation::Result<u64> {
    let value = value.context(MissingFieldSnafu { field })?;
    u64::try_from(value).map_err(|_| NegativeIdSnafu { field, value }.build())
}

impl TryFrom<ViewPayload> for ViewRecord {
    type Error = ValidationError;

    fn try_from(payload: ViewPayload) -> Result<Self, Self::Error> {
        let video_id = non_negative("videoId", payload.video_id)?;
        let user_id = non_negative("userId", payload.user_id)?;

        Ok(Self {
            video_id: ItemId(video_id),
            user_id: UserId(user_id),
            location: payload.location.unwrap_or_default(),
            device: payload.device.unwrap_or_default(),
            timestamp: payload.timestamp.unwrap_or_else(now),
        })
    }
}
