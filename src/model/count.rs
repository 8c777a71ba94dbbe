use super::*;

/// One row of the counting table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct CountRecord {
    pub item_id: ItemId,
    pub views_count: u64,
}

/// Query string of `GET /count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct CountQuery {
    pub item_id: ItemId,
}
