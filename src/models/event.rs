//! Landing events delivered by the storage backend after an object write.

use serde::Deserialize;

/// Event-type prefix identifying object-creation events. Anything else in
/// the feed is ignored.
pub const CREATION_EVENT_PREFIX: &str = "ObjectCreated";

/// One storage-backend notification that an object write finished.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LandingEvent {
    /// Backend event kind, e.g. `ObjectCreated:Put`.
    pub event_type: String,

    /// Key of the object that landed.
    pub object_key: String,

    /// Size of the object in bytes, when reported.
    #[serde(default)]
    pub object_size: i64,
}

impl LandingEvent {
    /// True for creation-type events, the only kind the reconciler handles.
    pub fn is_creation(&self) -> bool {
        self.event_type.starts_with(CREATION_EVENT_PREFIX)
    }
}

/// A batch of landing events; one backend delivery may carry several.
#[derive(Deserialize, Clone, Debug)]
pub struct LandingBatch {
    #[serde(rename = "records", alias = "Records")]
    pub records: Vec<LandingEvent>,
}
