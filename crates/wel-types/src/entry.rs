use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::digest::{self, EntryHash};
use crate::error::TypeError;
use crate::value::{RawValue, Value};

/// Role an entry plays in a world instance's history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationClass {
    /// The entry changes world state.
    #[default]
    StateChange,
    /// The entry records an action that was refused. Never replayed.
    Rejection,
    /// Engine bookkeeping (ticks, lifecycle markers).
    System,
    /// Story-only output with no state effect.
    Narrative,
}

impl MutationClass {
    /// Wire name, as written into the hashed header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateChange => "STATE_CHANGE",
            Self::Rejection => "REJECTION",
            Self::System => "SYSTEM",
            Self::Narrative => "NARRATIVE",
        }
    }

    /// Whether entries of this class participate in replay.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Self::Rejection)
    }
}

impl fmt::Display for MutationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationClass {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATE_CHANGE" => Ok(Self::StateChange),
            "REJECTION" => Ok(Self::Rejection),
            "SYSTEM" => Ok(Self::System),
            "NARRATIVE" => Ok(Self::Narrative),
            other => Err(TypeError::UnknownMutationClass(other.to_owned())),
        }
    }
}

/// An event as submitted by a caller, before the ledger has indexed,
/// chained, or hashed it.
///
/// The ledger-owned fields (`event_index`, `prev_hash`, `hash`) exist only so
/// that forged values arriving from outside can be seen and discarded; the
/// ledger never reads them.
///
/// An unset `id` or `payload` stays unset: the key is left out of the hashed
/// header rather than written as `""` or `null`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDraft {
    pub id: Option<String>,
    pub world_instance_id: String,
    pub actor_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: RawValue,
    pub timestamp: Option<i64>,
    pub template_origin: Option<String>,
    pub mutation_class: Option<MutationClass>,
    pub event_index: Option<u64>,
    pub prev_hash: Option<String>,
    pub hash: Option<String>,
}

impl Default for EventDraft {
    fn default() -> Self {
        Self {
            id: None,
            world_instance_id: String::new(),
            actor_id: String::new(),
            event_type: String::new(),
            payload: RawValue::Absent,
            timestamp: None,
            template_origin: None,
            mutation_class: None,
            event_index: None,
            prev_hash: None,
            hash: None,
        }
    }
}

impl EventDraft {
    /// An empty `id` means the event has none.
    pub fn new(
        id: impl Into<String>,
        world_instance_id: impl Into<String>,
        actor_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            id: (!id.is_empty()).then_some(id),
            world_instance_id: world_instance_id.into(),
            actor_id: actor_id.into(),
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn with_payload(mut self, payload: impl Into<RawValue>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn class(mut self, class: MutationClass) -> Self {
        self.mutation_class = Some(class);
        self
    }

    pub fn template_origin(mut self, origin: impl Into<String>) -> Self {
        self.template_origin = Some(origin.into());
        self
    }

    /// Whether the caller tried to set any ledger-owned field.
    pub fn has_ledger_fields(&self) -> bool {
        self.event_index.is_some() || self.prev_hash.is_some() || self.hash.is_some()
    }
}

/// Every hashed field of a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub world_instance_id: String,
    pub actor_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// `None` when the caller gave no payload; `Some(Value::Null)` is an
    /// explicit `null`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub payload: Option<Value>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_origin: Option<String>,
    pub mutation_class: MutationClass,
    pub event_index: u64,
    #[serde(with = "digest::prev_hash")]
    pub prev_hash: Option<EntryHash>,
}

impl EntryHeader {
    /// The header as a map value, keyed exactly as it is hashed.
    ///
    /// Unset `id`, `payload` and `templateOrigin` are left out rather than
    /// written as empty values.
    pub fn to_value(&self, hash_version: u32) -> Value {
        let mut map = BTreeMap::new();
        map.insert("hashVersion".to_owned(), Value::from(hash_version));
        if let Some(id) = &self.id {
            map.insert("id".to_owned(), Value::from(id.as_str()));
        }
        map.insert(
            "worldInstanceId".to_owned(),
            Value::from(self.world_instance_id.as_str()),
        );
        map.insert("actorId".to_owned(), Value::from(self.actor_id.as_str()));
        map.insert("type".to_owned(), Value::from(self.event_type.as_str()));
        if let Some(payload) = &self.payload {
            map.insert("payload".to_owned(), payload.clone());
        }
        map.insert("timestamp".to_owned(), Value::from(self.timestamp));
        if let Some(origin) = &self.template_origin {
            map.insert("templateOrigin".to_owned(), Value::from(origin.as_str()));
        }
        map.insert(
            "mutationClass".to_owned(),
            Value::from(self.mutation_class.as_str()),
        );
        map.insert("eventIndex".to_owned(), Value::from(self.event_index));
        map.insert(
            "prevHash".to_owned(),
            Value::from(digest::prev_hash::to_wire(&self.prev_hash)),
        );
        Value::Map(map)
    }
}

/// A field that is present deserializes to `Some`, even when it is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A sealed, hash-chained ledger record.
///
/// Entries have no mutators: once sealed, the only way to observe one is
/// through shared references, so neither the header nor anything nested in
/// the payload can change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    header: EntryHeader,
    hash: EntryHash,
}

impl LedgerEntry {
    /// Seal a header with its computed digest.
    pub fn seal(header: EntryHeader, hash: EntryHash) -> Self {
        Self { header, hash }
    }

    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    pub fn id(&self) -> Option<&str> {
        self.header.id.as_deref()
    }

    pub fn world_instance_id(&self) -> &str {
        &self.header.world_instance_id
    }

    pub fn actor_id(&self) -> &str {
        &self.header.actor_id
    }

    pub fn event_type(&self) -> &str {
        &self.header.event_type
    }

    pub fn payload(&self) -> Option<&Value> {
        self.header.payload.as_ref()
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn template_origin(&self) -> Option<&str> {
        self.header.template_origin.as_deref()
    }

    pub fn mutation_class(&self) -> MutationClass {
        self.header.mutation_class
    }

    pub fn event_index(&self) -> u64 {
        self.header.event_index
    }

    pub fn prev_hash(&self) -> Option<EntryHash> {
        self.header.prev_hash
    }

    pub fn hash(&self) -> EntryHash {
        self.hash
    }

    pub fn is_replayable(&self) -> bool {
        self.header.mutation_class.is_replayable()
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} [{}] {} by {}",
            self.header.world_instance_id,
            self.header.event_index,
            self.hash.short_hex(),
            self.header.event_type,
            self.header.actor_id
        )
    }
}
