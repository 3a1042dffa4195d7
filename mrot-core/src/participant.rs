use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Participant metadata collected by the host before the session starts.
///
/// The experiment core never interprets these values; they are carried along
/// so exports can attach them to the trial log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantMeta {
    pub participant_id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl ParticipantMeta {
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
