use crate::model::transfer::{FileMetadata, TransferId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Channel-plane frame exchanged directly between peers once a session is open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DataMessage {
    FileChunk {
        chunk: FileChunk,
        /// Present on chunk 0 only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<FileMetadata>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileChunk {
    pub id: TransferId,
    pub index: u32,
    #[serde(with = "base64_payload")]
    pub data: Bytes,
    pub is_last: bool,
}

impl DataMessage {
    pub fn encode(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn decode(frame: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(frame)
    }
}

mod base64_payload {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(de::Error::custom)
    }
}
