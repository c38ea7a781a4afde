use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const ROOM_CODE_LEN: usize = 6;
const ROOM_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Short shareable room code, e.g. `K3QZ9A`.
    pub fn generate() -> Self {
        let mut seed = Uuid::new_v4().as_u128();
        let mut code = String::with_capacity(ROOM_CODE_LEN);
        for _ in 0..ROOM_CODE_LEN {
            code.push(ROOM_ALPHABET[(seed % 36) as usize] as char);
            seed /= 36;
        }
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
