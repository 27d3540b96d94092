//! Opaque 128-bit identifiers shared by every entity in the data model.
//!
//! Every entity the platform persists is identified by an `Id` wrapping a
//! UUID. A single newtype (rather than one per entity kind, as a more
//! conservative design might choose) keeps the wire and storage shape
//! uniform while call sites still get a distinct Rust type per role via
//! light wrapper aliases below.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identifier. Freshly minted entities get `Id::new()`
/// (UUID v4); `Id::nil()` is reserved for the audit chain's genesis
/// predecessor and must never be assigned to a real entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(pub Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn from_bytes(b: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(b))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}…)", &self.to_hex()[..8])
    }
}

/// Unix timestamp, seconds, UTC.
pub type Timestamp = i64;

/// A hex-encoded SHA-256 digest, used throughout for scope/purpose/details
/// hashes. Kept as a `String` rather than `[u8; 32]` because most call
/// sites receive it pre-hashed from an external collaborator (the ODX
/// producer, a requester front-end) and never need to re-derive bytes.
pub type Hash32Hex = String;
