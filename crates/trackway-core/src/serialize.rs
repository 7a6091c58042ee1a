//! Binary route snapshots.
//!
//! A compiled [`Route`] is encoded with `bitcode` behind a versioned header,
//! so a loader can cache compiled routes and reject stale caches instead of
//! misreading them.

use serde::{Deserialize, Serialize};

use crate::element::Route;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a compiled route snapshot.
pub const ROUTE_MAGIC: u32 = 0x7BA1_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("data too short for snapshot header")]
    TooShort,
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", ROUTE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Header stored in front of every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHeader {
    pub magic: u32,
    pub version: u32,
    /// Element count, for a quick sanity check before use.
    pub element_count: u64,
}

impl RouteHeader {
    pub fn new(element_count: u64) -> Self {
        Self {
            magic: ROUTE_MAGIC,
            version: FORMAT_VERSION,
            element_count,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != ROUTE_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    header: RouteHeader,
    route: &'a Route,
}

#[derive(Deserialize)]
struct Snapshot {
    header: RouteHeader,
    route: Route,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn encode_route(route: &Route) -> Result<Vec<u8>, SerializeError> {
    let snapshot = SnapshotRef {
        header: RouteHeader::new(route.elements.len() as u64),
        route,
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decodes a snapshot, validating the header before handing out the route.
pub fn decode_route(data: &[u8]) -> Result<Route, DeserializeError> {
    if data.is_empty() {
        return Err(DeserializeError::TooShort);
    }
    let snapshot: Snapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    if snapshot.header.element_count != snapshot.route.elements.len() as u64 {
        return Err(DeserializeError::Decode(format!(
            "header announces {} elements, payload has {}",
            snapshot.header.element_count,
            snapshot.route.elements.len()
        )));
    }
    Ok(snapshot.route)
}
