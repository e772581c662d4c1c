//! # Snapshot Format
//!
//! Binary serialization of a whole record set.
//!
//! Format: Header (5 bytes) + postcard-serialized [`StoreSnapshot`].
//! - 4 bytes: Magic ("REGS")
//! - 1 byte: Version
//!
//! Size and header are checked before the payload is decoded.

use crate::primitives;
use crate::store::StoreSnapshot;
use crate::RegistrarError;

/// Largest snapshot accepted for decoding.
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), RegistrarError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(RegistrarError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(RegistrarError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RegistrarError> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(RegistrarError::SerializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Encode a snapshot as header + payload.
pub fn snapshot_to_bytes(snapshot: &StoreSnapshot) -> Result<Vec<u8>, RegistrarError> {
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| RegistrarError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a snapshot, validating size and header first.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<StoreSnapshot, RegistrarError> {
    if bytes.len() < HEADER_LEN {
        return Err(RegistrarError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(RegistrarError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        RegistrarError::SerializationError(format!("Failed to decode snapshot: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RecordStore};
    use crate::{Course, CourseId, Student, StudentId};
    use chrono::{DateTime, Utc};

    fn sample() -> StoreSnapshot {
        let mut store = MemoryStore::with_max_credits(20);
        store
            .insert_student(Student::new(
                StudentId::new("S1"),
                "Ken Thompson",
                "ken@example.edu",
                DateTime::<Utc>::UNIX_EPOCH,
            ))
            .expect("student");
        store
            .insert_course(Course {
                id: CourseId::new("OS1"),
                title: "Operating Systems".to_string(),
                credits: 4,
                department: "CS".to_string(),
                semester: "SPRING".to_string(),
                instructor_id: "I2".to_string(),
                active: true,
            })
            .expect("course");
        StoreSnapshot::from(&store)
    }

    #[test]
    fn header_roundtrip() {
        let bytes = PersistenceHeader::new().to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored, PersistenceHeader::new());
        assert_eq!(&bytes[0..4], b"REGS");
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let snapshot = sample();
        let bytes1 = snapshot_to_bytes(&snapshot).expect("encode");
        let restored = snapshot_from_bytes(&bytes1).expect("decode");
        let bytes2 = snapshot_to_bytes(&restored).expect("re-encode");

        assert_eq!(restored, snapshot);
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("encode");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            snapshot_from_bytes(&bytes),
            Err(RegistrarError::SerializationError(_))
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(snapshot_from_bytes(b"REG").is_err());
        let bytes = snapshot_to_bytes(&sample()).expect("encode");
        assert!(snapshot_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
