//! # Canonical Export Module
//!
//! A redb file is not bit-identical across runs even when its records are.
//! The canonical export is: records sorted by id and serialized with
//! postcard, so two stores with the same contents always export the same
//! bytes. It is the format used to compare, verify and move record sets.
//!
//! Layout:
//! ```text
//! [header_len: u32 LE] [CanonicalHeader (postcard)] [CanonicalRecords (postcard)]
//! ```

use crate::store::{RecordStore, StoreSnapshot};
use crate::{Course, Enrollment, RegistrarError, Student};
use serde::{Deserialize, Serialize};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for canonical export format.
pub const CANONICAL_MAGIC: [u8; 4] = *b"RGEX";

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Maximum student or course count accepted on import.
pub const MAX_IMPORT_RECORD_COUNT: u64 = 1_000_000;

/// Maximum enrollment count accepted on import.
pub const MAX_IMPORT_ENROLLMENT_COUNT: u64 = 10_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub student_count: u64,
    pub course_count: u64,
    pub enrollment_count: u64,
    /// Checksum of the encoded records section.
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(records: &CanonicalRecords, checksum: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            student_count: records.students.len() as u64,
            course_count: records.courses.len() as u64,
            enrollment_count: records.enrollments.len() as u64,
            checksum,
        }
    }

    /// Validate magic, version and count limits.
    pub fn validate(&self) -> Result<(), RegistrarError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(RegistrarError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(RegistrarError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.student_count > MAX_IMPORT_RECORD_COUNT
            || self.course_count > MAX_IMPORT_RECORD_COUNT
        {
            return Err(RegistrarError::SerializationError(format!(
                "Record count exceeds maximum allowed {}",
                MAX_IMPORT_RECORD_COUNT
            )));
        }
        if self.enrollment_count > MAX_IMPORT_ENROLLMENT_COUNT {
            return Err(RegistrarError::SerializationError(format!(
                "Enrollment count {} exceeds maximum allowed {}",
                self.enrollment_count, MAX_IMPORT_ENROLLMENT_COUNT
            )));
        }
        Ok(())
    }
}

/// Every record of a store, sorted by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalRecords {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    pub next_enrollment_id: u64,
    pub max_credits: u32,
}

impl CanonicalRecords {
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut students = snapshot.students;
        let mut courses = snapshot.courses;
        let mut enrollments = snapshot.enrollments;
        students.sort_by(|a, b| a.id.cmp(&b.id));
        courses.sort_by(|a, b| a.id.cmp(&b.id));
        enrollments.sort_by_key(|e| e.id);
        Self {
            students,
            courses,
            enrollments,
            next_enrollment_id: snapshot.next_enrollment_id,
            max_credits: snapshot.max_credits,
        }
    }

    pub fn from_store<S: RecordStore + ?Sized>(store: &S) -> Result<Self, RegistrarError> {
        Ok(Self::from_snapshot(StoreSnapshot::capture(store)?))
    }

    #[must_use]
    pub fn into_snapshot(self) -> StoreSnapshot {
        StoreSnapshot {
            students: self.students,
            courses: self.courses,
            enrollments: self.enrollments,
            next_enrollment_id: self.next_enrollment_id,
            max_credits: self.max_credits,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, RegistrarError> {
        postcard::to_allocvec(self)
            .map_err(|e| RegistrarError::SerializationError(format!("Data: {}", e)))
    }

    /// Deterministic checksum of the encoded records.
    pub fn checksum(&self) -> Result<u64, RegistrarError> {
        Ok(checksum_bytes(&self.encode()?))
    }
}

/// Rotate-and-XOR checksum.
///
/// Detects accidental corruption only. It is not collision resistant; use
/// the BLAKE3 hash (`crypto-hash` feature) where tampering matters.
#[must_use]
pub fn checksum_bytes(data: &[u8]) -> u64 {
    data.iter().enumerate().fold(0u64, |hash, (i, byte)| {
        hash.rotate_left(7) ^ u64::from(*byte).rotate_left((i % 64) as u32)
    }) ^ (data.len() as u64).rotate_left(3)
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export a store to canonical bytes.
pub fn export_canonical<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<u8>, RegistrarError> {
    export_records(&CanonicalRecords::from_store(store)?)
}

/// Encode already-collected records.
pub fn export_records(records: &CanonicalRecords) -> Result<Vec<u8>, RegistrarError> {
    let data_bytes = records.encode()?;
    let header = CanonicalHeader::new(records, checksum_bytes(&data_bytes));
    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| RegistrarError::SerializationError(format!("Header: {}", e)))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Decode canonical bytes, verifying header, limits, checksum and counts.
pub fn import_canonical(data: &[u8]) -> Result<StoreSnapshot, RegistrarError> {
    let Some(len_bytes) = data.get(..4) else {
        return Err(RegistrarError::SerializationError(
            "Data too short".to_string(),
        ));
    };
    let header_len =
        u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    let header_end = 4usize.saturating_add(header_len);
    let Some(header_bytes) = data.get(4..header_end) else {
        return Err(RegistrarError::SerializationError(
            "Data too short for header".to_string(),
        ));
    };

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| RegistrarError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let body = &data[header_end..];
    let computed = checksum_bytes(body);
    if computed != header.checksum {
        return Err(RegistrarError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }

    let records: CanonicalRecords = postcard::from_bytes(body)
        .map_err(|e| RegistrarError::SerializationError(format!("Data: {}", e)))?;

    if records.students.len() as u64 != header.student_count
        || records.courses.len() as u64 != header.course_count
        || records.enrollments.len() as u64 != header.enrollment_count
    {
        return Err(RegistrarError::SerializationError(
            "Record count mismatch".to_string(),
        ));
    }

    Ok(records.into_snapshot())
}

/// Check whether a store holds exactly the records of a canonical export.
pub fn verify_canonical<S: RecordStore + ?Sized>(
    store: &S,
    canonical_data: &[u8],
) -> Result<bool, RegistrarError> {
    let imported = CanonicalRecords::from_snapshot(import_canonical(canonical_data)?);
    let current = CanonicalRecords::from_store(store)?;
    Ok(imported.students == current.students
        && imported.courses == current.courses
        && imported.enrollments == current.enrollments
        && imported.next_enrollment_id == current.next_enrollment_id)
}

/// Checksum of a store's canonical records.
pub fn canonical_checksum<S: RecordStore + ?Sized>(store: &S) -> Result<u64, RegistrarError> {
    CanonicalRecords::from_store(store)?.checksum()
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// BLAKE3 hash of a store's canonical export, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash<S: RecordStore + ?Sized>(store: &S) -> Result<String, RegistrarError> {
    Ok(compute_blake3_hash(&export_canonical(store)?))
}

/// Compare a store's canonical BLAKE3 hash against an expected hex string.
#[cfg(feature = "crypto-hash")]
pub fn verify_crypto_hash<S: RecordStore + ?Sized>(
    store: &S,
    expected_hash: &str,
) -> Result<bool, RegistrarError> {
    Ok(canonical_crypto_hash(store)?.eq_ignore_ascii_case(expected_hash.trim()))
}

/// BLAKE3 hash of raw bytes, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
