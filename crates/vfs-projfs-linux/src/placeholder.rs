//! Placeholder identity tokens and update flags.

use std::fmt;

use bitflags::bitflags;

use crate::error::ProjFsError;

/// Length in bytes of a provider or content id.
pub const PLACEHOLDER_ID_LENGTH: usize = 128;

/// Permission bits used for placeholder directories.
pub const PLACEHOLDER_DIR_MODE: u32 = 0o777;

/// Opaque fixed-length correlation token stored with a placeholder.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId([u8; PLACEHOLDER_ID_LENGTH]);

impl PlaceholderId {
    /// All-zero id.
    pub const fn zeroed() -> Self {
        Self([0; PLACEHOLDER_ID_LENGTH])
    }

    /// Wrap an exact-length array.
    pub const fn new(bytes: [u8; PLACEHOLDER_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; PLACEHOLDER_ID_LENGTH] {
        &self.0
    }

    /// Mutable raw bytes, for sessions that fill ids in place.
    pub fn as_mut_bytes(&mut self) -> &mut [u8; PLACEHOLDER_ID_LENGTH] {
        &mut self.0
    }
}

impl Default for PlaceholderId {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl TryFrom<&[u8]> for PlaceholderId {
    type Error = ProjFsError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; PLACEHOLDER_ID_LENGTH] =
            bytes.try_into().map_err(|_| ProjFsError::InvalidArgs)?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for PlaceholderId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Ids are mostly short strings padded with zeros.
        let used: usize = self
            .0
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |i| i + 1);
        write!(f, "PlaceholderId(")?;
        for b in &self.0[..used] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// Provider and content ids backing a file placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaceholderIdentity {
    /// Identifies the provider that owns the placeholder.
    pub provider_id: PlaceholderId,
    /// Identifies the content version behind the placeholder.
    pub content_id: PlaceholderId,
}

impl PlaceholderIdentity {
    /// Create an identity from two ids.
    pub fn new(provider_id: PlaceholderId, content_id: PlaceholderId) -> Self {
        Self {
            provider_id,
            content_id,
        }
    }
}

/// Require an id slice to be exactly [`PLACEHOLDER_ID_LENGTH`] bytes.
///
/// # Panics
/// On any other length. Callers own the id format, so a wrong length is a
/// programming error rather than a runtime failure.
pub(crate) fn require_id(bytes: &[u8], name: &str) -> PlaceholderId {
    match PlaceholderId::try_from(bytes) {
        Ok(id) => id,
        Err(_) => panic!(
            "{} must be exactly {} bytes, got {}",
            name,
            PLACEHOLDER_ID_LENGTH,
            bytes.len()
        ),
    }
}

bitflags! {
    /// What local changes an update-style operation may discard.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UpdateType: u32 {
        /// Allow updating a placeholder whose metadata changed.
        const ALLOW_DIRTY_METADATA = 0x01;
        /// Allow updating a placeholder whose content changed.
        const ALLOW_DIRTY_DATA = 0x02;
        /// Allow replacing a tombstone.
        const ALLOW_TOMBSTONE = 0x04;
        /// Allow updating a read-only file.
        const ALLOW_READ_ONLY = 0x20;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_exact_length() {
        let bytes: Vec<u8> = (0..PLACEHOLDER_ID_LENGTH).map(|i| i as u8).collect();
        let id = PlaceholderId::try_from(bytes.as_slice()).unwrap();
        assert_eq!(id.as_bytes().as_slice(), bytes.as_slice());
    }

    #[test]
    fn test_try_from_wrong_length() {
        assert_eq!(
            PlaceholderId::try_from([0u8; 127].as_slice()),
            Err(ProjFsError::InvalidArgs)
        );
        assert_eq!(
            PlaceholderId::try_from([0u8; 129].as_slice()),
            Err(ProjFsError::InvalidArgs)
        );
    }

    #[test]
    #[should_panic(expected = "providerId must be exactly 128 bytes, got 0")]
    fn test_require_id_panics() {
        require_id(&[], "providerId");
    }

    #[test]
    fn test_debug_trims_padding() {
        let mut id = PlaceholderId::zeroed();
        id.as_mut_bytes()[0] = 0xab;
        id.as_mut_bytes()[1] = 0x01;
        assert_eq!(format!("{:?}", id), "PlaceholderId(ab01)");
        assert_eq!(format!("{:?}", PlaceholderId::zeroed()), "PlaceholderId()");
    }
}
