//! Service UUID derivation.
//!
//! The advertised service UUID is not fixed: it is derived from the upper
//! half of the 32-byte public-key commitment, so a central that knows the
//! key can predict the UUID while everyone else sees an opaque, rotating
//! value. The low bit of the final byte is the continuity discriminator:
//! clear for a discoverable first pairing, set for continuous session
//! resumption. Everything else comes from commitment bytes 16..32.

use picoble_identity::Commitment;
use std::fmt;
use uuid::Uuid;

/// Commitment byte offset where the UUID material starts.
const UUID_MATERIAL_OFFSET: usize = 16;

/// A derived, advertisable service UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceUuid(Uuid);

impl ServiceUuid {
    /// The underlying UUID value.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Whether the continuity bit is set.
    pub fn is_continuous(&self) -> bool {
        self.0.as_bytes()[15] & 0x01 != 0
    }
}

impl fmt::Display for ServiceUuid {
    /// Canonical 36-character form, uppercase hex with literal `-`
    /// separators.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = Uuid::encode_buffer();
        f.write_str(self.0.hyphenated().encode_upper(&mut buffer))
    }
}

/// Derive the service UUID for a commitment.
///
/// Deterministic: equal inputs always yield equal UUIDs. The `continuous`
/// flag selects between the "new pairing" UUID (low bit of the last byte
/// clear) and the "session resumption" UUID (low bit set).
pub fn derive_service_uuid(commitment: &Commitment, continuous: bool) -> ServiceUuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&commitment.as_bytes()[UUID_MATERIAL_OFFSET..]);

    if continuous {
        bytes[15] |= 0x01;
    } else {
        bytes[15] &= 0xFE;
    }

    ServiceUuid(Uuid::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ones_commitment() {
        let commitment = Commitment::from_bytes(&[0xFF; 32]).unwrap();

        let discoverable = derive_service_uuid(&commitment, false);
        assert_eq!(
            discoverable.to_string(),
            "FFFFFFFF-FFFF-FFFF-FFFF-FFFFFFFFFFFE"
        );

        let continuous = derive_service_uuid(&commitment, true);
        assert_eq!(
            continuous.to_string(),
            "FFFFFFFF-FFFF-FFFF-FFFF-FFFFFFFFFFFF"
        );
    }

    #[test]
    fn test_continuity_bit_matches_input() {
        let commitment = Commitment::digest(b"some key");

        for continuous in [false, true] {
            let uuid = derive_service_uuid(&commitment, continuous);
            assert_eq!(uuid.is_continuous(), continuous);

            let rendered = uuid.to_string();
            let last_digit = u8::from_str_radix(&rendered[35..], 16).unwrap();
            assert_eq!(last_digit & 0x01 != 0, continuous);
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let commitment = Commitment::digest(b"stable input");

        let first = derive_service_uuid(&commitment, true);
        let second = derive_service_uuid(&commitment, true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_lower_commitment_half_is_ignored() {
        let mut a = [0x00u8; 32];
        let mut b = [0x77u8; 32];
        for pos in 16..32 {
            a[pos] = pos as u8;
            b[pos] = pos as u8;
        }

        let uuid_a = derive_service_uuid(&Commitment::from_bytes(&a).unwrap(), false);
        let uuid_b = derive_service_uuid(&Commitment::from_bytes(&b).unwrap(), false);
        assert_eq!(uuid_a, uuid_b);
    }

    #[test]
    fn test_byte_grouping() {
        let mut bytes = [0u8; 32];
        for (pos, byte) in bytes.iter_mut().enumerate() {
            *byte = pos as u8;
        }
        let commitment = Commitment::from_bytes(&bytes).unwrap();

        // Bytes 16..20 form the first group, 20..22 the second, 22..24 the
        // third and 24..32 the remainder.
        let uuid = derive_service_uuid(&commitment, false);
        assert_eq!(uuid.to_string(), "10111213-1415-1617-1819-1A1B1C1D1E1E");
    }

    #[test]
    fn test_canonical_format() {
        let uuid = derive_service_uuid(&Commitment::digest(b"format"), false);
        let rendered = uuid.to_string();

        assert_eq!(rendered.len(), 36);
        for pos in [8, 13, 18, 23] {
            assert_eq!(rendered.as_bytes()[pos], b'-');
        }
        assert_eq!(rendered.to_uppercase(), rendered);
    }
}
