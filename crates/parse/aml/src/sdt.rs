//! System Description Table (SDT) header and checksum utilities.

use crate::AmlError;
use crate::stream::{AmlStream, AmlStreamMut};

/// Signature of the Differentiated System Description Table.
pub const DSDT_SIGNATURE: [u8; 4] = *b"DSDT";
/// Signature of a Secondary System Description Table.
pub const SSDT_SIGNATURE: [u8; 4] = *b"SSDT";

/// Creator ID stamped into generated tables.
pub const CREATOR_ID: u32 = u32::from_le_bytes(*b"HAML");
/// Creator revision stamped into generated tables.
pub const CREATOR_REVISION: u32 = 1;
/// Revision of generated definition blocks (64-bit integers).
pub const DEFINITION_BLOCK_REVISION: u8 = 2;

/// Offset of the checksum byte inside the header.
pub const CHECKSUM_OFFSET: usize = 9;

/// Standard ACPI System Description Table header.
///
/// This 36-byte header is present at the start of every ACPI table. For
/// definition blocks it precedes the AML byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdtHeader {
    /// 4-byte ASCII signature identifying the table type.
    pub signature: [u8; 4],
    /// Total length of the table, including the header, in bytes.
    pub length: u32,
    /// Revision of the table structure.
    pub revision: u8,
    /// Checksum byte. The entire table, including the header, must sum to zero.
    pub checksum: u8,
    /// OEM-supplied identification string.
    pub oem_id: [u8; 6],
    /// OEM-supplied table identification string.
    pub oem_table_id: [u8; 8],
    /// OEM-supplied revision number.
    pub oem_revision: u32,
    /// Vendor ID of the utility that created the table.
    pub creator_id: u32,
    /// Revision of the utility that created the table.
    pub creator_revision: u32,
}

impl SdtHeader {
    /// The size of an SDT header in bytes.
    pub const SIZE: usize = 36;

    /// Builds the header of a new, empty definition block.
    ///
    /// `oem_id` and `oem_table_id` are copied into their 6 and 8 byte fields,
    /// NUL padded and truncated if longer.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidHeader`] if the signature is not `DSDT` or
    /// `SSDT`, or an identifier is not printable ASCII.
    pub fn new_definition_block(
        signature: [u8; 4],
        oem_id: &str,
        oem_table_id: &str,
        oem_revision: u32,
    ) -> Result<Self, AmlError> {
        if signature != DSDT_SIGNATURE && signature != SSDT_SIGNATURE {
            return Err(AmlError::InvalidHeader);
        }
        Ok(Self {
            signature,
            length: Self::SIZE as u32,
            revision: DEFINITION_BLOCK_REVISION,
            checksum: 0,
            oem_id: copy_id(oem_id)?,
            oem_table_id: copy_id(oem_table_id)?,
            oem_revision,
            creator_id: CREATOR_ID,
            creator_revision: CREATOR_REVISION,
        })
    }

    /// Read an [`SdtHeader`] from a byte slice.
    ///
    /// Returns `None` if the slice is shorter than [`SdtHeader::SIZE`] bytes.
    #[must_use]
    pub fn read_from_bytes(data: &[u8]) -> Option<Self> {
        Self::decode(&mut AmlStream::new(data)).ok()
    }

    /// Reads a header from `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::UnexpectedEnd`] if fewer than 36 bytes remain.
    pub fn decode(stream: &mut AmlStream<'_>) -> Result<Self, AmlError> {
        let raw = stream.read_bytes(Self::SIZE)?;
        let u32_at = |offset: usize| {
            u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
        };
        let mut header = Self {
            signature: [raw[0], raw[1], raw[2], raw[3]],
            length: u32_at(4),
            revision: raw[8],
            checksum: raw[CHECKSUM_OFFSET],
            oem_id: [0; 6],
            oem_table_id: [0; 8],
            oem_revision: u32_at(24),
            creator_id: u32_at(28),
            creator_revision: u32_at(32),
        };
        header.oem_id.copy_from_slice(&raw[10..16]);
        header.oem_table_id.copy_from_slice(&raw[16..24]);
        Ok(header)
    }

    /// Writes the header in its 36-byte wire layout.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::BufferTooSmall`] if it does not fit.
    pub fn encode(&self, out: &mut AmlStreamMut<'_>) -> Result<(), AmlError> {
        out.write_bytes(&self.to_bytes())
    }

    /// Returns the header in its 36-byte wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut raw = [0u8; Self::SIZE];
        raw[0..4].copy_from_slice(&self.signature);
        raw[4..8].copy_from_slice(&self.length.to_le_bytes());
        raw[8] = self.revision;
        raw[CHECKSUM_OFFSET] = self.checksum;
        raw[10..16].copy_from_slice(&self.oem_id);
        raw[16..24].copy_from_slice(&self.oem_table_id);
        raw[24..28].copy_from_slice(&self.oem_revision.to_le_bytes());
        raw[28..32].copy_from_slice(&self.creator_id.to_le_bytes());
        raw[32..36].copy_from_slice(&self.creator_revision.to_le_bytes());
        raw
    }

    /// Returns the 4-byte signature as a byte slice.
    #[must_use]
    pub fn signature(&self) -> [u8; 4] {
        self.signature
    }

    /// Returns the total length of this table (header included).
    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Returns `true` for DSDT and SSDT headers.
    #[must_use]
    pub fn is_definition_block(&self) -> bool {
        self.signature == DSDT_SIGNATURE || self.signature == SSDT_SIGNATURE
    }
}

fn copy_id<const N: usize>(text: &str) -> Result<[u8; N], AmlError> {
    let bytes = text.as_bytes();
    if !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return Err(AmlError::InvalidHeader);
    }
    let mut id = [0u8; N];
    let len = bytes.len().min(N);
    id[..len].copy_from_slice(&bytes[..len]);
    Ok(id)
}

/// Validate the checksum of a byte slice.
///
/// ACPI tables are designed so that the sum of all bytes in the table equals
/// zero (mod 256). This function computes that sum and returns `true` when
/// the checksum is valid.
#[must_use]
pub fn validate_checksum(data: &[u8]) -> bool {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0
}

/// Computes and stores the checksum byte of a complete table in place.
///
/// Does nothing if `table` is shorter than a header.
pub fn update_checksum(table: &mut [u8]) {
    if table.len() < SdtHeader::SIZE {
        return;
    }
    table[CHECKSUM_OFFSET] = 0;
    let sum = table.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));
    table[CHECKSUM_OFFSET] = sum.wrapping_neg();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = SdtHeader::new_definition_block(SSDT_SIGNATURE, "OEMID", "OEMTABLID", 1).unwrap();
        assert_eq!(&header.oem_id, b"OEMID\0");
        assert_eq!(&header.oem_table_id, b"OEMTABLI");
        let raw = header.to_bytes();
        assert_eq!(&raw[0..4], b"SSDT");
        assert_eq!(raw[4], 36);
        assert_eq!(raw[8], DEFINITION_BLOCK_REVISION);
        assert_eq!(SdtHeader::read_from_bytes(&raw), Some(header));
        assert!(SdtHeader::read_from_bytes(&raw[..35]).is_none());
    }

    #[test]
    fn rejects_foreign_signatures() {
        assert_eq!(
            SdtHeader::new_definition_block(*b"FACP", "A", "B", 0),
            Err(AmlError::InvalidHeader)
        );
        assert_eq!(
            SdtHeader::new_definition_block(DSDT_SIGNATURE, "\u{7f}", "B", 0),
            Err(AmlError::InvalidHeader)
        );
    }

    #[test]
    fn checksum_round_trip() {
        let mut raw = SdtHeader::new_definition_block(DSDT_SIGNATURE, "HADRON", "TEST", 7)
            .unwrap()
            .to_bytes();
        update_checksum(&mut raw);
        assert!(validate_checksum(&raw));
    }
}
