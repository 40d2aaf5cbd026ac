//! Typed views of AML data objects.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::AmlError;

/// A compressed EISA/PnP device identifier.
///
/// EISA IDs are stored as 32-bit compressed values in AML bytecode
/// (via the `EisaId()` macro in ASL). The 3-letter manufacturer code
/// is packed into the upper 16 bits and the product ID into the lower 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EisaId {
    /// The raw 32-bit EISA ID value, as carried by the AML `DWordConst`.
    pub raw: u32,
}

impl EisaId {
    /// Decodes the EISA ID into a 7-character ASCII string (e.g., `"PNP0A03"`).
    #[must_use]
    pub fn decode(&self) -> [u8; 7] {
        // After byte-swapping the AML value:
        //   Bits 30-26: first char - 'A' + 1
        //   Bits 25-21: second char - 'A' + 1
        //   Bits 20-16: third char - 'A' + 1
        //   Bits 15-0:  product ID as 4 hex digits
        let swapped = self.raw.swap_bytes();
        let c1 = (((swapped >> 26) & 0x1F) as u8) + b'@';
        let c2 = (((swapped >> 21) & 0x1F) as u8) + b'@';
        let c3 = (((swapped >> 16) & 0x1F) as u8) + b'@';
        let product = swapped as u16;

        let hex_digit = |nibble: u8| -> u8 {
            if nibble < 10 { b'0' + nibble } else { b'A' + nibble - 10 }
        };

        [
            c1,
            c2,
            c3,
            hex_digit((product >> 12) as u8 & 0xF),
            hex_digit((product >> 8) as u8 & 0xF),
            hex_digit((product >> 4) as u8 & 0xF),
            hex_digit(product as u8 & 0xF),
        ]
    }

    /// Returns `true` if the manufacturer code decodes to letters.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.raw & 0x80 == 0 && self.decode()[..3].iter().all(u8::is_ascii_uppercase)
    }
}

impl FromStr for EisaId {
    type Err = AmlError;

    /// Compresses a `"PNP0A03"`-style identifier: three upper-case letters
    /// and four upper-case hex digits.
    fn from_str(text: &str) -> Result<Self, AmlError> {
        let bytes: [u8; 7] = text.as_bytes().try_into().map_err(|_| AmlError::OutOfRange)?;
        if !bytes[..3].iter().all(u8::is_ascii_uppercase) {
            return Err(AmlError::OutOfRange);
        }
        let mut product = 0u32;
        for &b in &bytes[3..] {
            let nibble = match b {
                b'0'..=b'9' => b - b'0',
                b'A'..=b'F' => b - b'A' + 10,
                _ => return Err(AmlError::OutOfRange),
            };
            product = (product << 4) | u32::from(nibble);
        }
        let letter = |b: u8| u32::from(b - b'@');
        let compressed =
            (letter(bytes[0]) << 26) | (letter(bytes[1]) << 21) | (letter(bytes[2]) << 16) | product;
        Ok(Self { raw: compressed.swap_bytes() })
    }
}

impl fmt::Display for EisaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.decode();
        f.write_str(core::str::from_utf8(&text).unwrap_or("???????"))
    }
}

/// Value held by a `Name` object.
///
/// Only data objects that need no evaluation are resolved; anything else is
/// [`AmlValue::Unresolved`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmlValue {
    /// An integer constant (Zero, One, Ones, ByteConst, WordConst,
    /// DWordConst, QWordConst).
    Integer(u64),
    /// A compressed EISA/PnP device identifier held by `_HID` or `_CID`.
    EisaId(EisaId),
    /// A string literal, without its terminating NUL.
    String(String),
    /// The byte list of a `Buffer` with a constant size.
    Buffer(Vec<u8>),
    /// A `Package` or `VarPackage` with this many elements present.
    Package(usize),
    /// A value that needs evaluation (method call, reference, expression).
    Unresolved,
}

impl AmlValue {
    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::EisaId(id) => Some(u64::from(id.raw)),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn eisa_id_compression() {
        let id: EisaId = "PNP0A03".parse().unwrap();
        assert_eq!(id.raw, 0x030A_D041);
        assert_eq!(&id.decode(), b"PNP0A03");
        assert_eq!(id.to_string(), "PNP0A03");
        assert!(id.is_well_formed());

        assert_eq!("ACPI000".parse::<EisaId>(), Err(AmlError::OutOfRange));
        assert_eq!("PNP0A0".parse::<EisaId>(), Err(AmlError::OutOfRange));
        assert_eq!("pnp0A03".parse::<EisaId>(), Err(AmlError::OutOfRange));
        assert_eq!("PNP0a03".parse::<EisaId>(), Err(AmlError::OutOfRange));
    }

    #[test]
    fn value_accessors() {
        assert_eq!(AmlValue::Integer(7).as_integer(), Some(7));
        assert_eq!(AmlValue::String("ARMH0011".to_string()).as_str(), Some("ARMH0011"));
        assert_eq!(AmlValue::Unresolved.as_integer(), None);
    }
}
