//! ACPI resource descriptors.
//!
//! Resource templates (`_CRS`, `_PRS`, ...) are Buffer byte lists made of
//! small (1-byte tag) and large (3-byte tag) descriptors as defined in ACPI
//! 6.5 §6.4, terminated by an End Tag. This module frames a byte list into
//! descriptors for the parser and decodes descriptors into [`AcpiResource`]
//! values for callers and for the tree printer.

use alloc::vec::Vec;

use crate::AmlError;

// ─── Tags ───────────────────────────────────────────────────────────────────

/// Small IRQ descriptor without the information byte.
pub const IRQ_NO_FLAGS_TAG: u8 = 0x22;
/// Small IRQ descriptor with the information byte.
pub const IRQ_TAG: u8 = 0x23;
/// Small DMA descriptor.
pub const DMA_TAG: u8 = 0x2A;
/// Small I/O port descriptor.
pub const IO_TAG: u8 = 0x47;
/// Small fixed I/O port descriptor.
pub const FIXED_IO_TAG: u8 = 0x4B;
/// End Tag, followed by a checksum byte.
pub const END_TAG: u8 = 0x79;
/// Large 32-bit memory range descriptor.
pub const MEMORY32_TAG: u8 = 0x85;
/// Large 32-bit fixed memory range descriptor.
pub const MEMORY32_FIXED_TAG: u8 = 0x86;
/// Large DWord address space descriptor.
pub const DWORD_ADDRESS_TAG: u8 = 0x87;
/// Large Word address space descriptor.
pub const WORD_ADDRESS_TAG: u8 = 0x88;
/// Large extended interrupt descriptor.
pub const EXTENDED_IRQ_TAG: u8 = 0x89;
/// Large QWord address space descriptor.
pub const QWORD_ADDRESS_TAG: u8 = 0x8A;
/// Large generic register descriptor.
pub const GENERIC_REGISTER_TAG: u8 = 0x82;
/// Large serial bus connection descriptor.
pub const SERIAL_BUS_TAG: u8 = 0x8E;

/// Address space resource type: memory range.
pub const RESOURCE_TYPE_MEMORY: u8 = 0;
/// Address space resource type: I/O range.
pub const RESOURCE_TYPE_IO: u8 = 1;
/// Address space resource type: bus number range.
pub const RESOURCE_TYPE_BUS_NUMBER: u8 = 2;

/// Serial bus type of a UART connection.
pub const SERIAL_BUS_UART: u8 = 3;

// ─── Framing ────────────────────────────────────────────────────────────────

/// Total size, tag included, of the descriptor at the start of `bytes`.
///
/// Returns `None` if the tag or length field is truncated or the body runs
/// past the end of `bytes`.
#[must_use]
pub fn descriptor_len(bytes: &[u8]) -> Option<usize> {
    let tag = *bytes.first()?;
    let len = if tag & 0x80 == 0 {
        1 + usize::from(tag & 0x07)
    } else {
        let body = u16::from_le_bytes([*bytes.get(1)?, *bytes.get(2)?]);
        3 + usize::from(body)
    };
    (len <= bytes.len()).then_some(len)
}

/// Returns `true` for a complete End Tag descriptor.
#[must_use]
pub fn is_end_tag(descriptor: &[u8]) -> bool {
    descriptor.len() == 2 && descriptor[0] == END_TAG
}

/// Splits a byte list into resource descriptors.
///
/// Succeeds only if `bytes` decomposes exactly into descriptors and the last,
/// and only the last, is an End Tag. Returns `Ok(None)` otherwise.
///
/// # Errors
///
/// Returns [`AmlError::OutOfResources`] if allocation fails.
pub fn split_descriptors(bytes: &[u8]) -> Result<Option<Vec<&[u8]>>, AmlError> {
    let mut descriptors = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let Some(len) = descriptor_len(rest) else {
            return Ok(None);
        };
        let (descriptor, tail) = rest.split_at(len);
        if descriptor[0] == END_TAG && (!is_end_tag(descriptor) || !tail.is_empty()) {
            return Ok(None);
        }
        descriptors.try_reserve(1)?;
        descriptors.push(descriptor);
        rest = tail;
    }
    match descriptors.last() {
        Some(last) if is_end_tag(last) => Ok(Some(descriptors)),
        _ => Ok(None),
    }
}

// ─── Typed decoding ─────────────────────────────────────────────────────────

/// A decoded ACPI resource descriptor from a `_CRS` buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiResource {
    /// I/O port range (small resource tag 0x47), or a DWord I/O range.
    Io {
        /// Base I/O port address.
        base: u16,
        /// Number of ports.
        length: u16,
    },
    /// Fixed I/O port range (small resource tag 0x4B).
    FixedIo {
        /// Base I/O port address.
        base: u16,
        /// Number of ports.
        length: u8,
    },
    /// Interrupt line from small IRQ descriptor (tags 0x22/0x23).
    Irq {
        /// IRQ number (0-15).
        irq: u8,
        /// Whether the interrupt is edge-triggered (vs level-triggered).
        edge_triggered: bool,
        /// Whether the interrupt is active-low (vs active-high).
        active_low: bool,
    },
    /// 32-bit memory range (large resource tag 0x05), or a DWord memory range.
    Memory32 {
        /// Base physical address.
        base: u32,
        /// Length in bytes.
        length: u32,
        /// Whether the region is writable.
        writable: bool,
    },
    /// 32-bit fixed memory range (large resource tag 0x06).
    FixedMemory32 {
        /// Base physical address.
        base: u32,
        /// Length in bytes.
        length: u32,
        /// Whether the region is writable.
        writable: bool,
    },
    /// 64-bit memory region from QWord address space (large resource tag 0x0A).
    Memory64 {
        /// Base physical address.
        base: u64,
        /// Length in bytes.
        length: u64,
        /// Whether the region is writable.
        writable: bool,
    },
    /// Any other Word/DWord/QWord address space range (bus numbers, Word I/O,
    /// QWord I/O, vendor types).
    AddressSpace {
        /// Resource type byte (0 memory, 1 I/O, 2 bus number, 192+ vendor).
        resource_type: u8,
        /// Width in bytes of the address fields (2, 4 or 8).
        width: u8,
        /// Range minimum.
        min: u64,
        /// Range maximum.
        max: u64,
        /// Translation offset.
        translation: u64,
        /// Range length.
        length: u64,
    },
    /// Extended IRQ descriptor (large resource tag 0x09). Only the first
    /// interrupt number is reported.
    ExtendedIrq {
        /// Global System Interrupt number.
        gsi: u32,
        /// Number of interrupts in the descriptor.
        count: u8,
        /// Whether the interrupt is edge-triggered.
        edge_triggered: bool,
        /// Whether the interrupt is active-low.
        active_low: bool,
        /// Whether the interrupt is shared.
        shared: bool,
    },
    /// DMA channel (small resource tag 0x2A).
    Dma {
        /// DMA channel number (0-7).
        channel: u8,
        /// Whether the channel supports bus mastering.
        bus_master: bool,
    },
    /// Generic register (large resource tag 0x02).
    GenericRegister {
        /// Address space ID.
        address_space: u8,
        /// Register width in bits.
        bit_width: u8,
        /// Register offset in bits.
        bit_offset: u8,
        /// Access size (0 undefined, 1 byte ... 4 qword).
        access_size: u8,
        /// Register address.
        address: u64,
    },
    /// UART serial bus connection (large resource tag 0x0E, bus type 3).
    Uart {
        /// Baud rate in bits per second.
        baud_rate: u32,
        /// Receive FIFO size in bytes.
        rx_fifo: u16,
        /// Transmit FIFO size in bytes.
        tx_fifo: u16,
        /// Data bits, stop bits and flow control as encoded.
        type_flags: u16,
    },
}

/// Iterator over resource descriptors in a resource template buffer.
///
/// Unknown or short descriptors are skipped. Iteration ends at the End Tag,
/// at the end of the data, or at a descriptor whose length runs past it.
#[derive(Clone)]
pub struct ResourceIter<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Little-endian field reader over one descriptor body.
struct Body<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Body<'_> {
    fn u8(&mut self) -> Option<u8> {
        let v = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn u16(&mut self) -> Option<u16> {
        let b = self.data.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        let b = self.data.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Option<u64> {
        let b = self.data.get(self.pos..self.pos + 8)?;
        self.pos += 8;
        Some(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Reads an address field of `width` bytes.
    fn address(&mut self, width: u8) -> Option<u64> {
        match width {
            2 => self.u16().map(u64::from),
            4 => self.u32().map(u64::from),
            _ => self.u64(),
        }
    }
}

impl<'a> ResourceIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

/// Decodes one complete descriptor, tag included.
///
/// Returns `None` for the End Tag and for descriptors this module does not
/// decode.
#[must_use]
pub fn decode_descriptor(descriptor: &[u8]) -> Option<AcpiResource> {
    let tag = *descriptor.first()?;
    if tag & 0x80 == 0 {
        decode_small(tag, &descriptor[1..])
    } else {
        decode_large(tag & 0x7F, descriptor.get(3..)?)
    }
}

fn decode_small(tag: u8, body: &[u8]) -> Option<AcpiResource> {
    let mut r = Body { data: body, pos: 0 };
    match (tag >> 3) & 0x0F {
        // IRQ: 16-bit mask, optional information byte
        0x04 => {
            let mask = r.u16()?;
            let (edge_triggered, active_low) = match r.u8() {
                Some(flags) => (flags & 0x01 != 0, flags & 0x08 != 0),
                // No flags byte: edge-triggered, active-high (ISA)
                None => (true, false),
            };
            let irq = mask.trailing_zeros();
            (irq < 16).then_some(AcpiResource::Irq { irq: irq as u8, edge_triggered, active_low })
        }
        // DMA: channel mask, flags
        0x05 => {
            let channel_mask = r.u8()?;
            let flags = r.u8()?;
            let channel = channel_mask.trailing_zeros();
            (channel < 8).then_some(AcpiResource::Dma {
                channel: channel as u8,
                bus_master: flags & 0x04 != 0,
            })
        }
        // I/O: decode, min, max, alignment, length
        0x08 => {
            let _decode = r.u8()?;
            let base = r.u16()?;
            let _max = r.u16()?;
            let _alignment = r.u8()?;
            let length = r.u8()?;
            Some(AcpiResource::Io { base, length: u16::from(length) })
        }
        // Fixed I/O: base, length
        0x09 => {
            let base = r.u16()?;
            let length = r.u8()?;
            Some(AcpiResource::FixedIo { base, length })
        }
        _ => None,
    }
}

fn decode_large(tag_type: u8, body: &[u8]) -> Option<AcpiResource> {
    let mut r = Body { data: body, pos: 0 };
    match tag_type {
        0x02 => Some(AcpiResource::GenericRegister {
            address_space: r.u8()?,
            bit_width: r.u8()?,
            bit_offset: r.u8()?,
            access_size: r.u8()?,
            address: r.u64()?,
        }),
        0x05 => {
            let flags = r.u8()?;
            let base = r.u32()?;
            let _max = r.u32()?;
            let _alignment = r.u32()?;
            let length = r.u32()?;
            Some(AcpiResource::Memory32 { base, length, writable: flags & 0x01 != 0 })
        }
        0x06 => {
            let flags = r.u8()?;
            let base = r.u32()?;
            let length = r.u32()?;
            Some(AcpiResource::FixedMemory32 { base, length, writable: flags & 0x01 != 0 })
        }
        0x07 | 0x08 | 0x0A => {
            let width = match tag_type {
                0x08 => 2,
                0x07 => 4,
                _ => 8,
            };
            let resource_type = r.u8()?;
            let _general_flags = r.u8()?;
            let type_flags = r.u8()?;
            let _granularity = r.address(width)?;
            let min = r.address(width)?;
            let max = r.address(width)?;
            let translation = r.address(width)?;
            let length = r.address(width)?;
            let writable = type_flags & 0x01 != 0;
            Some(match (resource_type, width) {
                (RESOURCE_TYPE_MEMORY, 4) => AcpiResource::Memory32 {
                    base: min as u32,
                    length: length as u32,
                    writable,
                },
                (RESOURCE_TYPE_IO, 4) => AcpiResource::Io { base: min as u16, length: length as u16 },
                (RESOURCE_TYPE_MEMORY, 8) => AcpiResource::Memory64 { base: min, length, writable },
                _ => AcpiResource::AddressSpace { resource_type, width, min, max, translation, length },
            })
        }
        0x09 => {
            let flags = r.u8()?;
            let count = r.u8()?;
            if count == 0 {
                return None;
            }
            Some(AcpiResource::ExtendedIrq {
                gsi: r.u32()?,
                count,
                edge_triggered: flags & 0x02 != 0,
                active_low: flags & 0x04 != 0,
                shared: flags & 0x08 != 0,
            })
        }
        0x0E => {
            let _revision = r.u8()?;
            let _source_index = r.u8()?;
            if r.u8()? != SERIAL_BUS_UART {
                return None;
            }
            let _general_flags = r.u8()?;
            let type_flags = r.u16()?;
            let _type_revision = r.u8()?;
            let _type_data_len = r.u16()?;
            let baud_rate = r.u32()?;
            let rx_fifo = r.u16()?;
            let tx_fifo = r.u16()?;
            Some(AcpiResource::Uart { baud_rate, rx_fifo, tx_fifo, type_flags })
        }
        _ => None,
    }
}

impl Iterator for ResourceIter<'_> {
    type Item = AcpiResource;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.data.get(self.pos..)?;
            if rest.first() == Some(&END_TAG) {
                return None;
            }
            let len = descriptor_len(rest)?;
            self.pos += len;
            if let Some(resource) = decode_descriptor(&rest[..len]) {
                return Some(resource);
            }
            // If the descriptor was unrecognised or empty, loop to next.
        }
    }
}

/// Parse a resource template buffer into an iterator of [`AcpiResource`] items.
///
/// `data` should point to the raw byte contents of the resource template buffer
/// (i.e., the initializer data from a `Buffer` AML object). The iterator yields
/// resources until the End Tag descriptor (0x79) is encountered or the data is
/// exhausted.
#[must_use]
pub fn parse_resource_template(data: &[u8]) -> ResourceIter<'_> {
    ResourceIter::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_io_descriptor() {
        // I/O descriptor: tag 0x47, decode=1, min=0x03F8, max=0x03F8, align=1, len=8
        let data = [0x47, 0x01, 0xF8, 0x03, 0xF8, 0x03, 0x01, 0x08, 0x79, 0x00];
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(resources, [AcpiResource::Io { base: 0x03F8, length: 8 }]);
    }

    #[test]
    fn parse_irq_descriptors() {
        // IRQ descriptor without flags: tag 0x22, mask=0x0010 (IRQ 4)
        let data = [0x22, 0x10, 0x00, 0x79, 0x00];
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(
            resources,
            [AcpiResource::Irq { irq: 4, edge_triggered: true, active_low: false }]
        );

        // With flags: edge=1, active-low=1
        let data = [0x23, 0x10, 0x00, 0x09, 0x79, 0x00];
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(
            resources,
            [AcpiResource::Irq { irq: 4, edge_triggered: true, active_low: true }]
        );
    }

    #[test]
    fn parse_extended_irq() {
        let data = [
            0x89, 0x06, 0x00, // tag + length
            0x07, // flags: consumer, edge-triggered, active-low
            0x01, // interrupt count
            0x09, 0x00, 0x00, 0x00, // GSI 9
            0x79, 0x00, // end tag
        ];
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(
            resources,
            [AcpiResource::ExtendedIrq {
                gsi: 9,
                count: 1,
                edge_triggered: true,
                active_low: true,
                shared: false,
            }]
        );
    }

    #[test]
    fn parse_fixed_memory32() {
        let data = [
            0x86, 0x09, 0x00, // tag + length
            0x01, // flags: writable
            0x00, 0x00, 0xD0, 0xFE, // base 0xFED00000
            0x00, 0x10, 0x00, 0x00, // length 0x1000
            0x79, 0x00, // end tag
        ];
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(
            resources,
            [AcpiResource::FixedMemory32 { base: 0xFED0_0000, length: 0x1000, writable: true }]
        );
    }

    #[test]
    fn parse_word_bus_number() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x88, 0x0D, 0x00, RESOURCE_TYPE_BUS_NUMBER, 0x0C, 0x00]);
        for field in [0u16, 0, 0xFF, 0, 0x100] {
            data.extend_from_slice(&field.to_le_bytes());
        }
        data.extend_from_slice(&[0x79, 0x00]);
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(
            resources,
            [AcpiResource::AddressSpace {
                resource_type: RESOURCE_TYPE_BUS_NUMBER,
                width: 2,
                min: 0,
                max: 0xFF,
                translation: 0,
                length: 0x100,
            }]
        );
    }

    #[test]
    fn parse_dma_descriptor() {
        // DMA descriptor: channel_mask=0x04 (ch 2), flags=0x04
        let data = [0x2A, 0x04, 0x04, 0x79, 0x00];
        let resources: Vec<_> = parse_resource_template(&data).collect();
        assert_eq!(resources, [AcpiResource::Dma { channel: 2, bus_master: true }]);
    }

    #[test]
    fn empty_template() {
        let data = [0x79, 0x00];
        assert_eq!(parse_resource_template(&data).count(), 0);
    }

    #[test]
    fn framing() {
        let template = [0x4B, 0x60, 0x00, 0x01, 0x22, 0x10, 0x00, 0x79, 0x00];
        let parts = split_descriptors(&template).unwrap().unwrap();
        assert_eq!(parts, [&template[..4], &template[4..7], &template[7..]]);

        // Missing End Tag, End Tag in the middle, truncated descriptor.
        assert_eq!(split_descriptors(&template[..7]).unwrap(), None);
        assert_eq!(split_descriptors(&[0x79, 0x00, 0x22, 0x10, 0x00]).unwrap(), None);
        assert_eq!(split_descriptors(&[0x86, 0x09, 0x00, 0x01]).unwrap(), None);
        assert_eq!(split_descriptors(&[]).unwrap(), None);
        assert_eq!(descriptor_len(&[0x86, 0x09]), None);
    }
}
