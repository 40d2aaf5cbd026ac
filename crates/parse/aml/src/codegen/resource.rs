//! Resource descriptor builders (`Interrupt`, `IO`, `QWordMemory`, ...).
//!
//! Each builder encodes one descriptor as a ResourceData node. With a
//! `parent` (a `Name (_CRS, ResourceTemplate () {...})` or the template
//! buffer itself) the descriptor is inserted just before the End Tag and the
//! buffer size grows with it.

use alloc::vec::Vec;

use crate::AmlError;
use crate::name::NameString;
use crate::node::{AmlTree, DataType, NodeId};
use crate::opcode::BUFFER_OP;
use crate::resource::{
    self, DWORD_ADDRESS_TAG, EXTENDED_IRQ_TAG, GENERIC_REGISTER_TAG, IO_TAG, MEMORY32_FIXED_TAG,
    QWORD_ADDRESS_TAG, RESOURCE_TYPE_BUS_NUMBER, RESOURCE_TYPE_IO, RESOURCE_TYPE_MEMORY, SERIAL_BUS_TAG,
    SERIAL_BUS_UART, WORD_ADDRESS_TAG,
};

/// ACPI Generic Address Structure, as carried by `Register ()`.
///
/// The all-zero default is the null register used for optional entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenericAddress {
    /// Address space ID (0 system memory, 1 system I/O, 0x7F FFixedHW, ...).
    pub address_space: u8,
    /// Register width in bits.
    pub bit_width: u8,
    /// Register offset in bits.
    pub bit_offset: u8,
    /// Access size: 0 undefined, 1 byte, 2 word, 3 dword, 4 qword.
    pub access_size: u8,
    /// Register address.
    pub address: u64,
}

impl GenericAddress {
    /// Returns `true` for the null register.
    #[must_use]
    pub fn is_null(&self) -> bool {
        *self == Self::default()
    }
}

/// General flags shared by Word, DWord and QWord address space descriptors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressFlags {
    /// `ResourceConsumer` rather than `ResourceProducer`.
    pub consumer: bool,
    /// `SubDecode` rather than `PosDecode`.
    pub subtractive_decode: bool,
    /// `MinFixed`.
    pub min_fixed: bool,
    /// `MaxFixed`.
    pub max_fixed: bool,
}

impl AddressFlags {
    fn bits(self) -> u8 {
        u8::from(self.consumer)
            | (u8::from(self.subtractive_decode) << 1)
            | (u8::from(self.min_fixed) << 2)
            | (u8::from(self.max_fixed) << 3)
    }
}

/// Range fields of an address space descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressRange<T> {
    /// Address granularity, a mask of the form 2^n - 1.
    pub granularity: T,
    /// Range minimum.
    pub min: T,
    /// Range maximum.
    pub max: T,
    /// Translation offset.
    pub translation: T,
    /// Range length.
    pub length: T,
}

impl<T: Copy + Into<u64>> AddressRange<T> {
    fn widen(&self) -> AddressRange<u64> {
        AddressRange {
            granularity: self.granularity.into(),
            min: self.min.into(),
            max: self.max.into(),
            translation: self.translation.into(),
            length: self.length.into(),
        }
    }
}

/// Type-specific flags of an I/O range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoFlags {
    /// 1 `NonISAOnlyRanges`, 2 `ISAOnlyRanges`, 3 `EntireRange`.
    pub isa_ranges: u8,
    /// `TypeTranslation`: the range is memory on the primary side.
    pub type_translation: bool,
    /// `SparseTranslation`.
    pub sparse_translation: bool,
}

impl Default for IoFlags {
    fn default() -> Self {
        Self { isa_ranges: 3, type_translation: false, sparse_translation: false }
    }
}

impl IoFlags {
    fn bits(self) -> Result<u8, AmlError> {
        if !(1..=3).contains(&self.isa_ranges) {
            return Err(AmlError::OutOfRange);
        }
        Ok(self.isa_ranges | (u8::from(self.type_translation) << 4) | (u8::from(self.sparse_translation) << 5))
    }
}

/// Type-specific flags of a memory range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryFlags {
    /// `ReadWrite` rather than `ReadOnly`.
    pub writable: bool,
    /// 0 `NonCacheable`, 1 `Cacheable`, 2 `WriteCombining`, 3 `Prefetchable`.
    pub cacheability: u8,
    /// 0 `AddressRangeMemory`, 1 `AddressRangeReserved`, 2 `AddressRangeACPI`,
    /// 3 `AddressRangeNVS`.
    pub range_type: u8,
    /// `TypeTranslation`: the range is I/O on the primary side.
    pub type_translation: bool,
}

impl MemoryFlags {
    fn bits(self) -> Result<u8, AmlError> {
        if self.cacheability > 3 || self.range_type > 3 {
            return Err(AmlError::OutOfRange);
        }
        Ok(u8::from(self.writable)
            | (self.cacheability << 1)
            | (self.range_type << 3)
            | (u8::from(self.type_translation) << 5))
    }
}

/// Settings of a `UartSerialBusV2 ()` connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig<'a> {
    /// Baud rate in bits per second.
    pub baud_rate: u32,
    /// Data bits, 5 to 9.
    pub data_bits: u8,
    /// 0 none, 1 one, 2 one and a half, 3 two.
    pub stop_bits: u8,
    /// 0 none, 1 hardware, 2 XON/XOFF.
    pub flow_control: u8,
    /// Big-endian bit order on the line.
    pub big_endian: bool,
    /// 0 none, 1 even, 2 odd, 3 mark, 4 space.
    pub parity: u8,
    /// Bitmask of the serial lines in use (RTS, CTS, DTR, DSR, RI, DTD).
    pub lines_enabled: u8,
    /// Receive FIFO size in bytes.
    pub rx_fifo: u16,
    /// Transmit FIFO size in bytes.
    pub tx_fifo: u16,
    /// Connection initiated by the device rather than the controller.
    pub device_initiated: bool,
    /// `ResourceConsumer` rather than `ResourceProducer`.
    pub consumer: bool,
    /// Path of the UART controller.
    pub resource_source: &'a str,
}

/// Revision of generated serial bus descriptors.
const SERIAL_BUS_REVISION: u8 = 1;
/// Revision of the UART type-specific data.
const UART_TYPE_REVISION: u8 = 1;
/// Bytes of UART type-specific data following the length field.
const UART_TYPE_DATA_LEN: u16 = 10;

/// Checks the address space rules: `min <= max`, a granularity of the
/// form 2^n - 1, and a length matching a fully fixed range.
fn check_address_range(flags: AddressFlags, range: &AddressRange<u64>) -> Result<(), AmlError> {
    if range.min > range.max || (range.granularity & range.granularity.wrapping_add(1)) != 0 {
        return Err(AmlError::OutOfRange);
    }
    if flags.min_fixed && flags.max_fixed && range.length != 0 {
        let span = (range.max - range.min).checked_add(1);
        if span != Some(range.length) {
            return Err(AmlError::OutOfRange);
        }
    }
    Ok(())
}

/// Encodes a Word, DWord or QWord address space descriptor.
fn address_space(
    tag: u8,
    width: usize,
    resource_type: u8,
    flags: AddressFlags,
    type_flags: u8,
    range: &AddressRange<u64>,
) -> Result<Vec<u8>, AmlError> {
    check_address_range(flags, range)?;
    let body = 3 + 5 * width;
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(3 + body)?;
    bytes.push(tag);
    bytes.extend_from_slice(&(body as u16).to_le_bytes());
    bytes.extend_from_slice(&[resource_type, flags.bits(), type_flags]);
    for field in [range.granularity, range.min, range.max, range.translation, range.length] {
        bytes.extend_from_slice(&field.to_le_bytes()[..width]);
    }
    Ok(bytes)
}

fn register_bytes(register: &GenericAddress) -> Result<[u8; 15], AmlError> {
    if register.access_size > 4 {
        return Err(AmlError::OutOfRange);
    }
    let mut bytes = [0u8; 15];
    bytes[..7].copy_from_slice(&[
        GENERIC_REGISTER_TAG,
        0x0C,
        0x00,
        register.address_space,
        register.bit_width,
        register.bit_offset,
        register.access_size,
    ]);
    bytes[7..].copy_from_slice(&register.address.to_le_bytes());
    Ok(bytes)
}

impl AmlTree {
    /// Template buffer addressed by `node`: the buffer itself or the value of
    /// a `Name`.
    fn template_buffer(&self, node: NodeId) -> Result<NodeId, AmlError> {
        let buffer = if *self.encoding(node)? == BUFFER_OP { node } else { self.name_op_value_node(node)? };
        if *self.encoding(buffer)? == BUFFER_OP { Ok(buffer) } else { Err(AmlError::TypeMismatch) }
    }

    /// Creates a ResourceData node from `bytes`, inserting it before the End
    /// Tag of `parent`'s template.
    pub(crate) fn append_descriptor(&mut self, bytes: &[u8], parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let buffer = parent.map(|parent| self.template_buffer(parent)).transpose()?;
        let id = self.new_data(DataType::ResourceData, bytes)?;
        let Some(buffer) = buffer else {
            return Ok(id);
        };
        let end = self.variable_args(buffer)?.iter().copied().rev().find(|&node| {
            self.data(node).is_ok_and(|data| {
                data.data_type() == DataType::ResourceData && resource::is_end_tag(data.buffer())
            })
        });
        self.with_cleanup(id, |tree| match end {
            Some(end) => tree.insert_before(end, id),
            None => tree.attach_node(buffer, id),
        })?;
        Ok(id)
    }

    /// `Register (...)` holding a copy of `register`.
    pub(crate) fn new_register_template(&mut self, register: &GenericAddress) -> Result<NodeId, AmlError> {
        let bytes = register_bytes(register)?;
        let template = self.new_resource_template()?;
        self.with_cleanup(template, |tree| tree.append_descriptor(&bytes, Some(template)))?;
        Ok(template)
    }

    /// `Interrupt (ResourceConsumer|ResourceProducer, Edge|Level,
    /// ActiveLow|ActiveHigh, Shared|Exclusive) { irqs... }`.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] unless `irqs` holds 1 to 255 interrupts.
    /// - [`AmlError::TypeMismatch`] if `parent` is not a resource template.
    pub fn rd_interrupt(
        &mut self,
        consumer: bool,
        edge_triggered: bool,
        active_low: bool,
        shared: bool,
        irqs: &[u32],
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let count = u8::try_from(irqs.len()).map_err(|_| AmlError::OutOfRange)?;
        if count == 0 {
            return Err(AmlError::OutOfRange);
        }
        let body = 2 + 4 * u16::from(count);
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(3 + usize::from(body))?;
        bytes.push(EXTENDED_IRQ_TAG);
        bytes.extend_from_slice(&body.to_le_bytes());
        bytes.push(
            u8::from(consumer) | (u8::from(edge_triggered) << 1) | (u8::from(active_low) << 2) | (u8::from(shared) << 3),
        );
        bytes.push(count);
        for irq in irqs {
            bytes.extend_from_slice(&irq.to_le_bytes());
        }
        self.append_descriptor(&bytes, parent)
    }

    /// `IO (Decode16|Decode10, min, max, alignment, length)`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] if `min > max`, [`AmlError::TypeMismatch`] if
    /// `parent` is not a resource template.
    pub fn rd_io(
        &mut self,
        decode16: bool,
        min: u16,
        max: u16,
        alignment: u8,
        length: u8,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        if min > max {
            return Err(AmlError::OutOfRange);
        }
        let [min_lo, min_hi] = min.to_le_bytes();
        let [max_lo, max_hi] = max.to_le_bytes();
        let bytes = [IO_TAG, u8::from(decode16), min_lo, min_hi, max_lo, max_hi, alignment, length];
        self.append_descriptor(&bytes, parent)
    }

    /// `Memory32Fixed (ReadWrite|ReadOnly, base, length)`.
    ///
    /// # Errors
    ///
    /// [`AmlError::TypeMismatch`] if `parent` is not a resource template.
    pub fn rd_memory32_fixed(
        &mut self,
        writable: bool,
        base: u32,
        length: u32,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&[MEMORY32_FIXED_TAG, 0x09, 0x00, u8::from(writable)]);
        bytes[4..8].copy_from_slice(&base.to_le_bytes());
        bytes[8..].copy_from_slice(&length.to_le_bytes());
        self.append_descriptor(&bytes, parent)
    }

    /// `WordBusNumber (...)`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an inconsistent range,
    /// [`AmlError::TypeMismatch`] if `parent` is not a resource template.
    pub fn rd_word_bus_number(
        &mut self,
        flags: AddressFlags,
        range: AddressRange<u16>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let bytes = address_space(WORD_ADDRESS_TAG, 2, RESOURCE_TYPE_BUS_NUMBER, flags, 0, &range.widen())?;
        self.append_descriptor(&bytes, parent)
    }

    /// `WordIO (...)`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::rd_word_bus_number`].
    pub fn rd_word_io(
        &mut self,
        flags: AddressFlags,
        io: IoFlags,
        range: AddressRange<u16>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let bytes = address_space(WORD_ADDRESS_TAG, 2, RESOURCE_TYPE_IO, flags, io.bits()?, &range.widen())?;
        self.append_descriptor(&bytes, parent)
    }

    /// `DWordIO (...)`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::rd_word_bus_number`].
    pub fn rd_dword_io(
        &mut self,
        flags: AddressFlags,
        io: IoFlags,
        range: AddressRange<u32>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let bytes = address_space(DWORD_ADDRESS_TAG, 4, RESOURCE_TYPE_IO, flags, io.bits()?, &range.widen())?;
        self.append_descriptor(&bytes, parent)
    }

    /// `DWordMemory (...)`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::rd_word_bus_number`].
    pub fn rd_dword_memory(
        &mut self,
        flags: AddressFlags,
        memory: MemoryFlags,
        range: AddressRange<u32>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let bytes =
            address_space(DWORD_ADDRESS_TAG, 4, RESOURCE_TYPE_MEMORY, flags, memory.bits()?, &range.widen())?;
        self.append_descriptor(&bytes, parent)
    }

    /// `QWordIO (...)`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::rd_word_bus_number`].
    pub fn rd_qword_io(
        &mut self,
        flags: AddressFlags,
        io: IoFlags,
        range: AddressRange<u64>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let bytes = address_space(QWORD_ADDRESS_TAG, 8, RESOURCE_TYPE_IO, flags, io.bits()?, &range)?;
        self.append_descriptor(&bytes, parent)
    }

    /// `QWordMemory (...)`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::rd_word_bus_number`].
    pub fn rd_qword_memory(
        &mut self,
        flags: AddressFlags,
        memory: MemoryFlags,
        range: AddressRange<u64>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        let bytes = address_space(QWORD_ADDRESS_TAG, 8, RESOURCE_TYPE_MEMORY, flags, memory.bits()?, &range)?;
        self.append_descriptor(&bytes, parent)
    }

    /// `Register (...)`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an access size above 4,
    /// [`AmlError::TypeMismatch`] if `parent` is not a resource template.
    pub fn rd_register(&mut self, register: &GenericAddress, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        let bytes = register_bytes(register)?;
        self.append_descriptor(&bytes, parent)
    }

    /// `UartSerialBusV2 (...)`.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] for data bits outside 5 to 9 or an unknown
    ///   stop bits, flow control or parity value.
    /// - [`AmlError::InvalidNameString`] for a malformed controller path.
    /// - [`AmlError::TypeMismatch`] if `parent` is not a resource template.
    pub fn rd_uart_serial_bus(&mut self, uart: &UartConfig<'_>, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if !(5..=9).contains(&uart.data_bits) || uart.stop_bits > 3 || uart.flow_control > 2 || uart.parity > 4 {
            return Err(AmlError::OutOfRange);
        }
        NameString::from_asl(uart.resource_source)?;

        let total = 22 + uart.resource_source.len() + 1;
        let body = u16::try_from(total - 3).map_err(|_| AmlError::OutOfRange)?;
        let general = u8::from(uart.device_initiated) | (u8::from(uart.consumer) << 1);
        let type_flags = u16::from(uart.flow_control)
            | (u16::from(uart.stop_bits) << 2)
            | (u16::from(uart.data_bits - 5) << 4)
            | (u16::from(uart.big_endian) << 7);

        let mut bytes = Vec::new();
        bytes.try_reserve_exact(total)?;
        bytes.push(SERIAL_BUS_TAG);
        bytes.extend_from_slice(&body.to_le_bytes());
        bytes.extend_from_slice(&[SERIAL_BUS_REVISION, 0, SERIAL_BUS_UART, general]);
        bytes.extend_from_slice(&type_flags.to_le_bytes());
        bytes.push(UART_TYPE_REVISION);
        bytes.extend_from_slice(&UART_TYPE_DATA_LEN.to_le_bytes());
        bytes.extend_from_slice(&uart.baud_rate.to_le_bytes());
        bytes.extend_from_slice(&uart.rx_fifo.to_le_bytes());
        bytes.extend_from_slice(&uart.tx_fifo.to_le_bytes());
        bytes.extend_from_slice(&[uart.parity, uart.lines_enabled]);
        bytes.extend_from_slice(uart.resource_source.as_bytes());
        bytes.push(0);
        self.append_descriptor(&bytes, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AcpiResource, decode_descriptor};
    use crate::serialize::serialize_node;

    fn crs() -> (AmlTree, NodeId) {
        let mut tree = AmlTree::new();
        let crs = tree.name_resource_template("_CRS", None).unwrap();
        (tree, crs)
    }

    fn decoded(tree: &AmlTree, rd: NodeId) -> Option<AcpiResource> {
        decode_descriptor(tree.data(rd).unwrap().buffer())
    }

    #[test]
    fn descriptors_go_before_end_tag() {
        let (mut tree, crs) = crs();
        let io = tree.rd_io(true, 0x3F8, 0x3F8, 1, 8, Some(crs)).unwrap();
        let irq = tree.rd_interrupt(true, true, false, false, &[0x21], Some(crs)).unwrap();
        assert_eq!(
            serialize_node(&tree, crs).unwrap(),
            [
                0x08, b'_', b'C', b'R', b'S', 0x11, 0x16, 0x0A, 0x13, //
                0x47, 0x01, 0xF8, 0x03, 0xF8, 0x03, 0x01, 0x08, //
                0x89, 0x06, 0x00, 0x03, 0x01, 0x21, 0x00, 0x00, 0x00, //
                0x79, 0x00,
            ]
        );
        assert_eq!(tree.name_op_get_first_rd_node(crs), Ok(Some(io)));
        assert_eq!(tree.name_op_get_next_rd_node(io), Ok(Some(irq)));
        assert_eq!(tree.name_op_get_next_rd_node(irq), Ok(None));
        assert_eq!(
            decoded(&tree, irq),
            Some(AcpiResource::ExtendedIrq {
                gsi: 0x21,
                count: 1,
                edge_triggered: true,
                active_low: false,
                shared: false
            })
        );
    }

    #[test]
    fn address_spaces() {
        let (mut tree, crs) = crs();
        let fixed = AddressFlags { consumer: false, subtractive_decode: false, min_fixed: true, max_fixed: true };
        let bus = tree
            .rd_word_bus_number(
                fixed,
                AddressRange { granularity: 0, min: 0, max: 0xFF, translation: 0, length: 0x100 },
                Some(crs),
            )
            .unwrap();
        assert_eq!(
            decoded(&tree, bus),
            Some(AcpiResource::AddressSpace {
                resource_type: RESOURCE_TYPE_BUS_NUMBER,
                width: 2,
                min: 0,
                max: 0xFF,
                translation: 0,
                length: 0x100
            })
        );

        let memory = MemoryFlags { writable: true, ..MemoryFlags::default() };
        let mmio = tree
            .rd_qword_memory(
                fixed,
                memory,
                AddressRange { granularity: 0, min: 0x1_0000_0000, max: 0x1_FFFF_FFFF, translation: 0, length: 0x1_0000_0000 },
                Some(crs),
            )
            .unwrap();
        assert_eq!(
            decoded(&tree, mmio),
            Some(AcpiResource::Memory64 { base: 0x1_0000_0000, length: 0x1_0000_0000, writable: true })
        );
        assert_eq!(tree.data(mmio).unwrap().buffer().len(), 46);

        let low = tree
            .rd_dword_memory(
                AddressFlags::default(),
                memory,
                AddressRange { granularity: 0xFFF, min: 0xC000_0000, max: 0xDFFF_FFFF, translation: 0, length: 0x2000_0000 },
                None,
            )
            .unwrap();
        assert_eq!(
            decoded(&tree, low),
            Some(AcpiResource::Memory32 { base: 0xC000_0000, length: 0x2000_0000, writable: true })
        );

        let io = tree
            .rd_dword_io(
                fixed,
                IoFlags::default(),
                AddressRange { granularity: 0, min: 0x1000, max: 0xFFFF, translation: 0, length: 0xF000 },
                None,
            )
            .unwrap();
        assert_eq!(decoded(&tree, io), Some(AcpiResource::Io { base: 0x1000, length: 0xF000 }));
        assert_eq!(tree.data(io).unwrap().buffer()[5], 0x03);

        let word_io = tree
            .rd_word_io(fixed, IoFlags::default(), AddressRange { max: 0xCF7, length: 0xCF8, ..AddressRange::default() }, None)
            .unwrap();
        assert_eq!(tree.data(word_io).unwrap().buffer().len(), 16);
        let qword_io = tree
            .rd_qword_io(AddressFlags::default(), IoFlags::default(), AddressRange { max: 0xFFFF, ..AddressRange::default() }, None)
            .unwrap();
        assert_eq!(tree.data(qword_io).unwrap().buffer()[..4], [QWORD_ADDRESS_TAG, 0x2B, 0x00, RESOURCE_TYPE_IO]);
    }

    #[test]
    fn invalid_descriptors_allocate_nothing() {
        let (mut tree, crs) = crs();
        let before = tree.len();
        assert_eq!(tree.rd_interrupt(true, false, false, false, &[], Some(crs)), Err(AmlError::OutOfRange));
        assert_eq!(tree.rd_io(true, 0x10, 0x0F, 1, 1, Some(crs)), Err(AmlError::OutOfRange));
        let bad_granularity = AddressRange { granularity: 0x1000, max: 0xFFFF, ..AddressRange::default() };
        assert_eq!(
            tree.rd_word_io(AddressFlags::default(), IoFlags::default(), bad_granularity, None),
            Err(AmlError::OutOfRange)
        );
        let fixed = AddressFlags { min_fixed: true, max_fixed: true, ..AddressFlags::default() };
        let bad_length = AddressRange { max: 0xFF, length: 0x80, ..AddressRange::default() };
        assert_eq!(tree.rd_word_bus_number(fixed, bad_length, None), Err(AmlError::OutOfRange));
        let reversed = AddressRange { min: 2, max: 1, ..AddressRange::default() };
        assert_eq!(
            tree.rd_qword_memory(AddressFlags::default(), MemoryFlags::default(), reversed, None),
            Err(AmlError::OutOfRange)
        );
        let bad_memory = MemoryFlags { cacheability: 4, ..MemoryFlags::default() };
        assert_eq!(
            tree.rd_dword_memory(AddressFlags::default(), bad_memory, AddressRange::default(), None),
            Err(AmlError::OutOfRange)
        );
        let bad_io = IoFlags { isa_ranges: 0, ..IoFlags::default() };
        assert_eq!(tree.rd_dword_io(AddressFlags::default(), bad_io, AddressRange::default(), None), Err(AmlError::OutOfRange));
        let register = GenericAddress { access_size: 5, ..GenericAddress::default() };
        assert_eq!(tree.rd_register(&register, Some(crs)), Err(AmlError::OutOfRange));
        assert_eq!(tree.len(), before);

        let uid = tree.name_integer("_UID", 0, None).unwrap();
        let before = tree.len();
        assert_eq!(tree.rd_memory32_fixed(true, 0, 0x1000, Some(uid)), Err(AmlError::TypeMismatch));
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn register_and_fixed_memory() {
        let (mut tree, crs) = crs();
        let register = GenericAddress { address_space: 1, bit_width: 8, bit_offset: 0, access_size: 1, address: 0xB2 };
        let rd = tree.rd_register(&register, Some(crs)).unwrap();
        assert_eq!(
            decoded(&tree, rd),
            Some(AcpiResource::GenericRegister { address_space: 1, bit_width: 8, bit_offset: 0, access_size: 1, address: 0xB2 })
        );
        let mem = tree.rd_memory32_fixed(false, 0xFED0_0000, 0x400, Some(crs)).unwrap();
        assert_eq!(
            decoded(&tree, mem),
            Some(AcpiResource::FixedMemory32 { base: 0xFED0_0000, length: 0x400, writable: false })
        );
        assert!(GenericAddress::default().is_null());
        assert!(!register.is_null());
    }

    #[test]
    fn uart_serial_bus() {
        let (mut tree, crs) = crs();
        let uart = UartConfig {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            flow_control: 0,
            big_endian: false,
            parity: 0,
            lines_enabled: 0,
            rx_fifo: 64,
            tx_fifo: 64,
            device_initiated: false,
            consumer: true,
            resource_source: "\\_SB.URT0",
        };
        let rd = tree.rd_uart_serial_bus(&uart, Some(crs)).unwrap();
        let bytes = tree.data(rd).unwrap().buffer();
        assert_eq!(bytes.len(), 22 + 10);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 29);
        assert_eq!(
            decoded(&tree, rd),
            Some(AcpiResource::Uart { baud_rate: 115_200, rx_fifo: 64, tx_fifo: 64, type_flags: 0x34 })
        );
        assert_eq!(
            tree.rd_uart_serial_bus(&UartConfig { data_bits: 4, ..uart }, None),
            Err(AmlError::OutOfRange)
        );
        assert_eq!(
            tree.rd_uart_serial_bus(&UartConfig { resource_source: "urt0", ..uart }, None),
            Err(AmlError::InvalidNameString)
        );
    }
}
