//! AML grammar table.
//!
//! Every opcode the parser accepts and the serializer emits is described by
//! one [`AmlByteEncoding`]: its fixed-argument formats, whether it carries a
//! PkgLength and a variable-argument list, and whether it defines a name in
//! the namespace. The parser and serializer are both driven by this table.
//!
//! Field lists (`Field`, `IndexField`, `BankField`) use a separate, smaller
//! table because their element encodings overlap with term opcodes.

use bitflags::bitflags;

/// Prefix byte of every extended (two-byte) opcode.
pub const EXT_OP_PREFIX: u8 = 0x5B;

/// Maximum number of fixed arguments any opcode takes.
pub const MAX_FIXED_ARGS: usize = 6;

bitflags! {
    /// Grammar attributes of an opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpAttributes: u16 {
        /// A PkgLength follows the opcode.
        const HAS_PKG_LENGTH = 1 << 0;
        /// The variable-argument list holds term objects.
        const HAS_CHILD_OBJ = 1 << 1;
        /// The variable-argument list holds raw or resource data.
        const HAS_BYTE_LIST = 1 << 2;
        /// The variable-argument list holds field elements.
        const HAS_FIELD_LIST = 1 << 3;
        /// The opcode defines a name in the ACPI namespace.
        const IN_NAMESPACE = 1 << 4;
        /// The node is encoded as a bare NameString.
        const IS_NAME_CHAR = 1 << 5;
        /// The opcode has no byte encoding of its own.
        const IS_PSEUDO_OPCODE = 1 << 6;
        /// The opcode is a field-list element.
        const IS_FIELD_ELEMENT = 1 << 7;
    }
}

/// Encoding of one fixed argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFormat {
    /// Little-endian 8-bit integer.
    UInt8,
    /// Little-endian 16-bit integer.
    UInt16,
    /// Little-endian 32-bit integer.
    UInt32,
    /// Little-endian 64-bit integer.
    UInt64,
    /// An AML NameString.
    Name,
    /// A NUL-terminated ASCII string.
    String,
    /// A nested term object.
    Object,
    /// A nested term in SuperName or DataRefObject position. A NameString
    /// there refers to the object and is never a method call.
    Reference,
    /// A bare PkgLength value, as used by field elements.
    FieldPkgLen,
}

impl ParseFormat {
    /// Returns the byte width of integer formats.
    #[must_use]
    pub const fn integer_width(self) -> Option<usize> {
        match self {
            Self::UInt8 => Some(1),
            Self::UInt16 => Some(2),
            Self::UInt32 => Some(4),
            Self::UInt64 => Some(8),
            _ => None,
        }
    }
}

/// Grammar description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmlByteEncoding {
    /// ASL spelling of the opcode, for diagnostics.
    pub name: &'static str,
    /// First opcode byte ([`EXT_OP_PREFIX`] for extended opcodes).
    pub op: u8,
    /// Second opcode byte of extended opcodes, 0 otherwise.
    pub sub_op: u8,
    /// Formats of the fixed arguments, in encoding order.
    pub formats: &'static [ParseFormat],
    /// Grammar attributes.
    pub attributes: OpAttributes,
    /// Index of the fixed argument holding the defined name.
    pub name_index: Option<u8>,
}

impl AmlByteEncoding {
    /// Number of fixed arguments.
    #[must_use]
    pub const fn fixed_arg_count(&self) -> usize {
        self.formats.len()
    }

    /// Returns `true` if the opcode carries a variable-argument list.
    #[must_use]
    pub const fn has_variable_args(&self) -> bool {
        self.attributes.intersects(
            OpAttributes::HAS_CHILD_OBJ
                .union(OpAttributes::HAS_BYTE_LIST)
                .union(OpAttributes::HAS_FIELD_LIST),
        )
    }

    /// Returns `true` if the opcode opens a namespace scope (`Scope`,
    /// `Device`, `Method`, ...).
    #[must_use]
    pub const fn introduces_scope(&self) -> bool {
        self.attributes
            .contains(OpAttributes::IN_NAMESPACE.union(OpAttributes::HAS_CHILD_OBJ))
    }

    /// Index of the fixed argument that holds the defined NameString.
    #[must_use]
    pub const fn naming_argument_index(&self) -> Option<usize> {
        if !self.attributes.contains(OpAttributes::IN_NAMESPACE) {
            return None;
        }
        match self.name_index {
            Some(index) => Some(index as usize),
            None => None,
        }
    }

    /// Returns `true` for pseudo opcodes, which emit no opcode bytes.
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        self.attributes.contains(OpAttributes::IS_PSEUDO_OPCODE)
    }

    /// Returns `true` for field-list elements.
    #[must_use]
    pub const fn is_field_element(&self) -> bool {
        self.attributes.contains(OpAttributes::IS_FIELD_ELEMENT)
    }

    /// Number of opcode bytes written before the PkgLength and arguments.
    #[must_use]
    pub const fn opcode_size(&self) -> usize {
        if self.is_pseudo() {
            0
        } else if self.op == EXT_OP_PREFIX && !self.is_field_element() {
            2
        } else {
            1
        }
    }

    /// Returns `true` for `Zero`, `One`, `Ones` and the integer prefixes.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        !self.is_pseudo()
            && !self.is_field_element()
            && matches!(self.op, 0x00 | 0x01 | 0xFF | 0x0A | 0x0B | 0x0C | 0x0E)
    }
}

const fn op(
    name: &'static str,
    op: u8,
    formats: &'static [ParseFormat],
    attributes: OpAttributes,
    name_index: Option<u8>,
) -> AmlByteEncoding {
    AmlByteEncoding { name, op, sub_op: 0, formats, attributes, name_index }
}

const fn ext(
    name: &'static str,
    sub_op: u8,
    formats: &'static [ParseFormat],
    attributes: OpAttributes,
    name_index: Option<u8>,
) -> AmlByteEncoding {
    AmlByteEncoding { name, op: EXT_OP_PREFIX, sub_op, formats, attributes, name_index }
}

// ─── Argument shapes ────────────────────────────────────────────────────────

const NONE: &[ParseFormat] = &[];
const O1: &[ParseFormat] = &[ParseFormat::Object];
const O2: &[ParseFormat] = &[ParseFormat::Object, ParseFormat::Object];
const O6: &[ParseFormat] = &[
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Object,
];
const N1: &[ParseFormat] = &[ParseFormat::Name];
const N2: &[ParseFormat] = &[ParseFormat::Name, ParseFormat::Name];
const NB: &[ParseFormat] = &[ParseFormat::Name, ParseFormat::UInt8];
const NR: &[ParseFormat] = &[ParseFormat::Name, ParseFormat::Reference];
const R1: &[ParseFormat] = &[ParseFormat::Reference];
const RO: &[ParseFormat] = &[ParseFormat::Reference, ParseFormat::Object];
const RR: &[ParseFormat] = &[ParseFormat::Reference, ParseFormat::Reference];
const OR: &[ParseFormat] = &[ParseFormat::Object, ParseFormat::Reference];
const OOR: &[ParseFormat] = &[ParseFormat::Object, ParseFormat::Object, ParseFormat::Reference];
const OORR: &[ParseFormat] = &[
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Reference,
    ParseFormat::Reference,
];
const OOOR: &[ParseFormat] = &[
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Object,
    ParseFormat::Reference,
];
const OON: &[ParseFormat] = &[ParseFormat::Object, ParseFormat::Object, ParseFormat::Name];

const NO_ATTR: OpAttributes = OpAttributes::empty();
const IN_NS: OpAttributes = OpAttributes::IN_NAMESPACE;
const PKG_CHILD: OpAttributes = OpAttributes::HAS_PKG_LENGTH.union(OpAttributes::HAS_CHILD_OBJ);
const PKG_SCOPE: OpAttributes = PKG_CHILD.union(OpAttributes::IN_NAMESPACE);
const PKG_FIELDS: OpAttributes = OpAttributes::HAS_PKG_LENGTH.union(OpAttributes::HAS_FIELD_LIST);

// ─── Encodings referenced by the parser and code generator ─────────────────

/// `Zero`.
pub const ZERO_OP: AmlByteEncoding = op("Zero", 0x00, NONE, NO_ATTR, None);
/// `One`.
pub const ONE_OP: AmlByteEncoding = op("One", 0x01, NONE, NO_ATTR, None);
/// `Ones`.
pub const ONES_OP: AmlByteEncoding = op("Ones", 0xFF, NONE, NO_ATTR, None);
/// `ByteConst`.
pub const BYTE_OP: AmlByteEncoding = op("ByteConst", 0x0A, &[ParseFormat::UInt8], NO_ATTR, None);
/// `WordConst`.
pub const WORD_OP: AmlByteEncoding = op("WordConst", 0x0B, &[ParseFormat::UInt16], NO_ATTR, None);
/// `DWordConst`.
pub const DWORD_OP: AmlByteEncoding =
    op("DWordConst", 0x0C, &[ParseFormat::UInt32], NO_ATTR, None);
/// `String` literal.
pub const STRING_OP: AmlByteEncoding = op("String", 0x0D, &[ParseFormat::String], NO_ATTR, None);
/// `QWordConst`.
pub const QWORD_OP: AmlByteEncoding =
    op("QWordConst", 0x0E, &[ParseFormat::UInt64], NO_ATTR, None);
/// `Alias (Source, Alias)`.
pub const ALIAS_OP: AmlByteEncoding = op("Alias", 0x06, N2, IN_NS, Some(1));
/// `Name (Name, Object)`.
pub const NAME_OP: AmlByteEncoding = op("Name", 0x08, NR, IN_NS, Some(0));
/// `Scope (Name) { ... }`.
pub const SCOPE_OP: AmlByteEncoding = op("Scope", 0x10, N1, PKG_SCOPE, Some(0));
/// `Buffer (Size) { ... }`.
pub const BUFFER_OP: AmlByteEncoding = op(
    "Buffer",
    0x11,
    O1,
    OpAttributes::HAS_PKG_LENGTH.union(OpAttributes::HAS_BYTE_LIST),
    None,
);
/// `Package (NumElements) { ... }`.
pub const PACKAGE_OP: AmlByteEncoding = op("Package", 0x12, &[ParseFormat::UInt8], PKG_CHILD, None);
/// `VarPackage (NumElements) { ... }`.
pub const VAR_PACKAGE_OP: AmlByteEncoding = op("VarPackage", 0x13, O1, PKG_CHILD, None);
/// `Method (Name, Flags) { ... }`.
pub const METHOD_OP: AmlByteEncoding = op("Method", 0x14, NB, PKG_SCOPE, Some(0));
/// `External (Name, Type, ArgCount)`.
pub const EXTERNAL_OP: AmlByteEncoding = op(
    "External",
    0x15,
    &[ParseFormat::Name, ParseFormat::UInt8, ParseFormat::UInt8],
    IN_NS,
    Some(0),
);
/// `Return (Value)`.
pub const RETURN_OP: AmlByteEncoding = op("Return", 0xA4, O1, NO_ATTR, None);
/// `OperationRegion (Name, Space, Offset, Length)`.
pub const OP_REGION_OP: AmlByteEncoding = ext(
    "OperationRegion",
    0x80,
    &[ParseFormat::Name, ParseFormat::UInt8, ParseFormat::Object, ParseFormat::Object],
    IN_NS,
    Some(0),
);
/// `Field (Region, Flags) { ... }`.
pub const FIELD_OP: AmlByteEncoding = ext("Field", 0x81, NB, PKG_FIELDS, None);
/// `Device (Name) { ... }`.
pub const DEVICE_OP: AmlByteEncoding = ext("Device", 0x82, N1, PKG_SCOPE, Some(0));
/// `Processor (Name, Id, PblkAddress, PblkLength) { ... }`.
pub const PROCESSOR_OP: AmlByteEncoding = ext(
    "Processor",
    0x83,
    &[ParseFormat::Name, ParseFormat::UInt8, ParseFormat::UInt32, ParseFormat::UInt8],
    PKG_SCOPE,
    Some(0),
);
/// `PowerResource (Name, SystemLevel, ResourceOrder) { ... }`.
pub const POWER_RES_OP: AmlByteEncoding = ext(
    "PowerResource",
    0x84,
    &[ParseFormat::Name, ParseFormat::UInt8, ParseFormat::UInt16],
    PKG_SCOPE,
    Some(0),
);
/// `ThermalZone (Name) { ... }`.
pub const THERMAL_ZONE_OP: AmlByteEncoding = ext("ThermalZone", 0x85, N1, PKG_SCOPE, Some(0));

/// Call of a control method: the method's NameString followed by its
/// argument terms.
pub const METHOD_INVOCATION_OP: AmlByteEncoding = op(
    "MethodInvocation",
    0xD0,
    N1,
    OpAttributes::IS_PSEUDO_OPCODE.union(OpAttributes::HAS_CHILD_OBJ),
    None,
);
/// Bare NameString used as a term.
pub const NAME_REFERENCE_OP: AmlByteEncoding = op(
    "NameReference",
    0xD1,
    N1,
    OpAttributes::IS_PSEUDO_OPCODE.union(OpAttributes::IS_NAME_CHAR),
    None,
);

// ─── Field elements ─────────────────────────────────────────────────────────

const FIELD_ATTR: OpAttributes = OpAttributes::IS_FIELD_ELEMENT;

/// `Offset`/unnamed reserved bits inside a field list.
pub const RESERVED_FIELD_OP: AmlByteEncoding =
    op("ReservedField", 0x00, &[ParseFormat::FieldPkgLen], FIELD_ATTR, None);
/// `AccessAs (Type, Attribute)`.
pub const ACCESS_FIELD_OP: AmlByteEncoding = op(
    "AccessField",
    0x01,
    &[ParseFormat::UInt8, ParseFormat::UInt8],
    FIELD_ATTR,
    None,
);
/// `Connection (Resource)`.
pub const CONNECT_FIELD_OP: AmlByteEncoding = op("ConnectField", 0x02, O1, FIELD_ATTR, None);
/// `AccessAs (Type, Attribute, Length)`.
pub const EXTENDED_ACCESS_FIELD_OP: AmlByteEncoding = op(
    "ExtendedAccessField",
    0x03,
    &[ParseFormat::UInt8, ParseFormat::UInt8, ParseFormat::UInt8],
    FIELD_ATTR,
    None,
);
/// Named field unit: a 4-character name followed by its bit width.
pub const NAMED_FIELD_OP: AmlByteEncoding = op(
    "NamedField",
    0xD2,
    &[ParseFormat::Name, ParseFormat::FieldPkgLen],
    FIELD_ATTR
        .union(OpAttributes::IS_PSEUDO_OPCODE)
        .union(OpAttributes::IN_NAMESPACE),
    Some(0),
);

static FIELD_TABLE: &[AmlByteEncoding] =
    &[RESERVED_FIELD_OP, ACCESS_FIELD_OP, CONNECT_FIELD_OP, EXTENDED_ACCESS_FIELD_OP];

// ─── Term opcodes ───────────────────────────────────────────────────────────

static TERM_TABLE: &[AmlByteEncoding] = &[
    ZERO_OP,
    ONE_OP,
    ALIAS_OP,
    NAME_OP,
    BYTE_OP,
    WORD_OP,
    DWORD_OP,
    STRING_OP,
    QWORD_OP,
    SCOPE_OP,
    BUFFER_OP,
    PACKAGE_OP,
    VAR_PACKAGE_OP,
    METHOD_OP,
    EXTERNAL_OP,
    op("Local0", 0x60, NONE, NO_ATTR, None),
    op("Local1", 0x61, NONE, NO_ATTR, None),
    op("Local2", 0x62, NONE, NO_ATTR, None),
    op("Local3", 0x63, NONE, NO_ATTR, None),
    op("Local4", 0x64, NONE, NO_ATTR, None),
    op("Local5", 0x65, NONE, NO_ATTR, None),
    op("Local6", 0x66, NONE, NO_ATTR, None),
    op("Local7", 0x67, NONE, NO_ATTR, None),
    op("Arg0", 0x68, NONE, NO_ATTR, None),
    op("Arg1", 0x69, NONE, NO_ATTR, None),
    op("Arg2", 0x6A, NONE, NO_ATTR, None),
    op("Arg3", 0x6B, NONE, NO_ATTR, None),
    op("Arg4", 0x6C, NONE, NO_ATTR, None),
    op("Arg5", 0x6D, NONE, NO_ATTR, None),
    op("Arg6", 0x6E, NONE, NO_ATTR, None),
    op("Store", 0x70, OR, NO_ATTR, None),
    op("RefOf", 0x71, R1, NO_ATTR, None),
    op("Add", 0x72, OOR, NO_ATTR, None),
    op("Concatenate", 0x73, OOR, NO_ATTR, None),
    op("Subtract", 0x74, OOR, NO_ATTR, None),
    op("Increment", 0x75, R1, NO_ATTR, None),
    op("Decrement", 0x76, R1, NO_ATTR, None),
    op("Multiply", 0x77, OOR, NO_ATTR, None),
    op("Divide", 0x78, OORR, NO_ATTR, None),
    op("ShiftLeft", 0x79, OOR, NO_ATTR, None),
    op("ShiftRight", 0x7A, OOR, NO_ATTR, None),
    op("And", 0x7B, OOR, NO_ATTR, None),
    op("NAnd", 0x7C, OOR, NO_ATTR, None),
    op("Or", 0x7D, OOR, NO_ATTR, None),
    op("NOr", 0x7E, OOR, NO_ATTR, None),
    op("XOr", 0x7F, OOR, NO_ATTR, None),
    op("Not", 0x80, OR, NO_ATTR, None),
    op("FindSetLeftBit", 0x81, OR, NO_ATTR, None),
    op("FindSetRightBit", 0x82, OR, NO_ATTR, None),
    op("DerefOf", 0x83, O1, NO_ATTR, None),
    op("ConcatenateResTemplate", 0x84, OOR, NO_ATTR, None),
    op("Mod", 0x85, OOR, NO_ATTR, None),
    op("Notify", 0x86, RO, NO_ATTR, None),
    op("SizeOf", 0x87, R1, NO_ATTR, None),
    op("Index", 0x88, OOR, NO_ATTR, None),
    op(
        "Match",
        0x89,
        &[
            ParseFormat::Object,
            ParseFormat::UInt8,
            ParseFormat::Object,
            ParseFormat::UInt8,
            ParseFormat::Object,
            ParseFormat::Object,
        ],
        NO_ATTR,
        None,
    ),
    op("CreateDWordField", 0x8A, OON, IN_NS, Some(2)),
    op("CreateWordField", 0x8B, OON, IN_NS, Some(2)),
    op("CreateByteField", 0x8C, OON, IN_NS, Some(2)),
    op("CreateBitField", 0x8D, OON, IN_NS, Some(2)),
    op("ObjectType", 0x8E, R1, NO_ATTR, None),
    op("CreateQWordField", 0x8F, OON, IN_NS, Some(2)),
    op("LAnd", 0x90, O2, NO_ATTR, None),
    op("LOr", 0x91, O2, NO_ATTR, None),
    op("LNot", 0x92, O1, NO_ATTR, None),
    op("LEqual", 0x93, O2, NO_ATTR, None),
    op("LGreater", 0x94, O2, NO_ATTR, None),
    op("LLess", 0x95, O2, NO_ATTR, None),
    op("ToBuffer", 0x96, OR, NO_ATTR, None),
    op("ToDecimalString", 0x97, OR, NO_ATTR, None),
    op("ToHexString", 0x98, OR, NO_ATTR, None),
    op("ToInteger", 0x99, OR, NO_ATTR, None),
    op("ToString", 0x9C, OOR, NO_ATTR, None),
    op("CopyObject", 0x9D, OR, NO_ATTR, None),
    op("Mid", 0x9E, OOOR, NO_ATTR, None),
    op("Continue", 0x9F, NONE, NO_ATTR, None),
    op("If", 0xA0, O1, PKG_CHILD, None),
    op("Else", 0xA1, NONE, PKG_CHILD, None),
    op("While", 0xA2, O1, PKG_CHILD, None),
    op("Noop", 0xA3, NONE, NO_ATTR, None),
    RETURN_OP,
    op("Break", 0xA5, NONE, NO_ATTR, None),
    op("BreakPoint", 0xCC, NONE, NO_ATTR, None),
    ONES_OP,
    ext("Mutex", 0x01, NB, IN_NS, Some(0)),
    ext("Event", 0x02, N1, IN_NS, Some(0)),
    ext("CondRefOf", 0x12, RR, NO_ATTR, None),
    ext(
        "CreateField",
        0x13,
        &[ParseFormat::Object, ParseFormat::Object, ParseFormat::Object, ParseFormat::Name],
        IN_NS,
        Some(3),
    ),
    ext("LoadTable", 0x1F, O6, NO_ATTR, None),
    ext("Load", 0x20, NR, NO_ATTR, None),
    ext("Stall", 0x21, O1, NO_ATTR, None),
    ext("Sleep", 0x22, O1, NO_ATTR, None),
    ext("Acquire", 0x23, &[ParseFormat::Reference, ParseFormat::UInt16], NO_ATTR, None),
    ext("Signal", 0x24, R1, NO_ATTR, None),
    ext("Wait", 0x25, RO, NO_ATTR, None),
    ext("Reset", 0x26, R1, NO_ATTR, None),
    ext("Release", 0x27, R1, NO_ATTR, None),
    ext("FromBCD", 0x28, OR, NO_ATTR, None),
    ext("ToBCD", 0x29, OR, NO_ATTR, None),
    ext("Unload", 0x2A, R1, NO_ATTR, None),
    ext("Revision", 0x30, NONE, NO_ATTR, None),
    ext("Debug", 0x31, NONE, NO_ATTR, None),
    ext(
        "Fatal",
        0x32,
        &[ParseFormat::UInt8, ParseFormat::UInt32, ParseFormat::Object],
        NO_ATTR,
        None,
    ),
    ext("Timer", 0x33, NONE, NO_ATTR, None),
    OP_REGION_OP,
    FIELD_OP,
    DEVICE_OP,
    PROCESSOR_OP,
    POWER_RES_OP,
    THERMAL_ZONE_OP,
    ext(
        "IndexField",
        0x86,
        &[ParseFormat::Name, ParseFormat::Name, ParseFormat::UInt8],
        PKG_FIELDS,
        None,
    ),
    ext(
        "BankField",
        0x87,
        &[ParseFormat::Name, ParseFormat::Name, ParseFormat::Object, ParseFormat::UInt8],
        PKG_FIELDS,
        None,
    ),
    ext(
        "DataTableRegion",
        0x88,
        &[ParseFormat::Name, ParseFormat::Object, ParseFormat::Object, ParseFormat::Object],
        IN_NS,
        Some(0),
    ),
];

/// Looks up a term opcode.
///
/// `sub_op` is only consulted when `op` is [`EXT_OP_PREFIX`].
#[must_use]
pub fn lookup(op: u8, sub_op: u8) -> Option<&'static AmlByteEncoding> {
    let sub_op = if op == EXT_OP_PREFIX { sub_op } else { 0 };
    TERM_TABLE.iter().find(|enc| enc.op == op && enc.sub_op == sub_op)
}

/// Looks up a field-list element by its lead byte.
///
/// Named fields start with a name character and are not in this table; see
/// [`NAMED_FIELD_OP`].
#[must_use]
pub fn lookup_field(op: u8) -> Option<&'static AmlByteEncoding> {
    FIELD_TABLE.iter().find(|enc| enc.op == op)
}

/// Returns the integer-constant encoding for a value width in bytes.
#[must_use]
pub fn integer_encoding(width: usize) -> Option<&'static AmlByteEncoding> {
    match width {
        1 => Some(&BYTE_OP),
        2 => Some(&WORD_OP),
        4 => Some(&DWORD_OP),
        8 => Some(&QWORD_OP),
        _ => None,
    }
}

/// Iterates over every term opcode in the table.
pub fn term_opcodes() -> impl Iterator<Item = &'static AmlByteEncoding> {
    TERM_TABLE.iter()
}
