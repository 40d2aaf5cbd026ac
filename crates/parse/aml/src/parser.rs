//! AML definition block parser.
//!
//! [`parse_definition_block`] validates the table header and builds an
//! [`AmlTree`] from the AML byte stream. The parser is a generic interpreter
//! of the opcode table: for every opcode it reads the PkgLength if the entry
//! has one, parses each fixed argument by its [`ParseFormat`], then fills the
//! variable-argument list (terms, byte list or field list) until the
//! PkgLength budget is exhausted.
//!
//! Encoded NameStrings, strings, integers and field lengths are stored
//! verbatim in data nodes, and the PkgLength width of every object is
//! remembered, so serializing an unmodified tree reproduces the input.
//!
//! Any error aborts the parse and drops every node built so far.

use alloc::vec::Vec;
use core::mem;

use log::{debug, trace, warn};

use crate::AmlError;
use crate::name::{self, AmlPath, NameSeg, NameString};
use crate::node::{AmlTree, DataType, NodeId};
use crate::opcode::{
    self, AmlByteEncoding, EXT_OP_PREFIX, EXTERNAL_OP, METHOD_INVOCATION_OP, METHOD_OP,
    NAME_REFERENCE_OP, NAMED_FIELD_OP, OpAttributes, PACKAGE_OP, ParseFormat, VAR_PACKAGE_OP,
};
use crate::resource;
use crate::sdt::{self, SdtHeader};
use crate::stream::AmlStream;

/// `ObjectType` value of a control method in `External`.
const EXTERNAL_METHOD_TYPE: u8 = 8;

/// Parser options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Reject tables whose bytes do not sum to zero.
    pub verify_checksum: bool,
    /// Maximum nesting depth of terms.
    pub max_depth: usize,
    /// Build method-invocation nodes for calls to known methods. When off,
    /// every NameString term becomes a name reference and call arguments
    /// become sibling terms.
    pub detect_method_invocations: bool,
    /// Split Buffer byte lists that form a resource template into one data
    /// node per descriptor.
    pub split_resource_templates: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_depth: 256,
            detect_method_invocations: true,
            split_resource_templates: true,
        }
    }
}

/// Parses a DSDT or SSDT with the default [`ParseConfig`].
///
/// # Errors
///
/// See [`parse_definition_block_with`].
pub fn parse_definition_block(bytes: &[u8]) -> Result<AmlTree, AmlError> {
    parse_definition_block_with(bytes, &ParseConfig::default())
}

/// Parses a DSDT or SSDT into a tree.
///
/// # Errors
///
/// - [`AmlError::InvalidHeader`] for a short table, a foreign signature or a
///   length field that disagrees with `bytes.len()`.
/// - [`AmlError::InvalidChecksum`] if checksum verification is on and fails.
/// - [`AmlError::UnknownOpcode`], [`AmlError::InvalidPkgLength`],
///   [`AmlError::UnexpectedEnd`] or [`AmlError::InvalidNameString`] for
///   malformed AML.
/// - [`AmlError::NestingTooDeep`] past [`ParseConfig::max_depth`].
pub fn parse_definition_block_with(bytes: &[u8], config: &ParseConfig) -> Result<AmlTree, AmlError> {
    let mut stream = AmlStream::new(bytes);
    let header = SdtHeader::decode(&mut stream).map_err(|_| {
        warn!("aml: table shorter than its header ({} bytes)", bytes.len());
        AmlError::InvalidHeader
    })?;
    if !header.is_definition_block() {
        warn!("aml: {:?} is not a definition block", header.signature());
        return Err(AmlError::InvalidHeader);
    }
    if header.length() as usize != bytes.len() {
        warn!("aml: header length {} but table has {} bytes", header.length(), bytes.len());
        return Err(AmlError::InvalidHeader);
    }
    if config.verify_checksum && !sdt::validate_checksum(bytes) {
        warn!("aml: checksum mismatch");
        return Err(AmlError::InvalidChecksum);
    }

    let mut parser = Parser {
        tree: AmlTree::new(),
        config,
        methods: Vec::new(),
        scope: AmlPath::ROOT,
    };
    let root = parser.tree.new_root(header)?;
    parser.parse_term_list(&mut stream, root, 0, false).inspect_err(|err| {
        warn!("aml: parse failed: {err}");
    })?;

    debug!(
        "aml: parsed {} ({} bytes, {} nodes, {} methods)",
        core::str::from_utf8(&header.signature()).unwrap_or("????"),
        bytes.len(),
        parser.tree.len(),
        parser.methods.len()
    );
    Ok(parser.tree)
}

/// Decodes a PkgLength, returning its value and encoded width in bytes.
///
/// # Errors
///
/// Returns [`AmlError::InvalidPkgLength`] if a multi-byte lead byte has bits
/// 4-5 set, and [`AmlError::UnexpectedEnd`] on truncation.
pub fn read_pkg_length(stream: &mut AmlStream<'_>) -> Result<(usize, u8), AmlError> {
    let lead = stream.read_byte()?;
    let follow = lead >> 6;
    if follow == 0 {
        return Ok((usize::from(lead & 0x3F), 1));
    }
    if lead & 0x30 != 0 {
        return Err(AmlError::InvalidPkgLength);
    }
    let mut len = usize::from(lead & 0x0F);
    for (i, &b) in stream.read_bytes(usize::from(follow))?.iter().enumerate() {
        len |= usize::from(b) << (4 + 8 * i);
    }
    Ok((len, follow + 1))
}

/// A control method known to the parser.
struct MethodEntry {
    path: AmlPath,
    arg_count: u8,
}

struct Parser<'c> {
    tree: AmlTree,
    config: &'c ParseConfig,
    methods: Vec<MethodEntry>,
    /// Namespace scope the current term list is evaluated in.
    scope: AmlPath,
}

impl Parser<'_> {
    /// Parses terms until `stream` is exhausted, appending them to `parent`.
    fn parse_term_list(
        &mut self,
        stream: &mut AmlStream<'_>,
        parent: NodeId,
        depth: usize,
        in_package: bool,
    ) -> Result<(), AmlError> {
        while !stream.is_empty() {
            let child = self.parse_term(stream, depth + 1, !in_package)?;
            self.tree.push_variable_argument(parent, child)?;
        }
        Ok(())
    }

    /// Parses one term object.
    fn parse_term(
        &mut self,
        stream: &mut AmlStream<'_>,
        depth: usize,
        allow_invocation: bool,
    ) -> Result<NodeId, AmlError> {
        if depth > self.config.max_depth {
            return Err(AmlError::NestingTooDeep);
        }
        let lead = stream.peek_byte()?;
        if name::is_name_string_start(lead) {
            return self.parse_name_term(stream, depth, allow_invocation);
        }

        stream.read_byte()?;
        let sub_op = if lead == EXT_OP_PREFIX { stream.read_byte()? } else { 0 };
        let Some(encoding) = opcode::lookup(lead, sub_op) else {
            warn!("aml: unknown opcode {lead:#04x}/{sub_op:#04x}");
            return Err(AmlError::UnknownOpcode { op: lead, sub_op });
        };
        trace!("aml: {:depth$}{}", "", encoding.name);
        self.parse_object(stream, encoding, depth)
    }

    fn parse_object(
        &mut self,
        stream: &mut AmlStream<'_>,
        encoding: &'static AmlByteEncoding,
        depth: usize,
    ) -> Result<NodeId, AmlError> {
        let id = self.tree.new_object(encoding)?;

        let mut scoped = None;
        if encoding.attributes.contains(OpAttributes::HAS_PKG_LENGTH) {
            let (len, width) = read_pkg_length(stream)?;
            let body = len.checked_sub(usize::from(width)).ok_or(AmlError::InvalidPkgLength)?;
            scoped = Some(stream.split(body)?);
            self.tree.object_mut(id)?.pkg_len_hint = width;
        }
        let body = match scoped.as_mut() {
            Some(scoped) => scoped,
            None => stream,
        };

        for (index, &format) in encoding.formats.iter().enumerate() {
            let arg = self.parse_fixed(body, format, depth)?;
            self.tree.set_fixed_argument(id, index, arg)?;
        }
        self.record_method(id, encoding)?;

        let attributes = encoding.attributes;
        if attributes.contains(OpAttributes::HAS_CHILD_OBJ) {
            let in_package = *encoding == PACKAGE_OP || *encoding == VAR_PACKAGE_OP;
            if encoding.introduces_scope() {
                let path = self.scope.resolve(&self.tree.defined_name(id)?)?;
                let outer = mem::replace(&mut self.scope, path);
                self.parse_term_list(body, id, depth, in_package)?;
                self.scope = outer;
            } else {
                self.parse_term_list(body, id, depth, in_package)?;
            }
        } else if attributes.contains(OpAttributes::HAS_BYTE_LIST) {
            self.parse_byte_list(body, id)?;
        } else if attributes.contains(OpAttributes::HAS_FIELD_LIST) {
            self.parse_field_list(body, id, depth)?;
        }
        Ok(id)
    }

    fn parse_fixed(
        &mut self,
        stream: &mut AmlStream<'_>,
        format: ParseFormat,
        depth: usize,
    ) -> Result<NodeId, AmlError> {
        match format {
            ParseFormat::UInt8 | ParseFormat::UInt16 | ParseFormat::UInt32 | ParseFormat::UInt64 => {
                let width = format.integer_width().ok_or(AmlError::TypeMismatch)?;
                let bytes = stream.read_bytes(width)?;
                self.tree.new_data(DataType::UInt, bytes)
            }
            ParseFormat::Name => {
                let bytes = read_name_bytes(stream)?;
                self.tree.new_data(DataType::NameString, bytes)
            }
            ParseFormat::String => {
                let rest = stream.rest();
                let len = rest.iter().position(|&b| b == 0).ok_or(AmlError::UnexpectedEnd)? + 1;
                let bytes = stream.read_bytes(len)?;
                self.tree.new_data(DataType::String, bytes)
            }
            ParseFormat::FieldPkgLen => {
                let start = stream.rest();
                let (_, width) = read_pkg_length(stream)?;
                self.tree.new_data(DataType::FieldPkgLen, &start[..usize::from(width)])
            }
            ParseFormat::Object => self.parse_term(stream, depth + 1, true),
            ParseFormat::Reference => self.parse_term(stream, depth + 1, false),
        }
    }

    /// Parses a NameString in term position: a method invocation when it
    /// names a known method, a name reference otherwise.
    fn parse_name_term(
        &mut self,
        stream: &mut AmlStream<'_>,
        depth: usize,
        allow_invocation: bool,
    ) -> Result<NodeId, AmlError> {
        let bytes = read_name_bytes(stream)?;
        let arg_count = if allow_invocation && self.config.detect_method_invocations {
            self.find_method(&NameString::from_aml(bytes)?)?
        } else {
            None
        };

        let encoding = if arg_count.is_some() { &METHOD_INVOCATION_OP } else { &NAME_REFERENCE_OP };
        trace!("aml: {:depth$}{}", "", encoding.name);
        let id = self.tree.new_object(encoding)?;
        let name = self.tree.new_data(DataType::NameString, bytes)?;
        self.tree.set_fixed_argument(id, 0, name)?;
        for _ in 0..arg_count.unwrap_or(0) {
            let arg = self.parse_term(stream, depth + 1, true)?;
            self.tree.push_variable_argument(id, arg)?;
        }
        Ok(id)
    }

    /// Stores a byte list as resource descriptors when it forms a complete
    /// resource template, or as one raw node otherwise.
    fn parse_byte_list(&mut self, stream: &mut AmlStream<'_>, parent: NodeId) -> Result<(), AmlError> {
        let bytes = stream.read_bytes(stream.remaining())?;
        if bytes.is_empty() {
            return Ok(());
        }
        let descriptors = if self.config.split_resource_templates {
            resource::split_descriptors(bytes)?
        } else {
            None
        };
        match descriptors {
            Some(descriptors) => {
                for descriptor in descriptors {
                    let data = self.tree.new_data(DataType::ResourceData, descriptor)?;
                    self.tree.push_variable_argument(parent, data)?;
                }
            }
            None => {
                let data = self.tree.new_data(DataType::Raw, bytes)?;
                self.tree.push_variable_argument(parent, data)?;
            }
        }
        Ok(())
    }

    fn parse_field_list(
        &mut self,
        stream: &mut AmlStream<'_>,
        parent: NodeId,
        depth: usize,
    ) -> Result<(), AmlError> {
        while !stream.is_empty() {
            let lead = stream.peek_byte()?;
            let element = if name::is_lead_name_char(lead) {
                let seg = NameSeg::from_bytes(stream.read_bytes(4)?).ok_or(AmlError::UnexpectedEnd)?;
                if !seg.is_valid() {
                    return Err(AmlError::InvalidNameString);
                }
                let id = self.tree.new_object(&NAMED_FIELD_OP)?;
                let name = self.tree.new_data(DataType::NameString, &seg.0)?;
                self.tree.set_fixed_argument(id, 0, name)?;
                let width = self.parse_fixed(stream, ParseFormat::FieldPkgLen, depth)?;
                self.tree.set_fixed_argument(id, 1, width)?;
                id
            } else {
                let Some(encoding) = opcode::lookup_field(lead) else {
                    warn!("aml: unknown field element {lead:#04x}");
                    return Err(AmlError::UnknownOpcode { op: lead, sub_op: 0 });
                };
                stream.read_byte()?;
                let id = self.tree.new_object(encoding)?;
                for (index, &format) in encoding.formats.iter().enumerate() {
                    let arg = match format {
                        // Connection takes a NameString or a buffer, never a call.
                        ParseFormat::Object => self.parse_term(stream, depth + 1, false)?,
                        format => self.parse_fixed(stream, format, depth)?,
                    };
                    self.tree.set_fixed_argument(id, index, arg)?;
                }
                id
            };
            self.tree.push_variable_argument(parent, element)?;
        }
        Ok(())
    }

    /// Remembers `Method` definitions and `External` method declarations.
    fn record_method(&mut self, id: NodeId, encoding: &AmlByteEncoding) -> Result<(), AmlError> {
        let arg_count = if *encoding == METHOD_OP {
            self.fixed_integer(id, 1)? & 0x07
        } else if *encoding == EXTERNAL_OP && self.fixed_integer(id, 1)? == EXTERNAL_METHOD_TYPE {
            self.fixed_integer(id, 2)? & 0x07
        } else {
            return Ok(());
        };
        let path = self.scope.resolve(&self.tree.defined_name(id)?)?;
        self.methods.try_reserve(1)?;
        self.methods.push(MethodEntry { path, arg_count });
        Ok(())
    }

    fn fixed_integer(&self, id: NodeId, index: usize) -> Result<u8, AmlError> {
        let data = self.tree.fixed_argument(id, index)?.ok_or(AmlError::TypeMismatch)?;
        let value = self.tree.data(data)?.integer().ok_or(AmlError::TypeMismatch)?;
        Ok(value as u8)
    }

    /// Argument count of the method `name` refers to from the current scope.
    ///
    /// A single bare segment is searched in the current scope and then in
    /// each enclosing scope; other names resolve to exactly one path.
    fn find_method(&self, name: &NameString) -> Result<Option<u8>, AmlError> {
        let lookup = |path: &AmlPath| {
            self.methods.iter().rev().find(|m| m.path == *path).map(|m| m.arg_count)
        };
        match name.segments() {
            [seg] if !name.is_absolute() && name.parent_prefixes() == 0 => {
                let mut scope = self.scope.clone();
                loop {
                    if let Some(count) = lookup(&scope.join(*seg)?) {
                        return Ok(Some(count));
                    }
                    if scope.pop().is_none() {
                        return Ok(None);
                    }
                }
            }
            _ => Ok(self.scope.resolve(name).ok().and_then(|path| lookup(&path))),
        }
    }
}

/// Reads one encoded NameString and returns its bytes.
fn read_name_bytes<'a>(stream: &mut AmlStream<'a>) -> Result<&'a [u8], AmlError> {
    let start = stream.rest();
    let before = stream.position();
    NameString::decode(stream)?;
    Ok(&start[..stream.position() - before])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AmlNode;
    use crate::opcode::{BUFFER_OP, DEVICE_OP, FIELD_OP, NAME_OP, ONE_OP, SCOPE_OP};
    use crate::sdt::SSDT_SIGNATURE;

    /// Wraps `body` in a valid SSDT.
    fn table(body: &[u8]) -> Vec<u8> {
        let mut header = SdtHeader::new_definition_block(SSDT_SIGNATURE, "HADRON", "TEST", 1).unwrap();
        header.length = (SdtHeader::SIZE + body.len()) as u32;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(body);
        sdt::update_checksum(&mut bytes);
        bytes
    }

    // Scope (\_SB) { Device (CPU0) { Name (_UID, Zero) } }
    const SCOPE_DEVICE_NAME: &[u8] = &[
        0x10, 0x13, b'\\', b'_', b'S', b'B', b'_', //
        0x5B, 0x82, 0x0B, b'C', b'P', b'U', b'0', //
        0x08, b'_', b'U', b'I', b'D', 0x00,
    ];

    #[test]
    fn pkg_length_widths() {
        let mut one = AmlStream::new(&[0x3F]);
        assert_eq!(read_pkg_length(&mut one), Ok((0x3F, 1)));
        let mut two = AmlStream::new(&[0x4A, 0x01]);
        assert_eq!(read_pkg_length(&mut two), Ok((0x1A, 2)));
        let mut four = AmlStream::new(&[0xC1, 0x00, 0x00, 0x01]);
        assert_eq!(read_pkg_length(&mut four), Ok((0x0100_0001, 4)));
        let mut bad = AmlStream::new(&[0x51, 0x00]);
        assert_eq!(read_pkg_length(&mut bad), Err(AmlError::InvalidPkgLength));
        let mut short = AmlStream::new(&[0x80, 0x00]);
        assert_eq!(read_pkg_length(&mut short), Err(AmlError::UnexpectedEnd));
    }

    #[test]
    fn scope_device_name() {
        let tree = parse_definition_block(&table(SCOPE_DEVICE_NAME)).unwrap();
        let root = tree.root().unwrap();
        let top = tree.variable_args(root).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(tree.encoding(top[0]).unwrap(), &SCOPE_OP);
        assert_eq!(tree.object(top[0]).unwrap().pkg_len_hint(), 1);

        let device = tree.variable_args(top[0]).unwrap()[0];
        assert_eq!(tree.encoding(device).unwrap(), &DEVICE_OP);

        let uid = tree.find_node(root, "\\_SB.CPU0._UID").unwrap().unwrap();
        assert_eq!(tree.encoding(uid).unwrap(), &NAME_OP);
        let value = tree.fixed_argument(uid, 1).unwrap().unwrap();
        assert_eq!(tree.integer_value(value), Ok(0));
        assert_eq!(tree.header().unwrap().length() as usize, SdtHeader::SIZE + SCOPE_DEVICE_NAME.len());
    }

    #[test]
    fn method_invocations() {
        // Method (FOO, 1) { Return (Arg0) }  FOO (One)
        let body = [
            0x14, 0x08, b'F', b'O', b'O', b'_', 0x01, 0xA4, 0x68, //
            b'F', b'O', b'O', b'_', 0x01,
        ];
        let tree = parse_definition_block(&table(&body)).unwrap();
        let top = tree.variable_args(tree.root().unwrap()).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(tree.encoding(top[1]).unwrap(), &METHOD_INVOCATION_OP);
        let args = tree.variable_args(top[1]).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(tree.encoding(args[0]).unwrap(), &ONE_OP);

        let config = ParseConfig { detect_method_invocations: false, ..ParseConfig::default() };
        let tree = parse_definition_block_with(&table(&body), &config).unwrap();
        let top = tree.variable_args(tree.root().unwrap()).unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(tree.encoding(top[1]).unwrap(), &NAME_REFERENCE_OP);
    }

    #[test]
    fn invocations_search_enclosing_scopes() {
        // Method (\FOO, 0) { }  Scope (\_SB) { Name (X, FOO) FOO }  Name (P, Package (1) { FOO })
        let body = [
            0x14, 0x06, b'F', b'O', b'O', b'_', 0x00, //
            0x10, 0x12, b'_', b'S', b'B', b'_', 0x08, b'X', b'_', b'_', b'_', b'F', b'O', b'O', b'_', //
            b'F', b'O', b'O', b'_', //
            0x08, b'P', b'_', b'_', b'_', 0x12, 0x06, 0x01, b'F', b'O', b'O', b'_',
        ];
        let tree = parse_definition_block(&table(&body)).unwrap();
        let root = tree.root().unwrap();

        // A Name value is a data object, so the method is only referenced.
        let x = tree.find_node(root, "\\_SB.X").unwrap().unwrap();
        let value = tree.fixed_argument(x, 1).unwrap().unwrap();
        assert_eq!(tree.encoding(value).unwrap(), &NAME_REFERENCE_OP);

        let scope = tree.variable_args(root).unwrap()[1];
        let call = tree.variable_args(scope).unwrap()[1];
        assert_eq!(tree.encoding(call).unwrap(), &METHOD_INVOCATION_OP);

        let p = tree.find_node(root, "P").unwrap().unwrap();
        let package = tree.fixed_argument(p, 1).unwrap().unwrap();
        let element = tree.variable_args(package).unwrap()[0];
        assert_eq!(tree.encoding(element).unwrap(), &NAME_REFERENCE_OP);
    }

    #[test]
    fn references_to_methods_are_not_calls() {
        // External (\M, MethodObj, 2)
        // If (CondRefOf (\M, Local0)) { Return (\M (One, Zero)) }
        let body = [
            0x15, 0x5C, b'M', b'_', b'_', b'_', 0x08, 0x02, //
            0xA0, 0x11, 0x5B, 0x12, 0x5C, b'M', b'_', b'_', b'_', 0x60, //
            0xA4, 0x5C, b'M', b'_', b'_', b'_', 0x01, 0x00,
        ];
        let bytes = table(&body);
        let tree = parse_definition_block(&bytes).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.variable_args(root).unwrap().len(), 2);

        let if_op = tree.variable_args(root).unwrap()[1];
        let cond_ref_of = tree.fixed_argument(if_op, 0).unwrap().unwrap();
        assert_eq!(tree.encoding(cond_ref_of).unwrap().name, "CondRefOf");
        let source = tree.fixed_argument(cond_ref_of, 0).unwrap().unwrap();
        assert_eq!(tree.encoding(source).unwrap(), &NAME_REFERENCE_OP);
        let target = tree.fixed_argument(cond_ref_of, 1).unwrap().unwrap();
        assert_eq!(tree.encoding(target).unwrap().name, "Local0");

        let body = tree.variable_args(if_op).unwrap();
        assert_eq!(body.len(), 1);
        let value = tree.fixed_argument(body[0], 0).unwrap().unwrap();
        assert_eq!(tree.encoding(value).unwrap(), &METHOD_INVOCATION_OP);
        assert_eq!(tree.variable_args(value).unwrap().len(), 2);

        assert_eq!(crate::serialize_definition_block(&tree).unwrap(), bytes);
    }

    #[test]
    fn resource_templates_are_split() {
        // Name (_CRS, Buffer (5) { IRQNoFlags () {4}, EndTag })
        let body = [0x08, b'_', b'C', b'R', b'S', 0x11, 0x08, 0x0A, 0x05, 0x22, 0x10, 0x00, 0x79, 0x00];
        let tree = parse_definition_block(&table(&body)).unwrap();
        let crs = tree.variable_args(tree.root().unwrap()).unwrap()[0];
        let buffer = tree.fixed_argument(crs, 1).unwrap().unwrap();
        assert_eq!(tree.encoding(buffer).unwrap(), &BUFFER_OP);
        let descriptors = tree.variable_args(buffer).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(tree.data(descriptors[0]).unwrap().data_type(), DataType::ResourceData);
        assert_eq!(tree.data(descriptors[1]).unwrap().buffer(), &[0x79, 0x00]);

        // Buffer (2) { 1, 2 } stays raw.
        let body = [0x08, b'B', b'U', b'F', b'_', 0x11, 0x05, 0x0A, 0x02, 0x01, 0x02];
        let tree = parse_definition_block(&table(&body)).unwrap();
        let name = tree.variable_args(tree.root().unwrap()).unwrap()[0];
        let buffer = tree.fixed_argument(name, 1).unwrap().unwrap();
        let bytes = tree.variable_args(buffer).unwrap();
        assert_eq!(bytes.len(), 1);
        assert_eq!(tree.data(bytes[0]).unwrap().data_type(), DataType::Raw);
    }

    #[test]
    fn field_lists() {
        // OperationRegion (GPIO, SystemMemory, Zero, 4)
        // Field (GPIO, ByteAcc) { PIN0, 8, Offset (2), AccessAs (ByteAcc) }
        let body = [
            0x5B, 0x80, b'G', b'P', b'I', b'O', 0x00, 0x00, 0x0A, 0x04, //
            0x5B, 0x81, 0x10, b'G', b'P', b'I', b'O', 0x01, //
            b'P', b'I', b'N', b'0', 0x08, 0x00, 0x08, 0x01, 0x01, 0x00,
        ];
        let tree = parse_definition_block(&table(&body)).unwrap();
        let root = tree.root().unwrap();
        let field = tree.variable_args(root).unwrap()[1];
        assert_eq!(tree.encoding(field).unwrap(), &FIELD_OP);
        let elements = tree.variable_args(field).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(tree.encoding(elements[0]).unwrap(), &NAMED_FIELD_OP);
        assert_eq!(tree.find_node(root, "\\PIN0"), Ok(Some(elements[0])));
        assert!(matches!(tree.node(elements[1]), Ok(AmlNode::Object(o)) if o.encoding().is_field_element()));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(
            parse_definition_block(&table(&[0x02])).err(),
            Some(AmlError::UnknownOpcode { op: 0x02, sub_op: 0 })
        );
        assert_eq!(
            parse_definition_block(&table(&[0x5B, 0x7F])).err(),
            Some(AmlError::UnknownOpcode { op: 0x5B, sub_op: 0x7F })
        );
        // Scope whose PkgLength runs past the table.
        assert_eq!(
            parse_definition_block(&table(&[0x10, 0x20, b'_', b'S', b'B', b'_'])).err(),
            Some(AmlError::InvalidPkgLength)
        );
        assert_eq!(parse_definition_block(&table(&[0x0A])).err(), Some(AmlError::UnexpectedEnd));

        let mut bytes = table(SCOPE_DEVICE_NAME);
        bytes[0..4].copy_from_slice(b"FACP");
        sdt::update_checksum(&mut bytes);
        assert_eq!(parse_definition_block(&bytes).err(), Some(AmlError::InvalidHeader));

        let mut bytes = table(SCOPE_DEVICE_NAME);
        bytes.push(0);
        assert_eq!(parse_definition_block(&bytes).err(), Some(AmlError::InvalidHeader));

        let mut bytes = table(SCOPE_DEVICE_NAME);
        bytes[sdt::CHECKSUM_OFFSET] ^= 0xFF;
        assert_eq!(parse_definition_block(&bytes).err(), Some(AmlError::InvalidChecksum));
        let lenient = ParseConfig { verify_checksum: false, ..ParseConfig::default() };
        assert!(parse_definition_block_with(&bytes, &lenient).is_ok());

        assert_eq!(parse_definition_block(&[0; 10]).err(), Some(AmlError::InvalidHeader));
    }

    #[test]
    fn nesting_limit() {
        let config = ParseConfig { max_depth: 2, ..ParseConfig::default() };
        assert_eq!(
            parse_definition_block_with(&table(SCOPE_DEVICE_NAME), &config).err(),
            Some(AmlError::NestingTooDeep)
        );
        let config = ParseConfig { max_depth: 4, ..ParseConfig::default() };
        assert!(parse_definition_block_with(&table(SCOPE_DEVICE_NAME), &config).is_ok());
    }
}
