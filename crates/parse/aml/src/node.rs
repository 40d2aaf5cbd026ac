//! AML object model and the arena that owns it.
//!
//! A tree is made of three node kinds:
//!
//! - [`RootNode`]: the definition block header plus the top-level term list.
//! - [`ObjectNode`]: an opcode with its fixed-argument slots and, for
//!   opcodes that have one, a variable-argument list.
//! - [`DataNode`]: a leaf holding encoded bytes (NameString, string,
//!   integer, resource descriptor, field length or raw buffer).
//!
//! All nodes live in an [`AmlTree`] and are addressed with [`NodeId`]
//! handles. Parent links are kept in the arena next to each node. Nodes that
//! have no parent and are not the root are *detached*: they still belong to
//! the arena and are released with the tree or by
//! [`AmlTree::delete_tree`](crate::AmlTree::delete_tree).
//!
//! There is no uninitialized data kind; a data node always carries a typed
//! payload from the moment it is created.

use alloc::vec::Vec;

use crate::AmlError;
use crate::opcode::{AmlByteEncoding, MAX_FIXED_ARGS};
use crate::sdt::SdtHeader;

/// Handle to a node inside an [`AmlTree`].
///
/// Handles are plain values. A handle outlives the node it names without
/// harm: once the node is freed, every operation taking the stale handle
/// fails with [`AmlError::InvalidNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Arena slot of this handle. Slots are reused after a node is freed.
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Payload type of a [`DataNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// AML-encoded NameString.
    NameString,
    /// ASCII string including its terminating NUL.
    String,
    /// Little-endian unsigned integer of 1, 2, 4 or 8 bytes.
    UInt,
    /// Uninterpreted bytes.
    Raw,
    /// One complete resource descriptor, tag included.
    ResourceData,
    /// Encoded PkgLength of a field element.
    FieldPkgLen,
}

/// Leaf node holding encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    pub(crate) data_type: DataType,
    pub(crate) buffer: Vec<u8>,
}

impl DataNode {
    /// Type of the payload.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Encoded payload bytes, written verbatim by the serializer.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Value of an integer payload.
    #[must_use]
    pub fn integer(&self) -> Option<u64> {
        if self.data_type != DataType::UInt || self.buffer.len() > 8 {
            return None;
        }
        let mut raw = [0u8; 8];
        raw[..self.buffer.len()].copy_from_slice(&self.buffer);
        Some(u64::from_le_bytes(raw))
    }

    /// Text of a string payload, without the terminating NUL.
    #[must_use]
    pub fn string(&self) -> Option<&str> {
        if self.data_type != DataType::String {
            return None;
        }
        let text = self.buffer.strip_suffix(&[0]).unwrap_or(&self.buffer);
        core::str::from_utf8(text).ok()
    }
}

/// Top of a definition block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNode {
    /// Table header. `length` and `checksum` are recomputed on serialization.
    pub header: SdtHeader,
    pub(crate) children: Vec<NodeId>,
}

impl RootNode {
    /// Top-level terms, in order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An opcode and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNode {
    pub(crate) encoding: &'static AmlByteEncoding,
    pub(crate) fixed_args: [Option<NodeId>; MAX_FIXED_ARGS],
    pub(crate) variable_args: Vec<NodeId>,
    pub(crate) pkg_len_hint: u8,
}

impl ObjectNode {
    pub(crate) fn new(encoding: &'static AmlByteEncoding) -> Self {
        Self {
            encoding,
            fixed_args: [None; MAX_FIXED_ARGS],
            variable_args: Vec::new(),
            pkg_len_hint: 0,
        }
    }

    /// Grammar entry of the opcode.
    #[must_use]
    pub fn encoding(&self) -> &'static AmlByteEncoding {
        self.encoding
    }

    /// Fixed-argument slots, one per format in the grammar entry.
    #[must_use]
    pub fn fixed_args(&self) -> &[Option<NodeId>] {
        &self.fixed_args[..self.encoding.fixed_arg_count()]
    }

    /// Node in fixed slot `index`.
    #[must_use]
    pub fn fixed_argument(&self, index: usize) -> Option<NodeId> {
        self.fixed_args().get(index).copied().flatten()
    }

    /// Variable arguments, in order.
    #[must_use]
    pub fn variable_args(&self) -> &[NodeId] {
        &self.variable_args
    }

    /// Width in bytes of the PkgLength this node was parsed with, 0 if none.
    #[must_use]
    pub fn pkg_len_hint(&self) -> u8 {
        self.pkg_len_hint
    }
}

/// One node of an AML tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmlNode {
    /// Definition block root.
    Root(RootNode),
    /// Opcode with arguments.
    Object(ObjectNode),
    /// Encoded leaf data.
    Data(DataNode),
}

impl AmlNode {
    /// Children in encoding order: fixed arguments, then variable arguments.
    #[must_use]
    pub fn children(&self) -> Children<'_> {
        match self {
            Self::Root(root) => Children { fixed: [].iter(), variable: root.children.iter() },
            Self::Object(object) => Children {
                fixed: object.fixed_args().iter(),
                variable: object.variable_args.iter(),
            },
            Self::Data(_) => Children { fixed: [].iter(), variable: [].iter() },
        }
    }

    /// Returns the object node, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the data node, if this is one.
    #[must_use]
    pub fn as_data(&self) -> Option<&DataNode> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the root node, if this is one.
    #[must_use]
    pub fn as_root(&self) -> Option<&RootNode> {
        match self {
            Self::Root(root) => Some(root),
            _ => None,
        }
    }

    /// Variable-argument list of a root or an object that accepts one.
    pub(crate) fn variable_args_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            Self::Root(root) => Some(&mut root.children),
            Self::Object(object) if object.encoding.has_variable_args() => {
                Some(&mut object.variable_args)
            }
            _ => None,
        }
    }
}

/// Iterator over the children of a node.
#[derive(Clone)]
pub struct Children<'a> {
    fixed: core::slice::Iter<'a, Option<NodeId>>,
    variable: core::slice::Iter<'a, NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        for slot in self.fixed.by_ref() {
            if slot.is_some() {
                return *slot;
            }
        }
        self.variable.next().copied()
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<NodeId> {
        if let Some(id) = self.variable.next_back() {
            return Some(*id);
        }
        while let Some(slot) = self.fixed.next_back() {
            if slot.is_some() {
                return *slot;
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    parent: Option<NodeId>,
    node: AmlNode,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entry: Option<NodeEntry>,
}

/// Arena owning every node of one definition block.
///
/// A tree holds at most one root. Nodes created by the code generator, by
/// [`AmlTree::clone_node`](crate::AmlTree::clone_node) or by detaching live
/// in the same arena until they are attached or deleted, so dropping the
/// tree releases everything.
#[derive(Debug, Clone, Default)]
pub struct AmlTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<NodeId>,
    live: usize,
}

impl AmlTree {
    /// Creates an empty tree with no root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the root node handle.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of live nodes, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Number of arena slots, live or free. Every [`NodeId::index`] is below
    /// this bound.
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the arena holds no node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns `true` if `id` names a live node of this tree.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_ok()
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry, AmlError> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(AmlError::InvalidNode)
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, AmlError> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(AmlError::InvalidNode)
    }

    /// Returns the node behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale or foreign handles.
    pub fn node(&self, id: NodeId) -> Result<&AmlNode, AmlError> {
        self.entry(id).map(|entry| &entry.node)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut AmlNode, AmlError> {
        self.entry_mut(id).map(|entry| &mut entry.node)
    }

    /// Returns the parent of `id`, `None` for the root and detached nodes.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale or foreign handles.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, AmlError> {
        self.entry(id).map(|entry| entry.parent)
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), AmlError> {
        self.entry_mut(id)?.parent = parent;
        Ok(())
    }

    /// Returns `true` if `id` has a parent.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale or foreign handles.
    pub fn is_attached(&self, id: NodeId) -> Result<bool, AmlError> {
        self.parent(id).map(|parent| parent.is_some())
    }

    /// Returns the object node behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `id` is not an object node.
    pub fn object(&self, id: NodeId) -> Result<&ObjectNode, AmlError> {
        self.node(id)?.as_object().ok_or(AmlError::TypeMismatch)
    }

    pub(crate) fn object_mut(&mut self, id: NodeId) -> Result<&mut ObjectNode, AmlError> {
        match self.node_mut(id)? {
            AmlNode::Object(object) => Ok(object),
            _ => Err(AmlError::TypeMismatch),
        }
    }

    /// Returns the data node behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `id` is not a data node.
    pub fn data(&self, id: NodeId) -> Result<&DataNode, AmlError> {
        self.node(id)?.as_data().ok_or(AmlError::TypeMismatch)
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> Result<&mut DataNode, AmlError> {
        match self.node_mut(id)? {
            AmlNode::Data(data) => Ok(data),
            _ => Err(AmlError::TypeMismatch),
        }
    }

    /// Grammar entry of an object node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `id` is not an object node.
    pub fn encoding(&self, id: NodeId) -> Result<&'static AmlByteEncoding, AmlError> {
        self.object(id).map(ObjectNode::encoding)
    }

    /// Node in fixed slot `index` of an object node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `id` is not an object node.
    pub fn fixed_argument(&self, id: NodeId, index: usize) -> Result<Option<NodeId>, AmlError> {
        self.object(id).map(|object| object.fixed_argument(index))
    }

    /// Variable arguments of a root or object node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] for data nodes.
    pub fn variable_args(&self, id: NodeId) -> Result<&[NodeId], AmlError> {
        match self.node(id)? {
            AmlNode::Root(root) => Ok(&root.children),
            AmlNode::Object(object) => Ok(&object.variable_args),
            AmlNode::Data(_) => Err(AmlError::TypeMismatch),
        }
    }

    /// Definition block header.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] if the tree has no root.
    pub fn header(&self) -> Result<&SdtHeader, AmlError> {
        let root = self.root.ok_or(AmlError::InvalidNode)?;
        match self.node(root)? {
            AmlNode::Root(root) => Ok(&root.header),
            _ => Err(AmlError::InvalidNode),
        }
    }

    /// Mutable definition block header.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] if the tree has no root.
    pub fn header_mut(&mut self) -> Result<&mut SdtHeader, AmlError> {
        let root = self.root.ok_or(AmlError::InvalidNode)?;
        match self.node_mut(root)? {
            AmlNode::Root(root) => Ok(&mut root.header),
            _ => Err(AmlError::InvalidNode),
        }
    }

    // ─── Allocation ─────────────────────────────────────────────────────────

    /// Stores `node` in a free slot.
    ///
    /// The free list is kept large enough to hold every slot, so releasing a
    /// node never allocates.
    pub(crate) fn alloc(&mut self, node: AmlNode) -> Result<NodeId, AmlError> {
        let entry = Some(NodeEntry { parent: None, node });
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = entry;
            NodeId { index, generation: slot.generation }
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| AmlError::OutOfResources)?;
            self.slots.try_reserve(1)?;
            let needed = self.slots.len() + 1 - self.free.len();
            self.free.try_reserve(needed)?;
            self.slots.push(Slot { generation: 0, entry });
            NodeId { index, generation: 0 }
        };
        self.live += 1;
        Ok(id)
    }

    /// Frees the slot of `id` and returns its node. Children are untouched.
    pub(crate) fn release(&mut self, id: NodeId) -> Result<AmlNode, AmlError> {
        self.entry(id)?;
        let slot = &mut self.slots[id.index()];
        let entry = slot.entry.take().ok_or(AmlError::InvalidNode)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        if self.root == Some(id) {
            self.root = None;
        }
        Ok(entry.node)
    }

    /// Creates the root node of this tree.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::RootExists`] if the tree already has a root.
    pub fn new_root(&mut self, header: SdtHeader) -> Result<NodeId, AmlError> {
        if self.root.is_some() {
            return Err(AmlError::RootExists);
        }
        let id = self.alloc(AmlNode::Root(RootNode { header, children: Vec::new() }))?;
        self.root = Some(id);
        Ok(id)
    }

    /// Creates a detached object node with empty argument slots.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn new_object(&mut self, encoding: &'static AmlByteEncoding) -> Result<NodeId, AmlError> {
        self.alloc(AmlNode::Object(ObjectNode::new(encoding)))
    }

    /// Creates a detached data node holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn new_data(&mut self, data_type: DataType, bytes: &[u8]) -> Result<NodeId, AmlError> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(bytes.len())?;
        buffer.extend_from_slice(bytes);
        self.alloc(AmlNode::Data(DataNode { data_type, buffer }))
    }

    /// Places a detached node in an empty fixed slot of `parent`.
    pub(crate) fn set_fixed_argument(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), AmlError> {
        if self.parent(child)?.is_some() {
            return Err(AmlError::NodeAttached);
        }
        let object = self.object_mut(parent)?;
        if index >= object.encoding.fixed_arg_count() {
            return Err(AmlError::OutOfRange);
        }
        if object.fixed_args[index].is_some() {
            return Err(AmlError::FixedArgument);
        }
        object.fixed_args[index] = Some(child);
        self.set_parent(child, Some(parent))
    }

    /// Appends a detached node to the variable arguments of `parent` without
    /// touching element counts. The parser uses this while the count is
    /// still the one read from the stream.
    pub(crate) fn push_variable_argument(&mut self, parent: NodeId, child: NodeId) -> Result<(), AmlError> {
        let list = self
            .node_mut(parent)?
            .variable_args_mut()
            .ok_or(AmlError::NotVariableArgumentParent)?;
        list.try_reserve(1)?;
        list.push(child);
        self.set_parent(child, Some(parent))
    }
}
