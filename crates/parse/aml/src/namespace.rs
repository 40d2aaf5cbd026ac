//! Namespace resolution over an AML tree.
//!
//! A node *in the namespace* is an object whose opcode defines a name
//! (`Name`, `Device`, `Method`, `OperationRegion`, named fields, ...). Scope
//! openers (`Scope`, `Device`, `Method`, `Processor`, `PowerResource`,
//! `ThermalZone`) additionally make their name the current scope for the
//! terms they contain.
//!
//! Absolute paths are computed by resolving each defining NameString against
//! the path of its enclosing scope, so `Scope (\_SB.PCI0) { Name (X, 1) }`
//! defines `\_SB_.PCI0.X___`. Detached branches resolve as if their top node
//! sat directly under the root.

use alloc::vec::Vec;

use crate::AmlError;
use crate::name::{AmlPath, NameSeg, NameString};
use crate::node::{AmlNode, AmlTree, DataType, NodeId};
use crate::visitor::{AmlVisitor, WalkAction};

/// Kind of a namespace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A DefScope.
    Scope,
    /// A DefDevice.
    Device,
    /// A DefMethod.
    Method,
    /// A DefThermalZone.
    ThermalZone,
    /// A DefProcessor.
    Processor,
    /// A DefPowerRes.
    PowerResource,
    /// A DefName.
    Name,
    /// An operation region, data region or field unit.
    Region,
    /// Any other named object (`Alias`, `Mutex`, `CreateField`, ...).
    Other,
}

impl NodeKind {
    fn of(op: u8, sub_op: u8) -> Self {
        match (op, sub_op) {
            (0x10, _) => Self::Scope,
            (0x08, _) => Self::Name,
            (0x14, _) => Self::Method,
            (0x5B, 0x82) => Self::Device,
            (0x5B, 0x83) => Self::Processor,
            (0x5B, 0x84) => Self::PowerResource,
            (0x5B, 0x85) => Self::ThermalZone,
            (0x5B, 0x80 | 0x88) | (0xD2, _) => Self::Region,
            _ => Self::Other,
        }
    }
}

/// One named object of the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Node that defines the name.
    pub node: NodeId,
    /// Absolute path of the name.
    pub path: AmlPath,
    /// Kind of namespace object.
    pub kind: NodeKind,
}

impl AmlTree {
    /// Returns `true` if `node` defines a name.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale handles.
    pub fn is_namespace_node(&self, node: NodeId) -> Result<bool, AmlError> {
        Ok(self.node(node)?.as_object().is_some_and(|o| o.encoding().naming_argument_index().is_some()))
    }

    /// Returns `true` for the root and for objects that open a scope.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale handles.
    pub fn is_scope_node(&self, node: NodeId) -> Result<bool, AmlError> {
        Ok(match self.node(node)? {
            AmlNode::Root(_) => true,
            AmlNode::Object(object) => object.encoding().introduces_scope(),
            AmlNode::Data(_) => false,
        })
    }

    /// Nearest ancestor that is the root or opens a scope.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] for stale handles.
    pub fn namespace_parent(&self, node: NodeId) -> Result<Option<NodeId>, AmlError> {
        let mut current = self.parent(node)?;
        while let Some(id) = current {
            if self.is_scope_node(id)? {
                return Ok(Some(id));
            }
            current = self.parent(id)?;
        }
        Ok(None)
    }

    /// Decoded defining NameString of a namespace node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `node` defines no name.
    pub fn defined_name(&self, node: NodeId) -> Result<NameString, AmlError> {
        let object = self.object(node)?;
        let index = object.encoding().naming_argument_index().ok_or(AmlError::TypeMismatch)?;
        let slot = object.fixed_argument(index).ok_or(AmlError::TypeMismatch)?;
        let data = self.data(slot)?;
        if data.data_type() != DataType::NameString {
            return Err(AmlError::TypeMismatch);
        }
        NameString::from_aml(data.buffer())
    }

    /// Absolute path of the root or of a namespace node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] for nodes that define no name and
    /// [`AmlError::InvalidPath`] if a name climbs above the root.
    pub fn absolute_path(&self, node: NodeId) -> Result<AmlPath, AmlError> {
        if matches!(self.node(node)?, AmlNode::Root(_)) {
            return Ok(AmlPath::ROOT);
        }
        let name = self.defined_name(node)?;
        let base = match self.namespace_parent(node)? {
            Some(scope) => self.absolute_path(scope)?,
            None => AmlPath::ROOT,
        };
        base.resolve(&name)
    }

    /// Path of the scope a term inside `node` is evaluated in.
    fn scope_path(&self, node: NodeId) -> Result<AmlPath, AmlError> {
        if self.is_scope_node(node)? {
            self.absolute_path(node)
        } else {
            match self.namespace_parent(node)? {
                Some(scope) => self.absolute_path(scope),
                None => Ok(AmlPath::ROOT),
            }
        }
    }

    /// Topmost ancestor of `node`: the root, or the head of a detached branch.
    fn top_of(&self, node: NodeId) -> Result<NodeId, AmlError> {
        let mut top = node;
        while let Some(parent) = self.parent(top)? {
            top = parent;
        }
        Ok(top)
    }

    /// Resolves an ASL path relative to `reference`.
    ///
    /// - A leading `\` starts at the root of the tree `reference` belongs to.
    /// - Otherwise the search starts at `reference` if it opens a scope, or
    ///   at its namespace parent.
    /// - Each `^` climbs one namespace level.
    /// - The remaining segments (1 to 4 characters each, padded with `_`)
    ///   name the target. An empty remainder yields the scope reached.
    ///
    /// Returns `Ok(None)` if nothing in the tree has that path.
    ///
    /// # Errors
    ///
    /// - [`AmlError::InvalidPath`] if `path` is malformed or climbs above
    ///   the root.
    /// - [`AmlError::NodeNotAttached`] for an absolute path from a branch
    ///   that is not part of a definition block.
    pub fn find_node(&self, reference: NodeId, path: &str) -> Result<Option<NodeId>, AmlError> {
        let name = NameString::from_asl(path).map_err(|_| AmlError::InvalidPath)?;
        let top = self.top_of(reference)?;

        let mut scope = if name.is_absolute() {
            if !matches!(self.node(top)?, AmlNode::Root(_)) {
                return Err(AmlError::NodeNotAttached);
            }
            top
        } else if self.is_scope_node(reference)? {
            reference
        } else {
            self.namespace_parent(reference)?.unwrap_or(top)
        };

        for _ in 0..name.parent_prefixes() {
            scope = self.namespace_parent(scope)?.ok_or(AmlError::InvalidPath)?;
        }
        if name.segments().is_empty() {
            return Ok(Some(scope));
        }

        let base = if name.is_absolute() { AmlPath::ROOT } else { self.scope_path(scope)? };
        let target = base.resolve(&NameString::from_segments(name.segments())?)?;
        self.find_by_path(top, &target)
    }

    /// First namespace node under `top`, in pre-order, whose absolute path
    /// is `target`. `top` is a root or the head of a detached branch.
    ///
    /// Paths are built incrementally from the enclosing scopes during a
    /// single walk. A node whose name does not resolve (it climbs above the
    /// root, or is malformed) cannot match, and neither can anything inside it.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] if `top` is stale.
    pub fn find_by_path(&self, top: NodeId, target: &AmlPath) -> Result<Option<NodeId>, AmlError> {
        if target.is_root() {
            return Ok(matches!(self.node(top)?, AmlNode::Root(_)).then_some(top));
        }
        let mut search = PathSearch { target, scopes: Vec::new(), found: None, error: None };
        self.walk(top, &mut search)?;
        match search.error {
            Some(err) => Err(err),
            None => Ok(search.found),
        }
    }

    /// Lists every namespace node reachable from the root, in pre-order.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] if the tree has no root.
    pub fn namespace_entries(&self) -> Result<Vec<NamespaceEntry>, AmlError> {
        let root = self.root().ok_or(AmlError::InvalidNode)?;
        let mut collect = Collect { entries: Vec::new(), error: None };
        self.walk(root, &mut collect)?;
        match collect.error {
            Some(err) => Err(err),
            None => Ok(collect.entries),
        }
    }

    /// Final segment of the name defined by `node`.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::defined_name`], plus [`AmlError::InvalidNameString`]
    /// for names without segments.
    pub fn defined_seg(&self, node: NodeId) -> Result<NameSeg, AmlError> {
        self.defined_name(node)?.last_segment().ok_or(AmlError::InvalidNameString)
    }
}

struct PathSearch<'a> {
    target: &'a AmlPath,
    /// Enclosing scope nodes of the current node and their paths, innermost last.
    scopes: Vec<(NodeId, AmlPath)>,
    found: Option<NodeId>,
    error: Option<AmlError>,
}

impl PathSearch<'_> {
    fn visit(&mut self, tree: &AmlTree, node: NodeId) -> Result<WalkAction, AmlError> {
        if !tree.is_namespace_node(node)? {
            return Ok(WalkAction::Continue);
        }
        let resolved = tree.defined_name(node).and_then(|name| match self.scopes.last() {
            Some((_, scope)) => scope.resolve(&name),
            None => AmlPath::ROOT.resolve(&name),
        });
        let path = match resolved {
            Ok(path) => path,
            Err(AmlError::OutOfResources) => return Err(AmlError::OutOfResources),
            Err(_) => return Ok(WalkAction::SkipChildren),
        };
        if path == *self.target {
            self.found = Some(node);
            return Ok(WalkAction::Stop);
        }
        if tree.is_scope_node(node)? {
            self.scopes.try_reserve(1)?;
            self.scopes.push((node, path));
        }
        Ok(WalkAction::Continue)
    }
}

impl AmlVisitor for PathSearch<'_> {
    fn enter(&mut self, tree: &AmlTree, node: NodeId, _depth: usize) -> WalkAction {
        match self.visit(tree, node) {
            Ok(action) => action,
            Err(err) => {
                self.error = Some(err);
                WalkAction::Stop
            }
        }
    }

    fn exit(&mut self, _tree: &AmlTree, node: NodeId, _depth: usize) {
        if self.scopes.last().is_some_and(|(scope, _)| *scope == node) {
            self.scopes.pop();
        }
    }
}

struct Collect {
    entries: Vec<NamespaceEntry>,
    error: Option<AmlError>,
}

impl Collect {
    fn record(&mut self, tree: &AmlTree, node: NodeId) -> Result<(), AmlError> {
        if !tree.is_namespace_node(node)? {
            return Ok(());
        }
        let encoding = tree.encoding(node)?;
        let path = tree.absolute_path(node)?;
        self.entries.try_reserve(1)?;
        self.entries.push(NamespaceEntry {
            node,
            path,
            kind: NodeKind::of(encoding.op, encoding.sub_op),
        });
        Ok(())
    }
}

impl AmlVisitor for Collect {
    fn enter(&mut self, tree: &AmlTree, node: NodeId, _depth: usize) -> WalkAction {
        match self.record(tree, node) {
            Ok(()) => WalkAction::Continue,
            Err(err) => {
                self.error = Some(err);
                WalkAction::Stop
            }
        }
    }
}
