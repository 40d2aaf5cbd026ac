//! Ordered tree walks.
//!
//! Callers implement [`AmlVisitor`] and override only the callbacks they need.
//! All methods have default bodies. [`AmlTree::walk`] visits nodes in
//! encoding order: a node, then its fixed arguments, then its variable
//! arguments.

use alloc::vec::Vec;

use crate::AmlError;
use crate::node::{AmlTree, NodeId};

/// What the walk does after [`AmlVisitor::enter`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Descend into the node's children.
    Continue,
    /// Do not visit the children; [`AmlVisitor::exit`] is still called.
    SkipChildren,
    /// End the walk immediately.
    Stop,
}

/// Visitor trait for walking an AML tree.
#[allow(unused_variables)]
pub trait AmlVisitor {
    /// Called before the children of `node` (pre-order).
    fn enter(&mut self, tree: &AmlTree, node: NodeId, depth: usize) -> WalkAction {
        WalkAction::Continue
    }

    /// Called after the children of `node` (post-order).
    fn exit(&mut self, tree: &AmlTree, node: NodeId, depth: usize) {}
}

impl AmlTree {
    /// Walks the branch at `start`, calling `visitor` on every node.
    ///
    /// The walk keeps its own stack, so deep trees do not recurse.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNode`] if `start` is stale, or
    /// [`AmlError::OutOfResources`] if the stack cannot grow.
    pub fn walk(&self, start: NodeId, visitor: &mut impl AmlVisitor) -> Result<(), AmlError> {
        // (node, depth, children already pushed)
        let mut stack: Vec<(NodeId, usize, bool)> = Vec::new();
        self.node(start)?;
        stack.try_reserve(1)?;
        stack.push((start, 0, false));

        while let Some((node, depth, expanded)) = stack.pop() {
            if expanded {
                visitor.exit(self, node, depth);
                continue;
            }
            match visitor.enter(self, node, depth) {
                WalkAction::Stop => return Ok(()),
                WalkAction::SkipChildren => visitor.exit(self, node, depth),
                WalkAction::Continue => {
                    let children = self.node(node)?.children();
                    stack.try_reserve(children.clone().count() + 1)?;
                    stack.push((node, depth, true));
                    stack.extend(children.rev().map(|child| (child, depth + 1, false)));
                }
            }
        }
        Ok(())
    }
}

/// Collects nodes in pre-order. Useful for tests and simple searches.
#[derive(Debug, Default)]
pub struct PreOrder {
    /// Visited nodes, in order.
    pub nodes: Vec<NodeId>,
}

impl AmlVisitor for PreOrder {
    fn enter(&mut self, _tree: &AmlTree, node: NodeId, _depth: usize) -> WalkAction {
        if self.nodes.try_reserve(1).is_err() {
            return WalkAction::Stop;
        }
        self.nodes.push(node);
        WalkAction::Continue
    }
}
