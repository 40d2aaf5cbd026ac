//! `hadron-aml` --- a `no_std` AML definition block tree library.
//!
//! This crate parses a DSDT or SSDT into an editable node tree, resolves ASL
//! namespace paths against it, lets callers attach, detach, clone and delete
//! branches, and serializes the tree back into a byte-exact definition block
//! with a recomputed header.
//!
//! Every node lives in an [`AmlTree`] arena and is addressed through a
//! [`NodeId`] handle. A handle to a deleted node is detected and reported as
//! [`AmlError::InvalidNode`] rather than aliasing a newer node.
//!
//! The [`codegen`] module builds well-formed subtrees for the common ASL
//! macros (`Name`, `Device`, `Method`, resource descriptors, `_PRT`, `_CPC`,
//! `_LPI` and friends) so firmware can synthesize tables without hand-encoding
//! AML.
//!
//! # Usage
//!
//! ```ignore
//! let mut tree = hadron_aml::parse_definition_block(ssdt_bytes)?;
//! let root = tree.root().ok_or(AmlError::InvalidNode)?;
//! if let Some(uid) = tree.find_node(root, "\\_SB.CPU0._UID")? {
//!     tree.name_op_update_integer(uid, 3)?;
//! }
//! let bytes = hadron_aml::serialize_definition_block(&tree)?;
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod api;
pub mod codegen;
pub mod debug;
pub mod error;
pub mod name;
pub mod namespace;
pub mod node;
pub mod opcode;
pub mod parser;
pub mod resource;
pub mod sdt;
pub mod serialize;
pub mod stream;
pub mod tree;
pub mod value;
pub mod visitor;

// Re-export key types at crate root for convenience.
pub use debug::TreeDisplay;
pub use error::{AmlError, AmlStatus};
pub use name::{AmlPath, NameSeg, NameString};
pub use namespace::{NamespaceEntry, NodeKind};
pub use node::{AmlNode, AmlTree, DataNode, DataType, NodeId, ObjectNode, RootNode};
pub use opcode::{AmlByteEncoding, OpAttributes, ParseFormat};
pub use parser::{ParseConfig, parse_definition_block, parse_definition_block_with};
pub use resource::{AcpiResource, ResourceIter, parse_resource_template};
pub use sdt::SdtHeader;
pub use serialize::{serialize_definition_block, serialize_node};
pub use value::{AmlValue, EisaId};
pub use visitor::{AmlVisitor, WalkAction};
