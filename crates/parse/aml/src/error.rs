//! Error type shared by every AML tree operation.

use r_efi::efi;

/// Coarse result class of an [`AmlError`].
///
/// Firmware callers usually only care which of these four classes a failure
/// belongs to; [`AmlError::status`] performs the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmlStatus {
    /// Bad input shape or range, or an invariant of the tree would break.
    InvalidParameter,
    /// An allocation failed.
    OutOfResources,
    /// An encoding does not fit the available or representable space.
    BufferTooSmall,
    /// The requested object does not exist.
    NotFound,
}

/// Errors reported by the AML parser, tree editor, serializer and codegen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmlError {
    /// The byte stream ended in the middle of a construct.
    #[error("unexpected end of AML stream")]
    UnexpectedEnd,
    /// A PkgLength encoding was malformed or exceeds its enclosing scope.
    #[error("invalid PkgLength encoding")]
    InvalidPkgLength,
    /// An opcode that has no entry in the opcode table.
    #[error("unknown opcode {op:#04x}/{sub_op:#04x}")]
    UnknownOpcode {
        /// First opcode byte.
        op: u8,
        /// Second byte for extended opcodes, 0 otherwise.
        sub_op: u8,
    },
    /// The ACPI table header is malformed (signature or length).
    #[error("invalid definition block header")]
    InvalidHeader,
    /// The table bytes do not sum to zero.
    #[error("definition block checksum mismatch")]
    InvalidChecksum,
    /// An AML NameString or ASL name is malformed.
    #[error("invalid name string")]
    InvalidNameString,
    /// An ASL path is syntactically invalid or climbs above the root.
    #[error("invalid namespace path")]
    InvalidPath,
    /// A handle refers to a freed node or to nothing at all.
    #[error("invalid node handle")]
    InvalidNode,
    /// The node sits in a fixed-argument slot and cannot be detached.
    #[error("node occupies a fixed argument slot")]
    FixedArgument,
    /// The node must be detached for this operation.
    #[error("node is still attached to a parent")]
    NodeAttached,
    /// The node must be attached for this operation.
    #[error("node is not attached to a parent")]
    NodeNotAttached,
    /// Attaching the node would make it its own ancestor.
    #[error("attaching node would create a cycle")]
    WouldCycle,
    /// The tree already owns a root node.
    #[error("tree already has a root node")]
    RootExists,
    /// The parent does not accept variable arguments.
    #[error("parent does not accept variable arguments")]
    NotVariableArgumentParent,
    /// A node or payload has an unexpected kind for this operation.
    #[error("node type mismatch")]
    TypeMismatch,
    /// A scalar argument is outside the range the ACPI specification allows.
    #[error("value out of range")]
    OutOfRange,
    /// Parsing recursed deeper than the configured limit.
    #[error("AML nesting too deep")]
    NestingTooDeep,
    /// An encoded length does not fit in a 28-bit PkgLength.
    #[error("PkgLength overflow")]
    PkgLengthOverflow,
    /// An allocation failed.
    #[error("out of resources")]
    OutOfResources,
    /// A write would run past the end of the output buffer.
    #[error("buffer too small")]
    BufferTooSmall,
    /// The object named by a path does not exist.
    #[error("object not found")]
    NotFound,
}

impl AmlError {
    /// Classifies the error into one of the four firmware result codes.
    #[must_use]
    pub fn status(self) -> AmlStatus {
        match self {
            Self::OutOfResources => AmlStatus::OutOfResources,
            Self::BufferTooSmall | Self::PkgLengthOverflow => AmlStatus::BufferTooSmall,
            Self::NotFound => AmlStatus::NotFound,
            _ => AmlStatus::InvalidParameter,
        }
    }
}

impl From<AmlError> for efi::Status {
    fn from(err: AmlError) -> Self {
        match err.status() {
            AmlStatus::InvalidParameter => efi::Status::INVALID_PARAMETER,
            AmlStatus::OutOfResources => efi::Status::OUT_OF_RESOURCES,
            AmlStatus::BufferTooSmall => efi::Status::BUFFER_TOO_SMALL,
            AmlStatus::NotFound => efi::Status::NOT_FOUND,
        }
    }
}

impl From<alloc::collections::TryReserveError> for AmlError {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::OutOfResources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(AmlError::FixedArgument.status(), AmlStatus::InvalidParameter);
        assert_eq!(AmlError::UnknownOpcode { op: 0x02, sub_op: 0 }.status(), AmlStatus::InvalidParameter);
        assert_eq!(AmlError::PkgLengthOverflow.status(), AmlStatus::BufferTooSmall);
        assert_eq!(AmlError::OutOfResources.status(), AmlStatus::OutOfResources);
    }

    #[test]
    fn efi_status_mapping() {
        assert_eq!(efi::Status::from(AmlError::InvalidPath), efi::Status::INVALID_PARAMETER);
        assert_eq!(efi::Status::from(AmlError::BufferTooSmall), efi::Status::BUFFER_TOO_SMALL);
        assert_eq!(efi::Status::from(AmlError::NotFound), efi::Status::NOT_FOUND);
    }
}
