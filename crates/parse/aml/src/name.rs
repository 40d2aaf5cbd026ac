//! AML name segments, NameStrings and absolute namespace paths.
//!
//! ACPI names are composed of 4-byte segments. A [`NameString`] is a segment
//! list with an optional root (`\`) or parent (`^`) prefix, and can be read
//! from AML bytes or from ASL text. An [`AmlPath`] is a fully resolved
//! absolute path.

use alloc::vec::Vec;
use core::fmt;

use crate::AmlError;
use crate::stream::AmlStream;

/// Root prefix, `\`.
pub const ROOT_CHAR: u8 = b'\\';
/// Parent prefix, `^`.
pub const PARENT_PREFIX_CHAR: u8 = b'^';
/// Two segments follow.
pub const DUAL_NAME_PREFIX: u8 = 0x2E;
/// A segment count and that many segments follow.
pub const MULTI_NAME_PREFIX: u8 = 0x2F;
/// Empty name.
pub const NULL_NAME: u8 = 0x00;

/// Returns `true` for characters that may start a name segment.
#[must_use]
pub const fn is_lead_name_char(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'_')
}

/// Returns `true` for characters allowed after the first of a segment.
#[must_use]
pub const fn is_name_char(byte: u8) -> bool {
    is_lead_name_char(byte) || byte.is_ascii_digit()
}

/// Returns `true` if `byte` can start a NameString in term position.
#[must_use]
pub const fn is_name_string_start(byte: u8) -> bool {
    is_lead_name_char(byte)
        || matches!(byte, ROOT_CHAR | PARENT_PREFIX_CHAR | DUAL_NAME_PREFIX | MULTI_NAME_PREFIX)
}

/// A 4-byte AML name segment (e.g., `_SB_`, `PCI0`, `_HID`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameSeg(pub [u8; 4]);

impl NameSeg {
    /// Create a `NameSeg` from a 4-byte slice.
    ///
    /// Returns `None` if the slice is shorter than 4 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let seg: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(seg))
    }

    /// Parses an ASL segment of 1 to 4 characters, padding it with `_`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNameString`] for empty, overlong or
    /// non-conforming segments. Lower-case letters are rejected.
    pub fn from_asl(text: &str) -> Result<Self, AmlError> {
        let bytes = text.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return Err(AmlError::InvalidNameString);
        }
        let mut seg = *b"____";
        seg[..bytes.len()].copy_from_slice(bytes);
        let seg = Self(seg);
        if seg.is_valid() { Ok(seg) } else { Err(AmlError::InvalidNameString) }
    }

    /// Returns `true` if the segment follows the `LeadNameChar NameChar{3}`
    /// grammar.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_lead_name_char(self.0[0]) && self.0[1..].iter().all(|&b| is_name_char(b))
    }

    /// Returns the name as a UTF-8 string (ACPI names are always ASCII).
    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Debug for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameSeg(\"{}\")", self.as_str())
    }
}

impl fmt::Display for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A NameString: optional `\` or `^` prefixes followed by name segments.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NameString {
    root: bool,
    parent_prefixes: usize,
    segments: Vec<NameSeg>,
}

impl NameString {
    /// Builds a relative single-segment name.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn from_seg(seg: NameSeg) -> Result<Self, AmlError> {
        let mut segments = Vec::new();
        segments.try_reserve_exact(1)?;
        segments.push(seg);
        Ok(Self { root: false, parent_prefixes: 0, segments })
    }

    /// Builds a relative name from `segments`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn from_segments(segments: &[NameSeg]) -> Result<Self, AmlError> {
        let mut name = Self::default();
        name.segments.try_reserve_exact(segments.len())?;
        name.segments.extend_from_slice(segments);
        Ok(name)
    }

    /// Returns `true` for `\`-prefixed names.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.root
    }

    /// Number of leading `^` prefixes.
    #[must_use]
    pub fn parent_prefixes(&self) -> usize {
        self.parent_prefixes
    }

    /// The name segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[NameSeg] {
        &self.segments
    }

    /// The final segment, if any.
    #[must_use]
    pub fn last_segment(&self) -> Option<NameSeg> {
        self.segments.last().copied()
    }

    /// Reads an AML NameString from `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::UnexpectedEnd`] on truncation and
    /// [`AmlError::InvalidNameString`] on malformed prefixes or segments.
    pub fn decode(stream: &mut AmlStream<'_>) -> Result<Self, AmlError> {
        let mut name = Self::default();
        match stream.peek_byte()? {
            ROOT_CHAR => {
                stream.read_byte()?;
                name.root = true;
            }
            PARENT_PREFIX_CHAR => {
                while stream.peek_byte()? == PARENT_PREFIX_CHAR {
                    stream.read_byte()?;
                    name.parent_prefixes += 1;
                }
            }
            _ => {}
        }

        let count = match stream.read_byte()? {
            NULL_NAME => 0,
            DUAL_NAME_PREFIX => 2,
            MULTI_NAME_PREFIX => usize::from(stream.read_byte()?),
            lead if is_lead_name_char(lead) => {
                let rest = stream.read_bytes(3)?;
                let seg = NameSeg([lead, rest[0], rest[1], rest[2]]);
                if !seg.is_valid() {
                    return Err(AmlError::InvalidNameString);
                }
                name.segments.try_reserve_exact(1)?;
                name.segments.push(seg);
                return Ok(name);
            }
            _ => return Err(AmlError::InvalidNameString),
        };

        name.segments.try_reserve_exact(count)?;
        for _ in 0..count {
            let seg = NameSeg::from_bytes(stream.read_bytes(4)?).ok_or(AmlError::UnexpectedEnd)?;
            if !seg.is_valid() {
                return Err(AmlError::InvalidNameString);
            }
            name.segments.push(seg);
        }
        Ok(name)
    }

    /// Decodes a complete AML NameString held in `bytes`.
    ///
    /// # Errors
    ///
    /// As [`NameString::decode`], plus [`AmlError::InvalidNameString`] if
    /// bytes remain after the name.
    pub fn from_aml(bytes: &[u8]) -> Result<Self, AmlError> {
        let mut stream = AmlStream::new(bytes);
        let name = Self::decode(&mut stream)?;
        if stream.is_empty() { Ok(name) } else { Err(AmlError::InvalidNameString) }
    }

    /// Parses ASL path text such as `\_SB.PCI0`, `^^FOO` or `_UID`.
    ///
    /// Segments shorter than four characters are padded with `_`. The empty
    /// string and a lone `\` or run of `^` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNameString`] for any syntax violation.
    pub fn from_asl(text: &str) -> Result<Self, AmlError> {
        let mut name = Self::default();
        let mut rest = text;
        if let Some(stripped) = rest.strip_prefix('\\') {
            name.root = true;
            rest = stripped;
        } else {
            while let Some(stripped) = rest.strip_prefix('^') {
                name.parent_prefixes += 1;
                rest = stripped;
            }
        }
        if rest.is_empty() {
            return Ok(name);
        }

        for part in rest.split('.') {
            let seg = NameSeg::from_asl(part)?;
            name.segments.try_reserve(1)?;
            name.segments.push(seg);
        }
        if name.segments.len() > usize::from(u8::MAX) {
            return Err(AmlError::InvalidNameString);
        }
        Ok(name)
    }

    /// Number of bytes [`NameString::encode`] produces.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let prefix = usize::from(self.root) + self.parent_prefixes;
        let body = match self.segments.len() {
            0 => 1,
            1 => 4,
            2 => 9,
            n => 2 + 4 * n,
        };
        prefix + body
    }

    /// Encodes the name in its canonical AML form.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidNameString`] for more than 255 segments and
    /// [`AmlError::OutOfResources`] if allocation fails.
    pub fn encode(&self) -> Result<Vec<u8>, AmlError> {
        let count = u8::try_from(self.segments.len()).map_err(|_| AmlError::InvalidNameString)?;
        let mut out = Vec::new();
        out.try_reserve_exact(self.encoded_len())?;
        if self.root {
            out.push(ROOT_CHAR);
        }
        out.extend(core::iter::repeat_n(PARENT_PREFIX_CHAR, self.parent_prefixes));
        match count {
            0 => out.push(NULL_NAME),
            1 => {}
            2 => out.push(DUAL_NAME_PREFIX),
            n => {
                out.push(MULTI_NAME_PREFIX);
                out.push(n);
            }
        }
        for seg in &self.segments {
            out.extend_from_slice(&seg.0);
        }
        Ok(out)
    }
}

impl fmt::Display for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.root {
            f.write_str("\\")?;
        }
        for _ in 0..self.parent_prefixes {
            f.write_str("^")?;
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameString(\"{self}\")")
    }
}

/// A fully resolved absolute namespace path.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct AmlPath {
    segments: Vec<NameSeg>,
}

impl AmlPath {
    /// The root path (`\`).
    pub const ROOT: Self = Self { segments: Vec::new() };

    /// Creates an empty path.
    #[must_use]
    pub const fn new() -> Self {
        Self::ROOT
    }

    /// Appends a name segment to the path.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn push(&mut self, seg: NameSeg) -> Result<(), AmlError> {
        self.segments.try_reserve(1)?;
        self.segments.push(seg);
        Ok(())
    }

    /// Removes and returns the last name segment from the path.
    pub fn pop(&mut self) -> Option<NameSeg> {
        self.segments.pop()
    }

    /// Returns the segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[NameSeg] {
        &self.segments
    }

    /// Returns the number of segments (depth) in this path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolves `name` with this path as the current scope.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidPath`] if the `^` prefixes climb above the
    /// root, or [`AmlError::OutOfResources`] if allocation fails.
    pub fn resolve(&self, name: &NameString) -> Result<Self, AmlError> {
        let mut resolved = Self::new();
        if !name.is_absolute() {
            let keep = self
                .depth()
                .checked_sub(name.parent_prefixes())
                .ok_or(AmlError::InvalidPath)?;
            resolved.segments.try_reserve_exact(keep + name.segments().len())?;
            resolved.segments.extend_from_slice(&self.segments[..keep]);
        }
        resolved.segments.try_reserve(name.segments().len())?;
        resolved.segments.extend_from_slice(name.segments());
        Ok(resolved)
    }

    /// Returns a copy of this path with `seg` appended.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if allocation fails.
    pub fn join(&self, seg: NameSeg) -> Result<Self, AmlError> {
        let mut joined = Self::new();
        joined.segments.try_reserve_exact(self.depth() + 1)?;
        joined.segments.extend_from_slice(&self.segments);
        joined.segments.push(seg);
        Ok(joined)
    }

    /// Returns the enclosing scope, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        parent.pop()?;
        Some(parent)
    }
}

impl fmt::Debug for AmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmlPath(\"{self}\")")
    }
}

impl fmt::Display for AmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\")?;
        for (i, seg) in self.segments().iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn asl_segments_are_padded() {
        assert_eq!(NameSeg::from_asl("_SB").unwrap(), NameSeg(*b"_SB_"));
        assert_eq!(NameSeg::from_asl("CPU0").unwrap(), NameSeg(*b"CPU0"));
        assert!(NameSeg::from_asl("cpu0").is_err());
        assert!(NameSeg::from_asl("0ABC").is_err());
        assert!(NameSeg::from_asl("ABCDE").is_err());
        assert!(NameSeg::from_asl("").is_err());
    }

    #[test]
    fn asl_path_syntax() {
        let name = NameString::from_asl("\\_SB.CLU0.CPU0").unwrap();
        assert!(name.is_absolute());
        assert_eq!(name.segments().len(), 3);
        assert_eq!(name.to_string(), "\\_SB_.CLU0.CPU0");

        let up = NameString::from_asl("^^FOO").unwrap();
        assert_eq!(up.parent_prefixes(), 2);
        assert_eq!(up.last_segment(), Some(NameSeg(*b"FOO_")));

        assert!(NameString::from_asl("\\").unwrap().segments().is_empty());
        assert!(NameString::from_asl("\\^A").is_err());
        assert!(NameString::from_asl("A..B").is_err());
        assert!(NameString::from_asl("A.").is_err());
    }

    #[test]
    fn aml_encodings() {
        let cases: [(&str, &[u8]); 5] = [
            ("_UID", b"_UID"),
            ("\\_SB.PCI0", b"\\\x2E_SB_PCI0"),
            ("\\_SB.PCI0.LPCB", b"\\\x2F\x03_SB_PCI0LPCB"),
            ("\\", b"\\\x00"),
            ("^^_CRS", b"^^_CRS"),
        ];
        for (asl, aml) in cases {
            let name = NameString::from_asl(asl).unwrap();
            assert_eq!(name.encode().unwrap(), aml, "{asl}");
            assert_eq!(name.encoded_len(), aml.len());
            assert_eq!(NameString::from_aml(aml).unwrap(), name);
        }
    }

    #[test]
    fn aml_rejects_garbage() {
        assert_eq!(NameString::from_aml(b"_SB"), Err(AmlError::UnexpectedEnd));
        assert_eq!(NameString::from_aml(b"1ABC"), Err(AmlError::InvalidNameString));
        assert_eq!(NameString::from_aml(b"_SB_X"), Err(AmlError::InvalidNameString));
        assert_eq!(NameString::from_aml(b"\x2E_SB_pci0"), Err(AmlError::InvalidNameString));
    }

    #[test]
    fn path_resolution() {
        let scope = AmlPath::ROOT.resolve(&NameString::from_asl("\\_SB.PCI0").unwrap()).unwrap();
        assert_eq!(scope.to_string(), "\\_SB_.PCI0");

        let rel = scope.resolve(&NameString::from_asl("^LPCB").unwrap()).unwrap();
        assert_eq!(rel.to_string(), "\\_SB_.LPCB");

        let abs = scope.resolve(&NameString::from_asl("\\_TZ").unwrap()).unwrap();
        assert_eq!(abs.to_string(), "\\_TZ_");

        assert_eq!(scope.resolve(&NameString::from_asl("^^^X").unwrap()), Err(AmlError::InvalidPath));
        assert_eq!(scope.parent().unwrap().to_string(), "\\_SB_");
        assert!(AmlPath::ROOT.parent().is_none());
        assert_eq!(AmlPath::ROOT.to_string(), "\\");
    }
}
