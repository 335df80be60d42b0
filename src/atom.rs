//! MP4 box (atom) tree builder.
//!
//! MP4-family containers are trees of typed, size-prefixed binary records
//! ("boxes" in newer editions of ISO/IEC 14496, "atoms" historically).
//! [`Atom`] models
//! one node: a leaf carrying raw payload bytes, or a container carrying
//! child atoms — never both, enforced by [`AtomContent`] at the type level.
//! Sizes are recomputed on demand, so a serialized tree always reflects
//! every mutation made before [`Atom::to_bytes`].
//!
//! The generic builder keeps the size/offset arithmetic in one place
//! instead of duplicating it in every concrete box the header synthesizer
//! emits.
//!
//! # Example
//!
//! ```
//! use trimtone::Atom;
//!
//! let mut moov = Atom::container(*b"moov");
//! moov.push_child(Atom::full_leaf(*b"mvhd", 0, 0, vec![0; 100]));
//! assert_eq!(moov.size(), 8 + 12 + 100);
//! assert!(moov.find("mvhd").is_some());
//! ```

/// Payload of an [`Atom`]: raw bytes or child atoms, mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomContent {
    /// Leaf payload bytes.
    Data(Vec<u8>),
    /// Ordered child atoms.
    Children(Vec<Atom>),
}

/// One node of an MP4 box tree.
///
/// Serialized layout is `[size: u32 BE][tag: 4 ASCII bytes]` followed by an
/// optional `[version: u8][flags: 24-bit BE]` full-box header, followed by
/// the payload bytes or the concatenated child serializations. The size
/// field counts the node's own header plus its full subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    tag: [u8; 4],
    /// `Some((version, flags))` for full boxes; flags use the low 24 bits.
    version_flags: Option<(u8, u32)>,
    content: AtomContent,
}

impl Atom {
    /// Create a leaf atom holding `data`.
    pub fn leaf(tag: [u8; 4], data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            version_flags: None,
            content: AtomContent::Data(data.into()),
        }
    }

    /// Create a full-box leaf with a version byte and 24-bit flags.
    pub fn full_leaf(tag: [u8; 4], version: u8, flags: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            version_flags: Some((version, flags & 0x00FF_FFFF)),
            content: AtomContent::Data(data.into()),
        }
    }

    /// Create an empty container atom.
    pub fn container(tag: [u8; 4]) -> Self {
        Self {
            tag,
            version_flags: None,
            content: AtomContent::Children(Vec::new()),
        }
    }

    /// Create an empty full-box container with a version byte and 24-bit flags.
    pub fn full_container(tag: [u8; 4], version: u8, flags: u32) -> Self {
        Self {
            tag,
            version_flags: Some((version, flags & 0x00FF_FFFF)),
            content: AtomContent::Children(Vec::new()),
        }
    }

    /// The atom's 4-byte type tag.
    pub fn tag(&self) -> [u8; 4] {
        self.tag
    }

    /// The atom's type tag as a string, for path matching and diagnostics.
    pub fn tag_str(&self) -> &str {
        // Tags are 4 ASCII characters by construction.
        std::str::from_utf8(&self.tag).unwrap_or("????")
    }

    /// Append a child atom. No-ops when this atom is a leaf.
    pub fn push_child(&mut self, child: Atom) -> &mut Self {
        if let AtomContent::Children(children) = &mut self.content {
            children.push(child);
        }
        self
    }

    /// Replace the payload bytes. No-ops when this atom is a container.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        if let AtomContent::Data(existing) = &mut self.content {
            *existing = data.into();
        }
        self
    }

    /// Payload bytes, or `None` for containers.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.content {
            AtomContent::Data(data) => Some(data),
            AtomContent::Children(_) => None,
        }
    }

    /// Mutable payload bytes, or `None` for containers.
    pub fn data_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.content {
            AtomContent::Data(data) => Some(data),
            AtomContent::Children(_) => None,
        }
    }

    /// The atom's content.
    pub fn content(&self) -> &AtomContent {
        &self.content
    }

    /// Find a descendant by dotted tag path, e.g.
    /// `"trak.mdia.minf.stbl.stco"`. Resolves depth-first, taking the first
    /// matching child at each level; returns `None` when any segment is
    /// absent (or when `self` is a leaf).
    pub fn find(&self, path: &str) -> Option<&Atom> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let AtomContent::Children(children) = &self.content else {
            return None;
        };
        let child = children.iter().find(|child| child.tag_str() == head)?;
        match rest {
            Some(rest) => child.find(rest),
            None => Some(child),
        }
    }

    /// Mutable variant of [`find`](Atom::find).
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Atom> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let AtomContent::Children(children) = &mut self.content else {
            return None;
        };
        let child = children
            .iter_mut()
            .find(|child| child.tag_str() == head)?;
        match rest {
            Some(rest) => child.find_mut(rest),
            None => Some(child),
        }
    }

    /// The encoded size in bytes: own header plus the full subtree.
    pub fn size(&self) -> u32 {
        let mut size = 8u32;
        if self.version_flags.is_some() {
            size += 4;
        }
        match &self.content {
            AtomContent::Data(data) => size + data.len() as u32,
            AtomContent::Children(children) => {
                size + children.iter().map(Atom::size).sum::<u32>()
            }
        }
    }

    /// Serialize the atom and its descendants into a flat byte sequence.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size() as usize);
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.size().to_be_bytes());
        out.extend_from_slice(&self.tag);
        if let Some((version, flags)) = self.version_flags {
            out.push(version);
            out.extend_from_slice(&flags.to_be_bytes()[1..]);
        }
        match &self.content {
            AtomContent::Data(data) => out.extend_from_slice(data),
            AtomContent::Children(children) => {
                for child in children {
                    child.write_into(out);
                }
            }
        }
    }
}
