//! Box tree builder invariants and serialization layout.

use trimtone::{Atom, AtomContent};

// ── Size arithmetic ────────────────────────────────────────────────

#[test]
fn empty_leaf_size_is_header_only() {
    let atom = Atom::leaf(*b"free", Vec::new());
    assert_eq!(atom.size(), 8);
}

#[test]
fn versioned_leaf_adds_four_bytes() {
    let atom = Atom::full_leaf(*b"mvhd", 0, 0, Vec::new());
    assert_eq!(atom.size(), 12);
}

#[test]
fn leaf_size_counts_payload() {
    let atom = Atom::leaf(*b"ftyp", vec![0u8; 20]);
    assert_eq!(atom.size(), 28);
}

#[test]
fn container_size_is_header_plus_children() {
    let mut moov = Atom::container(*b"moov");
    moov.push_child(Atom::full_leaf(*b"mvhd", 0, 0, vec![0u8; 96]));
    moov.push_child(Atom::container(*b"trak"));
    assert_eq!(moov.size(), 8 + (12 + 96) + 8);
}

#[test]
fn size_reflects_mutations_before_serialization() {
    let mut stbl = Atom::container(*b"stbl");
    let before = stbl.size();
    stbl.push_child(Atom::full_leaf(*b"stco", 0, 0, vec![0u8; 8]));
    assert_eq!(stbl.size(), before + 20);

    // The serialized size field agrees with the recomputed size.
    let bytes = stbl.to_bytes();
    let declared = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    assert_eq!(declared, stbl.size());
    assert_eq!(bytes.len() as u32, declared);
}

// ── Leaf/container exclusivity ─────────────────────────────────────

#[test]
fn push_child_on_leaf_is_a_no_op() {
    let mut leaf = Atom::leaf(*b"data", vec![1, 2, 3]);
    leaf.push_child(Atom::container(*b"oops"));
    assert_eq!(leaf.size(), 11);
    assert_eq!(leaf.data(), Some(&[1, 2, 3][..]));
}

#[test]
fn set_data_on_container_is_a_no_op() {
    let mut container = Atom::container(*b"moov");
    container.push_child(Atom::leaf(*b"mvhd", vec![0u8; 4]));
    container.set_data(vec![9u8; 100]);
    assert!(container.data().is_none());
    assert_eq!(container.size(), 8 + 12);
    assert!(matches!(container.content(), AtomContent::Children(_)));
}

// ── Path lookup ────────────────────────────────────────────────────

fn sample_tree() -> Atom {
    let mut stbl = Atom::container(*b"stbl");
    stbl.push_child(Atom::full_leaf(*b"stco", 0, 0, vec![0u8; 8]));

    let mut minf = Atom::container(*b"minf");
    minf.push_child(stbl);

    let mut mdia = Atom::container(*b"mdia");
    mdia.push_child(minf);

    let mut trak = Atom::container(*b"trak");
    trak.push_child(mdia);

    let mut moov = Atom::container(*b"moov");
    moov.push_child(trak);
    moov
}

#[test]
fn find_resolves_dotted_paths() {
    let moov = sample_tree();
    let stco = moov.find("trak.mdia.minf.stbl.stco");
    assert!(stco.is_some());
    assert_eq!(stco.unwrap().tag(), *b"stco");
}

#[test]
fn find_returns_none_for_missing_segment() {
    let moov = sample_tree();
    assert!(moov.find("trak.mdia.minf.stbl.stsz").is_none());
    assert!(moov.find("mdia").is_none());
    assert!(Atom::leaf(*b"data", Vec::new()).find("any").is_none());
}

#[test]
fn find_mut_allows_payload_patching() {
    let mut moov = sample_tree();
    let data = moov
        .find_mut("trak.mdia.minf.stbl.stco")
        .and_then(|atom| atom.data_mut())
        .unwrap();
    let offset = data.len() - 4;
    data[offset..].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());

    let stco = moov.find("trak.mdia.minf.stbl.stco").unwrap();
    assert_eq!(&stco.data().unwrap()[4..], &0xDEAD_BEEFu32.to_be_bytes());
}

// ── Serialized layout ──────────────────────────────────────────────

#[test]
fn leaf_serializes_with_big_endian_size_and_tag() {
    let atom = Atom::leaf(*b"test", vec![1, 2, 3]);
    assert_eq!(
        atom.to_bytes(),
        vec![0, 0, 0, 11, b't', b'e', b's', b't', 1, 2, 3],
    );
}

#[test]
fn versioned_leaf_serializes_version_then_24_bit_flags() {
    let atom = Atom::full_leaf(*b"tkhd", 1, 0x0001_0203, Vec::new());
    assert_eq!(
        atom.to_bytes(),
        vec![0, 0, 0, 12, b't', b'k', b'h', b'd', 1, 0x01, 0x02, 0x03],
    );
}

#[test]
fn container_serializes_children_in_order() {
    let mut moov = Atom::container(*b"moov");
    moov.push_child(Atom::leaf(*b"aaaa", vec![0xAA]));
    moov.push_child(Atom::leaf(*b"bbbb", vec![0xBB]));

    let bytes = moov.to_bytes();
    assert_eq!(bytes.len(), 8 + 9 + 9);
    assert_eq!(&bytes[0..4], &26u32.to_be_bytes());
    assert_eq!(&bytes[4..8], b"moov");
    assert_eq!(&bytes[8..12], &9u32.to_be_bytes());
    assert_eq!(&bytes[12..16], b"aaaa");
    assert_eq!(bytes[16], 0xAA);
    assert_eq!(&bytes[21..25], b"bbbb");
    assert_eq!(bytes[25], 0xBB);
}
