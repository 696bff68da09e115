//! Property tests for the archive-merge entry-set invariants.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use proptest::prelude::*;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use shutter::merge_libraries;

/// Base entry names: short relative paths that never collide with `libs/`.
fn base_entries() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let name = proptest::string::string_regex("src/[a-z]{1,8}\\.[a-z]{1,3}").unwrap();
    let bytes = proptest::collection::vec(any::<u8>(), 0..64);
    proptest::collection::btree_map(name, bytes, 0..8)
}

/// Library basenames plus whether the file exists on disk.
fn libraries() -> impl Strategy<Value = BTreeMap<String, (Vec<u8>, bool)>> {
    let name = proptest::string::string_regex("[a-z]{1,8}\\.jar").unwrap();
    let content = (proptest::collection::vec(any::<u8>(), 0..64), any::<bool>());
    proptest::collection::btree_map(name, content, 0..6)
}

fn write_zip(path: &Path, entries: &BTreeMap<String, Vec<u8>>) {
    let file = fs::File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        writer
            .start_file(name.clone(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn read_zip(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = fs::File::open(path).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        entries.insert(entry.name().to_string(), bytes);
    }
    entries
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: merging yields exactly `base ∪ {libs/name : on-disk}`,
    /// with base entries byte-identical afterward.
    #[test]
    fn property_merge_yields_union_and_preserves_base(
        base in base_entries(),
        libs in libraries(),
    ) {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("project-1.zip");
        write_zip(&archive, &base);

        let mut paths = Vec::new();
        let mut expected = base.clone();
        for (name, (bytes, exists)) in &libs {
            let path = dir.path().join(name);
            if *exists {
                fs::write(&path, bytes).unwrap();
                expected.insert(format!("libs/{name}"), bytes.clone());
            }
            paths.push(path);
        }

        merge_libraries(&archive, &paths).unwrap();

        prop_assert_eq!(read_zip(&archive), expected);
    }
}
