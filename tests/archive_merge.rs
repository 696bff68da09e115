//! Merge behavior against archives produced by the real exporter.

mod common;

use std::fs;

use common::{zip_entries, TestWorkspace};
use shutter::{merge_libraries, ProjectArchiver, ZipExporter};

#[test]
fn merge_preserves_base_entries_byte_identically() {
    let ws = TestWorkspace::new();
    let project = ws.add_project("app");
    fs::write(project.join("src").join("lib.rs"), "pub mod parser;\n").unwrap();

    let archive = ws.path().join("app-1.zip");
    ZipExporter::new().build(&project, "app", &archive).unwrap();
    let before = zip_entries(&archive);

    let jar = ws.path().join("native.so");
    fs::write(&jar, vec![7u8; 100_000]).unwrap();

    merge_libraries(&archive, &[jar]).unwrap();

    let after = zip_entries(&archive);
    let (libs, base): (Vec<_>, Vec<_>) = after
        .into_iter()
        .partition(|(name, _)| name.starts_with("libs/"));

    assert_eq!(base, before);
    assert_eq!(libs.len(), 1);
    assert_eq!(libs[0].0, "libs/native.so");
    assert_eq!(libs[0].1, vec![7u8; 100_000]);
}

#[test]
fn merged_entry_set_is_exactly_the_union() {
    let ws = TestWorkspace::new();
    let project = ws.add_project("app");

    let archive = ws.path().join("app-1.zip");
    ZipExporter::new().build(&project, "app", &archive).unwrap();

    let present = ws.path().join("a.jar");
    fs::write(&present, b"a").unwrap();
    let missing = ws.path().join("b.jar");

    merge_libraries(&archive, &[present, missing]).unwrap();

    let names: Vec<String> = zip_entries(&archive).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["app/README.md", "app/src/main.rs", "libs/a.jar"]
    );
}

#[test]
fn repeated_merges_accumulate_renamed_entries() {
    let ws = TestWorkspace::new();
    let project = ws.add_project("app");

    let archive = ws.path().join("app-1.zip");
    ZipExporter::new().build(&project, "app", &archive).unwrap();

    let jar = ws.path().join("util.jar");
    fs::write(&jar, b"v1").unwrap();
    merge_libraries(&archive, &[&jar]).unwrap();

    fs::write(&jar, b"v2").unwrap();
    merge_libraries(&archive, &[&jar]).unwrap();

    let entries = zip_entries(&archive);
    let libs: Vec<_> = entries
        .iter()
        .filter(|(name, _)| name.starts_with("libs/"))
        .collect();
    assert_eq!(libs.len(), 2);
    assert_eq!(libs[0].0, "libs/util-1.jar");
    assert_eq!(libs[0].1, b"v2");
    assert_eq!(libs[1].0, "libs/util.jar");
    assert_eq!(libs[1].1, b"v1");
}
