//! Pack, save and reload through real files

#![allow(clippy::expect_used, clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use warc_fs::{ArcError, ArcFileSystem, ArcFormatError, FilePointer};

/// Relative path (with `/`) to decompressed content for every file
fn contents(fs: &ArcFileSystem) -> BTreeMap<String, Vec<u8>> {
    fs.files()
        .into_iter()
        .map(|file| {
            let path = fs.relative_path(file).unwrap();
            let key = path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (key, fs.read_file(file).unwrap().to_vec())
        })
        .collect()
}

fn populate(dir: &Path) {
    std::fs::create_dir_all(dir.join("script/sub")).unwrap();
    std::fs::create_dir_all(dir.join("texture")).unwrap();
    std::fs::write(
        dir.join("script/start.ks"),
        b"@jump target=*main\n".repeat(50),
    )
    .unwrap();
    std::fs::write(dir.join("script/sub/Event.KS"), b"; event").unwrap();
    std::fs::write(dir.join("script/empty.ks"), b"").unwrap();
    std::fs::write(dir.join("texture/body.tex"), [0u8, 1, 2, 3, 255, 254]).unwrap();
    std::fs::write(dir.join("readme.txt"), b"not compressed").unwrap();
}

fn with_text(fs: &mut ArcFileSystem, path: &str, data: &'static str) {
    let file = fs.create_file(path).unwrap();
    fs.set_pointer(file, FilePointer::from_bytes(data.as_bytes()).unwrap())
        .unwrap();
}

fn pack(name: &str, files: &[(&str, &'static str)], path: &Path) {
    let mut fs = ArcFileSystem::with_name(name);
    for &(file_path, data) in files {
        with_text(&mut fs, file_path, data);
    }
    fs.save_to_path(path).unwrap();
}

#[test]
fn test_directory_round_trip() {
    let work = TempDir::new().unwrap();
    let source = work.path().join("source");
    populate(&source);

    let mut packed = ArcFileSystem::with_name("script");
    assert_eq!(packed.load_directory(&source).unwrap(), 5);
    let arc = work.path().join("script.arc");
    packed.save_to_path(&arc).unwrap();
    assert!(ArcFileSystem::detect_magic(&arc).unwrap());

    let mut loaded = ArcFileSystem::new();
    loaded.load_arc(&arc).unwrap();
    assert_eq!(contents(&loaded), contents(&packed));
    assert_eq!(contents(&loaded).len(), 5);

    let start = loaded.get_file("script/start.ks").unwrap();
    assert!(loaded.pointer(start).unwrap().compressed().unwrap());
    let readme = loaded.get_file("readme.txt").unwrap();
    assert!(!loaded.pointer(readme).unwrap().compressed().unwrap());
    let event = loaded.get_file("script/sub/event.ks").unwrap();
    assert_eq!(loaded.entry_name(event).unwrap(), "Event.KS");
}

#[test]
fn test_reloaded_archive_saves_again() {
    let work = TempDir::new().unwrap();
    let first = work.path().join("first.arc");
    let second = work.path().join("second.arc");
    pack(
        "menu",
        &[("a.menu", "menu menu menu"), ("dir/b.bin", "\u{0}\u{1}")],
        &first,
    );

    let mut loaded = ArcFileSystem::new();
    loaded.load_arc(&first).unwrap();
    loaded.save_to_path(&second).unwrap();

    let mut again = ArcFileSystem::new();
    again.load_arc(&second).unwrap();
    assert_eq!(contents(&again), contents(&loaded));
    assert_eq!(again.name(), "menu");
}

#[test]
fn test_name_derived_from_archive() {
    let work = TempDir::new().unwrap();
    let arc = work.path().join("named.arc");
    pack("bg", &[("x.ks", "x")], &arc);

    let mut derived = ArcFileSystem::new();
    assert!(!derived.is_name_set());
    derived.load_arc(&arc).unwrap();
    assert_eq!(derived.name(), "bg");
    assert_eq!(derived.full_name(derived.root()).unwrap(), "CM3D2ToolKit:\\\\bg");

    let mut fixed = ArcFileSystem::with_name("kept");
    fixed.load_arc(&arc).unwrap();
    assert_eq!(fixed.name(), "kept");
}

#[test]
fn test_load_into_subdirectory() {
    let work = TempDir::new().unwrap();
    let arc = work.path().join("sub.arc");
    pack("sub", &[("a/b.ks", "b")], &arc);

    let mut fs = ArcFileSystem::with_name("outer");
    let target = fs.create_directory("nested").unwrap();
    fs.load_arc_into(&arc, target).unwrap();
    let file = fs.get_file("nested/a/b.ks").unwrap();
    assert_eq!(fs.read_file(file).unwrap(), &b"b"[..]);
}

#[test]
fn test_merge_later_archive_wins() {
    let work = TempDir::new().unwrap();
    let a = work.path().join("a.arc");
    let b = work.path().join("b.arc");
    pack("a", &[("x.ks", "aaa"), ("only_a.ks", "a")], &a);
    pack("b", &[("x.ks", "bbb")], &b);

    let mut merged = ArcFileSystem::new();
    merged.merge_arc(&a).unwrap();
    merged.merge_arc(&b).unwrap();
    assert!(merged.directories().is_empty());

    let out = work.path().join("merged.arc");
    merged.save_to_path(&out).unwrap();

    let mut reloaded = ArcFileSystem::new();
    reloaded.load_arc(&out).unwrap();
    let files = contents(&reloaded);
    assert_eq!(files.len(), 2);
    assert_eq!(files["x.ks"], b"bbb");
    assert_eq!(files["only_a.ks"], b"a");
    assert_eq!(reloaded.name(), "a");
}

#[test]
fn test_merge_through_staging_directory() {
    let work = TempDir::new().unwrap();
    let a = work.path().join("a.arc");
    let b = work.path().join("b.arc");
    pack("a", &[("x.ks", "aaa")], &a);
    pack("b", &[("x.ks", "bbb")], &b);

    let mut fs = ArcFileSystem::new();
    let root = fs.root();
    for path in [&a, &b] {
        let staging = fs.create_directory("loaded").unwrap();
        fs.load_arc_into(path, staging).unwrap();
        fs.merge_move(staging, root).unwrap();
        assert!(!fs.has_entry(staging));
    }
    let file = fs.get_file("x.ks").unwrap();
    assert_eq!(fs.read_file(file).unwrap(), &b"bbb"[..]);
}

#[test]
fn test_corrupt_checksum_rejected() {
    let work = TempDir::new().unwrap();
    let arc = work.path().join("single.arc");
    pack("single", &[("x.ks", "content")], &arc);

    // footer: utf16 block, then utf8 block whose first file hash follows
    // the 12-byte block header and the 32-byte table header
    let mut bytes = std::fs::read(&arc).unwrap();
    let footer = 28 + i64::from_le_bytes(bytes[20..28].try_into().unwrap()) as usize;
    let utf16_size =
        i64::from_le_bytes(bytes[footer + 4..footer + 12].try_into().unwrap()) as usize;
    let utf8_hash = footer + 12 + utf16_size + 12 + 32;
    bytes[utf8_hash] ^= 0xFF;
    std::fs::write(&arc, &bytes).unwrap();

    let mut fs = ArcFileSystem::new();
    fs.create_file("existing.ks").unwrap();
    assert!(matches!(
        fs.load_arc(&arc),
        Err(ArcError::Format(ArcFormatError::ChecksumMismatch { .. }))
    ));
    assert_eq!(fs.files().len(), 1);
    assert!(!fs.is_name_set());
}

#[test]
fn test_truncated_archive_leaves_tree_unchanged() {
    let work = TempDir::new().unwrap();
    let arc = work.path().join("cut.arc");
    pack("cut", &[("x.ks", "x"), ("d/y.ks", "y")], &arc);
    let bytes = std::fs::read(&arc).unwrap();
    std::fs::write(&arc, &bytes[..bytes.len() - 10]).unwrap();

    let mut fs = ArcFileSystem::new();
    assert!(matches!(fs.load_arc(&arc), Err(ArcError::Format(_))));
    assert!(fs.files().is_empty());
    assert!(fs.directories().is_empty());

    assert!(fs.merge_arc(&arc).is_err());
    assert!(fs.directories().is_empty());
}

#[test]
fn test_not_an_archive() {
    let work = TempDir::new().unwrap();
    let path = work.path().join("plain.txt");
    std::fs::write(&path, b"just some text that is long enough").unwrap();
    assert!(!ArcFileSystem::detect_magic(&path).unwrap());

    let mut fs = ArcFileSystem::new();
    assert!(matches!(
        fs.load_arc(&path),
        Err(ArcError::Format(ArcFormatError::InvalidMagic))
    ));
}

#[test]
fn test_uncompressed_name_table_loads() {
    let work = TempDir::new().unwrap();
    let arc = work.path().join("raw.arc");
    let mut fs = ArcFileSystem::with_name("raw");
    fs.set_compress_name_table(false);
    fs.compress_list_mut().clear();
    let file = fs.create_file("a.ks").unwrap();
    fs.set_pointer(file, FilePointer::from_bytes(&b"plain"[..]).unwrap())
        .unwrap();
    fs.save_to_path(&arc).unwrap();

    let mut loaded = ArcFileSystem::new();
    loaded.load_arc(&arc).unwrap();
    let file = loaded.get_file("a.ks").unwrap();
    assert!(!loaded.pointer(file).unwrap().compressed().unwrap());
    assert_eq!(loaded.read_file(file).unwrap(), &b"plain"[..]);
}

#[test]
fn test_extract_round_trip() {
    let work = TempDir::new().unwrap();
    let source = work.path().join("source");
    populate(&source);

    let mut packed = ArcFileSystem::with_name("x");
    packed.load_directory(&source).unwrap();
    let arc = work.path().join("x.arc");
    packed.save_to_path(&arc).unwrap();

    let mut loaded = ArcFileSystem::new();
    loaded.load_arc(&arc).unwrap();
    let out = work.path().join("out");
    assert_eq!(loaded.extract_to(&out).unwrap(), 5);

    for rel in [
        "script/start.ks",
        "script/sub/Event.KS",
        "script/empty.ks",
        "texture/body.tex",
        "readme.txt",
    ] {
        assert_eq!(
            std::fs::read(out.join(rel)).unwrap(),
            std::fs::read(source.join(rel)).unwrap(),
            "{rel}"
        );
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_source_leaves_tree_unchanged() {
    let work = TempDir::new().unwrap();
    let source = work.path().join("source");
    populate(&source);
    // sorts after every regular entry and is not a regular file
    std::os::unix::fs::symlink("/dev/null", source.join("zz_device")).unwrap();

    let mut fs = ArcFileSystem::with_name("kept");
    fs.create_file("existing.ks").unwrap();
    assert!(matches!(
        fs.load_directory(&source),
        Err(ArcError::NotFound(_))
    ));
    assert_eq!(fs.files().len(), 1);
    assert!(fs.directories().is_empty());
    assert!(!fs.file_exists("readme.txt"));
}

#[test]
fn test_empty_compressed_entry_round_trip() {
    let work = TempDir::new().unwrap();
    let first = work.path().join("empty.arc");
    let second = work.path().join("again.arc");

    let mut fs = ArcFileSystem::with_name("empty");
    let file = fs.create_file("blank.ks").unwrap();
    fs.set_pointer(file, FilePointer::empty_compressed()).unwrap();
    with_text(&mut fs, "after.ks", "after");
    fs.save_to_path(&first).unwrap();

    let mut loaded = ArcFileSystem::new();
    loaded.load_arc(&first).unwrap();
    let blank = loaded.get_file("blank.ks").unwrap();
    let pointer = loaded.pointer(blank).unwrap();
    assert!(pointer.compressed().unwrap());
    assert_eq!(pointer.size().unwrap(), 0);
    assert_eq!(pointer.raw_size().unwrap(), 0);
    assert!(loaded.read_file(blank).unwrap().is_empty());
    let after = loaded.get_file("after.ks").unwrap();
    assert_eq!(loaded.read_file(after).unwrap(), &b"after"[..]);

    loaded.save_to_path(&second).unwrap();
    let mut again = ArcFileSystem::new();
    again.load_arc(&second).unwrap();
    assert_eq!(contents(&again), contents(&loaded));
}
