//! Tree behaviour through the public engine API

#![allow(clippy::expect_used, clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use warc_fs::{ArcError, ArcFileSystem, FilePointer};

fn with_content(fs: &mut ArcFileSystem, path: &str, data: &'static str) {
    let file = fs.create_file(path).unwrap();
    fs.set_pointer(file, FilePointer::from_bytes(data.as_bytes()).unwrap())
        .unwrap();
}

#[test]
fn test_create_directory_path_is_idempotent() {
    let mut fs = ArcFileSystem::new();
    let c = fs.create_directory("a/b/c").unwrap();

    let names: Vec<String> = fs
        .directories()
        .into_iter()
        .map(|d| fs.entry_name(d).unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    assert_eq!(fs.create_directory("a/b/c").unwrap(), c);
    assert_eq!(fs.create_directory("A\\B\\C").unwrap(), c);
    assert_eq!(fs.directories().len(), 3);
}

#[test]
fn test_cross_engine_move_leaves_both_trees() {
    let mut one = ArcFileSystem::new();
    let mut two = ArcFileSystem::new();
    with_content(&mut one, "dir/x.ks", "x");
    let file = one.get_file("dir/x.ks").unwrap();
    let dir = one.get_directory("dir").unwrap();
    let target = two.create_directory("target").unwrap();

    assert!(matches!(
        one.move_file(file, target),
        Err(ArcError::CrossFileSystem(_))
    ));
    assert!(matches!(
        one.move_directory(dir, target),
        Err(ArcError::CrossFileSystem(_))
    ));
    assert!(matches!(
        two.merge_move(dir, target),
        Err(ArcError::CrossFileSystem(_))
    ));

    assert!(one.file_exists("dir/x.ks"));
    assert_eq!(one.files().len(), 1);
    assert_eq!(two.file_count(target).unwrap(), 0);
    assert_eq!(two.directory_count(target).unwrap(), 0);
}

#[test]
fn test_delete_non_empty_directory() {
    let mut fs = ArcFileSystem::new();
    with_content(&mut fs, "dir/only.ks", "x");
    let dir = fs.get_directory("dir").unwrap();
    let file = fs.get_file("dir/only.ks").unwrap();

    assert!(matches!(
        fs.delete_directory(dir, false),
        Err(ArcError::InvalidOperation(_))
    ));
    assert!(fs.has_entry(file));

    fs.delete_directory(dir, true).unwrap();
    assert!(!fs.has_entry(dir));
    assert!(!fs.has_entry(file));
    assert!(!fs.file_exists("dir/only.ks"));
}

#[test]
fn test_merge_copy_versus_merge_move() {
    let mut fs = ArcFileSystem::new();
    with_content(&mut fs, "src/a.ks", "a");
    with_content(&mut fs, "src/nested/b.ks", "b");
    let src = fs.get_directory("src").unwrap();
    let copy_target = fs.create_directory("copied").unwrap();
    let move_target = fs.create_directory("moved").unwrap();

    fs.merge_copy(src, copy_target).unwrap();
    assert!(fs.file_exists("copied/a.ks"));
    assert!(fs.file_exists("copied/nested/b.ks"));
    assert!(fs.file_exists("src/a.ks"));
    assert!(fs.file_exists("src/nested/b.ks"));

    fs.merge_move(src, move_target).unwrap();
    assert!(fs.file_exists("moved/a.ks"));
    assert!(fs.file_exists("moved/nested/b.ks"));
    assert!(!fs.directory_exists("src"));
    assert!(!fs.has_entry(src));

    // copies share content with what was moved
    let copied = fs.pointer(fs.get_file("copied/a.ks").unwrap()).unwrap();
    let moved = fs.pointer(fs.get_file("moved/a.ks").unwrap()).unwrap();
    assert!(Arc::ptr_eq(&copied, &moved));
}

#[test]
fn test_merge_copy_between_engines() {
    let mut source = ArcFileSystem::with_name("source");
    with_content(&mut source, "a.ks", "from source");
    let mut target = ArcFileSystem::with_name("target");
    with_content(&mut target, "a.ks", "old");
    let root = target.root();

    target.merge_copy_from(&source, source.root(), root).unwrap();
    let file = target.get_file("a.ks").unwrap();
    assert_eq!(target.read_file(file).unwrap(), &b"from source"[..]);
    assert_eq!(target.files().len(), 1);
    assert!(source.file_exists("a.ks"));
}

#[test]
fn test_rename_does_not_check_collisions() {
    let mut fs = ArcFileSystem::new();
    with_content(&mut fs, "dir/first.ks", "1");
    with_content(&mut fs, "dir/second.ks", "2");
    let second = fs.get_file("dir/second.ks").unwrap();

    fs.rename(second, "FIRST.ks").unwrap();

    let dir = fs.get_directory("dir").unwrap();
    assert_eq!(fs.file_count(dir).unwrap(), 2);
    let found = fs.get_file("dir/first.ks").unwrap();
    assert_ne!(found, second);
    assert_eq!(fs.read_file(found).unwrap(), &b"1"[..]);
}

#[test]
fn test_name_hash_and_unique_id() {
    let mut fs = ArcFileSystem::new();
    let lower = fs.create_file("dir/file.ks").unwrap();
    let upper = fs.create_file("DIR2/FILE.KS").unwrap();

    assert_eq!(
        fs.name_hash(lower).unwrap(),
        fs.name_hash(upper).unwrap()
    );
    assert_eq!(
        fs.unique_id(lower).unwrap(),
        warc_hash::unique_id(&fs.full_name(lower).unwrap())
    );
    assert_ne!(fs.unique_id(lower).unwrap(), fs.unique_id(upper).unwrap());
}

#[test]
fn test_disposed_content_fails() {
    let mut fs = ArcFileSystem::new();
    with_content(&mut fs, "a.ks", "gone soon");
    let file = fs.get_file("a.ks").unwrap();

    fs.pointer(file).unwrap().dispose();
    assert!(matches!(fs.read_file(file), Err(ArcError::Disposed)));

    let mut out = std::io::Cursor::new(Vec::new());
    assert!(matches!(fs.save(&mut out), Err(ArcError::Disposed)));
}

#[test]
fn test_clean_file_name() {
    assert_eq!(ArcFileSystem::clean_file_name("a|b<c>.ks"), "abc.ks");
    assert_eq!(ArcFileSystem::clean_file_name("plain.ks"), "plain.ks");
}

proptest! {
    #[test]
    fn prop_created_paths_resolve(segments in proptest::collection::vec("[a-zA-Z0-9_]{1,8}", 1..5)) {
        let mut fs = ArcFileSystem::new();
        let path = segments.join("/");
        let dir = fs.create_directory(&path).unwrap();

        prop_assert_eq!(fs.get_directory(&path.to_uppercase()).unwrap(), dir);
        prop_assert_eq!(fs.depth(dir).unwrap(), segments.len());
        prop_assert!(fs.directories().len() <= segments.len());
    }

    #[test]
    fn prop_delete_removes_whole_subtree(files in proptest::collection::vec("[a-z]{1,3}/[a-z]{1,3}\\.ks", 1..10)) {
        let mut fs = ArcFileSystem::new();
        let top = fs.create_directory("top").unwrap();
        for file in &files {
            fs.create_file_in(file, top).unwrap();
        }
        fs.delete_directory(top, true).unwrap();

        prop_assert!(fs.files().is_empty());
        prop_assert!(fs.directories().is_empty());
    }
}
