//! Arena-backed directory tree
//!
//! Nodes live in an append-only arena. Slot 0 is the root. Deleted nodes
//! leave an empty slot behind so stale handles can never alias a newer
//! entry. Live slots in index order form the flat registry of all entries,
//! which is also the order file content is written on save.

use crate::config::{ArcConfig, CompressList, DEFAULT_COMPRESS_PATTERNS};
use crate::entry::{DirId, EntryId, FileId, Node, NodeKind, next_filesystem_id};
use crate::pointer::FilePointer;
use crate::{ArcError, DEFAULT_NAME, Result, SEPARATOR, root_name};
use bytes::Bytes;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warc_hash::NameHash;

pub(crate) const ROOT: u32 = 0;

/// In-memory ARC directory tree
#[derive(Debug)]
pub struct ArcFileSystem {
    id: u64,
    name: String,
    name_set: bool,
    nodes: Vec<Option<Node>>,
    pub(crate) compress_list: CompressList,
    pub(crate) compress_name_table: bool,
}

impl Default for ArcFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ArcFileSystem {
    /// Empty filesystem named after the first archive it loads
    pub fn new() -> Self {
        let compress_list = CompressList::new(DEFAULT_COMPRESS_PATTERNS).unwrap_or_else(|e| {
            warn!("Default compress patterns rejected: {e}");
            CompressList::default()
        });
        Self::build(compress_list, true)
    }

    /// Empty filesystem with a fixed display name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut fs = Self::new();
        fs.set_name(name);
        fs
    }

    /// Empty filesystem from a configuration
    pub fn with_config(config: ArcConfig) -> Result<Self> {
        let compress_list = CompressList::new(config.compress_patterns)?;
        let mut fs = Self::build(compress_list, config.compress_name_table);
        if let Some(name) = config.name {
            fs.set_name(name);
        }
        Ok(fs)
    }

    fn build(compress_list: CompressList, compress_name_table: bool) -> Self {
        Self {
            id: next_filesystem_id(),
            name: DEFAULT_NAME.to_string(),
            name_set: false,
            nodes: vec![Some(Node::directory(&root_name(DEFAULT_NAME), None))],
            compress_list,
            compress_name_table,
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the display name was set explicitly or taken from an archive
    pub const fn is_name_set(&self) -> bool {
        self.name_set
    }

    /// Set the display name; the root directory is renamed to match
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if let Some(Some(root)) = self.nodes.get_mut(ROOT as usize) {
            root.set_name(&root_name(&name));
        }
        self.name = name;
        self.name_set = true;
    }

    /// Root directory
    pub const fn root(&self) -> DirId {
        DirId {
            fs: self.id,
            index: ROOT,
        }
    }

    /// Current configuration
    pub fn config(&self) -> ArcConfig {
        ArcConfig {
            name: self.name_set.then(|| self.name.clone()),
            compress_patterns: self.compress_list.patterns().to_vec(),
            compress_name_table: self.compress_name_table,
        }
    }

    /// Globs selecting files to compress on save
    pub const fn compress_list(&self) -> &CompressList {
        &self.compress_list
    }

    /// Mutable access to the compress globs
    pub fn compress_list_mut(&mut self) -> &mut CompressList {
        &mut self.compress_list
    }

    /// Enable or disable name table compression on save
    pub fn set_compress_name_table(&mut self, enable: bool) {
        self.compress_name_table = enable;
    }

    // ---------------------------------------------------------------------
    // Arena access
    // ---------------------------------------------------------------------

    pub(crate) fn node(&self, index: u32) -> Option<&Node> {
        self.nodes.get(index as usize).and_then(Option::as_ref)
    }

    pub(crate) fn live(&self, index: u32) -> Result<&Node> {
        self.node(index)
            .ok_or_else(|| ArcError::NotFound(format!("entry #{index} no longer exists")))
    }

    fn live_mut(&mut self, index: u32) -> Result<&mut Node> {
        self.nodes
            .get_mut(index as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| ArcError::NotFound(format!("entry #{index} no longer exists")))
    }

    pub(crate) const fn dir_id(&self, index: u32) -> DirId {
        DirId { fs: self.id, index }
    }

    pub(crate) const fn file_id(&self, index: u32) -> FileId {
        FileId { fs: self.id, index }
    }

    fn check_owner(&self, fs: u64, what: &str) -> Result<()> {
        if fs == self.id {
            Ok(())
        } else {
            Err(ArcError::CrossFileSystem(format!(
                "{what} belongs to filesystem {fs}, not {}",
                self.id
            )))
        }
    }

    pub(crate) fn dir_index(&self, id: DirId) -> Result<u32> {
        self.check_owner(id.fs, "directory")?;
        match self.node(id.index) {
            Some(node) if node.is_directory() => Ok(id.index),
            _ => Err(ArcError::NotFound(format!(
                "directory #{} no longer exists",
                id.index
            ))),
        }
    }

    pub(crate) fn file_index(&self, id: FileId) -> Result<u32> {
        self.check_owner(id.fs, "file")?;
        match self.node(id.index) {
            Some(node) if !node.is_directory() => Ok(id.index),
            _ => Err(ArcError::NotFound(format!(
                "file #{} no longer exists",
                id.index
            ))),
        }
    }

    pub(crate) fn entry_index(&self, id: EntryId) -> Result<u32> {
        match id {
            EntryId::Directory(dir) => self.dir_index(dir),
            EntryId::File(file) => self.file_index(file),
        }
    }

    pub(crate) fn children(&self, index: u32) -> Result<(&[u32], &[u32])> {
        match &self.live(index)?.kind {
            NodeKind::Directory { dirs, files } => Ok((dirs, files)),
            NodeKind::File { .. } => Err(ArcError::InvalidOperation(format!(
                "entry #{index} is not a directory"
            ))),
        }
    }

    fn children_mut(&mut self, index: u32) -> Result<(&mut Vec<u32>, &mut Vec<u32>)> {
        match &mut self.live_mut(index)?.kind {
            NodeKind::Directory { dirs, files } => Ok((dirs, files)),
            NodeKind::File { .. } => Err(ArcError::InvalidOperation(format!(
                "entry #{index} is not a directory"
            ))),
        }
    }

    pub(crate) fn file_pointer(&self, index: u32) -> Result<&Arc<FilePointer>> {
        match &self.live(index)?.kind {
            NodeKind::File { pointer } => Ok(pointer),
            NodeKind::Directory { .. } => Err(ArcError::InvalidOperation(format!(
                "entry #{index} is not a file"
            ))),
        }
    }

    pub(crate) fn set_file_pointer(&mut self, index: u32, new: Arc<FilePointer>) -> Result<()> {
        match &mut self.live_mut(index)?.kind {
            NodeKind::File { pointer } => {
                *pointer = new;
                Ok(())
            }
            NodeKind::Directory { .. } => Err(ArcError::InvalidOperation(format!(
                "entry #{index} is not a file"
            ))),
        }
    }

    /// Live arena slots in creation order
    pub(crate) fn live_indices(&self) -> impl Iterator<Item = (u32, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|node| (i as u32, node)))
    }

    pub(crate) fn find_child_dir(&self, parent: u32, hash: u64) -> Result<Option<u32>> {
        let (dirs, _) = self.children(parent)?;
        Ok(dirs
            .iter()
            .copied()
            .find(|&i| self.node(i).is_some_and(|n| n.hash().utf16 == hash)))
    }

    pub(crate) fn find_child_file(&self, parent: u32, hash: u64) -> Result<Option<u32>> {
        let (_, files) = self.children(parent)?;
        Ok(files
            .iter()
            .copied()
            .find(|&i| self.node(i).is_some_and(|n| n.hash().utf16 == hash)))
    }

    pub(crate) fn insert_dir(&mut self, name: &str, parent: u32) -> Result<u32> {
        self.children(parent)?;
        let index = self.nodes.len() as u32;
        self.nodes.push(Some(Node::directory(name, Some(parent))));
        self.children_mut(parent)?.0.push(index);
        Ok(index)
    }

    pub(crate) fn insert_file(
        &mut self,
        name: &str,
        parent: u32,
        pointer: Arc<FilePointer>,
    ) -> Result<u32> {
        self.children(parent)?;
        let index = self.nodes.len() as u32;
        self.nodes.push(Some(Node::file(name, parent, pointer)));
        self.children_mut(parent)?.1.push(index);
        Ok(index)
    }

    pub(crate) fn rename_node(&mut self, index: u32, name: &str) -> Result<()> {
        self.live_mut(index)?.set_name(name);
        Ok(())
    }

    /// Unlink a node from its parent's child list
    pub(crate) fn detach(&mut self, index: u32) -> Result<()> {
        let node = self.live(index)?;
        let is_dir = node.is_directory();
        if let Some(parent) = node.parent {
            let (dirs, files) = self.children_mut(parent)?;
            let list = if is_dir { dirs } else { files };
            if let Some(pos) = list.iter().position(|&i| i == index) {
                list.remove(pos);
            }
        }
        self.live_mut(index)?.parent = None;
        Ok(())
    }

    /// Link a detached node under `parent`
    pub(crate) fn attach(&mut self, index: u32, parent: u32) -> Result<()> {
        let is_dir = self.live(index)?.is_directory();
        let (dirs, files) = self.children_mut(parent)?;
        if is_dir {
            dirs.push(index);
        } else {
            files.push(index);
        }
        self.live_mut(index)?.parent = Some(parent);
        Ok(())
    }

    pub(crate) fn remove_file(&mut self, index: u32) -> Result<()> {
        self.detach(index)?;
        self.nodes[index as usize] = None;
        Ok(())
    }

    pub(crate) fn remove_dir(&mut self, index: u32, recursive: bool) -> Result<()> {
        if index == ROOT {
            return Err(ArcError::InvalidOperation(
                "cannot delete the root directory".to_string(),
            ));
        }

        let (dirs, files) = self.children(index)?;
        if !recursive && !(dirs.is_empty() && files.is_empty()) {
            return Err(ArcError::InvalidOperation(format!(
                "directory {} is not empty",
                self.display_index(index)
            )));
        }

        self.remove_children(index)?;
        self.detach(index)?;
        self.nodes[index as usize] = None;
        Ok(())
    }

    fn remove_children(&mut self, index: u32) -> Result<()> {
        let (dirs, files) = self.children(index)?;
        let (dirs, files) = (dirs.to_vec(), files.to_vec());
        for dir in dirs {
            self.remove_dir(dir, true)?;
        }
        for file in files {
            self.remove_file(file)?;
        }
        Ok(())
    }

    /// Whether `index` is `ancestor` or lies below it
    pub(crate) fn is_within(&self, index: u32, ancestor: u32) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.node(i).and_then(|n| n.parent);
        }
        false
    }

    pub(crate) fn get_or_create_dir(&mut self, parent: u32, name: &str) -> Result<u32> {
        match self.find_child_dir(parent, NameHash::of(name).utf16)? {
            Some(existing) => Ok(existing),
            None => self.insert_dir(name, parent),
        }
    }

    pub(crate) fn get_or_create_file(&mut self, parent: u32, name: &str) -> Result<u32> {
        match self.find_child_file(parent, NameHash::of(name).utf16)? {
            Some(existing) => Ok(existing),
            None => self.insert_file(name, parent, FilePointer::empty()),
        }
    }

    pub(crate) fn full_name_of(&self, index: u32) -> Result<String> {
        let mut parts = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = self.live(i)?;
            parts.push(node.name());
            current = node.parent;
        }
        parts.reverse();
        Ok(parts.join(SEPARATOR.to_string().as_str()))
    }

    pub(crate) fn display_index(&self, index: u32) -> String {
        self.full_name_of(index)
            .map_or_else(|_| format!("<entry #{index}>"), |name| format!("\"{name}\""))
    }

    // ---------------------------------------------------------------------
    // Path resolution
    // ---------------------------------------------------------------------

    fn split_path(path: &str) -> Result<(Vec<&str>, &str)> {
        let mut segments: Vec<&str> = path
            .split(['/', SEPARATOR])
            .filter(|s| !s.is_empty())
            .collect();
        match segments.pop() {
            Some("." | "..") | None => Err(ArcError::InvalidPath(format!(
                "'{path}' does not name an entry"
            ))),
            Some(last) => Ok((segments, last)),
        }
    }

    fn walk(&self, start: u32, segments: &[&str]) -> Result<u32> {
        let mut current = start;
        for &segment in segments {
            current = match segment {
                "." => current,
                ".." => self.live(current)?.parent.ok_or_else(|| {
                    ArcError::InvalidPath("'..' leads above the root".to_string())
                })?,
                name => self
                    .find_child_dir(current, NameHash::of(name).utf16)?
                    .ok_or_else(|| ArcError::NotFound(format!("directory '{name}'")))?,
            };
        }
        Ok(current)
    }

    fn walk_create(&mut self, start: u32, segments: &[&str]) -> Result<u32> {
        let mut current = start;
        for &segment in segments {
            current = match segment {
                "." => current,
                ".." => self.live(current)?.parent.ok_or_else(|| {
                    ArcError::InvalidPath("'..' leads above the root".to_string())
                })?,
                name => self.get_or_create_dir(current, name)?,
            };
        }
        Ok(current)
    }

    fn create_dir_at(&mut self, path: &str, parent: DirId) -> Result<u32> {
        let start = self.dir_index(parent)?;
        let (segments, last) = Self::split_path(path)?;
        let dir = self.walk_create(start, &segments)?;
        self.get_or_create_dir(dir, last)
    }

    fn create_file_at(&mut self, path: &str, parent: DirId) -> Result<u32> {
        let start = self.dir_index(parent)?;
        let (segments, last) = Self::split_path(path)?;
        let dir = self.walk_create(start, &segments)?;
        self.get_or_create_file(dir, last)
    }

    fn lookup_dir(&self, path: &str, parent: DirId) -> Result<u32> {
        let start = self.dir_index(parent)?;
        let (segments, last) = Self::split_path(path)?;
        let dir = self.walk(start, &segments)?;
        self.find_child_dir(dir, NameHash::of(last).utf16)?
            .ok_or_else(|| ArcError::NotFound(format!("directory '{path}'")))
    }

    fn lookup_file(&self, path: &str, parent: DirId) -> Result<u32> {
        let start = self.dir_index(parent)?;
        let (segments, last) = Self::split_path(path)?;
        let dir = self.walk(start, &segments)?;
        self.find_child_file(dir, NameHash::of(last).utf16)?
            .ok_or_else(|| ArcError::NotFound(format!("file '{path}'")))
    }

    // ---------------------------------------------------------------------
    // Create / get / exists
    // ---------------------------------------------------------------------

    /// Get or create a directory below the root, creating intermediate
    /// directories as needed
    ///
    /// Path segments are separated by `/` or `\`; `.` stays in place and
    /// `..` moves to the parent.
    pub fn create_directory(&mut self, path: &str) -> Result<DirId> {
        self.create_directory_in(path, self.root())
    }

    /// Get or create a directory below `parent`
    pub fn create_directory_in(&mut self, path: &str, parent: DirId) -> Result<DirId> {
        debug!("Creating directory '{}' in {}", path, self.display(parent));
        self.create_dir_at(path, parent)
            .map(|index| self.dir_id(index))
            .inspect_err(|e| error!("Failed to create directory '{path}': {e}"))
    }

    /// Get or create a file below the root
    ///
    /// New files start with empty content.
    pub fn create_file(&mut self, path: &str) -> Result<FileId> {
        self.create_file_in(path, self.root())
    }

    /// Get or create a file below `parent`
    pub fn create_file_in(&mut self, path: &str, parent: DirId) -> Result<FileId> {
        debug!("Creating file '{}' in {}", path, self.display(parent));
        self.create_file_at(path, parent)
            .map(|index| self.file_id(index))
            .inspect_err(|e| error!("Failed to create file '{path}': {e}"))
    }

    /// Look up an existing directory below the root
    pub fn get_directory(&self, path: &str) -> Result<DirId> {
        self.get_directory_in(path, self.root())
    }

    /// Look up an existing directory below `parent`
    pub fn get_directory_in(&self, path: &str, parent: DirId) -> Result<DirId> {
        self.lookup_dir(path, parent)
            .map(|index| self.dir_id(index))
            .inspect_err(|e| error!("Failed to get directory '{path}': {e}"))
    }

    /// Look up an existing file below the root
    pub fn get_file(&self, path: &str) -> Result<FileId> {
        self.get_file_in(path, self.root())
    }

    /// Look up an existing file below `parent`
    pub fn get_file_in(&self, path: &str, parent: DirId) -> Result<FileId> {
        self.lookup_file(path, parent)
            .map(|index| self.file_id(index))
            .inspect_err(|e| error!("Failed to get file '{path}': {e}"))
    }

    /// Whether a directory exists below the root
    pub fn directory_exists(&self, path: &str) -> bool {
        self.directory_exists_in(path, self.root())
    }

    /// Whether a directory exists below `parent`
    pub fn directory_exists_in(&self, path: &str, parent: DirId) -> bool {
        self.lookup_dir(path, parent).is_ok()
    }

    /// Whether a file exists below the root
    pub fn file_exists(&self, path: &str) -> bool {
        self.file_exists_in(path, self.root())
    }

    /// Whether a file exists below `parent`
    pub fn file_exists_in(&self, path: &str, parent: DirId) -> bool {
        self.lookup_file(path, parent).is_ok()
    }

    // ---------------------------------------------------------------------
    // Delete / clear
    // ---------------------------------------------------------------------

    /// Remove a file from the tree
    ///
    /// The handle is invalid afterwards. Shared content is left untouched.
    pub fn delete_file(&mut self, file: FileId) -> Result<()> {
        info!("Deleting file {}", self.display(file));
        self.file_index(file)
            .and_then(|index| self.remove_file(index))
            .inspect_err(|e| error!("Failed to delete file: {e}"))
    }

    /// Remove a directory
    ///
    /// Without `recursive` the directory must be empty. The root can never
    /// be deleted.
    pub fn delete_directory(&mut self, dir: DirId, recursive: bool) -> Result<()> {
        info!(
            "Deleting directory {} (recursive: {})",
            self.display(dir),
            recursive
        );
        self.dir_index(dir)
            .and_then(|index| self.remove_dir(index, recursive))
            .inspect_err(|e| error!("Failed to delete directory: {e}"))
    }

    /// Delete every entry below the root
    pub fn clear(&mut self) -> Result<()> {
        self.clear_directory(self.root())
    }

    /// Delete every direct child of `dir`, recursively
    pub fn clear_directory(&mut self, dir: DirId) -> Result<()> {
        info!("Clearing directory {}", self.display(dir));
        self.dir_index(dir)
            .and_then(|index| self.remove_children(index))
            .inspect_err(|e| error!("Failed to clear directory: {e}"))
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Whether `id` was issued by this filesystem and still exists
    pub fn has_entry(&self, id: impl Into<EntryId>) -> bool {
        self.entry_index(id.into()).is_ok()
    }

    /// Whether `dir` is this filesystem's root
    pub fn is_root(&self, dir: DirId) -> bool {
        dir == self.root()
    }

    /// Entry name
    pub fn entry_name(&self, id: impl Into<EntryId>) -> Result<&str> {
        let index = self.entry_index(id.into())?;
        Ok(self.live(index)?.name())
    }

    /// Names of all ancestors and the entry, joined with `\`
    pub fn full_name(&self, id: impl Into<EntryId>) -> Result<String> {
        let index = self.entry_index(id.into())?;
        self.full_name_of(index)
    }

    /// Entry formatted as its quoted full name, for messages
    pub fn display(&self, id: impl Into<EntryId>) -> String {
        let id = id.into();
        match self.entry_index(id) {
            Ok(index) => self.display_index(index),
            Err(_) => format!("<foreign entry #{}>", id.index()),
        }
    }

    /// Number of ancestors; 0 for the root
    pub fn depth(&self, id: impl Into<EntryId>) -> Result<usize> {
        let mut index = self.entry_index(id.into())?;
        let mut depth = 0;
        while let Some(parent) = self.live(index)?.parent {
            depth += 1;
            index = parent;
        }
        Ok(depth)
    }

    /// Containing directory; `None` for the root
    pub fn parent(&self, id: impl Into<EntryId>) -> Result<Option<DirId>> {
        let index = self.entry_index(id.into())?;
        Ok(self.live(index)?.parent.map(|p| self.dir_id(p)))
    }

    /// Direct subdirectories of `dir`
    pub fn directories_of(&self, dir: DirId) -> Result<Vec<DirId>> {
        let (dirs, _) = self.children(self.dir_index(dir)?)?;
        Ok(dirs.iter().map(|&i| self.dir_id(i)).collect())
    }

    /// Direct files of `dir`
    pub fn files_of(&self, dir: DirId) -> Result<Vec<FileId>> {
        let (_, files) = self.children(self.dir_index(dir)?)?;
        Ok(files.iter().map(|&i| self.file_id(i)).collect())
    }

    /// Number of direct subdirectories
    pub fn directory_count(&self, dir: DirId) -> Result<usize> {
        Ok(self.children(self.dir_index(dir)?)?.0.len())
    }

    /// Number of direct files
    pub fn file_count(&self, dir: DirId) -> Result<usize> {
        Ok(self.children(self.dir_index(dir)?)?.1.len())
    }

    /// Every directory except the root, in creation order
    pub fn directories(&self) -> Vec<DirId> {
        self.live_indices()
            .filter(|(i, node)| *i != ROOT && node.is_directory())
            .map(|(i, _)| self.dir_id(i))
            .collect()
    }

    /// Every file, in creation order
    pub fn files(&self) -> Vec<FileId> {
        self.live_indices()
            .filter(|(_, node)| !node.is_directory())
            .map(|(i, _)| self.file_id(i))
            .collect()
    }

    /// Content pointer of a file
    pub fn pointer(&self, file: FileId) -> Result<Arc<FilePointer>> {
        let index = self.file_index(file)?;
        self.file_pointer(index).map(Arc::clone)
    }

    /// Replace a file's content pointer
    pub fn set_pointer(&mut self, file: FileId, pointer: Arc<FilePointer>) -> Result<()> {
        let index = self.file_index(file)?;
        self.set_file_pointer(index, pointer)
    }

    /// Case-folded hash pair of the entry name
    pub fn name_hash(&self, id: impl Into<EntryId>) -> Result<NameHash> {
        let index = self.entry_index(id.into())?;
        Ok(self.live(index)?.hash())
    }

    /// Case-sensitive hash of the entry's full name
    pub fn unique_id(&self, id: impl Into<EntryId>) -> Result<u64> {
        Ok(warc_hash::unique_id(&self.full_name(id)?))
    }

    /// Decompressed content of a file
    pub fn read_file(&self, file: FileId) -> Result<Bytes> {
        self.pointer(file)?
            .read_all()
            .inspect_err(|e| error!("Failed to read {}: {e}", self.display(file)))
    }

    // ---------------------------------------------------------------------
    // Utilities
    // ---------------------------------------------------------------------

    /// Whether the file at `path` starts with the ARC magic
    pub fn detect_magic(path: impl AsRef<Path>) -> Result<bool> {
        let mut reader = BufReader::new(File::open(path)?);
        Ok(warc_format::detect_magic(&mut reader)?)
    }

    /// Strip characters that are not allowed in local file names
    pub fn clean_file_name(input: &str) -> String {
        input
            .chars()
            .filter(|&c| !matches!(c, '"' | '<' | '>' | '|' | ':' | '*' | '?' | '\\' | '/'))
            .filter(|c| !c.is_ascii_control())
            .collect()
    }
}
