//! Copy, move, merge and rename

use crate::entry::{EntryId, FileId};
use crate::filesystem::{ArcFileSystem, ROOT};
use crate::pointer::FilePointer;
use crate::{ArcError, DirId, Result, SEPARATOR};
use std::sync::Arc;
use tracing::{error, info};
use warc_hash::NameHash;

/// Detached copy of a directory's contents
///
/// Taken before any mutation so a directory can be copied into itself or
/// out of another filesystem.
#[derive(Debug)]
struct DirSnapshot {
    name: String,
    files: Vec<(String, Arc<FilePointer>)>,
    dirs: Vec<DirSnapshot>,
}

impl ArcFileSystem {
    fn snapshot_file(&self, index: u32) -> Result<(String, Arc<FilePointer>)> {
        let name = self.live(index)?.name().to_string();
        Ok((name, Arc::clone(self.file_pointer(index)?)))
    }

    fn snapshot_dir(&self, index: u32) -> Result<DirSnapshot> {
        let (dirs, files) = self.children(index)?;
        Ok(DirSnapshot {
            name: self.live(index)?.name().to_string(),
            files: files
                .iter()
                .map(|&f| self.snapshot_file(f))
                .collect::<Result<_>>()?,
            dirs: dirs
                .iter()
                .map(|&d| self.snapshot_dir(d))
                .collect::<Result<_>>()?,
        })
    }

    /// Place a file under `target`, replacing a same-named file
    fn apply_file(&mut self, name: &str, pointer: Arc<FilePointer>, target: u32) -> Result<u32> {
        if let Some(existing) = self.find_child_file(target, NameHash::of(name).utf16)? {
            self.remove_file(existing)?;
        }
        self.insert_file(name, target, pointer)
    }

    fn apply_contents(&mut self, snapshot: DirSnapshot, target: u32) -> Result<()> {
        for (name, pointer) in snapshot.files {
            self.apply_file(&name, pointer, target)?;
        }
        for dir in snapshot.dirs {
            self.apply_dir(dir, target)?;
        }
        Ok(())
    }

    /// Place a directory under `target`, reusing a same-named directory
    fn apply_dir(&mut self, snapshot: DirSnapshot, target: u32) -> Result<u32> {
        let dir = self.get_or_create_dir(target, &snapshot.name)?;
        self.apply_contents(snapshot, dir)?;
        Ok(dir)
    }

    fn move_file_to(&mut self, index: u32, target: u32) -> Result<u32> {
        let node = self.live(index)?;
        if node.parent == Some(target) {
            return Ok(index);
        }
        if let Some(existing) = self.find_child_file(target, node.hash().utf16)? {
            self.remove_file(existing)?;
        }
        self.detach(index)?;
        self.attach(index, target)?;
        Ok(index)
    }

    fn move_dir_to(&mut self, index: u32, target: u32) -> Result<u32> {
        if index == ROOT {
            return Err(ArcError::InvalidOperation(
                "cannot move the root directory".to_string(),
            ));
        }
        if self.is_within(target, index) {
            return Err(ArcError::InvalidOperation(format!(
                "cannot move {} into itself",
                self.display_index(index)
            )));
        }

        let node = self.live(index)?;
        if node.parent == Some(target) {
            return Ok(index);
        }
        match self.find_child_dir(target, node.hash().utf16)? {
            Some(existing) => {
                self.move_children(index, existing)?;
                self.remove_dir(index, false)?;
                Ok(existing)
            }
            None => {
                self.detach(index)?;
                self.attach(index, target)?;
                Ok(index)
            }
        }
    }

    fn move_children(&mut self, source: u32, target: u32) -> Result<()> {
        let (dirs, files) = self.children(source)?;
        let (dirs, files) = (dirs.to_vec(), files.to_vec());
        for file in files {
            self.move_file_to(file, target)?;
        }
        for dir in dirs {
            self.move_dir_to(dir, target)?;
        }
        Ok(())
    }

    fn copy_file_within(&mut self, file: FileId, target: DirId) -> Result<u32> {
        let index = self.file_index(file)?;
        let target = self.dir_index(target)?;
        if self.live(index)?.parent == Some(target) {
            return Ok(index);
        }
        let (name, pointer) = self.snapshot_file(index)?;
        self.apply_file(&name, pointer, target)
    }

    fn copy_dir_within(&mut self, dir: DirId, target: DirId) -> Result<u32> {
        let index = self.dir_index(dir)?;
        let target = self.dir_index(target)?;
        if index == ROOT {
            return Err(ArcError::InvalidOperation(
                "cannot copy the root directory into its own filesystem".to_string(),
            ));
        }
        if self.live(index)?.parent == Some(target) {
            return Ok(index);
        }
        let snapshot = self.snapshot_dir(index)?;
        self.apply_dir(snapshot, target)
    }

    fn merge_source(&self, source: DirId, target: DirId) -> Result<(u32, u32)> {
        let source = self.dir_index(source)?;
        let target = self.dir_index(target)?;
        if source == ROOT {
            return Err(ArcError::InvalidOperation(
                "cannot merge the root directory into its own filesystem".to_string(),
            ));
        }
        Ok((source, target))
    }

    /// Copy a file into `target`
    ///
    /// A same-named file in `target` is replaced. The copy shares content
    /// with the original. Copying into the file's own directory returns the
    /// original.
    pub fn copy_file(&mut self, file: FileId, target: DirId) -> Result<FileId> {
        info!("Copying file {} to {}", self.display(file), self.display(target));
        self.copy_file_within(file, target)
            .map(|index| self.file_id(index))
            .inspect_err(|e| error!("Failed to copy file: {e}"))
    }

    /// Copy a file out of another filesystem into `target`
    pub fn copy_file_from(
        &mut self,
        source: &Self,
        file: FileId,
        target: DirId,
    ) -> Result<FileId> {
        info!(
            "Copying file {} from {} to {}",
            source.display(file),
            source.name(),
            self.display(target)
        );
        let result = source
            .file_index(file)
            .and_then(|index| source.snapshot_file(index))
            .and_then(|(name, pointer)| {
                let target = self.dir_index(target)?;
                self.apply_file(&name, pointer, target)
            });
        result
            .map(|index| self.file_id(index))
            .inspect_err(|e| error!("Failed to copy file: {e}"))
    }

    /// Copy a directory and everything below it into `target`
    ///
    /// An existing same-named directory in `target` is reused and receives
    /// the copied entries. The root cannot be copied within its own
    /// filesystem.
    pub fn copy_directory(&mut self, dir: DirId, target: DirId) -> Result<DirId> {
        info!(
            "Copying directory {} to {}",
            self.display(dir),
            self.display(target)
        );
        self.copy_dir_within(dir, target)
            .map(|index| self.dir_id(index))
            .inspect_err(|e| error!("Failed to copy directory: {e}"))
    }

    /// Copy a directory out of another filesystem into `target`
    pub fn copy_directory_from(
        &mut self,
        source: &Self,
        dir: DirId,
        target: DirId,
    ) -> Result<DirId> {
        info!(
            "Copying directory {} from {} to {}",
            source.display(dir),
            source.name(),
            self.display(target)
        );
        let result = source
            .dir_index(dir)
            .and_then(|index| source.snapshot_dir(index))
            .and_then(|snapshot| {
                let target = self.dir_index(target)?;
                self.apply_dir(snapshot, target)
            });
        result
            .map(|index| self.dir_id(index))
            .inspect_err(|e| error!("Failed to copy directory: {e}"))
    }

    /// Move a file into `target`, replacing a same-named file
    ///
    /// The handle stays valid.
    pub fn move_file(&mut self, file: FileId, target: DirId) -> Result<FileId> {
        info!("Moving file {} to {}", self.display(file), self.display(target));
        self.file_index(file)
            .and_then(|index| Ok((index, self.dir_index(target)?)))
            .and_then(|(index, target)| self.move_file_to(index, target))
            .map(|index| self.file_id(index))
            .inspect_err(|e| error!("Failed to move file: {e}"))
    }

    /// Move a directory into `target`
    ///
    /// When `target` already holds a same-named directory, the children are
    /// moved into it, the emptied source is deleted and the existing
    /// directory is returned. The root cannot be moved, and a directory
    /// cannot be moved below itself.
    pub fn move_directory(&mut self, dir: DirId, target: DirId) -> Result<DirId> {
        info!(
            "Moving directory {} to {}",
            self.display(dir),
            self.display(target)
        );
        self.dir_index(dir)
            .and_then(|index| Ok((index, self.dir_index(target)?)))
            .and_then(|(index, target)| self.move_dir_to(index, target))
            .map(|index| self.dir_id(index))
            .inspect_err(|e| error!("Failed to move directory: {e}"))
    }

    /// Copy every child of `source` into `target`
    ///
    /// `source` is left intact.
    pub fn merge_copy(&mut self, source: DirId, target: DirId) -> Result<()> {
        info!(
            "Merging {} into {} (copy)",
            self.display(source),
            self.display(target)
        );
        self.merge_source(source, target)
            .and_then(|(source, target)| Ok((self.snapshot_dir(source)?, target)))
            .and_then(|(snapshot, target)| self.apply_contents(snapshot, target))
            .inspect_err(|e| error!("Failed to merge directory: {e}"))
    }

    /// Copy every child of a directory in another filesystem into `target`
    ///
    /// The other filesystem's root may be used as `source`.
    pub fn merge_copy_from(&mut self, other: &Self, source: DirId, target: DirId) -> Result<()> {
        info!(
            "Merging {} from {} into {} (copy)",
            other.display(source),
            other.name(),
            self.display(target)
        );
        other
            .dir_index(source)
            .and_then(|index| other.snapshot_dir(index))
            .and_then(|snapshot| Ok((snapshot, self.dir_index(target)?)))
            .and_then(|(snapshot, target)| self.apply_contents(snapshot, target))
            .inspect_err(|e| error!("Failed to merge directory: {e}"))
    }

    /// Move every child of `source` into `target`, then delete `source`
    ///
    /// Later entries replace same-named files already in `target`. Children
    /// moved before a failure stay moved.
    pub fn merge_move(&mut self, source: DirId, target: DirId) -> Result<()> {
        info!(
            "Merging {} into {} (move)",
            self.display(source),
            self.display(target)
        );
        self.merge_source(source, target)
            .and_then(|(source, target)| {
                if self.is_within(target, source) {
                    return Err(ArcError::InvalidOperation(format!(
                        "cannot merge {} into itself",
                        self.display_index(source)
                    )));
                }
                self.move_children(source, target)?;
                self.remove_dir(source, false)
            })
            .inspect_err(|e| error!("Failed to merge directory: {e}"))
    }

    /// Change an entry's name
    ///
    /// Sibling names are not checked, so a rename can leave two children
    /// with the same case-folded name. Lookups then find the older one.
    pub fn rename(&mut self, id: impl Into<EntryId>, name: &str) -> Result<()> {
        let id = id.into();
        info!("Renaming {} to \"{}\"", self.display(id), name);
        self.rename_entry(id, name)
            .inspect_err(|e| error!("Failed to rename entry: {e}"))
    }

    fn rename_entry(&mut self, id: EntryId, name: &str) -> Result<()> {
        let index = self.entry_index(id)?;
        if index == ROOT {
            return Err(ArcError::InvalidOperation(
                "the root directory is renamed through set_name".to_string(),
            ));
        }
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', SEPARATOR]) {
            return Err(ArcError::InvalidPath(format!(
                "'{name}' is not a valid entry name"
            )));
        }
        self.rename_node(index, name)
    }
}
