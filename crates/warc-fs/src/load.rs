//! Populating a tree from archives, directories and single files

use crate::entry::{DirId, FileId};
use crate::filesystem::ArcFileSystem;
use crate::pointer::FilePointer;
use crate::{ArcError, Result, SEPARATOR};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, error, info, trace, warn};
use walkdir::WalkDir;
use warc_format::{ArcFooter, ArcFormatError, ArcHeader, HashTable};

/// Directory contents resolved from the footer before the tree is touched
#[derive(Debug, Default)]
struct DirPlan {
    name: String,
    files: Vec<(String, u64)>,
    dirs: Vec<DirPlan>,
}

impl DirPlan {
    fn resolve(
        name: String,
        table: &HashTable,
        names: &HashMap<u64, &str>,
        base: u64,
    ) -> Result<Self> {
        let lookup = |hash: u64| -> Result<String> {
            names
                .get(&hash)
                .map(|name| (*name).to_string())
                .ok_or_else(|| ArcFormatError::MissingName(hash).into())
        };

        let mut plan = Self {
            name,
            ..Self::default()
        };
        for entry in &table.files {
            let offset = base
                .checked_add_signed(entry.offset)
                .ok_or(ArcFormatError::InvalidOffset(entry.offset))?;
            plan.files.push((lookup(entry.hash)?, offset));
        }
        for entry in &table.dirs {
            let subtable = table
                .subtable(entry.hash)
                .ok_or(ArcFormatError::MissingSubdirectory(entry.hash))?;
            plan.dirs
                .push(Self::resolve(lookup(entry.hash)?, subtable, names, base)?);
        }
        Ok(plan)
    }

    fn file_count(&self) -> usize {
        self.files.len() + self.dirs.iter().map(Self::file_count).sum::<usize>()
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArcError::NotFound(path.display().to_string())
        } else {
            ArcError::Io(e)
        }
    })
}

impl ArcFileSystem {
    /// Load an archive into the root directory
    pub fn load_arc(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_arc_into(path, self.root())
    }

    /// Load an archive into `target`
    ///
    /// The footer is parsed and cross-checked before anything is added, so a
    /// corrupt archive leaves the tree unchanged. Files that already exist
    /// keep their node and take the archive's content. When no display name
    /// was set, it is taken from the archive's root entry.
    pub fn load_arc_into(&mut self, path: impl AsRef<Path>, target: DirId) -> Result<()> {
        let path = path.as_ref();
        info!("Loading arc {} into {}", path.display(), self.display(target));
        self.read_arc(path, target)
            .inspect_err(|e| error!("Failed to load arc {}: {e}", path.display()))
    }

    fn read_arc(&mut self, path: &Path, target: DirId) -> Result<()> {
        let target = self.dir_index(target)?;
        let mut reader = BufReader::new(open(path)?);

        let header = ArcHeader::read_from(&mut reader)?;
        let base = reader.stream_position()?;
        let footer_position = base
            .checked_add_signed(header.footer_offset)
            .ok_or(ArcFormatError::InvalidOffset(header.footer_offset))?;
        debug!("Footer at {footer_position} (base {base})");
        reader.seek(SeekFrom::Start(footer_position))?;

        let footer = ArcFooter::read(&mut reader)?;
        footer.verify_checksums()?;

        let names = footer.names.lookup();
        let plan = DirPlan::resolve(String::new(), &footer.utf16, &names, base)?;
        debug!(
            "Resolved {} files from {} name entries",
            plan.file_count(),
            footer.names.len()
        );

        if !self.is_name_set() {
            match footer.root_name() {
                Some(root) => {
                    let name = root.rsplit(SEPARATOR).next().unwrap_or(root);
                    debug!("Naming filesystem \"{name}\" after {}", path.display());
                    self.set_name(name);
                }
                None => warn!("{} records no root name", path.display()),
            }
        }

        let total = plan.file_count();
        let mut done = 0;
        self.apply_plan(plan, target, path, total, &mut done)
    }

    fn apply_plan(
        &mut self,
        plan: DirPlan,
        target: u32,
        archive: &Path,
        total: usize,
        done: &mut usize,
    ) -> Result<()> {
        for (name, offset) in plan.files {
            let file = self.get_or_create_file(target, &name)?;
            self.set_file_pointer(file, FilePointer::from_archive(archive, offset))?;
            *done += 1;
            trace!("[{}/{}] Loaded {}", done, total, name);
        }
        for dir in plan.dirs {
            let index = self.get_or_create_dir(target, &dir.name)?;
            self.apply_plan(dir, index, archive, total, done)?;
        }
        Ok(())
    }

    /// Load an archive into a staging directory and merge it into the root
    ///
    /// Same-named files already in the tree are replaced. The staging
    /// directory is removed on failure.
    pub fn merge_arc(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut serial = 0;
        let staging_name = loop {
            let candidate = format!("<$TEMP-{serial}$>");
            if !self.directory_exists(&candidate) {
                break candidate;
            }
            serial += 1;
        };

        let staging = self.create_directory(&staging_name)?;
        let root = self.root();
        let result = self
            .load_arc_into(path, staging)
            .and_then(|()| self.merge_move(staging, root));

        if result.is_err()
            && self.has_entry(staging)
            && let Err(e) = self.delete_directory(staging, true)
        {
            warn!("Failed to remove staging directory {staging_name}: {e}");
        }
        result
    }

    /// Mirror a local directory below the root
    ///
    /// Returns the number of files added.
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        self.load_directory_into(path, self.root())
    }

    /// Mirror a local directory below `target`
    ///
    /// The directory itself is not recreated; its contents are. Every
    /// source path is checked before the tree is changed.
    pub fn load_directory_into(&mut self, path: impl AsRef<Path>, target: DirId) -> Result<usize> {
        let path = path.as_ref();
        info!(
            "Loading directory {} into {}",
            path.display(),
            self.display(target)
        );
        self.read_directory(path, target)
            .inspect_err(|e| error!("Failed to load directory {}: {e}", path.display()))
    }

    fn read_directory(&mut self, path: &Path, target: DirId) -> Result<usize> {
        let target = self.dir_index(target)?;
        if !path.is_dir() {
            return Err(ArcError::NotFound(path.display().to_string()));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            let segments: Vec<String> = entry
                .path()
                .strip_prefix(path)
                .unwrap_or_else(|_| entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let pointer = if entry.file_type().is_dir() {
                None
            } else {
                Some(FilePointer::from_disk(entry.path())?)
            };
            entries.push((segments, pointer));
        }

        let total = entries.iter().filter(|(_, p)| p.is_some()).count();
        let mut done = 0;
        for (segments, pointer) in entries {
            let Some((last, parents)) = segments.split_last() else {
                continue;
            };
            let mut dir = target;
            for segment in parents {
                dir = self.get_or_create_dir(dir, segment)?;
            }
            match pointer {
                None => {
                    self.get_or_create_dir(dir, last)?;
                }
                Some(pointer) => {
                    let file = self.get_or_create_file(dir, last)?;
                    self.set_file_pointer(file, pointer)?;
                    done += 1;
                    trace!("[{}/{}] Added {}", done, total, segments.join("/"));
                }
            }
        }
        Ok(total)
    }

    /// Add a single local file to the root
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<FileId> {
        self.load_file_into(path, self.root())
    }

    /// Add a single local file to `target`, replacing a same-named file's
    /// content
    pub fn load_file_into(&mut self, path: impl AsRef<Path>, target: DirId) -> Result<FileId> {
        let path = path.as_ref();
        info!("Loading file {} into {}", path.display(), self.display(target));
        self.read_file_entry(path, target)
            .map(|index| self.file_id(index))
            .inspect_err(|e| error!("Failed to load file {}: {e}", path.display()))
    }

    fn read_file_entry(&mut self, path: &Path, target: DirId) -> Result<u32> {
        let target = self.dir_index(target)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ArcError::InvalidPath(path.display().to_string()))?;
        let pointer = FilePointer::from_disk(path)?;
        let file = self.get_or_create_file(target, &name)?;
        self.set_file_pointer(file, pointer)?;
        Ok(file)
    }
}
