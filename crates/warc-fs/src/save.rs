//! Archive writing and extraction

use crate::entry::FileId;
use crate::filesystem::{ArcFileSystem, ROOT};
use crate::{ArcError, Result};
use binrw::BinWriterExt;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, trace};
use warc_format::{
    ArcFooter, ArcFormatError, ArcHeader, ContentHeader, HashTableBuilder, LayoutDirectory,
    NameTable,
};
use warc_hash::Encoding;

impl ArcFileSystem {
    /// Write the tree as an archive
    ///
    /// File content is written in creation order. Files whose name matches
    /// the compress list are compressed on the way out; the tree itself is
    /// left as it was.
    pub fn save<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        info!("Saving arc {}", self.name());
        self.write_arc(writer)
            .inspect_err(|e| error!("Failed to save arc {}: {e}", self.name()))
    }

    /// Write the tree to a new archive file
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Saving arc {} to {}", self.name(), path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_arc<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        writer
            .write_le(&ArcHeader::new(0))
            .map_err(ArcFormatError::from)?;
        let base = writer.stream_position()?;

        let files: Vec<u32> = self
            .live_indices()
            .filter(|(_, node)| !node.is_directory())
            .map(|(index, _)| index)
            .collect();
        let total = files.len();
        let mut offsets = HashMap::with_capacity(total);

        for (n, &index) in files.iter().enumerate() {
            let name = self.live(index)?.name();
            let mut pointer = Arc::clone(self.file_pointer(index)?);
            if self.compress_list.is_match(name) {
                pointer = pointer.compress()?;
            }
            let data = pointer.data()?;
            let compressed = pointer.compressed()?;
            let raw_size = if compressed {
                pointer.raw_size()?
            } else {
                data.len() as u32
            };

            let offset = writer.stream_position()? - base;
            offsets.insert(index, offset as i64);

            let header = ContentHeader::new(compressed, raw_size, data.len() as u32);
            writer.write_all(&header.to_bytes())?;
            writer.write_all(&data)?;
            trace!("[{}/{}] Packed {}", n + 1, total, self.display_index(index));
        }

        let footer_position = writer.stream_position()?;
        let footer_offset = (footer_position - base) as i64;
        writer.seek(SeekFrom::Start(base - 8))?;
        writer.write_all(&footer_offset.to_le_bytes())?;
        writer.seek(SeekFrom::Start(footer_position))?;
        debug!("Footer at offset {footer_offset}");

        let footer = ArcFooter {
            utf16: HashTableBuilder::new(self.layout(ROOT, &offsets, Encoding::Utf16)?).build(),
            utf8: HashTableBuilder::new(self.layout(ROOT, &offsets, Encoding::Utf8)?).build(),
            names: self.name_table(),
        };
        debug!(
            "Writing footer: {} files, {} names",
            footer.utf16.total_files(),
            footer.names.len()
        );
        footer.write(writer, self.compress_name_table)?;
        writer.flush()?;
        Ok(())
    }

    fn layout(
        &self,
        index: u32,
        offsets: &HashMap<u32, i64>,
        encoding: Encoding,
    ) -> Result<LayoutDirectory> {
        let (dirs, files) = self.children(index)?;
        let mut layout = LayoutDirectory::new(self.live(index)?.hash().get(encoding));
        for &file in files {
            let offset = offsets.get(&file).copied().ok_or_else(|| {
                ArcError::NotFound(format!("content offset of {}", self.display_index(file)))
            })?;
            layout = layout.with_file(self.live(file)?.hash().get(encoding), offset);
        }
        for &dir in dirs {
            layout = layout.with_dir(self.layout(dir, offsets, encoding)?);
        }
        Ok(layout)
    }

    /// One entry per distinct literal name: files, then directories, then
    /// the root
    fn name_table(&self) -> NameTable {
        let files = self.live_indices().filter(|(_, node)| !node.is_directory());
        let dirs = self
            .live_indices()
            .filter(|(index, node)| *index != ROOT && node.is_directory());
        let root = self.live_indices().filter(|(index, _)| *index == ROOT);

        let mut seen = HashSet::new();
        let mut table = NameTable::new();
        for (_, node) in files.chain(dirs).chain(root) {
            if seen.insert(node.name()) {
                table.push(node.hash().utf16, node.name());
            }
        }
        table
    }

    /// Path of a file below the root, usable on the local filesystem
    ///
    /// Each segment is stripped of characters local file names cannot hold.
    pub fn relative_path(&self, file: FileId) -> Result<PathBuf> {
        let mut index = self.file_index(file)?;
        let mut segments = Vec::new();
        while index != ROOT {
            let node = self.live(index)?;
            segments.push(node.name());
            index = node
                .parent
                .ok_or_else(|| ArcError::NotFound(format!("parent of {}", self.display(file))))?;
        }

        let mut path = PathBuf::new();
        for segment in segments.iter().rev() {
            let clean = Self::clean_file_name(segment);
            if clean.is_empty() || clean == "." || clean == ".." {
                return Err(ArcError::InvalidPath(format!(
                    "{} cannot be written to disk",
                    self.display(file)
                )));
            }
            path.push(clean);
        }
        Ok(path)
    }

    /// Write every file's decompressed content below `dir`
    ///
    /// Returns the number of files written.
    pub fn extract_to(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        info!("Extracting {} to {}", self.name(), dir.display());
        self.write_files(dir)
            .inspect_err(|e| error!("Failed to extract {}: {e}", self.name()))
    }

    fn write_files(&self, dir: &Path) -> Result<usize> {
        let files = self.files();
        let total = files.len();
        for (n, &file) in files.iter().enumerate() {
            let path = dir.join(self.relative_path(file)?);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, self.pointer(file)?.read_all()?)?;
            trace!("[{}/{}] Unpacked {}", n + 1, total, path.display());
        }
        Ok(total)
    }
}
