//! Lazy file content
//!
//! Every file entry holds an `Arc<FilePointer>`. Copies of a file share the
//! same pointer, so content is never duplicated in memory until it is read.

use crate::{ArcError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};
use warc_format::{CONTENT_HEADER_SIZE, ContentHeader, deflate};

static EMPTY_UNCOMPRESSED: LazyLock<Arc<FilePointer>> =
    LazyLock::new(|| Arc::new(FilePointer::Empty(EmptyPointer { compressed: false })));

static EMPTY_COMPRESSED: LazyLock<Arc<FilePointer>> =
    LazyLock::new(|| Arc::new(FilePointer::Empty(EmptyPointer { compressed: true })));

/// Source of a file's bytes
#[derive(Debug)]
pub enum FilePointer {
    /// Zero-length content
    Empty(EmptyPointer),
    /// Bytes held in memory
    Memory(MemoryPointer),
    /// A file on the local disk
    Disk(DiskPointer),
    /// A content block inside an existing archive
    Archive(ArchivePointer),
}

/// Immutable zero-length content
#[derive(Debug)]
pub struct EmptyPointer {
    compressed: bool,
}

/// In-memory content
#[derive(Debug)]
pub struct MemoryPointer {
    data: Mutex<Bytes>,
    compressed: bool,
    raw_size: u32,
    disposed: AtomicBool,
}

/// Content read from a local file on demand
#[derive(Debug)]
pub struct DiskPointer {
    path: PathBuf,
    size: u32,
    disposed: AtomicBool,
}

/// Content read from a content block of an archive on demand
///
/// The 16-byte block header is read on first use.
#[derive(Debug)]
pub struct ArchivePointer {
    archive: PathBuf,
    offset: u64,
    header: Mutex<Option<ContentHeader>>,
    disposed: AtomicBool,
}

impl FilePointer {
    /// Shared empty pointer
    pub fn empty() -> Arc<Self> {
        Arc::clone(&EMPTY_UNCOMPRESSED)
    }

    /// Shared empty pointer tagged as compressed
    pub fn empty_compressed() -> Arc<Self> {
        Arc::clone(&EMPTY_COMPRESSED)
    }

    /// Uncompressed in-memory content
    ///
    /// Fails when the content exceeds `u32::MAX` bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Arc<Self>> {
        let data = data.into();
        Ok(Arc::new(Self::Memory(MemoryPointer {
            raw_size: entry_len(data.len())?,
            data: Mutex::new(data),
            compressed: false,
            disposed: AtomicBool::new(false),
        })))
    }

    /// Already-compressed in-memory content that inflates to `raw_size` bytes
    pub fn from_compressed(data: impl Into<Bytes>, raw_size: u32) -> Result<Arc<Self>> {
        let data = data.into();
        entry_len(data.len())?;
        Ok(Arc::new(Self::Memory(MemoryPointer {
            data: Mutex::new(data),
            compressed: true,
            raw_size,
            disposed: AtomicBool::new(false),
        })))
    }

    /// Content of a local file
    ///
    /// Fails when the path is missing or the file exceeds `u32::MAX` bytes.
    pub fn from_disk(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArcError::NotFound(path.display().to_string())
            } else {
                ArcError::Io(e)
            }
        })?;
        if !metadata.is_file() {
            return Err(ArcError::NotFound(path.display().to_string()));
        }
        let size = u32::try_from(metadata.len()).map_err(|_| ArcError::SizeLimit {
            path: path.display().to_string(),
            size: metadata.len(),
        })?;

        Ok(Arc::new(Self::Disk(DiskPointer {
            path: path.to_path_buf(),
            size,
            disposed: AtomicBool::new(false),
        })))
    }

    /// Content block at `offset` inside `archive`
    pub fn from_archive(archive: impl Into<PathBuf>, offset: u64) -> Arc<Self> {
        Arc::new(Self::Archive(ArchivePointer {
            archive: archive.into(),
            offset,
            header: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }))
    }

    /// Whether the stored bytes are DEFLATE compressed
    pub fn compressed(&self) -> Result<bool> {
        match self {
            Self::Empty(p) => Ok(p.compressed),
            Self::Memory(p) => {
                p.check()?;
                Ok(p.compressed)
            }
            Self::Disk(p) => {
                p.check()?;
                Ok(false)
            }
            Self::Archive(p) => Ok(p.header()?.is_compressed()),
        }
    }

    /// Length after decompression
    pub fn raw_size(&self) -> Result<u32> {
        match self {
            Self::Empty(_) => Ok(0),
            Self::Memory(p) => {
                p.check()?;
                Ok(p.raw_size)
            }
            Self::Disk(p) => {
                p.check()?;
                Ok(p.size)
            }
            Self::Archive(p) => Ok(p.header()?.raw_size),
        }
    }

    /// Length of the stored bytes
    pub fn size(&self) -> Result<u32> {
        match self {
            Self::Empty(_) => Ok(0),
            Self::Memory(p) => {
                p.check()?;
                entry_len(p.data.lock().len())
            }
            Self::Disk(p) => {
                p.check()?;
                Ok(p.size)
            }
            Self::Archive(p) => Ok(p.header()?.size),
        }
    }

    /// Stored bytes, compressed if [`compressed`](Self::compressed) is set
    pub fn data(&self) -> Result<Bytes> {
        match self {
            Self::Empty(_) => Ok(Bytes::new()),
            Self::Memory(p) => {
                p.check()?;
                Ok(p.data.lock().clone())
            }
            Self::Disk(p) => {
                p.check()?;
                trace!("Reading {}", p.path.display());
                Ok(Bytes::from(std::fs::read(&p.path)?))
            }
            Self::Archive(p) => p.read_body(),
        }
    }

    /// Compressed form of this content
    ///
    /// Returns the same pointer when already compressed.
    pub fn compress(self: &Arc<Self>) -> Result<Arc<Self>> {
        if self.compressed()? || matches!(**self, Self::Empty(_)) {
            return Ok(Arc::clone(self));
        }
        let raw = self.data()?;
        let compressed = deflate::compress(&raw)?;
        debug!("Compressed {} bytes to {}", raw.len(), compressed.len());
        Self::from_compressed(compressed, entry_len(raw.len())?)
    }

    /// Uncompressed form of this content
    ///
    /// Returns the same pointer when not compressed.
    pub fn decompress(self: &Arc<Self>) -> Result<Arc<Self>> {
        if !self.compressed()? {
            return Ok(Arc::clone(self));
        }
        if self.raw_size()? == 0 {
            return Ok(Self::empty());
        }
        let raw = deflate::decompress_sized(&self.data()?, self.raw_size()?)?;
        Self::from_bytes(raw)
    }

    /// Decompressed content
    pub fn read_all(self: &Arc<Self>) -> Result<Bytes> {
        self.decompress()?.data()
    }

    /// Release held content; later access fails with [`ArcError::Disposed`]
    ///
    /// The shared empty pointers cannot be disposed.
    pub fn dispose(&self) {
        match self {
            Self::Empty(_) => {}
            Self::Memory(p) => {
                p.disposed.store(true, Ordering::Release);
                *p.data.lock() = Bytes::new();
            }
            Self::Disk(p) => p.disposed.store(true, Ordering::Release),
            Self::Archive(p) => {
                p.disposed.store(true, Ordering::Release);
                *p.header.lock() = None;
            }
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        match self {
            Self::Empty(_) => false,
            Self::Memory(p) => p.disposed.load(Ordering::Acquire),
            Self::Disk(p) => p.disposed.load(Ordering::Acquire),
            Self::Archive(p) => p.disposed.load(Ordering::Acquire),
        }
    }
}

/// Length of in-memory content as stored in a content header
fn entry_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ArcError::SizeLimit {
        path: "<memory>".to_string(),
        size: len as u64,
    })
}

impl MemoryPointer {
    fn check(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ArcError::Disposed);
        }
        Ok(())
    }
}

impl DiskPointer {
    fn check(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ArcError::Disposed);
        }
        Ok(())
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchivePointer {
    /// Archive file holding the content block
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Absolute position of the content block header
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    fn header(&self) -> Result<ContentHeader> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ArcError::Disposed);
        }
        let mut slot = self.header.lock();
        if let Some(header) = *slot {
            return Ok(header);
        }

        let mut file = File::open(&self.archive)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = [0u8; CONTENT_HEADER_SIZE as usize];
        file.read_exact(&mut buf)?;
        let header = ContentHeader::from_bytes(buf);
        *slot = Some(header);
        Ok(header)
    }

    fn read_body(&self) -> Result<Bytes> {
        let header = self.header()?;
        let mut file = File::open(&self.archive)?;
        file.seek(SeekFrom::Start(self.offset + CONTENT_HEADER_SIZE))?;
        let mut body = vec![0u8; header.size as usize];
        file.read_exact(&mut body)?;
        Ok(Bytes::from(body))
    }
}
