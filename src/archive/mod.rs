// src/archive/mod.rs
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::error::Result;

/// Suffix of the table files inside a GTFS archive.
pub const TABLE_EXTENSION: &str = ".txt";

/// Member that is never loaded even though it is a table file.
pub const EXCLUDED_MEMBER: &str = "agency.txt";

/// What kind of entry a member is. The reader never filters on this;
/// callers decide what to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// One entry of the archive, alive only until the next call to
/// [`ArchiveReader::next_member`].
pub struct ArchiveMember<'a> {
    pub name: String,
    pub kind: EntryKind,
    reader: Box<dyn Read + 'a>,
}

impl<'a> ArchiveMember<'a> {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

impl Read for ArchiveMember<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Forward-only reader over an in-memory ZIP buffer.
///
/// Opening the same buffer twice gives two independent readers; each one
/// walks the members once, in central-directory order.
pub struct ArchiveReader<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    next: usize,
}

impl<'a> ArchiveReader<'a> {
    /// Fails with [`LoadError::ArchiveFormat`](crate::LoadError::ArchiveFormat)
    /// when `buf` is not a ZIP archive.
    pub fn open(buf: &'a [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(buf))?;
        debug!(members = archive.len(), bytes = buf.len(), "opened archive");
        Ok(Self { archive, next: 0 })
    }

    /// Total number of entries, directories included.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Advance to the next entry. Returns `None` once every entry was
    /// handed out.
    pub fn next_member(&mut self) -> Option<Result<ArchiveMember<'_>>> {
        if self.next >= self.archive.len() {
            return None;
        }
        let idx = self.next;
        self.next += 1;

        let entry = match self.archive.by_index(idx) {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e.into())),
        };
        let kind = if entry.is_dir() {
            EntryKind::Directory
        } else if entry.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let name = entry.name().to_string();

        Some(Ok(ArchiveMember {
            name,
            kind,
            reader: Box::new(entry),
        }))
    }
}

/// True when `name` is a table file that should be loaded.
pub fn is_table_member(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(TABLE_EXTENSION) && lower != EXCLUDED_MEMBER
}

/// Base file name with the table extension removed: `feed/stops.txt`
/// becomes `stops`. Casing is kept as-is.
pub fn table_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    if base.to_lowercase().ends_with(TABLE_EXTENSION) {
        base[..base.len() - TABLE_EXTENSION.len()].to_string()
    } else {
        base.to_string()
    }
}
