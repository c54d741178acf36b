//! In-memory release asset builders.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Cursor, Write};
use tar::{Builder, EntryType, Header};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// One entry of a test archive.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    /// Regular file with explicit permission bits
    File {
        path: String,
        contents: Vec<u8>,
        mode: u32,
    },
    /// Directory entry
    Dir { path: String },
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, contents: impl Into<Vec<u8>>, mode: u32) -> Self {
        Self::File {
            path: path.into(),
            contents: contents.into(),
            mode,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self::Dir {
            path: path.into(),
        }
    }
}

/// Build a gzip-compressed tarball holding `entries` in order.
///
/// # Panics
///
/// Panics if the archive cannot be written.
#[must_use]
pub fn tar_gz_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for entry in entries {
        let mut header = Header::new_gnu();
        match entry {
            ArchiveEntry::File {
                path,
                contents,
                mode,
            } => {
                header.set_entry_type(EntryType::Regular);
                header.set_size(contents.len() as u64);
                header.set_mode(*mode);
                builder
                    .append_data(&mut header, path, contents.as_slice())
                    .expect("append tar file");
            }
            ArchiveEntry::Dir { path } => {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                builder.append_data(&mut header, path, std::io::empty()).expect("append tar dir");
            }
        }
    }

    builder.into_inner().expect("finish tar").finish().expect("finish gzip")
}

/// Build a zip archive holding `entries` in order.
///
/// # Panics
///
/// Panics if the archive cannot be written.
#[must_use]
pub fn zip_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        match entry {
            ArchiveEntry::File {
                path,
                contents,
                mode,
            } => {
                let options = SimpleFileOptions::default().unix_permissions(*mode);
                writer.start_file(path.as_str(), options).expect("start zip file");
                writer.write_all(contents).expect("write zip file");
            }
            ArchiveEntry::Dir { path } => {
                let options = SimpleFileOptions::default().unix_permissions(0o755);
                writer.add_directory(path.as_str(), options).expect("add zip dir");
            }
        }
    }

    writer.finish().expect("finish zip").into_inner()
}
