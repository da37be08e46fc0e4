//! CSV archives
//!
//! Modules keep an [`Archiver`] per record stream and implement [`Archived`] so the executive can
//! flush them all at the end of each cycle.

use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    path::Path,
};
use thiserror::Error;

use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Appends serialised records to one CSV file in the session archive.
///
/// The default archiver is detached and drops every record, for modules run without a session.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not open the archive file: {0}")]
    FileError(std::io::Error),

    #[error("Could not write the archive record: {0}")]
    CsvError(csv::Error),
}

/// Something which writes its state to the session archive once per cycle.
pub trait Archived {
    fn write(&mut self) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Open `<arch_root>/<path>` for appending, creating parent directories.
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, ArchiveError> {
        let file_path = session.arch_root.join(path);

        if let Some(dir) = file_path.parent() {
            fs::create_dir_all(dir).map_err(ArchiveError::FileError)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .map_err(ArchiveError::FileError)?;

        Ok(Self {
            writer: Some(WriterBuilder::new().from_writer(file))
        })
    }

    /// Write one record and flush it. The header row comes from the first record.
    ///
    /// Only flat records are supported, nested structs and sequences are rejected by csv.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return Ok(())
        };

        writer.serialize(record).map_err(ArchiveError::CsvError)?;
        writer.flush().map_err(|e| ArchiveError::CsvError(e.into()))
    }
}
