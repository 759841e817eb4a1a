//! Instruction-id to source-location table
//!
//! The table is written once by the instrumentation and read before analysis. It is
//! a sequence of fixed-size little-endian records:
//!
//! ```text
//! iid: u64 | line: u32 | column: u32 | file: [u8; 64], NUL-padded
//! ```

use crate::interpreter::operand::Iid;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FILE_NAME_LEN: usize = 64;
pub const RECORD_SIZE: usize = 8 + 4 + 4 + FILE_NAME_LEN;

#[derive(Debug, Error)]
pub enum DebugInfoError {
    #[error("cannot read debug information from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("debug information truncated: {trailing} trailing bytes after record {records}")]
    Truncated { records: usize, trailing: usize },

    #[error("read error: {0}")]
    Read(#[from] io::Error),
}

/// Source position of one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for DebugLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function {}, Line {}, Column {}",
            self.file, self.line, self.column
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DebugInfoMap {
    entries: FxHashMap<Iid, DebugLocation>,
}

impl DebugInfoMap {
    pub fn new() -> Self {
        DebugInfoMap::default()
    }

    /// Parse every record from `reader`
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, DebugInfoError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let records = bytes.len() / RECORD_SIZE;
        let trailing = bytes.len() % RECORD_SIZE;
        if trailing != 0 {
            return Err(DebugInfoError::Truncated { records, trailing });
        }

        let mut map = DebugInfoMap::new();
        for (iid, location) in bytes.chunks_exact(RECORD_SIZE).filter_map(decode_record) {
            map.insert(iid, location);
        }
        Ok(map)
    }

    pub fn load(path: &Path) -> Result<Self, DebugInfoError> {
        let file = File::open(path).map_err(|source| DebugInfoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_from(BufReader::new(file))
    }

    /// Serialize in ascending id order; file names longer than the field are cut
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut ids: Vec<&Iid> = self.entries.keys().collect();
        ids.sort();
        for iid in ids {
            let loc = &self.entries[iid];
            let mut file = [0u8; FILE_NAME_LEN];
            let name = loc.file.as_bytes();
            let n = name.len().min(FILE_NAME_LEN - 1);
            file[..n].copy_from_slice(&name[..n]);

            writer.write_all(&iid.to_le_bytes())?;
            writer.write_all(&loc.line.to_le_bytes())?;
            writer.write_all(&loc.column.to_le_bytes())?;
            writer.write_all(&file)?;
        }
        Ok(())
    }

    pub fn get(&self, iid: Iid) -> Option<&DebugLocation> {
        self.entries.get(&iid)
    }

    pub fn insert(&mut self, iid: Iid, location: DebugLocation) {
        self.entries.insert(iid, location);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split one `RECORD_SIZE` record into its id and location
fn decode_record(record: &[u8]) -> Option<(Iid, DebugLocation)> {
    let (iid, rest) = record.split_first_chunk::<8>()?;
    let (line, rest) = rest.split_first_chunk::<4>()?;
    let (column, file) = rest.split_first_chunk::<4>()?;
    let end = file.iter().position(|&b| b == 0).unwrap_or(file.len());
    let location = DebugLocation {
        file: String::from_utf8_lossy(&file[..end]).into_owned(),
        line: u32::from_le_bytes(*line),
        column: u32::from_le_bytes(*column),
    };
    Some((u64::from_le_bytes(*iid), location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_survive_serialization() {
        let mut map = DebugInfoMap::new();
        map.insert(
            42,
            DebugLocation {
                file: "main.c".into(),
                line: 7,
                column: 3,
            },
        );
        let mut bytes = Vec::new();
        map.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), RECORD_SIZE);

        let back = DebugInfoMap::read_from(bytes.as_slice()).unwrap();
        assert_eq!(back.get(42), map.get(42));
        assert_eq!(back.get(43), None);
    }

    #[test]
    fn record_fields_decode_little_endian() {
        let mut record = vec![0u8; RECORD_SIZE];
        record[..8].copy_from_slice(&7u64.to_le_bytes());
        record[8..12].copy_from_slice(&12u32.to_le_bytes());
        record[12..16].copy_from_slice(&5u32.to_le_bytes());
        record[16..19].copy_from_slice(b"a.c");

        let (iid, location) = decode_record(&record).unwrap();
        assert_eq!(iid, 7);
        assert_eq!((location.line, location.column), (12, 5));
        assert_eq!(location.file, "a.c");
        assert!(decode_record(&record[..10]).is_none());
    }

    #[test]
    fn partial_records_are_rejected() {
        let bytes = vec![0u8; RECORD_SIZE + 5];
        assert!(matches!(
            DebugInfoMap::read_from(bytes.as_slice()),
            Err(DebugInfoError::Truncated {
                records: 1,
                trailing: 5
            })
        ));
    }
}
