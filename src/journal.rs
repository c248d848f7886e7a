//! Append-only strength journal.
//!
//! The chain store is in-memory; the only durable artifact is a log of
//! `(block_id, local_strength)` pairs, enough to rebuild state on restart
//! by refetching and re-validating the blocks themselves.
//!
//! Record layout: 32-byte block id, u32-BE length, big-endian strength
//! magnitude. A torn tail record (crash mid-write) is detected and
//! ignored on replay.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::Path;

use num_bigint::BigUint;
use tracing::{debug, warn};

use crate::block::BlockId;
use crate::{Error, Result};

pub struct Journal {
    file: File,
}

impl Journal {
    /// Open (or create) a journal at `path`, positioned for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path.as_ref())
            .map_err(|e| Error::Journal(e.to_string()))?;
        Ok(Journal { file })
    }

    /// Append one record and flush it to the OS.
    pub fn record(&mut self, id: &BlockId, strength: &BigUint) -> Result<()> {
        let magnitude = strength.to_bytes_be();
        let mut buf = Vec::with_capacity(32 + 4 + magnitude.len());
        buf.extend_from_slice(&id.0);
        buf.extend_from_slice(&(magnitude.len() as u32).to_be_bytes());
        buf.extend_from_slice(&magnitude);
        self.file
            .write_all(&buf)
            .and_then(|_| self.file.flush())
            .map_err(|e| Error::Journal(e.to_string()))?;
        debug!(block = %id, "journaled strength");
        Ok(())
    }

    /// Read every complete record from a journal file, in append order.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<(BlockId, BigUint)>> {
        let file = File::open(path.as_ref()).map_err(|e| Error::Journal(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        loop {
            let mut id = [0u8; 32];
            match reader.read_exact(&mut id) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Error::Journal(e.to_string())),
            }
            let mut len = [0u8; 4];
            if read_or_torn(&mut reader, &mut len)? {
                break;
            }
            let mut magnitude = vec![0u8; u32::from_be_bytes(len) as usize];
            if read_or_torn(&mut reader, &mut magnitude)? {
                break;
            }
            records.push((BlockId(id), BigUint::from_bytes_be(&magnitude)));
        }
        Ok(records)
    }
}

/// Read exactly `buf`, returning `Ok(true)` on a clean-EOF torn record.
fn read_or_torn(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            warn!("torn record at journal tail, ignoring");
            Ok(true)
        }
        Err(e) => Err(Error::Journal(e.to_string())),
    }
}
