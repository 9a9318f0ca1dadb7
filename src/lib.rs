//! Reader and writer for the FIFF binary format.
//!
//! FIFF files are a flat sequence of typed, length-prefixed tags that
//! together describe a tree of nested blocks: measurement metadata,
//! calibration, projections, compensation matrices and bulk raw sample
//! buffers. This crate decodes the tag stream ([`tag`]), rebuilds the
//! block tree ([`tree`]), materializes the domain records
//! ([`meas_info`], [`cov`], [`proj`], [`comp`], [`matrix`]), indexes raw
//! recordings without loading them ([`raw`]) and writes files back out
//! ([`writer`]).
//!
//! ```no_run
//! use fiff_io::{open, read_meas_info};
//!
//! # fn main() -> fiff_io::Result<()> {
//! let (mut reader, tree, _directory) = open("sample_raw.fif")?;
//! if let Some((info, _meas)) = read_meas_info(&mut reader, &tree)? {
//!     println!("{} channels at {} Hz", info.nchan, info.sfreq);
//! }
//! # Ok(())
//! # }
//! ```

pub mod comp;
pub mod constants;
pub mod cov;
pub mod error;
pub mod matrix;
pub mod meas_info;
pub mod proj;
pub mod raw;
pub mod tag;
pub mod tree;
pub mod types;
pub mod writer;

pub use comp::{read_ctf_comp, FiffCtfComp};
pub use cov::{read_cov, FiffCov};
pub use error::{Error, Result};
pub use matrix::{read_named_matrix, FiffNamedMatrix};
pub use meas_info::{read_bad_channels, read_meas_info, FiffInfo};
pub use proj::{read_proj, FiffProj};
pub use raw::{setup_read_raw, FiffRawData, RawDirEntry};
pub use tag::{DirEntry, Tag};
pub use tree::{make_dir_tree, DirNode};
pub use types::{FiffChInfo, FiffCoordTrans, FiffDigPoint, FiffId};
pub use writer::FiffWriter;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use constants::*;
use error::Error as E;

/// Split a colon-delimited name list. Names cannot contain literal
/// colons; the format provides no escaping.
pub fn split_name_list(list: &str) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(':').map(|s| s.to_string()).collect()
}

/// Open a FIFF stream: validate the mandatory file-id/directory-pointer
/// prefix, collect the flat tag directory (stored or by linear scan) and
/// assemble the block tree.
pub fn open_stream<R: Read + Seek>(reader: &mut R) -> Result<(DirNode, Vec<DirEntry>)> {
    reader.seek(SeekFrom::Start(0))?;
    let first = Tag::read_info(reader)?;
    if first.kind != FIFF_FILE_ID {
        return Err(E::Structural(format!(
            "file does not start with a file id tag (kind {})",
            first.kind
        )));
    }
    if first.dtype != FIFFT_ID_STRUCT || first.size != 20 {
        return Err(E::Structural(format!(
            "file id tag has wrong type {} or size {}",
            first.dtype, first.size
        )));
    }
    let second = Tag::read(reader)?;
    if second.kind != FIFF_DIR_POINTER {
        return Err(E::Structural(format!(
            "file id tag is not followed by a directory pointer (kind {})",
            second.kind
        )));
    }
    let dirpos = second.to_i32()?;

    let directory = if dirpos > 0 {
        Tag::read_at(reader, dirpos as u64)?.to_dir_entries()?
    } else {
        scan_directory(reader)?
    };

    let tree = make_dir_tree(reader, &directory)?;
    log::debug!(
        "directory with {} entries, tree with {} top-level blocks",
        directory.len(),
        tree.children.len()
    );
    Ok((tree, directory))
}

/// Open a FIFF file by path. Returns the buffered reader for subsequent
/// positioned tag reads together with the tree and the flat directory.
pub fn open<P: AsRef<Path>>(
    path: P,
) -> Result<(BufReader<File>, DirNode, Vec<DirEntry>)> {
    let mut reader = BufReader::new(File::open(path)?);
    let (tree, directory) = open_stream(&mut reader)?;
    Ok((reader, tree, directory))
}

/// Linear scan for files without a stored directory: walk the tag chain
/// from the start, recording positions, until the terminating next
/// pointer (or the end of a truncated file).
fn scan_directory<R: Read + Seek>(reader: &mut R) -> Result<Vec<DirEntry>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut directory = Vec::new();
    let mut pos = 0u64;
    loop {
        let tag = match Tag::read_info(reader) {
            Ok(tag) => tag,
            Err(E::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };
        directory.push(DirEntry {
            kind: tag.kind,
            dtype: tag.dtype,
            size: tag.size,
            pos,
        });
        if tag.next == FIFFV_NEXT_NONE {
            break;
        }
        if tag.next > 0 {
            reader.seek(SeekFrom::Start(tag.next as u64))?;
        }
        pos = reader.stream_position()?;
    }
    Ok(directory)
}
