//! Raw-data indexing: mapping sample ranges onto on-disk buffer tags
//! without loading the sample data.

use std::path::Path;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::meas_info::{read_meas_info, FiffInfo};
use crate::tag::{DirEntry, Tag};

/// One slot of the raw-data directory: either a buffer on disk (`ent`
/// present) or a gap of skipped samples (`ent` absent).
#[derive(Debug, Clone)]
pub struct RawDirEntry {
    pub ent: Option<DirEntry>,
    pub first: i32,
    pub last: i32,
    pub nsamp: i32,
}

/// Index of a raw recording: measurement info, sample range, per-channel
/// calibration and the buffer directory. Holds no open file handle;
/// entries retain byte positions for later reads.
#[derive(Debug, Clone)]
pub struct FiffRawData {
    pub info: FiffInfo,
    pub first_samp: i32,
    pub last_samp: i32,
    pub cals: Vec<f64>,
    pub rawdir: Vec<RawDirEntry>,
}

fn sample_width(dtype: i32) -> Result<i32> {
    match dtype {
        FIFFT_SHORT | FIFFT_DAU_PACK16 => Ok(2),
        FIFFT_INT | FIFFT_FLOAT => Ok(4),
        other => Err(Error::UnsupportedType(other)),
    }
}

fn buffer_nsamp(ent: &DirEntry, nchan: i32) -> Result<i32> {
    let frame = sample_width(ent.dtype)? * nchan;
    if ent.size % frame != 0 {
        return Err(Error::Inconsistency(format!(
            "data buffer of {} bytes is not a whole number of {}-byte sample frames",
            ent.size, frame
        )));
    }
    Ok(ent.size / frame)
}

/// Open a raw recording and build its sample index.
pub fn setup_read_raw<P: AsRef<Path>>(path: P, allow_maxshield: bool) -> Result<FiffRawData> {
    let path = path.as_ref();
    log::debug!("opening raw data file {}", path.display());
    let (mut reader, tree, _directory) = crate::open(path)?;

    let (mut info, meas) = read_meas_info(&mut reader, &tree)?
        .ok_or_else(|| Error::Structural("no measurement data in file".to_string()))?;

    let raw_node = meas
        .dir_tree_find(FIFFB_RAW_DATA)
        .into_iter()
        .next()
        .or_else(|| meas.dir_tree_find(FIFFB_CONTINUOUS_DATA).into_iter().next())
        .or_else(|| {
            if allow_maxshield {
                meas.dir_tree_find(FIFFB_SMSH_RAW_DATA).into_iter().next()
            } else {
                None
            }
        })
        .ok_or_else(|| Error::Structural(format!("no raw data in {}", path.display())))?;

    info.filename = Some(path.to_path_buf());
    let nchan = info.nchan;

    let dir = &raw_node.directory;
    let mut next = 0usize;
    let mut first_samp = 0i32;
    let mut first_skip = 0i32;

    if let Some(ent) = dir.first() {
        if ent.kind == FIFF_FIRST_SAMPLE {
            first_samp = Tag::read_at(&mut reader, ent.pos)?.to_i32()?;
            next += 1;
        }
    }
    // an initial skip can be resolved only once the buffer size is known
    if let Some(ent) = dir.get(next) {
        if ent.kind == FIFF_DATA_SKIP {
            first_skip = Tag::read_at(&mut reader, ent.pos)?.to_i32()?;
            next += 1;
        }
    }

    let mut rawdir = Vec::new();
    let mut nskip = 0i32;
    for ent in &dir[next..] {
        if ent.kind == FIFF_DATA_SKIP {
            nskip = Tag::read_at(&mut reader, ent.pos)?.to_i32()?;
        } else if ent.kind == FIFF_DATA_BUFFER {
            let nsamp = buffer_nsamp(ent, nchan)?;
            // the initial skip advances the first sample without an entry
            if first_skip > 0 {
                first_samp += nsamp * first_skip;
                first_skip = 0;
            }
            if nskip > 0 {
                rawdir.push(RawDirEntry {
                    ent: None,
                    first: first_samp,
                    last: first_samp + nskip * nsamp - 1,
                    nsamp: nskip * nsamp,
                });
                first_samp += nskip * nsamp;
                nskip = 0;
            }
            rawdir.push(RawDirEntry {
                ent: Some(ent.clone()),
                first: first_samp,
                last: first_samp + nsamp - 1,
                nsamp,
            });
            first_samp += nsamp;
        }
    }

    let data_first_samp = rawdir.first().map(|r| r.first).unwrap_or(first_samp);
    let cals = info.chs.iter().map(|c| c.calibration()).collect();

    log::debug!(
        "raw range {} ... {} = {:.3} ... {:.3} secs",
        data_first_samp,
        first_samp - 1,
        data_first_samp as f64 / info.sfreq as f64,
        (first_samp - 1) as f64 / info.sfreq as f64
    );

    Ok(FiffRawData {
        info,
        first_samp: data_first_samp,
        last_samp: first_samp - 1,
        cals,
        rawdir,
    })
}
