//! Measurement info: the full acquisition metadata of a recording.

use std::io::{Read, Seek};
use std::path::PathBuf;

use crate::comp::{read_ctf_comp, FiffCtfComp};
use crate::constants::*;
use crate::error::{Error, Result};
use crate::proj::{read_proj, FiffProj};
use crate::split_name_list;
use crate::tag::Tag;
use crate::tree::DirNode;
use crate::types::{rigid_inverse, FiffChInfo, FiffCoordTrans, FiffDigPoint, FiffId};

/// Channel and acquisition metadata assembled from the measurement-info
/// block and its satellites (HPI result, isotrak, acquisition parameters,
/// projections, compensation, bad channels).
#[derive(Debug, Clone, Default)]
pub struct FiffInfo {
    pub file_id: Option<FiffId>,
    pub meas_id: Option<FiffId>,
    /// Seconds and microseconds; `[-1, -1]` when unknown.
    pub meas_date: [i32; 2],
    pub nchan: i32,
    pub sfreq: f32,
    pub highpass: f32,
    pub lowpass: f32,
    pub chs: Vec<FiffChInfo>,
    pub ch_names: Vec<String>,
    pub dev_head_t: Option<FiffCoordTrans>,
    pub ctf_head_t: Option<FiffCoordTrans>,
    /// Derived device-to-CTF-head transform, present only when both
    /// stored transforms are.
    pub dev_ctf_t: Option<FiffCoordTrans>,
    pub dig: Vec<FiffDigPoint>,
    pub dig_trans: Option<FiffCoordTrans>,
    pub bads: Vec<String>,
    pub projs: Vec<FiffProj>,
    pub comps: Vec<FiffCtfComp>,
    pub acq_pars: String,
    pub acq_stim: String,
    /// Set when the info was read from a file on disk; the writer uses
    /// it to copy donor blocks.
    pub filename: Option<PathBuf>,
}

/// Bad-channel names from the first bad-channels block under `node`;
/// empty when there is none.
pub fn read_bad_channels<R: Read + Seek>(reader: &mut R, node: &DirNode) -> Result<Vec<String>> {
    for bad_node in node.dir_tree_find(FIFFB_MNE_BAD_CHANNELS) {
        if let Some(tag) = bad_node.find_tag(reader, FIFF_MNE_CH_NAME_LIST)? {
            return Ok(split_name_list(&tag.to_string_value()));
        }
    }
    Ok(Vec::new())
}

fn classify_trans(
    cand: FiffCoordTrans,
    dev_head_t: &mut Option<FiffCoordTrans>,
    ctf_head_t: &mut Option<FiffCoordTrans>,
) {
    if cand.from == FIFFV_COORD_DEVICE && cand.to == FIFFV_COORD_HEAD {
        *dev_head_t = Some(cand);
    } else if cand.from == FIFFV_MNE_COORD_CTF_HEAD && cand.to == FIFFV_COORD_HEAD {
        *ctf_head_t = Some(cand);
    }
}

/// Read the measurement info from an assembled tree. Returns the info and
/// the measurement node it came from, or `None` when the file carries no
/// measurement block.
pub fn read_meas_info<'a, R: Read + Seek>(
    reader: &mut R,
    tree: &'a DirNode,
) -> Result<Option<(FiffInfo, &'a DirNode)>> {
    let meas = match tree.dir_tree_find(FIFFB_MEAS).first() {
        Some(node) => *node,
        None => {
            log::debug!("no measurement block in this file");
            return Ok(None);
        }
    };
    let meas_info = match meas.dir_tree_find(FIFFB_MEAS_INFO).first() {
        Some(node) => *node,
        None => {
            log::debug!("measurement block has no measurement info");
            return Ok(None);
        }
    };

    let mut nchan = None;
    let mut sfreq = None;
    let mut chs: Vec<FiffChInfo> = Vec::new();
    let mut lowpass = None;
    let mut highpass = None;
    let mut meas_date = [-1i32, -1];
    let mut dev_head_t = None;
    let mut ctf_head_t = None;

    for entry in &meas_info.directory {
        match entry.kind {
            FIFF_NCHAN => {
                let tag = Tag::read_at(reader, entry.pos)?;
                nchan = Some(tag.to_i32()?);
            }
            FIFF_SFREQ => {
                let tag = Tag::read_at(reader, entry.pos)?;
                sfreq = Some(tag.to_f32()?);
            }
            FIFF_CH_INFO => {
                let tag = Tag::read_at(reader, entry.pos)?;
                chs.push(tag.to_ch_info()?);
            }
            FIFF_LOWPASS => {
                let tag = Tag::read_at(reader, entry.pos)?;
                lowpass = Some(tag.to_f32()?);
            }
            FIFF_HIGHPASS => {
                let tag = Tag::read_at(reader, entry.pos)?;
                highpass = Some(tag.to_f32()?);
            }
            FIFF_MEAS_DATE => {
                let tag = Tag::read_at(reader, entry.pos)?;
                let vals = tag.to_i32_slice()?;
                if vals.len() >= 2 {
                    meas_date = [vals[0], vals[1]];
                }
            }
            FIFF_COORD_TRANS => {
                let tag = Tag::read_at(reader, entry.pos)?;
                classify_trans(tag.to_coord_trans()?, &mut dev_head_t, &mut ctf_head_t);
            }
            _ => {}
        }
    }

    let nchan =
        nchan.ok_or_else(|| Error::Structural("number of channels not defined".to_string()))?;
    let sfreq =
        sfreq.ok_or_else(|| Error::Structural("sampling frequency not defined".to_string()))?;
    if chs.is_empty() {
        return Err(Error::Structural(
            "channel information not defined".to_string(),
        ));
    }
    if chs.len() != nchan as usize {
        return Err(Error::Inconsistency(format!(
            "{} channel definitions for a stated channel count of {}",
            chs.len(),
            nchan
        )));
    }

    // fall back to the HPI result block for missing transforms
    if dev_head_t.is_none() || ctf_head_t.is_none() {
        if let Some(hpi_result) = meas_info.dir_tree_find(FIFFB_HPI_RESULT).first() {
            for tag in hpi_result
                .directory
                .iter()
                .filter(|e| e.kind == FIFF_COORD_TRANS)
                .map(|e| Tag::read_at(reader, e.pos))
            {
                classify_trans(tag?.to_coord_trans()?, &mut dev_head_t, &mut ctf_head_t);
            }
        }
    }

    // Polhemus digitization data
    let mut dig: Vec<FiffDigPoint> = Vec::new();
    let mut coord_frame = FIFFV_COORD_HEAD;
    let mut dig_trans = None;
    if let Some(isotrak) = meas_info.dir_tree_find(FIFFB_ISOTRAK).first() {
        for entry in &isotrak.directory {
            match entry.kind {
                FIFF_DIG_POINT => {
                    let tag = Tag::read_at(reader, entry.pos)?;
                    dig.push(tag.to_dig_point()?);
                }
                FIFF_MNE_COORD_FRAME => {
                    let tag = Tag::read_at(reader, entry.pos)?;
                    coord_frame = tag.to_i32()?;
                }
                FIFF_COORD_TRANS => {
                    let tag = Tag::read_at(reader, entry.pos)?;
                    dig_trans = Some(tag.to_coord_trans()?);
                }
                _ => {}
            }
        }
    }
    for point in dig.iter_mut() {
        point.coord_frame = coord_frame;
    }
    if let Some(t) = &dig_trans {
        if t.from != coord_frame && t.to != coord_frame {
            dig_trans = None;
        }
    }

    // acquisition parameter strings
    let mut acq_pars = String::new();
    let mut acq_stim = String::new();
    if let Some(acq) = meas_info.dir_tree_find(FIFFB_DACQ_PARS).first() {
        if let Some(tag) = acq.find_tag(reader, FIFF_DACQ_PARS)? {
            acq_pars = tag.to_string_value();
        }
        if let Some(tag) = acq.find_tag(reader, FIFF_DACQ_STIM)? {
            acq_stim = tag.to_string_value();
        }
    }

    let projs = read_proj(reader, meas_info)?;
    let comps = read_ctf_comp(reader, meas_info, &chs)?;
    let bads = read_bad_channels(reader, tree)?;

    let file_id = tree.id;
    let meas_id = meas_info
        .parent_id
        .or(meas_info.id)
        .or(meas.id)
        .or(meas.parent_id)
        .or(file_id);
    if meas_date == [-1, -1] {
        if let Some(id) = &meas_id {
            meas_date = [id.secs, id.usecs];
        }
    }

    let dev_ctf_t = match (&dev_head_t, &ctf_head_t) {
        (Some(dev_head), Some(ctf_head)) => {
            let trans = rigid_inverse(&ctf_head.trans).dot(&dev_head.trans);
            Some(FiffCoordTrans::from_forward(
                dev_head.from,
                ctf_head.from,
                trans,
            ))
        }
        _ => None,
    };

    let ch_names = chs.iter().map(|c| c.ch_name.clone()).collect();
    let info = FiffInfo {
        file_id,
        meas_id,
        meas_date,
        nchan,
        sfreq,
        highpass: highpass.unwrap_or(0.0),
        lowpass: lowpass.unwrap_or(sfreq / 2.0),
        chs,
        ch_names,
        dev_head_t,
        ctf_head_t,
        dev_ctf_t,
        dig,
        dig_trans,
        bads,
        projs,
        comps,
        acq_pars,
        acq_stim,
        filename: None,
    };
    Ok(Some((info, meas)))
}
