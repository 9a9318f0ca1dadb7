//! Covariance matrix records.

use ndarray::{Array1, Array2};
use std::io::{Read, Seek};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::meas_info::read_bad_channels;
use crate::proj::{read_proj, FiffProj};
use crate::split_name_list;
use crate::tag::Tag;
use crate::tree::DirNode;

/// A covariance matrix of one of the stored kinds (noise, source, ...).
///
/// `data` holds either the diagonal (`dim` values) or the packed lower
/// triangle (`dim*(dim+1)/2` values), selected by `diag`.
#[derive(Debug, Clone)]
pub struct FiffCov {
    pub kind: i32,
    pub diag: bool,
    pub dim: i32,
    pub names: Vec<String>,
    pub data: Array1<f64>,
    pub projs: Vec<FiffProj>,
    pub bads: Vec<String>,
    /// Degrees of freedom, -1 when not stored.
    pub nfree: i32,
    pub eig: Option<Array1<f64>>,
    pub eigvec: Option<Array2<f32>>,
}

fn to_f64_vector(tag: &Tag) -> Result<Vec<f64>> {
    match tag.base_type() {
        FIFFT_DOUBLE => tag.to_f64_slice(),
        FIFFT_FLOAT => Ok(tag.to_f32_slice()?.into_iter().map(f64::from).collect()),
        _ => Err(Error::UnsupportedType(tag.dtype)),
    }
}

/// Read the first covariance block of the requested kind under `node`.
/// No block of that kind is a normal outcome, reported as `Ok(None)`.
pub fn read_cov<R: Read + Seek>(
    reader: &mut R,
    node: &DirNode,
    kind: i32,
) -> Result<Option<FiffCov>> {
    for cov_node in node.dir_tree_find(FIFFB_MNE_COV) {
        let this_kind = match cov_node.find_tag(reader, FIFF_MNE_COV_KIND)? {
            Some(tag) => tag.to_i32()?,
            None => continue,
        };
        if this_kind != kind {
            continue;
        }

        let dim = cov_node
            .find_tag(reader, FIFF_MNE_COV_DIM)?
            .ok_or_else(|| Error::Structural("covariance dimension missing".to_string()))?
            .to_i32()?;

        let names = match cov_node.find_tag(reader, FIFF_MNE_ROW_NAMES)? {
            Some(tag) => {
                let names = split_name_list(&tag.to_string_value());
                if names.len() != dim as usize {
                    return Err(Error::Inconsistency(format!(
                        "{} covariance row names for dimension {}",
                        names.len(),
                        dim
                    )));
                }
                names
            }
            None => Vec::new(),
        };

        // diagonal storage takes precedence when both tags are present
        let (diag, data) = match cov_node.find_tag(reader, FIFF_MNE_COV_DIAG)? {
            Some(tag) => {
                let vals = to_f64_vector(&tag)?;
                if vals.len() != dim as usize {
                    return Err(Error::Inconsistency(format!(
                        "diagonal covariance has {} values for dimension {}",
                        vals.len(),
                        dim
                    )));
                }
                (true, Array1::from(vals))
            }
            None => match cov_node.find_tag(reader, FIFF_MNE_COV)? {
                Some(tag) => {
                    let vals = to_f64_vector(&tag)?;
                    let expected = (dim * (dim + 1) / 2) as usize;
                    if vals.len() != expected {
                        return Err(Error::Inconsistency(format!(
                            "packed covariance has {} values, expected {} for dimension {}",
                            vals.len(),
                            expected,
                            dim
                        )));
                    }
                    (false, Array1::from(vals))
                }
                None => {
                    return Err(Error::Structural(
                        "covariance block carries no matrix data".to_string(),
                    ))
                }
            },
        };

        // the decomposition is attached whole or not at all
        let eig_tag = cov_node.find_tag(reader, FIFF_MNE_COV_EIGENVALUES)?;
        let eigvec_tag = cov_node.find_tag(reader, FIFF_MNE_COV_EIGENVECTORS)?;
        let (eig, eigvec) = match (eig_tag, eigvec_tag) {
            (Some(e), Some(v)) => (
                Some(Array1::from(to_f64_vector(&e)?)),
                Some(v.to_float_matrix()?),
            ),
            _ => (None, None),
        };

        let nfree = match cov_node.find_tag(reader, FIFF_MNE_COV_NFREE)? {
            Some(tag) => tag.to_i32()?,
            None => -1,
        };

        let projs = read_proj(reader, cov_node)?;
        let bads = read_bad_channels(reader, cov_node)?;

        return Ok(Some(FiffCov {
            kind,
            diag,
            dim,
            names,
            data,
            projs,
            bads,
            nfree,
            eig,
            eigvec,
        }));
    }
    Ok(None)
}
