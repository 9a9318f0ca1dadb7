//! CTF software gradient compensation matrices.

use ndarray::Array1;
use std::io::{Read, Seek};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::matrix::{read_named_matrix, FiffNamedMatrix};
use crate::tree::DirNode;
use crate::types::FiffChInfo;

/// One compensation matrix, held in calibrated form.
#[derive(Debug, Clone)]
pub struct FiffCtfComp {
    /// The CTF code as stored in the file.
    pub ctfkind: i32,
    /// Simplified grade (1/2/3 for the known CTF gradient codes,
    /// otherwise equal to `ctfkind`).
    pub kind: i32,
    /// Whether the file stored the matrix already calibrated.
    pub save_calibrated: bool,
    pub rowcals: Array1<f64>,
    pub colcals: Array1<f64>,
    pub data: FiffNamedMatrix,
}

fn simplify_ctf_kind(ctfkind: i32) -> i32 {
    match ctfkind {
        FIFFV_CTF_GRAD_COMP_G1BR => FIFFV_MNE_CTFV_COMP_G1BR,
        FIFFV_CTF_GRAD_COMP_G2BR => FIFFV_MNE_CTFV_COMP_G2BR,
        FIFFV_CTF_GRAD_COMP_G3BR => FIFFV_MNE_CTFV_COMP_G3BR,
        other => other,
    }
}

fn calibration_for(chs: &[FiffChInfo], name: &str) -> Result<f64> {
    let mut found = None;
    for ch in chs {
        if ch.ch_name == name {
            if found.is_some() {
                return Err(Error::Inconsistency(format!(
                    "ambiguous channel name {name} in compensation data"
                )));
            }
            found = Some(ch.calibration());
        }
    }
    found.ok_or_else(|| {
        Error::Inconsistency(format!(
            "channel {name} referenced by compensation data is not present"
        ))
    })
}

/// Read all compensation matrices under `node`, rescaling uncalibrated
/// ones into calibrated form using the channel calibrations in `chs`.
pub fn read_ctf_comp<R: Read + Seek>(
    reader: &mut R,
    node: &DirNode,
    chs: &[FiffChInfo],
) -> Result<Vec<FiffCtfComp>> {
    let mut comps = Vec::new();

    // comp-data blocks are matched anywhere below `node`; a missing
    // wrapper block around them is tolerated
    for data_node in node.dir_tree_find(FIFFB_MNE_CTF_COMP_DATA) {
        let mut mat = read_named_matrix(reader, data_node, FIFF_MNE_CTF_COMP_DATA)?;

        let ctfkind = match data_node.find_tag(reader, FIFF_MNE_CTF_COMP_KIND)? {
            Some(tag) => tag.to_i32()?,
            None => {
                log::warn!("compensation kind missing, skipping");
                continue;
            }
        };
        let kind = simplify_ctf_kind(ctfkind);

        let calibrated = match data_node.find_tag(reader, FIFF_MNE_CTF_COMP_CALIBRATED)? {
            Some(tag) => tag.to_i32()? != 0,
            None => false,
        };

        let mut rowcals = Array1::<f64>::ones(mat.nrow);
        let mut colcals = Array1::<f64>::ones(mat.ncol);
        if !calibrated {
            for (c, name) in mat.col_names.iter().enumerate() {
                colcals[c] = 1.0 / calibration_for(chs, name)?;
            }
            for (r, name) in mat.row_names.iter().enumerate() {
                rowcals[r] = calibration_for(chs, name)?;
            }
            for r in 0..mat.nrow {
                for c in 0..mat.ncol {
                    mat.data[[r, c]] *= (rowcals[r] * colcals[c]) as f32;
                }
            }
        }

        comps.push(FiffCtfComp {
            ctfkind,
            kind,
            save_calibrated: calibrated,
            rowcals,
            colcals,
            data: mat,
        });
    }

    Ok(comps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::DirEntry;
    use crate::tree::make_dir_tree;
    use byteorder::{BigEndian, WriteBytesExt};
    use ndarray::Array2;
    use std::io::Cursor;

    fn push_tag(buf: &mut Vec<u8>, kind: i32, dtype: i32, data: &[u8]) -> DirEntry {
        let pos = buf.len() as u64;
        buf.write_i32::<BigEndian>(kind).unwrap();
        buf.write_i32::<BigEndian>(dtype).unwrap();
        buf.write_i32::<BigEndian>(data.len() as i32).unwrap();
        buf.write_i32::<BigEndian>(FIFFV_NEXT_SEQ).unwrap();
        buf.extend_from_slice(data);
        DirEntry {
            kind,
            dtype,
            size: data.len() as i32,
            pos,
        }
    }

    fn push_int_tag(buf: &mut Vec<u8>, kind: i32, value: i32) -> DirEntry {
        push_tag(buf, kind, FIFFT_INT, &value.to_be_bytes())
    }

    fn matrix_payload(mat: &Array2<f32>) -> Vec<u8> {
        let mut data = Vec::new();
        for c in 0..mat.ncols() {
            for r in 0..mat.nrows() {
                data.write_f32::<BigEndian>(mat[[r, c]]).unwrap();
            }
        }
        data.write_i32::<BigEndian>(mat.ncols() as i32).unwrap();
        data.write_i32::<BigEndian>(mat.nrows() as i32).unwrap();
        data.write_i32::<BigEndian>(2).unwrap();
        data
    }

    fn comp_file(calibrated: bool) -> (Vec<u8>, Vec<DirEntry>) {
        let mat = Array2::from_shape_vec((1, 2), vec![2.0f32, 4.0]).unwrap();
        let mut buf = Vec::new();
        let mut dir = Vec::new();
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_CTF_COMP));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_CTF_COMP_DATA));
        dir.push(push_int_tag(
            &mut buf,
            FIFF_MNE_CTF_COMP_KIND,
            FIFFV_CTF_GRAD_COMP_G1BR,
        ));
        dir.push(push_int_tag(
            &mut buf,
            FIFF_MNE_CTF_COMP_CALIBRATED,
            calibrated as i32,
        ));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_NAMED_MATRIX));
        dir.push(push_tag(&mut buf, FIFF_MNE_ROW_NAMES, FIFFT_STRING, b"MEG 0111"));
        dir.push(push_tag(
            &mut buf,
            FIFF_MNE_COL_NAMES,
            FIFFT_STRING,
            b"REF 0101:REF 0102",
        ));
        dir.push(push_tag(
            &mut buf,
            FIFF_MNE_CTF_COMP_DATA,
            FIFFT_FLOAT | FIFFT_MATRIX,
            &matrix_payload(&mat),
        ));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_NAMED_MATRIX));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_CTF_COMP_DATA));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_CTF_COMP));
        (buf, dir)
    }

    fn ch(name: &str, range: f32, cal: f32) -> FiffChInfo {
        FiffChInfo {
            ch_name: name.to_string(),
            range,
            cal,
            ..FiffChInfo::default()
        }
    }

    #[test]
    fn test_uncalibrated_comp_is_rescaled() {
        let (buf, dir) = comp_file(false);
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let chs = vec![
            ch("MEG 0111", 2.0, 3.0),
            ch("REF 0101", 1.0, 4.0),
            ch("REF 0102", 1.0, 8.0),
        ];
        let comps = read_ctf_comp(&mut cur, &tree, &chs).unwrap();
        assert_eq!(comps.len(), 1);
        let c = &comps[0];
        assert_eq!(c.ctfkind, FIFFV_CTF_GRAD_COMP_G1BR);
        assert_eq!(c.kind, FIFFV_MNE_CTFV_COMP_G1BR);
        assert!(!c.save_calibrated);
        // row cal 6, col cals 1/4 and 1/8
        assert!((c.data.data[[0, 0]] - 2.0 * 6.0 / 4.0).abs() < 1e-5);
        assert!((c.data.data[[0, 1]] - 4.0 * 6.0 / 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_comp_data_without_wrapper_block() {
        let mat = Array2::from_shape_vec((1, 1), vec![2.0f32]).unwrap();
        let mut buf = Vec::new();
        let mut dir = Vec::new();
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_CTF_COMP_DATA));
        dir.push(push_int_tag(
            &mut buf,
            FIFF_MNE_CTF_COMP_KIND,
            FIFFV_CTF_GRAD_COMP_G3BR,
        ));
        dir.push(push_int_tag(&mut buf, FIFF_MNE_CTF_COMP_CALIBRATED, 1));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_NAMED_MATRIX));
        dir.push(push_tag(&mut buf, FIFF_MNE_ROW_NAMES, FIFFT_STRING, b"MEG 0111"));
        dir.push(push_tag(&mut buf, FIFF_MNE_COL_NAMES, FIFFT_STRING, b"REF 0101"));
        dir.push(push_tag(
            &mut buf,
            FIFF_MNE_CTF_COMP_DATA,
            FIFFT_FLOAT | FIFFT_MATRIX,
            &matrix_payload(&mat),
        ));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_NAMED_MATRIX));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_CTF_COMP_DATA));

        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let chs = vec![ch("MEG 0111", 2.0, 3.0), ch("REF 0101", 1.0, 4.0)];
        let comps = read_ctf_comp(&mut cur, &tree, &chs).unwrap();
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].kind, FIFFV_MNE_CTFV_COMP_G3BR);
        assert_eq!(comps[0].data.data[[0, 0]], 2.0);
    }

    #[test]
    fn test_calibrated_comp_left_alone() {
        let (buf, dir) = comp_file(true);
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let chs = vec![
            ch("MEG 0111", 2.0, 3.0),
            ch("REF 0101", 1.0, 4.0),
            ch("REF 0102", 1.0, 8.0),
        ];
        let comps = read_ctf_comp(&mut cur, &tree, &chs).unwrap();
        let c = &comps[0];
        assert!(c.save_calibrated);
        assert_eq!(c.data.data[[0, 0]], 2.0);
        assert_eq!(c.data.data[[0, 1]], 4.0);
        assert_eq!(c.rowcals[0], 1.0);
    }

    #[test]
    fn test_ambiguous_channel_name_is_error() {
        let (buf, dir) = comp_file(false);
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let chs = vec![
            ch("MEG 0111", 2.0, 3.0),
            ch("REF 0101", 1.0, 4.0),
            ch("REF 0101", 1.0, 5.0),
            ch("REF 0102", 1.0, 8.0),
        ];
        assert!(matches!(
            read_ctf_comp(&mut cur, &tree, &chs),
            Err(Error::Inconsistency(_))
        ));
    }

    #[test]
    fn test_missing_channel_is_error() {
        let (buf, dir) = comp_file(false);
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let chs = vec![ch("MEG 0111", 2.0, 3.0), ch("REF 0101", 1.0, 4.0)];
        assert!(matches!(
            read_ctf_comp(&mut cur, &tree, &chs),
            Err(Error::Inconsistency(_))
        ));
    }
}
