//! Signal-space projection (SSP) items.

use std::io::{Read, Seek};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::matrix::FiffNamedMatrix;
use crate::split_name_list;
use crate::tree::DirNode;

/// One projection item: a set of projection vectors over named channels.
#[derive(Debug, Clone)]
pub struct FiffProj {
    pub kind: i32,
    pub active: bool,
    pub desc: String,
    /// Time point, present for field projections.
    pub time: Option<f32>,
    /// `nvec x nchan` vectors; column names are the channel names.
    pub data: FiffNamedMatrix,
}

/// Read all projection items stored under `node`. An item missing a
/// required piece stops the scan with a warning, returning the items
/// collected so far; a file without any projection block yields an
/// empty list.
pub fn read_proj<R: Read + Seek>(reader: &mut R, node: &DirNode) -> Result<Vec<FiffProj>> {
    let mut projs = Vec::new();

    for proj_block in node.dir_tree_find(FIFFB_PROJ) {
        // channel count stated once for the whole block, overridable per item
        let global_nchan = match proj_block.find_tag(reader, FIFF_NCHAN)? {
            Some(tag) => Some(tag.to_i32()?),
            None => None,
        };

        for item in proj_block.dir_tree_find(FIFFB_PROJ_ITEM) {
            let nchan = match item.find_tag(reader, FIFF_NCHAN)? {
                Some(tag) => Some(tag.to_i32()?),
                None => global_nchan,
            };

            let desc = match item.find_tag(reader, FIFF_DESCRIPTION)? {
                Some(tag) => tag.to_string_value(),
                None => match item.find_tag(reader, FIFF_NAME)? {
                    Some(tag) => tag.to_string_value(),
                    None => {
                        log::warn!("projection item description missing");
                        return Ok(projs);
                    }
                },
            };

            let kind = match item.find_tag(reader, FIFF_PROJ_ITEM_KIND)? {
                Some(tag) => tag.to_i32()?,
                None => {
                    log::warn!("projection item kind missing");
                    return Ok(projs);
                }
            };
            let time = if kind == FIFFV_PROJ_ITEM_FIELD {
                match item.find_tag(reader, FIFF_PROJ_ITEM_TIME)? {
                    Some(tag) => Some(tag.to_f32()?),
                    None => None,
                }
            } else {
                None
            };

            let nvec = match item.find_tag(reader, FIFF_PROJ_ITEM_NVEC)? {
                Some(tag) => tag.to_i32()?,
                None => {
                    log::warn!("number of projection vectors missing");
                    return Ok(projs);
                }
            };
            let names = match item.find_tag(reader, FIFF_PROJ_ITEM_CH_NAME_LIST)? {
                Some(tag) => split_name_list(&tag.to_string_value()),
                None => {
                    log::warn!("projection channel names missing");
                    return Ok(projs);
                }
            };
            let data = match item.find_tag(reader, FIFF_PROJ_ITEM_VECTORS)? {
                Some(tag) => tag.to_float_matrix()?,
                None => {
                    log::warn!("projection vectors missing");
                    return Ok(projs);
                }
            };

            if data.nrows() != nvec as usize {
                return Err(Error::Inconsistency(format!(
                    "projection '{}': {} vectors stated, matrix has {} rows",
                    desc,
                    nvec,
                    data.nrows()
                )));
            }
            if names.len() != data.ncols() {
                return Err(Error::Inconsistency(format!(
                    "projection '{}': {} channel names for {} columns",
                    desc,
                    names.len(),
                    data.ncols()
                )));
            }
            if let Some(nchan) = nchan {
                if nchan as usize != data.ncols() {
                    return Err(Error::Inconsistency(format!(
                        "projection '{}': {} channels stated, matrix has {} columns",
                        desc,
                        nchan,
                        data.ncols()
                    )));
                }
            }

            let active = match item.find_tag(reader, FIFF_MNE_PROJ_ITEM_ACTIVE)? {
                Some(tag) => tag.to_i32()? != 0,
                None => false,
            };

            let (nrow, ncol) = data.dim();
            projs.push(FiffProj {
                kind,
                active,
                desc,
                time,
                data: FiffNamedMatrix {
                    nrow,
                    ncol,
                    row_names: Vec::new(),
                    col_names: names,
                    data,
                },
            });
        }
    }

    Ok(projs)
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

    fn proj_file(with_kind: bool) -> (Vec<u8>, Vec<DirEntry>) {
        let vectors = Array2::from_shape_vec((1, 3), vec![0.5f32, 0.5, 0.7]).unwrap();
        let mut buf = Vec::new();
        let mut dir = Vec::new();
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_PROJ));
        dir.push(push_int_tag(&mut buf, FIFF_NCHAN, 3));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_PROJ_ITEM));
        dir.push(push_tag(&mut buf, FIFF_NAME, FIFFT_STRING, b"PCA-v1"));
        if with_kind {
            dir.push(push_int_tag(
                &mut buf,
                FIFF_PROJ_ITEM_KIND,
                FIFFV_PROJ_ITEM_FIELD,
            ));
        }
        let mut time = Vec::new();
        time.write_f32::<BigEndian>(0.25).unwrap();
        dir.push(push_tag(&mut buf, FIFF_PROJ_ITEM_TIME, FIFFT_FLOAT, &time));
        dir.push(push_int_tag(&mut buf, FIFF_PROJ_ITEM_NVEC, 1));
        dir.push(push_tag(
            &mut buf,
            FIFF_PROJ_ITEM_CH_NAME_LIST,
            FIFFT_STRING,
            b"MEG 0111:MEG 0112:MEG 0113",
        ));
        dir.push(push_tag(
            &mut buf,
            FIFF_PROJ_ITEM_VECTORS,
            FIFFT_FLOAT | FIFFT_MATRIX,
            &matrix_payload(&vectors),
        ));
        dir.push(push_int_tag(&mut buf, FIFF_MNE_PROJ_ITEM_ACTIVE, 1));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_PROJ_ITEM));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_PROJ));
        (buf, dir)
    }

    #[test]
    fn test_read_proj() {
        let (buf, dir) = proj_file(true);
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let projs = read_proj(&mut cur, &tree).unwrap();
        assert_eq!(projs.len(), 1);
        let p = &projs[0];
        assert_eq!(p.kind, FIFFV_PROJ_ITEM_FIELD);
        assert!(p.active);
        assert_eq!(p.desc, "PCA-v1");
        assert_eq!(p.time, Some(0.25));
        assert_eq!((p.data.nrow, p.data.ncol), (1, 3));
        assert_eq!(p.data.col_names[2], "MEG 0113");
        assert_eq!(p.data.data[[0, 2]], 0.7);
    }

    #[test]
    fn test_incomplete_item_stops_scan() {
        let (buf, dir) = proj_file(false);
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        assert!(read_proj(&mut cur, &tree).unwrap().is_empty());
    }

    #[test]
    fn test_no_proj_block_is_empty() {
        let mut buf = Vec::new();
        let mut dir = Vec::new();
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MEAS));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MEAS));
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        assert!(read_proj(&mut cur, &tree).unwrap().is_empty());
    }
}
