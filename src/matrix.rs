//! Named matrices: a float matrix with row and column channel names.

use ndarray::Array2;
use std::io::{Read, Seek};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::split_name_list;
use crate::tree::DirNode;

/// A matrix whose rows and columns are labelled with channel names.
/// Either name list may be empty when the file does not provide one.
#[derive(Debug, Clone, Default)]
pub struct FiffNamedMatrix {
    pub nrow: usize,
    pub ncol: usize,
    pub row_names: Vec<String>,
    pub col_names: Vec<String>,
    pub data: Array2<f32>,
}

/// Read a named matrix stored under `node`. The matrix data tag `matkind`
/// is looked up on the node itself first; failing that, one level down in
/// a `FIFFB_MNE_NAMED_MATRIX` child.
pub fn read_named_matrix<R: Read + Seek>(
    reader: &mut R,
    node: &DirNode,
    matkind: i32,
) -> Result<FiffNamedMatrix> {
    let node = if node.has_tag(matkind) {
        node
    } else {
        node.children
            .iter()
            .find(|c| c.block == FIFFB_MNE_NAMED_MATRIX && c.has_tag(matkind))
            .ok_or_else(|| {
                Error::Structural(format!("matrix data (tag {matkind}) not found"))
            })?
    };

    let tag = node
        .find_tag(reader, matkind)?
        .ok_or_else(|| Error::Structural(format!("matrix data (tag {matkind}) not found")))?;
    let data = tag.to_float_matrix()?;
    let (nrow, ncol) = data.dim();

    if let Some(tag) = node.find_tag(reader, FIFF_MNE_NROW)? {
        if tag.to_i32()? as usize != nrow {
            return Err(Error::Inconsistency(format!(
                "stated number of rows {} does not match matrix ({})",
                tag.to_i32()?,
                nrow
            )));
        }
    }
    if let Some(tag) = node.find_tag(reader, FIFF_MNE_NCOL)? {
        if tag.to_i32()? as usize != ncol {
            return Err(Error::Inconsistency(format!(
                "stated number of columns {} does not match matrix ({})",
                tag.to_i32()?,
                ncol
            )));
        }
    }

    let row_names = match node.find_tag(reader, FIFF_MNE_ROW_NAMES)? {
        Some(tag) => split_name_list(&tag.to_string_value()),
        None => Vec::new(),
    };
    if !row_names.is_empty() && row_names.len() != nrow {
        return Err(Error::Inconsistency(format!(
            "{} row names for a matrix with {} rows",
            row_names.len(),
            nrow
        )));
    }
    let col_names = match node.find_tag(reader, FIFF_MNE_COL_NAMES)? {
        Some(tag) => split_name_list(&tag.to_string_value()),
        None => Vec::new(),
    };
    if !col_names.is_empty() && col_names.len() != ncol {
        return Err(Error::Inconsistency(format!(
            "{} column names for a matrix with {} columns",
            col_names.len(),
            ncol
        )));
    }

    Ok(FiffNamedMatrix {
        nrow,
        ncol,
        row_names,
        col_names,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::DirEntry;
    use crate::tree::make_dir_tree;
    use byteorder::{BigEndian, WriteBytesExt};
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

    fn named_matrix_file(nrow: i32, row_names: &str) -> (Vec<u8>, Vec<DirEntry>) {
        let mat = Array2::from_shape_vec((2, 3), vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut buf = Vec::new();
        let mut dir = Vec::new();
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_CTF_COMP_DATA));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_NAMED_MATRIX));
        dir.push(push_int_tag(&mut buf, FIFF_MNE_NROW, nrow));
        dir.push(push_int_tag(&mut buf, FIFF_MNE_NCOL, 3));
        dir.push(push_tag(
            &mut buf,
            FIFF_MNE_ROW_NAMES,
            FIFFT_STRING,
            row_names.as_bytes(),
        ));
        dir.push(push_tag(
            &mut buf,
            FIFF_MNE_COL_NAMES,
            FIFFT_STRING,
            b"MEG 0111:MEG 0112:MEG 0113",
        ));
        dir.push(push_tag(
            &mut buf,
            FIFF_MNE_CTF_COMP_DATA,
            FIFFT_FLOAT | FIFFT_MATRIX,
            &matrix_payload(&mat),
        ));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_NAMED_MATRIX));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_CTF_COMP_DATA));
        (buf, dir)
    }

    #[test]
    fn test_read_named_matrix_descends_one_level() {
        let (buf, dir) = named_matrix_file(2, "MEG 0141:MEG 0142");
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let comp = &tree.children[0];
        assert!(!comp.has_tag(FIFF_MNE_CTF_COMP_DATA));
        let m = read_named_matrix(&mut cur, comp, FIFF_MNE_CTF_COMP_DATA).unwrap();
        assert_eq!((m.nrow, m.ncol), (2, 3));
        assert_eq!(m.row_names, vec!["MEG 0141", "MEG 0142"]);
        assert_eq!(m.col_names.len(), 3);
        assert_eq!(m.data[[0, 1]], 2.0);
        assert_eq!(m.data[[1, 2]], 6.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let (buf, dir) = named_matrix_file(5, "MEG 0141:MEG 0142");
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let comp = &tree.children[0];
        assert!(matches!(
            read_named_matrix(&mut cur, comp, FIFF_MNE_CTF_COMP_DATA),
            Err(Error::Inconsistency(_))
        ));
    }

    #[test]
    fn test_name_count_mismatch_rejected() {
        let (buf, dir) = named_matrix_file(2, "MEG 0141:MEG 0142:MEG 0143");
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        let comp = &tree.children[0];
        assert!(matches!(
            read_named_matrix(&mut cur, comp, FIFF_MNE_CTF_COMP_DATA),
            Err(Error::Inconsistency(_))
        ));
    }

    #[test]
    fn test_missing_matrix_is_structural() {
        let mut buf = Vec::new();
        let mut dir = Vec::new();
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_START, FIFFB_MNE_CTF_COMP_DATA));
        dir.push(push_int_tag(&mut buf, FIFF_BLOCK_END, FIFFB_MNE_CTF_COMP_DATA));
        let mut cur = Cursor::new(buf);
        let tree = make_dir_tree(&mut cur, &dir).unwrap();
        assert!(matches!(
            read_named_matrix(&mut cur, &tree.children[0], FIFF_MNE_CTF_COMP_DATA),
            Err(Error::Structural(_))
        ));
    }
}
