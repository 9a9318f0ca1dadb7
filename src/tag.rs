//! Tag codec: the typed, length-prefixed records a FIFF file is made of.
//!
//! Every tag is a 16-byte big-endian header (kind, type, size, next)
//! followed by `size` payload bytes. `next` is either a sentinel
//! ([`FIFFV_NEXT_SEQ`]/[`FIFFV_NEXT_NONE`]) or the byte offset of the
//! following tag.

use byteorder::{BigEndian, ReadBytesExt};
use ndarray::Array2;
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::{FiffChInfo, FiffCoordTrans, FiffDigPoint, FiffId};

/// One entry of the flat tag directory: where a tag lives and what it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: i32,
    pub dtype: i32,
    pub size: i32,
    /// Byte offset of the tag header in the file.
    pub pos: u64,
}

/// A decoded tag: header fields plus the raw payload bytes.
#[derive(Debug, Clone)]
pub struct Tag {
    pub kind: i32,
    pub dtype: i32,
    pub size: i32,
    pub next: i32,
    pub data: Vec<u8>,
}

impl Tag {
    /// Read only the header, leaving the stream positioned after the
    /// payload (used by the directory-less scan).
    pub fn read_info<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let kind = reader.read_i32::<BigEndian>()?;
        let dtype = reader.read_i32::<BigEndian>()?;
        let size = reader.read_i32::<BigEndian>()?;
        let next = reader.read_i32::<BigEndian>()?;
        if size > 0 {
            reader.seek(SeekFrom::Current(size as i64))?;
        }
        Ok(Tag {
            kind,
            dtype,
            size,
            next,
            data: Vec::new(),
        })
    }

    /// Read a full tag (header + payload) at the current position.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let kind = reader.read_i32::<BigEndian>()?;
        let dtype = reader.read_i32::<BigEndian>()?;
        let size = reader.read_i32::<BigEndian>()?;
        let next = reader.read_i32::<BigEndian>()?;
        let mut data = vec![0u8; size.max(0) as usize];
        reader.read_exact(&mut data)?;
        Ok(Tag {
            kind,
            dtype,
            size,
            next,
            data,
        })
    }

    /// Seek to `pos`, then read a full tag.
    pub fn read_at<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(pos))?;
        Self::read(reader)
    }

    /// Is the matrix coding bit set in the type word?
    pub fn is_matrix(&self) -> bool {
        self.dtype & FIFFT_MATRIX != 0
    }

    /// Type word with the matrix coding stripped.
    pub fn base_type(&self) -> i32 {
        self.dtype & 0xFFFF
    }

    pub fn to_i32(&self) -> Result<i32> {
        if self.data.len() < 4 {
            return Err(Error::Inconsistency(format!(
                "tag {} payload too small for an int",
                self.kind
            )));
        }
        Ok(Cursor::new(&self.data).read_i32::<BigEndian>()?)
    }

    pub fn to_i32_slice(&self) -> Result<Vec<i32>> {
        let n = self.data.len() / 4;
        let mut cur = Cursor::new(&self.data);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(cur.read_i32::<BigEndian>()?);
        }
        Ok(out)
    }

    pub fn to_f32(&self) -> Result<f32> {
        if self.data.len() < 4 {
            return Err(Error::Inconsistency(format!(
                "tag {} payload too small for a float",
                self.kind
            )));
        }
        Ok(Cursor::new(&self.data).read_f32::<BigEndian>()?)
    }

    pub fn to_f32_slice(&self) -> Result<Vec<f32>> {
        let n = self.data.len() / 4;
        let mut cur = Cursor::new(&self.data);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(cur.read_f32::<BigEndian>()?);
        }
        Ok(out)
    }

    pub fn to_f64(&self) -> Result<f64> {
        if self.data.len() < 8 {
            return Err(Error::Inconsistency(format!(
                "tag {} payload too small for a double",
                self.kind
            )));
        }
        Ok(Cursor::new(&self.data).read_f64::<BigEndian>()?)
    }

    pub fn to_f64_slice(&self) -> Result<Vec<f64>> {
        let n = self.data.len() / 8;
        let mut cur = Cursor::new(&self.data);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(cur.read_f64::<BigEndian>()?);
        }
        Ok(out)
    }

    /// Payload as UTF-8 text; exactly `size` bytes, trailing NULs stripped.
    pub fn to_string_value(&self) -> String {
        String::from_utf8_lossy(&self.data)
            .trim_end_matches('\0')
            .to_string()
    }

    pub fn to_id(&self) -> Result<FiffId> {
        FiffId::from_bytes(&self.data)
    }

    pub fn to_coord_trans(&self) -> Result<FiffCoordTrans> {
        FiffCoordTrans::from_bytes(&self.data)
    }

    pub fn to_ch_info(&self) -> Result<FiffChInfo> {
        FiffChInfo::from_bytes(&self.data)
    }

    pub fn to_dig_point(&self) -> Result<FiffDigPoint> {
        FiffDigPoint::from_bytes(&self.data)
    }

    /// Payload as a packed array of directory entries
    /// ({kind, type, size, pos} int quadruples).
    pub fn to_dir_entries(&self) -> Result<Vec<DirEntry>> {
        let n = self.data.len() / 16;
        let mut cur = Cursor::new(&self.data);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(DirEntry {
                kind: cur.read_i32::<BigEndian>()?,
                dtype: cur.read_i32::<BigEndian>()?,
                size: cur.read_i32::<BigEndian>()?,
                pos: cur.read_u32::<BigEndian>()? as u64,
            });
        }
        Ok(out)
    }

    /// Decode a matrix-coded float tag. On disk the elements are followed
    /// by a 3-int footer {ncol, nrow, ndim}; the payload is laid out so
    /// that the returned matrix is the transpose of the raw (ncol x nrow)
    /// reshape, i.e. the in-memory column-major convention with shape
    /// (nrow, ncol).
    pub fn to_float_matrix(&self) -> Result<Array2<f32>> {
        if !self.is_matrix() {
            return Err(Error::Inconsistency(format!(
                "tag {} is not matrix-coded (type {})",
                self.kind, self.dtype
            )));
        }
        if self.base_type() != FIFFT_FLOAT {
            return Err(Error::UnsupportedType(self.dtype));
        }
        if self.data.len() < 12 {
            return Err(Error::Inconsistency(format!(
                "matrix tag {} too small for a dimension footer",
                self.kind
            )));
        }
        let footer = &self.data[self.data.len() - 12..];
        let mut cur = Cursor::new(footer);
        let ncol = cur.read_i32::<BigEndian>()? as usize;
        let nrow = cur.read_i32::<BigEndian>()? as usize;
        let ndim = cur.read_i32::<BigEndian>()?;
        if ndim != 2 {
            return Err(Error::Inconsistency(format!(
                "matrix tag {} has {} dimensions (only 2 supported)",
                self.kind, ndim
            )));
        }
        let numel = (self.data.len() - 12) / 4;
        if numel != nrow * ncol {
            return Err(Error::Inconsistency(format!(
                "matrix tag {}: {} elements do not match {}x{} dims",
                self.kind, numel, nrow, ncol
            )));
        }
        let mut cur = Cursor::new(&self.data[..self.data.len() - 12]);
        let mut vals = Vec::with_capacity(numel);
        for _ in 0..numel {
            vals.push(cur.read_f32::<BigEndian>()?);
        }
        let raw = Array2::from_shape_vec((ncol, nrow), vals)
            .map_err(|e| Error::Inconsistency(format!("matrix reshape failed: {e}")))?;
        Ok(raw.reversed_axes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    pub(crate) fn tag_bytes(kind: i32, dtype: i32, data: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.write_i32::<BigEndian>(kind).unwrap();
        b.write_i32::<BigEndian>(dtype).unwrap();
        b.write_i32::<BigEndian>(data.len() as i32).unwrap();
        b.write_i32::<BigEndian>(FIFFV_NEXT_SEQ).unwrap();
        b.extend_from_slice(data);
        b
    }

    #[test]
    fn test_read_int_tag() {
        let mut data = Vec::new();
        data.write_i32::<BigEndian>(42).unwrap();
        let mut cur = Cursor::new(tag_bytes(FIFF_NCHAN, FIFFT_INT, &data));
        let tag = Tag::read(&mut cur).unwrap();
        assert_eq!(tag.kind, FIFF_NCHAN);
        assert_eq!(tag.dtype, FIFFT_INT);
        assert_eq!(tag.size, 4);
        assert_eq!(tag.next, FIFFV_NEXT_SEQ);
        assert_eq!(tag.to_i32().unwrap(), 42);
    }

    #[test]
    fn test_read_info_skips_payload() {
        let mut bytes = tag_bytes(FIFF_NCHAN, FIFFT_INT, &[0, 0, 0, 7]);
        bytes.extend_from_slice(&tag_bytes(FIFF_SFREQ, FIFFT_FLOAT, &[0; 4]));
        let mut cur = Cursor::new(bytes);
        let first = Tag::read_info(&mut cur).unwrap();
        assert_eq!(first.kind, FIFF_NCHAN);
        assert!(first.data.is_empty());
        // positioned exactly at the next header
        let second = Tag::read_info(&mut cur).unwrap();
        assert_eq!(second.kind, FIFF_SFREQ);
    }

    #[test]
    fn test_read_at_position() {
        let prefix = tag_bytes(FIFF_NCHAN, FIFFT_INT, &[0, 0, 0, 1]);
        let pos = prefix.len() as u64;
        let mut bytes = prefix;
        let mut data = Vec::new();
        data.write_f32::<BigEndian>(600.0).unwrap();
        bytes.extend_from_slice(&tag_bytes(FIFF_SFREQ, FIFFT_FLOAT, &data));
        let mut cur = Cursor::new(bytes);
        let tag = Tag::read_at(&mut cur, pos).unwrap();
        assert_eq!(tag.kind, FIFF_SFREQ);
        assert!((tag.to_f32().unwrap() - 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_string_tag_exact_size_no_terminator() {
        let data = b"MEG 0113:MEG 0112";
        let mut cur = Cursor::new(tag_bytes(FIFF_MNE_CH_NAME_LIST, FIFFT_STRING, data));
        let tag = Tag::read(&mut cur).unwrap();
        assert_eq!(tag.size as usize, data.len());
        assert_eq!(tag.to_string_value(), "MEG 0113:MEG 0112");
    }

    #[test]
    fn test_string_tag_trailing_nuls_stripped() {
        let mut cur = Cursor::new(tag_bytes(FIFF_NAME, FIFFT_STRING, b"PCA-v1\0\0"));
        let tag = Tag::read(&mut cur).unwrap();
        assert_eq!(tag.to_string_value(), "PCA-v1");
    }

    #[test]
    fn test_to_i32_payload_too_small() {
        let mut cur = Cursor::new(tag_bytes(FIFF_NCHAN, FIFFT_INT, &[0, 1]));
        let tag = Tag::read(&mut cur).unwrap();
        assert!(tag.to_i32().is_err());
    }

    #[test]
    fn test_dir_entries_decode() {
        let mut data = Vec::new();
        for (kind, dtype, size, pos) in
            [(FIFF_NCHAN, FIFFT_INT, 4, 16u32), (FIFF_SFREQ, FIFFT_FLOAT, 4, 36)]
        {
            data.write_i32::<BigEndian>(kind).unwrap();
            data.write_i32::<BigEndian>(dtype).unwrap();
            data.write_i32::<BigEndian>(size).unwrap();
            data.write_u32::<BigEndian>(pos).unwrap();
        }
        let mut cur = Cursor::new(tag_bytes(FIFF_DIR, FIFFT_DIR_ENTRY_STRUCT, &data));
        let tag = Tag::read(&mut cur).unwrap();
        let dir = tag.to_dir_entries().unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir[0].kind, FIFF_NCHAN);
        assert_eq!(dir[0].pos, 16);
        assert_eq!(dir[1].kind, FIFF_SFREQ);
        assert_eq!(dir[1].pos, 36);
    }

    fn matrix_tag(kind: i32, mat: &Array2<f32>) -> Vec<u8> {
        // transpose-on-write: column-major element order + {ncol, nrow, 2}
        let mut data = Vec::new();
        for c in 0..mat.ncols() {
            for r in 0..mat.nrows() {
                data.write_f32::<BigEndian>(mat[[r, c]]).unwrap();
            }
        }
        data.write_i32::<BigEndian>(mat.ncols() as i32).unwrap();
        data.write_i32::<BigEndian>(mat.nrows() as i32).unwrap();
        data.write_i32::<BigEndian>(2).unwrap();
        tag_bytes(kind, FIFFT_FLOAT | FIFFT_MATRIX, &data)
    }

    #[test]
    fn test_float_matrix_roundtrip() {
        let mat =
            Array2::from_shape_vec((2, 3), vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut cur = Cursor::new(matrix_tag(FIFF_PROJ_ITEM_VECTORS, &mat));
        let tag = Tag::read(&mut cur).unwrap();
        let decoded = tag.to_float_matrix().unwrap();
        assert_eq!(decoded.dim(), (2, 3));
        assert_eq!(decoded, mat);
        // double transpose identity
        assert_eq!(decoded.t().t(), mat);
    }

    #[test]
    fn test_float_matrix_bad_ndim() {
        let mat = Array2::from_shape_vec((1, 2), vec![1.0f32, 2.0]).unwrap();
        let mut bytes = matrix_tag(FIFF_PROJ_ITEM_VECTORS, &mat);
        let n = bytes.len();
        bytes[n - 1] = 3; // corrupt the ndim word
        let tag = Tag::read(&mut Cursor::new(bytes)).unwrap();
        assert!(matches!(
            tag.to_float_matrix(),
            Err(Error::Inconsistency(_))
        ));
    }

    #[test]
    fn test_float_matrix_requires_matrix_bit() {
        let mut cur = Cursor::new(tag_bytes(FIFF_PROJ_ITEM_VECTORS, FIFFT_FLOAT, &[0; 16]));
        let tag = Tag::read(&mut cur).unwrap();
        assert!(tag.to_float_matrix().is_err());
    }

    #[test]
    fn test_float_matrix_unsupported_base_type() {
        let mat = Array2::from_shape_vec((1, 2), vec![1.0f32, 2.0]).unwrap();
        let mut bytes = matrix_tag(FIFF_PROJ_ITEM_VECTORS, &mat);
        // flip the base type to DOUBLE while keeping the matrix bit
        let dtype = FIFFT_DOUBLE | FIFFT_MATRIX;
        bytes[4..8].copy_from_slice(&dtype.to_be_bytes());
        let tag = Tag::read(&mut Cursor::new(bytes)).unwrap();
        assert!(matches!(
            tag.to_float_matrix(),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_structured_payload_decode() {
        let mut data = Vec::new();
        for v in [(1 << 16) | 2, 7, 8, 1_600_000_000, 0] {
            data.write_i32::<BigEndian>(v).unwrap();
        }
        let mut cur = Cursor::new(tag_bytes(FIFF_FILE_ID, FIFFT_ID_STRUCT, &data));
        let tag = Tag::read(&mut cur).unwrap();
        let id = tag.to_id().unwrap();
        assert_eq!(id.machid, [7, 8]);
    }
}
