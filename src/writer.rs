//! Tag emission: the write side of the format.
//!
//! Every emitted tag carries `next = FIFFV_NEXT_SEQ`; the terminating
//! no-op tag written by [`FiffWriter::end_file`] is the single exception.

use byteorder::{BigEndian, WriteBytesExt};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::comp::FiffCtfComp;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::matrix::FiffNamedMatrix;
use crate::meas_info::FiffInfo;
use crate::proj::FiffProj;
use crate::tag::Tag;
use crate::tree::DirNode;
use crate::types::{FiffChInfo, FiffCoordTrans, FiffDigPoint, FiffId};

/// Sequential FIFF writer over any seekable sink.
pub struct FiffWriter<W: Write + Seek> {
    w: W,
}

fn generated_id() -> FiffId {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let nanos = now.subsec_nanos() as i32;
    FiffId {
        version: (1 << 16) | 2,
        machid: [nanos & 0xFFFF, (nanos >> 16) & 0xFFFF],
        secs: now.as_secs() as i32,
        usecs: 0,
    }
}

impl FiffWriter<BufWriter<File>> {
    /// Create a file and write the compulsory prefix: file id,
    /// directory pointer and free list placeholders.
    pub fn start_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::start(BufWriter::new(File::create(path)?))
    }

    /// Create a raw-capable file: the measurement prelude, all metadata
    /// from `info` (restricted to the channel selection `sel` when
    /// given), donor blocks copied from `info.filename`, and an open
    /// raw-data block ready for buffer writes. Returns the calibration
    /// vector to pass to [`FiffWriter::write_raw_buffer`].
    pub fn start_writing_raw<P: AsRef<Path>>(
        path: P,
        info: &FiffInfo,
        sel: Option<&[usize]>,
    ) -> Result<(Self, Vec<f64>)> {
        let mut chs = Vec::new();
        match sel {
            Some(sel) => {
                for &k in sel {
                    let ch = info.chs.get(k).ok_or_else(|| {
                        Error::Inconsistency(format!("channel selection index {k} out of range"))
                    })?;
                    chs.push(ch.clone());
                }
            }
            None => chs.extend(info.chs.iter().cloned()),
        }
        let nchan = chs.len() as i32;

        let mut writer = Self::start_file(path)?;
        writer.start_block(FIFFB_MEAS)?;
        writer.write_id(FIFF_BLOCK_ID, None)?;
        if let Some(meas_id) = &info.meas_id {
            writer.write_id(FIFF_PARENT_BLOCK_ID, Some(meas_id))?;
        }

        writer.start_block(FIFFB_MEAS_INFO)?;

        // blocks brought over verbatim from the original recording
        let mut have_hpi_result = false;
        let mut have_isotrak = false;
        if let Some(donor) = &info.filename {
            let (mut donor_reader, donor_tree, _) = crate::open(donor)?;
            for block in [
                FIFFB_SUBJECT,
                FIFFB_HPI_MEAS,
                FIFFB_HPI_RESULT,
                FIFFB_ISOTRAK,
                FIFFB_PROCESSING_HISTORY,
            ] {
                let nodes = donor_tree.dir_tree_find(block);
                writer.copy_tree(&mut donor_reader, donor_tree.id.as_ref(), &nodes)?;
                if block == FIFFB_HPI_RESULT && !nodes.is_empty() {
                    have_hpi_result = true;
                }
                if block == FIFFB_ISOTRAK && !nodes.is_empty() {
                    have_isotrak = true;
                }
            }
        }

        if !info.acq_pars.is_empty() || !info.acq_stim.is_empty() {
            writer.start_block(FIFFB_DACQ_PARS)?;
            if !info.acq_pars.is_empty() {
                writer.write_string(FIFF_DACQ_PARS, &info.acq_pars)?;
            }
            if !info.acq_stim.is_empty() {
                writer.write_string(FIFF_DACQ_STIM, &info.acq_stim)?;
            }
            writer.end_block(FIFFB_DACQ_PARS)?;
        }

        // coordinate transforms, unless a copied HPI result supplied them
        if !have_hpi_result {
            if let Some(t) = &info.dev_head_t {
                writer.write_coord_trans(t)?;
            }
            if let Some(t) = &info.ctf_head_t {
                writer.write_coord_trans(t)?;
            }
        }

        if !info.dig.is_empty() && !have_isotrak {
            writer.start_block(FIFFB_ISOTRAK)?;
            for point in &info.dig {
                writer.write_dig_point(point)?;
            }
            writer.end_block(FIFFB_ISOTRAK)?;
        }

        writer.write_proj(&info.projs)?;
        writer.write_ctf_comp(&info.comps)?;

        if !info.bads.is_empty() {
            writer.start_block(FIFFB_MNE_BAD_CHANNELS)?;
            writer.write_name_list(FIFF_MNE_CH_NAME_LIST, &info.bads)?;
            writer.end_block(FIFFB_MNE_BAD_CHANNELS)?;
        }

        writer.write_float(FIFF_SFREQ, &[info.sfreq])?;
        writer.write_float(FIFF_HIGHPASS, &[info.highpass])?;
        writer.write_float(FIFF_LOWPASS, &[info.lowpass])?;
        writer.write_int(FIFF_NCHAN, &[nchan])?;
        writer.write_int(FIFF_DATA_PACK, &[FIFFT_FLOAT])?;
        if info.meas_date[0] != -1 {
            writer.write_int(FIFF_MEAS_DATE, &info.meas_date)?;
        }

        // scan numbers may have been messed up; the range moves into cals
        let mut cals = Vec::with_capacity(chs.len());
        for (k, ch) in chs.iter_mut().enumerate() {
            ch.scanno = k as i32 + 1;
            ch.range = 1.0;
            cals.push(ch.cal as f64);
            writer.write_ch_info(ch)?;
        }

        writer.end_block(FIFFB_MEAS_INFO)?;
        writer.start_block(FIFFB_RAW_DATA)?;

        Ok((writer, cals))
    }
}

impl<W: Write + Seek> FiffWriter<W> {
    /// Wrap a sink and write the compulsory prefix.
    pub fn start(w: W) -> Result<Self> {
        let mut writer = FiffWriter { w };
        writer.write_id(FIFF_FILE_ID, None)?;
        writer.write_int(FIFF_DIR_POINTER, &[-1])?;
        writer.write_int(FIFF_FREE_LIST, &[-1])?;
        Ok(writer)
    }

    fn write_header(&mut self, kind: i32, dtype: i32, size: i32, next: i32) -> Result<()> {
        self.w.write_i32::<BigEndian>(kind)?;
        self.w.write_i32::<BigEndian>(dtype)?;
        self.w.write_i32::<BigEndian>(size)?;
        self.w.write_i32::<BigEndian>(next)?;
        Ok(())
    }

    pub fn write_int(&mut self, kind: i32, data: &[i32]) -> Result<()> {
        self.write_header(kind, FIFFT_INT, (data.len() * 4) as i32, FIFFV_NEXT_SEQ)?;
        for v in data {
            self.w.write_i32::<BigEndian>(*v)?;
        }
        Ok(())
    }

    pub fn write_float(&mut self, kind: i32, data: &[f32]) -> Result<()> {
        self.write_header(kind, FIFFT_FLOAT, (data.len() * 4) as i32, FIFFV_NEXT_SEQ)?;
        for v in data {
            self.w.write_f32::<BigEndian>(*v)?;
        }
        Ok(())
    }

    pub fn write_double(&mut self, kind: i32, data: &[f64]) -> Result<()> {
        self.write_header(kind, FIFFT_DOUBLE, (data.len() * 8) as i32, FIFFV_NEXT_SEQ)?;
        for v in data {
            self.w.write_f64::<BigEndian>(*v)?;
        }
        Ok(())
    }

    /// Exactly the string bytes, no terminator.
    pub fn write_string(&mut self, kind: i32, data: &str) -> Result<()> {
        self.write_header(kind, FIFFT_STRING, data.len() as i32, FIFFV_NEXT_SEQ)?;
        self.w.write_all(data.as_bytes())?;
        Ok(())
    }

    pub fn write_name_list(&mut self, kind: i32, names: &[String]) -> Result<()> {
        self.write_string(kind, &names.join(":"))
    }

    /// Write an id tag. A missing or placeholder id is replaced by a
    /// freshly generated one; the id actually written is returned.
    pub fn write_id(&mut self, kind: i32, id: Option<&FiffId>) -> Result<FiffId> {
        let id = match id {
            Some(id) if id.is_set() => *id,
            _ => generated_id(),
        };
        self.write_header(kind, FIFFT_ID_STRUCT, 20, FIFFV_NEXT_SEQ)?;
        for v in [id.version, id.machid[0], id.machid[1], id.secs, id.usecs] {
            self.w.write_i32::<BigEndian>(v)?;
        }
        Ok(id)
    }

    pub fn write_ch_info(&mut self, ch: &FiffChInfo) -> Result<()> {
        self.write_header(FIFF_CH_INFO, FIFFT_CH_INFO_STRUCT, 96, FIFFV_NEXT_SEQ)?;
        self.w.write_i32::<BigEndian>(ch.scanno)?;
        self.w.write_i32::<BigEndian>(ch.logno)?;
        self.w.write_i32::<BigEndian>(ch.kind)?;
        self.w.write_f32::<BigEndian>(ch.range)?;
        self.w.write_f32::<BigEndian>(ch.cal)?;
        self.w.write_i32::<BigEndian>(ch.coil_type)?;
        for v in &ch.loc {
            self.w.write_f32::<BigEndian>(*v)?;
        }
        self.w.write_i32::<BigEndian>(ch.unit)?;
        self.w.write_i32::<BigEndian>(ch.unit_mul)?;
        // 16-byte name field; at most 15 name bytes, never split mid-char
        let mut field = [0u8; 16];
        let name = ch.ch_name.as_bytes();
        let mut len = name.len().min(15);
        while !ch.ch_name.is_char_boundary(len) {
            len -= 1;
        }
        field[..len].copy_from_slice(&name[..len]);
        self.w.write_all(&field)?;
        Ok(())
    }

    pub fn write_coord_trans(&mut self, trans: &FiffCoordTrans) -> Result<()> {
        self.write_header(FIFF_COORD_TRANS, FIFFT_COORD_TRANS_STRUCT, 104, FIFFV_NEXT_SEQ)?;
        self.w.write_i32::<BigEndian>(trans.from)?;
        self.w.write_i32::<BigEndian>(trans.to)?;
        for m in [&trans.trans, &trans.invtrans] {
            for r in 0..3 {
                for c in 0..3 {
                    self.w.write_f32::<BigEndian>(m[[r, c]])?;
                }
            }
            for r in 0..3 {
                self.w.write_f32::<BigEndian>(m[[r, 3]])?;
            }
        }
        Ok(())
    }

    pub fn write_dig_point(&mut self, dig: &FiffDigPoint) -> Result<()> {
        self.write_header(FIFF_DIG_POINT, FIFFT_DIG_POINT_STRUCT, 20, FIFFV_NEXT_SEQ)?;
        self.w.write_i32::<BigEndian>(dig.kind)?;
        self.w.write_i32::<BigEndian>(dig.ident)?;
        for v in &dig.r {
            self.w.write_f32::<BigEndian>(*v)?;
        }
        Ok(())
    }

    /// Matrix-coded float tag: elements in column-major order followed by
    /// the `{ncol, nrow, 2}` footer, the exact inverse of the reader's
    /// transpose.
    pub fn write_float_matrix(&mut self, kind: i32, mat: &Array2<f32>) -> Result<()> {
        let numel = mat.len();
        self.write_header(
            kind,
            FIFFT_FLOAT | FIFFT_MATRIX,
            (numel * 4 + 12) as i32,
            FIFFV_NEXT_SEQ,
        )?;
        for c in 0..mat.ncols() {
            for r in 0..mat.nrows() {
                self.w.write_f32::<BigEndian>(mat[[r, c]])?;
            }
        }
        for v in [mat.ncols() as i32, mat.nrows() as i32, 2] {
            self.w.write_i32::<BigEndian>(v)?;
        }
        Ok(())
    }

    pub fn write_named_matrix(&mut self, kind: i32, mat: &FiffNamedMatrix) -> Result<()> {
        self.start_block(FIFFB_MNE_NAMED_MATRIX)?;
        self.write_int(FIFF_MNE_NROW, &[mat.nrow as i32])?;
        self.write_int(FIFF_MNE_NCOL, &[mat.ncol as i32])?;
        if !mat.row_names.is_empty() {
            self.write_name_list(FIFF_MNE_ROW_NAMES, &mat.row_names)?;
        }
        if !mat.col_names.is_empty() {
            self.write_name_list(FIFF_MNE_COL_NAMES, &mat.col_names)?;
        }
        self.write_float_matrix(kind, &mat.data)?;
        self.end_block(FIFFB_MNE_NAMED_MATRIX)?;
        Ok(())
    }

    pub fn write_proj(&mut self, projs: &[FiffProj]) -> Result<()> {
        if projs.is_empty() {
            return Ok(());
        }
        self.start_block(FIFFB_PROJ)?;
        for proj in projs {
            self.start_block(FIFFB_PROJ_ITEM)?;
            self.write_string(FIFF_NAME, &proj.desc)?;
            self.write_int(FIFF_PROJ_ITEM_KIND, &[proj.kind])?;
            if proj.kind == FIFFV_PROJ_ITEM_FIELD {
                self.write_float(FIFF_PROJ_ITEM_TIME, &[proj.time.unwrap_or(0.0)])?;
            }
            self.write_int(FIFF_NCHAN, &[proj.data.ncol as i32])?;
            self.write_int(FIFF_PROJ_ITEM_NVEC, &[proj.data.nrow as i32])?;
            self.write_int(FIFF_MNE_PROJ_ITEM_ACTIVE, &[proj.active as i32])?;
            self.write_name_list(FIFF_PROJ_ITEM_CH_NAME_LIST, &proj.data.col_names)?;
            self.write_float_matrix(FIFF_PROJ_ITEM_VECTORS, &proj.data.data)?;
            self.end_block(FIFFB_PROJ_ITEM)?;
        }
        self.end_block(FIFFB_PROJ)?;
        Ok(())
    }

    /// Write compensation matrices, undoing the calibration rescale the
    /// reader applied (a no-op for matrices stored calibrated, whose
    /// scale vectors are all ones).
    pub fn write_ctf_comp(&mut self, comps: &[FiffCtfComp]) -> Result<()> {
        if comps.is_empty() {
            return Ok(());
        }
        self.start_block(FIFFB_MNE_CTF_COMP)?;
        for comp in comps {
            self.start_block(FIFFB_MNE_CTF_COMP_DATA)?;
            self.write_int(FIFF_MNE_CTF_COMP_KIND, &[comp.ctfkind])?;
            self.write_int(FIFF_MNE_CTF_COMP_CALIBRATED, &[comp.save_calibrated as i32])?;
            let mut data = comp.data.clone();
            for r in 0..data.nrow {
                for c in 0..data.ncol {
                    data.data[[r, c]] /= (comp.rowcals[r] * comp.colcals[c]) as f32;
                }
            }
            self.write_named_matrix(FIFF_MNE_CTF_COMP_DATA, &data)?;
            self.end_block(FIFFB_MNE_CTF_COMP_DATA)?;
        }
        self.end_block(FIFFB_MNE_CTF_COMP)?;
        Ok(())
    }

    pub fn start_block(&mut self, kind: i32) -> Result<()> {
        self.write_int(FIFF_BLOCK_START, &[kind])
    }

    pub fn end_block(&mut self, kind: i32) -> Result<()> {
        self.write_int(FIFF_BLOCK_END, &[kind])
    }

    /// The terminating no-op tag; the only tag whose next pointer is the
    /// "no more tags" sentinel.
    pub fn end_file(&mut self) -> Result<()> {
        self.write_header(FIFF_NOP, FIFFT_VOID, 0, FIFFV_NEXT_NONE)?;
        self.w.flush()?;
        Ok(())
    }

    /// Re-serialize whole subtrees from another file, byte for byte.
    /// Block ids are rewritten from the node fields and the donor's file
    /// id becomes the parent file id where no parent block id exists.
    pub fn copy_tree<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        in_id: Option<&FiffId>,
        nodes: &[&DirNode],
    ) -> Result<()> {
        for node in nodes {
            self.start_block(node.block)?;
            if let Some(id) = &node.id {
                self.write_id(FIFF_BLOCK_ID, Some(id))?;
            }
            match (&node.parent_id, in_id) {
                (Some(parent), _) => {
                    self.write_id(FIFF_PARENT_BLOCK_ID, Some(parent))?;
                }
                (None, Some(in_id)) => {
                    self.write_id(FIFF_PARENT_FILE_ID, Some(in_id))?;
                }
                (None, None) => {}
            }
            for entry in &node.directory {
                if entry.kind == FIFF_BLOCK_ID
                    || entry.kind == FIFF_PARENT_BLOCK_ID
                    || entry.kind == FIFF_PARENT_FILE_ID
                {
                    continue;
                }
                let tag = Tag::read_at(reader, entry.pos)?;
                self.write_header(tag.kind, tag.dtype, tag.size, FIFFV_NEXT_SEQ)?;
                self.w.write_all(&tag.data)?;
            }
            let children: Vec<&DirNode> = node.children.iter().collect();
            self.copy_tree(reader, in_id, &children)?;
            self.end_block(node.block)?;
        }
        Ok(())
    }

    /// One raw buffer: rows are channels, columns samples. The inverse of
    /// the per-channel calibration is applied before writing.
    pub fn write_raw_buffer(&mut self, buf: &Array2<f32>, cals: &[f64]) -> Result<()> {
        if buf.nrows() != cals.len() {
            return Err(Error::Inconsistency(format!(
                "buffer has {} rows for {} calibration factors",
                buf.nrows(),
                cals.len()
            )));
        }
        self.write_header(
            FIFF_DATA_BUFFER,
            FIFFT_FLOAT,
            (buf.len() * 4) as i32,
            FIFFV_NEXT_SEQ,
        )?;
        // sample-major on disk
        for c in 0..buf.ncols() {
            for r in 0..buf.nrows() {
                self.w
                    .write_f32::<BigEndian>((buf[[r, c]] as f64 / cals[r]) as f32)?;
            }
        }
        Ok(())
    }

    /// Close the raw-data and measurement blocks and terminate the file.
    pub fn finish_writing_raw(&mut self) -> Result<()> {
        self.end_block(FIFFB_RAW_DATA)?;
        self.end_block(FIFFB_MEAS)?;
        self.end_file()
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}
