//! Fixed-layout structured records carried in tag payloads.

use byteorder::{BigEndian, ReadBytesExt};
use ndarray::Array2;
use std::io::{Cursor, Read};

use crate::constants::*;
use crate::error::{Error, Result};

/// Unique identifier attached to files and blocks (20 bytes on disk:
/// version, two machine-id words, seconds and microseconds of creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiffId {
    pub version: i32,
    pub machid: [i32; 2],
    pub secs: i32,
    pub usecs: i32,
}

impl FiffId {
    /// The "not set" placeholder, recognized by `version == -1`.
    pub fn placeholder() -> Self {
        FiffId {
            version: -1,
            machid: [-1, -1],
            secs: -1,
            usecs: -1,
        }
    }

    pub fn is_set(&self) -> bool {
        self.version != -1
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 20 {
            return Err(Error::Structural(format!(
                "id record too short: {} bytes (expected 20)",
                data.len()
            )));
        }
        let mut cur = Cursor::new(data);
        Ok(FiffId {
            version: cur.read_i32::<BigEndian>()?,
            machid: [cur.read_i32::<BigEndian>()?, cur.read_i32::<BigEndian>()?],
            secs: cur.read_i32::<BigEndian>()?,
            usecs: cur.read_i32::<BigEndian>()?,
        })
    }
}

/// One channel's metadata (96 bytes on disk).
#[derive(Debug, Clone, PartialEq)]
pub struct FiffChInfo {
    pub scanno: i32,
    pub logno: i32,
    pub kind: i32,
    pub range: f32,
    pub cal: f32,
    pub coil_type: i32,
    /// Coil coordinate system origin and unit vectors (r0, ex, ey, ez).
    pub loc: [f32; 12],
    pub unit: i32,
    pub unit_mul: i32,
    /// At most 15 visible characters; the on-disk field is 16 bytes,
    /// NUL padded.
    pub ch_name: String,
}

impl Default for FiffChInfo {
    fn default() -> Self {
        FiffChInfo {
            scanno: 0,
            logno: 0,
            kind: FIFFV_MISC_CH,
            range: 1.0,
            cal: 1.0,
            coil_type: 0,
            loc: [0.0; 12],
            unit: 0,
            unit_mul: 0,
            ch_name: String::new(),
        }
    }
}

impl FiffChInfo {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 96 {
            return Err(Error::Structural(format!(
                "channel info record too short: {} bytes (expected 96)",
                data.len()
            )));
        }
        let mut cur = Cursor::new(data);
        let scanno = cur.read_i32::<BigEndian>()?;
        let logno = cur.read_i32::<BigEndian>()?;
        let kind = cur.read_i32::<BigEndian>()?;
        let range = cur.read_f32::<BigEndian>()?;
        let cal = cur.read_f32::<BigEndian>()?;
        let coil_type = cur.read_i32::<BigEndian>()?;
        let mut loc = [0.0f32; 12];
        for v in loc.iter_mut() {
            *v = cur.read_f32::<BigEndian>()?;
        }
        let unit = cur.read_i32::<BigEndian>()?;
        let unit_mul = cur.read_i32::<BigEndian>()?;
        let mut name = [0u8; 16];
        cur.read_exact(&mut name)?;
        let ch_name = String::from_utf8_lossy(&name)
            .trim_end_matches('\0')
            .to_string();
        Ok(FiffChInfo {
            scanno,
            logno,
            kind,
            range,
            cal,
            coil_type,
            loc,
            unit,
            unit_mul,
            ch_name,
        })
    }

    /// Full calibration factor applied to raw samples.
    pub fn calibration(&self) -> f64 {
        self.range as f64 * self.cal as f64
    }
}

/// Coordinate transformation between two frames. Both the forward and the
/// inverse transform are kept as homogeneous 4x4 matrices, mirroring the
/// 56-byte on-disk record (rot 3x3 + move 3, invrot 3x3 + invmove 3).
#[derive(Debug, Clone, PartialEq)]
pub struct FiffCoordTrans {
    pub from: i32,
    pub to: i32,
    pub trans: Array2<f32>,
    pub invtrans: Array2<f32>,
}

impl FiffCoordTrans {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 56 {
            return Err(Error::Structural(format!(
                "coordinate transform record too short: {} bytes (expected 56)",
                data.len()
            )));
        }
        let mut cur = Cursor::new(data);
        let from = cur.read_i32::<BigEndian>()?;
        let to = cur.read_i32::<BigEndian>()?;
        let trans = read_homogeneous(&mut cur)?;
        let invtrans = read_homogeneous(&mut cur)?;
        Ok(FiffCoordTrans {
            from,
            to,
            trans,
            invtrans,
        })
    }

    /// Build a transform from a homogeneous forward matrix; the inverse is
    /// derived analytically (rigid transforms only).
    pub fn from_forward(from: i32, to: i32, trans: Array2<f32>) -> Self {
        let invtrans = rigid_inverse(&trans);
        FiffCoordTrans {
            from,
            to,
            trans,
            invtrans,
        }
    }

    /// The same transform with direction reversed.
    pub fn inverted(&self) -> Self {
        FiffCoordTrans {
            from: self.to,
            to: self.from,
            trans: self.invtrans.clone(),
            invtrans: self.trans.clone(),
        }
    }
}

fn read_homogeneous<R: Read>(cur: &mut R) -> Result<Array2<f32>> {
    let mut m = Array2::<f32>::eye(4);
    for r in 0..3 {
        for c in 0..3 {
            m[[r, c]] = cur.read_f32::<BigEndian>()?;
        }
    }
    for r in 0..3 {
        m[[r, 3]] = cur.read_f32::<BigEndian>()?;
    }
    Ok(m)
}

/// Inverse of a rigid homogeneous transform: [R t]^-1 = [R' -R't].
pub(crate) fn rigid_inverse(m: &Array2<f32>) -> Array2<f32> {
    let mut inv = Array2::<f32>::eye(4);
    for r in 0..3 {
        for c in 0..3 {
            inv[[r, c]] = m[[c, r]];
        }
    }
    for r in 0..3 {
        let mut t = 0.0f32;
        for c in 0..3 {
            t -= m[[c, r]] * m[[c, 3]];
        }
        inv[[r, 3]] = t;
    }
    inv
}

/// One digitization point (20 bytes on disk). The coordinate frame is not
/// stored per point; the reader stamps it from the surrounding block.
#[derive(Debug, Clone, PartialEq)]
pub struct FiffDigPoint {
    pub kind: i32,
    pub ident: i32,
    pub r: [f32; 3],
    pub coord_frame: i32,
}

impl FiffDigPoint {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 20 {
            return Err(Error::Structural(format!(
                "digitization point record too short: {} bytes (expected 20)",
                data.len()
            )));
        }
        let mut cur = Cursor::new(data);
        let kind = cur.read_i32::<BigEndian>()?;
        let ident = cur.read_i32::<BigEndian>()?;
        let mut r = [0.0f32; 3];
        for v in r.iter_mut() {
            *v = cur.read_f32::<BigEndian>()?;
        }
        Ok(FiffDigPoint {
            kind,
            ident,
            r,
            coord_frame: FIFFV_COORD_HEAD,
        })
    }
}
