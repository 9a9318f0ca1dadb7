//! FIFF constants: tag kinds (`FIFF_*`), block types (`FIFFB_*`), data
//! types (`FIFFT_*`) and value codes (`FIFFV_*`).

// File structure tags
pub const FIFF_FILE_ID: i32 = 100;
pub const FIFF_DIR_POINTER: i32 = 101;
pub const FIFF_DIR: i32 = 102;
pub const FIFF_BLOCK_ID: i32 = 103;
pub const FIFF_BLOCK_START: i32 = 104;
pub const FIFF_BLOCK_END: i32 = 105;
pub const FIFF_FREE_LIST: i32 = 106;
pub const FIFF_FREE_BLOCK: i32 = 107;
pub const FIFF_NOP: i32 = 108;
pub const FIFF_PARENT_FILE_ID: i32 = 109;
pub const FIFF_PARENT_BLOCK_ID: i32 = 110;

// Measurement info tags
pub const FIFF_DACQ_PARS: i32 = 150;
pub const FIFF_DACQ_STIM: i32 = 151;
pub const FIFF_NCHAN: i32 = 200;
pub const FIFF_SFREQ: i32 = 201;
pub const FIFF_DATA_PACK: i32 = 202;
pub const FIFF_CH_INFO: i32 = 203;
pub const FIFF_MEAS_DATE: i32 = 204;
pub const FIFF_DESCRIPTION: i32 = 206; // alias of FIFF_COMMENT
pub const FIFF_FIRST_SAMPLE: i32 = 208;
pub const FIFF_LAST_SAMPLE: i32 = 209;
pub const FIFF_DIG_POINT: i32 = 213;
pub const FIFF_LOWPASS: i32 = 219;
pub const FIFF_COORD_TRANS: i32 = 222;
pub const FIFF_HIGHPASS: i32 = 223;
pub const FIFF_NAME: i32 = 233;

// Raw data tags
pub const FIFF_DATA_BUFFER: i32 = 300;
pub const FIFF_DATA_SKIP: i32 = 301;

// SSP projection tags
pub const FIFF_PROJ_ITEM_KIND: i32 = 3411;
pub const FIFF_PROJ_ITEM_TIME: i32 = 3412;
pub const FIFF_PROJ_ITEM_NVEC: i32 = 3414;
pub const FIFF_PROJ_ITEM_VECTORS: i32 = 3415;
pub const FIFF_PROJ_ITEM_CH_NAME_LIST: i32 = 3417;

// MNE tags
pub const FIFF_MNE_ROW_NAMES: i32 = 3502;
pub const FIFF_MNE_COL_NAMES: i32 = 3503;
pub const FIFF_MNE_NROW: i32 = 3504;
pub const FIFF_MNE_NCOL: i32 = 3505;
pub const FIFF_MNE_COORD_FRAME: i32 = 3506;
pub const FIFF_MNE_CH_NAME_LIST: i32 = 3507;
pub const FIFF_MNE_COV_KIND: i32 = 3530;
pub const FIFF_MNE_COV_DIM: i32 = 3531;
pub const FIFF_MNE_COV: i32 = 3532;
pub const FIFF_MNE_COV_DIAG: i32 = 3533;
pub const FIFF_MNE_COV_EIGENVALUES: i32 = 3534;
pub const FIFF_MNE_COV_EIGENVECTORS: i32 = 3535;
pub const FIFF_MNE_COV_NFREE: i32 = 3536;
pub const FIFF_MNE_PROJ_ITEM_ACTIVE: i32 = 3560;
pub const FIFF_MNE_CTF_COMP_KIND: i32 = 3580;
pub const FIFF_MNE_CTF_COMP_DATA: i32 = 3581;
pub const FIFF_MNE_CTF_COMP_CALIBRATED: i32 = 3582;

// Block types (payload of a FIFF_BLOCK_START tag)
pub const FIFFB_ROOT: i32 = 999;
pub const FIFFB_MEAS: i32 = 100;
pub const FIFFB_MEAS_INFO: i32 = 101;
pub const FIFFB_RAW_DATA: i32 = 102;
pub const FIFFB_PROCESSED_DATA: i32 = 103;
pub const FIFFB_SUBJECT: i32 = 106;
pub const FIFFB_ISOTRAK: i32 = 107;
pub const FIFFB_HPI_MEAS: i32 = 108;
pub const FIFFB_HPI_RESULT: i32 = 109;
pub const FIFFB_CONTINUOUS_DATA: i32 = 112;
pub const FIFFB_DACQ_PARS: i32 = 117;
pub const FIFFB_SMSH_RAW_DATA: i32 = 119; // MaxShield raw data
pub const FIFFB_PROJ: i32 = 313;
pub const FIFFB_PROJ_ITEM: i32 = 314;
pub const FIFFB_MNE: i32 = 350;
pub const FIFFB_MNE_COV: i32 = 355;
pub const FIFFB_MNE_NAMED_MATRIX: i32 = 357;
pub const FIFFB_MNE_BAD_CHANNELS: i32 = 359;
pub const FIFFB_MNE_CTF_COMP: i32 = 370;
pub const FIFFB_MNE_CTF_COMP_DATA: i32 = 371;
pub const FIFFB_PROCESSING_HISTORY: i32 = 900;

// Data types
pub const FIFFT_VOID: i32 = 0;
pub const FIFFT_BYTE: i32 = 1;
pub const FIFFT_SHORT: i32 = 2;
pub const FIFFT_INT: i32 = 3;
pub const FIFFT_FLOAT: i32 = 4;
pub const FIFFT_DOUBLE: i32 = 5;
pub const FIFFT_STRING: i32 = 10;
pub const FIFFT_DAU_PACK16: i32 = 16;
pub const FIFFT_COMPLEX_FLOAT: i32 = 20;
pub const FIFFT_COMPLEX_DOUBLE: i32 = 21;
pub const FIFFT_CH_INFO_STRUCT: i32 = 30;
pub const FIFFT_ID_STRUCT: i32 = 31;
pub const FIFFT_DIR_ENTRY_STRUCT: i32 = 32;
pub const FIFFT_DIG_POINT_STRUCT: i32 = 33;
pub const FIFFT_COORD_TRANS_STRUCT: i32 = 35;

/// Matrix coding bit in the tag type word.
pub const FIFFT_MATRIX: i32 = 1 << 30;

// Next-pointer sentinels
pub const FIFFV_NEXT_SEQ: i32 = 0;
pub const FIFFV_NEXT_NONE: i32 = -1;

// Coordinate frames
pub const FIFFV_COORD_UNKNOWN: i32 = 0;
pub const FIFFV_COORD_DEVICE: i32 = 1;
pub const FIFFV_COORD_ISOTRAK: i32 = 2;
pub const FIFFV_COORD_HPI: i32 = 3;
pub const FIFFV_COORD_HEAD: i32 = 4;
pub const FIFFV_COORD_MRI: i32 = 5;
pub const FIFFV_MNE_COORD_CTF_DEVICE: i32 = 1001;
pub const FIFFV_MNE_COORD_CTF_HEAD: i32 = 1004;

// Channel types
pub const FIFFV_MEG_CH: i32 = 1;
pub const FIFFV_EEG_CH: i32 = 2;
pub const FIFFV_STIM_CH: i32 = 3;
pub const FIFFV_MCG_CH: i32 = 201;
pub const FIFFV_EOG_CH: i32 = 202;
pub const FIFFV_REF_MEG_CH: i32 = 301;
pub const FIFFV_EMG_CH: i32 = 302;
pub const FIFFV_ECG_CH: i32 = 402;
pub const FIFFV_MISC_CH: i32 = 502;
pub const FIFFV_RESP_CH: i32 = 602;

// Projection item kinds
pub const FIFFV_PROJ_ITEM_NONE: i32 = 0;
pub const FIFFV_PROJ_ITEM_FIELD: i32 = 1;
pub const FIFFV_PROJ_ITEM_DIP_FIX: i32 = 2;
pub const FIFFV_PROJ_ITEM_DIP_ROT: i32 = 3;
pub const FIFFV_PROJ_ITEM_HOMOG_GRAD: i32 = 4;
pub const FIFFV_PROJ_ITEM_HOMOG_FIELD: i32 = 5;
pub const FIFFV_MNE_PROJ_ITEM_EEG_AVREF: i32 = 10;

// CTF compensation grades; the on-disk codes are the 4-byte ASCII strings
// "G1BR", "G2BR", "G3BR" read as big-endian integers.
pub const FIFFV_MNE_CTFV_COMP_NONE: i32 = 0;
pub const FIFFV_MNE_CTFV_COMP_G1BR: i32 = 1;
pub const FIFFV_MNE_CTFV_COMP_G2BR: i32 = 2;
pub const FIFFV_MNE_CTFV_COMP_G3BR: i32 = 3;
pub const FIFFV_CTF_GRAD_COMP_G1BR: i32 = 0x4731_4252;
pub const FIFFV_CTF_GRAD_COMP_G2BR: i32 = 0x4732_4252;
pub const FIFFV_CTF_GRAD_COMP_G3BR: i32 = 0x4733_4252;

/// Is this channel type a data channel (as opposed to stimulus etc.)?
pub fn is_data_channel(kind: i32) -> bool {
    matches!(
        kind,
        FIFFV_MEG_CH
            | FIFFV_REF_MEG_CH
            | FIFFV_EEG_CH
            | FIFFV_MCG_CH
            | FIFFV_EOG_CH
            | FIFFV_EMG_CH
            | FIFFV_ECG_CH
            | FIFFV_MISC_CH
            | FIFFV_RESP_CH
    )
}

/// Human-readable channel type name.
pub fn channel_type_name(kind: i32) -> &'static str {
    match kind {
        FIFFV_MEG_CH => "MEG",
        FIFFV_REF_MEG_CH => "REF_MEG",
        FIFFV_EEG_CH => "EEG",
        FIFFV_MCG_CH => "MCG",
        FIFFV_STIM_CH => "STIM",
        FIFFV_EOG_CH => "EOG",
        FIFFV_EMG_CH => "EMG",
        FIFFV_ECG_CH => "ECG",
        FIFFV_MISC_CH => "MISC",
        FIFFV_RESP_CH => "RESP",
        _ => "UNKNOWN",
    }
}

/// Human-readable coordinate frame name.
pub fn coord_frame_name(frame: i32) -> &'static str {
    match frame {
        FIFFV_COORD_DEVICE => "Device",
        FIFFV_COORD_ISOTRAK => "Isotrak",
        FIFFV_COORD_HPI => "HPI",
        FIFFV_COORD_HEAD => "Head",
        FIFFV_COORD_MRI => "MRI",
        FIFFV_MNE_COORD_CTF_DEVICE => "CTF Device",
        FIFFV_MNE_COORD_CTF_HEAD => "CTF Head",
        _ => "Unknown",
    }
}
