// error.rs - Error handling types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum H264GenError {
    #[error("Invalid bit width {width}: fixed-width fields must be 1..=32 bits")]
    InvalidBitWidth { width: u8 },
    #[error("Exp-Golomb code number {code_num} is out of the encodable range")]
    ExpGolombRange { code_num: u64 },
    #[error("Failed to grow bitstream buffer by {requested} bytes")]
    BufferAllocation { requested: usize },
    #[error("Export range {offset}+{length} exceeds {available} finalized bytes")]
    ExportOutOfRange {
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid slice parameter: {0}")]
    InvalidSliceParam(String),
    #[error("Unsupported slice type: {0}")]
    UnsupportedSliceType(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, H264GenError>;
