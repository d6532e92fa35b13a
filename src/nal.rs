// nal.rs - NAL unit framing
use crate::bitstream::BitstreamWriter;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NalUnitType {
    NonIdrSlice = 1,
    IdrSlice = 5,
    Sps = 7,
    Pps = 8,
    EndOfStream = 11,
}

impl NalUnitType {
    pub fn is_parameter_set(self) -> bool {
        matches!(self, NalUnitType::Sps | NalUnitType::Pps)
    }
}

/// Annex B start code prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartCodeMode {
    /// `00 00 00 01` before every unit.
    #[default]
    Long,
    /// `00 00 00 01` before parameter sets, `00 00 01` elsewhere.
    Short,
}

impl StartCodeMode {
    fn prefix_bits(self, unit_type: NalUnitType) -> u8 {
        match self {
            StartCodeMode::Long => 32,
            StartCodeMode::Short if unit_type.is_parameter_set() => 32,
            StartCodeMode::Short => 24,
        }
    }
}

/// Align, then emit start code and the one-byte NAL header, all unescaped.
/// The payload that follows starts a fresh emulation-prevention run.
pub fn write_nal_header(
    writer: &mut BitstreamWriter,
    start_code: StartCodeMode,
    ref_idc: u8,
    unit_type: NalUnitType,
) -> Result<()> {
    writer.byte_align()?;
    writer.write_bits_unescaped(0x0000_0001, start_code.prefix_bits(unit_type))?;
    writer.write_bits_unescaped(0, 1)?; // forbidden_zero_bit
    writer.write_bits_unescaped(u32::from(ref_idc), 2)?;
    writer.write_bits_unescaped(unit_type as u32, 5)?;
    writer.reset_escape_state();
    Ok(())
}
