// bitstream.rs - Bit-exact bitstream writer with emulation prevention
//! MSB-first bit packer producing H.264 Annex B byte streams.
//!
//! Every byte completed through the escaped write path is fed to the
//! emulation-prevention state machine, so a payload can never contain
//! `00 00 00`, `00 00 01`, `00 00 02` or `00 00 03`. Start codes and the
//! alignment padding before them are written through the unescaped path.
use crate::error::{H264GenError, Result};
use tracing::trace;

/// Bytes reserved on every growth of the backing buffer.
pub const GROWTH_STEP: usize = 1024;

/// Growth is triggered once fewer spare bytes than this remain past the
/// in-progress byte. A single byte write appends at most two bytes.
const MIN_HEADROOM: usize = 4;

/// Byte spliced in front of a byte that would otherwise complete a start code.
pub const EMULATION_PREVENTION_BYTE: u8 = 0x03;

/// Largest supported Exp-Golomb prefix (leading zero count).
const MAX_EXP_GOLOMB_PREFIX: u32 = 32;

/// Run of finalized zero bytes seen by the escaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeState {
    NoZeros,
    OneZero,
    TwoOrMoreZeros,
}

#[derive(Debug)]
pub struct BitstreamWriter {
    buffer: Vec<u8>,
    // Index of the in-progress byte; everything before it is final.
    written: usize,
    bit_offset: u8,
    escape_state: EscapeState,
    escapes: usize,
}

impl BitstreamWriter {
    pub fn new() -> Self {
        let mut buffer = Vec::with_capacity(GROWTH_STEP);
        buffer.push(0);
        Self {
            buffer,
            written: 0,
            bit_offset: 0,
            escape_state: EscapeState::NoZeros,
            escapes: 0,
        }
    }

    /// Write the low `num_bits` bits of `value`, MSB first.
    ///
    /// With `escape` set, each byte completed by this call passes through the
    /// emulation-prevention state machine; otherwise the state is left as is.
    pub fn write_fixed(&mut self, value: u32, num_bits: u8, escape: bool) -> Result<()> {
        if num_bits == 0 || num_bits > 32 {
            return Err(H264GenError::InvalidBitWidth { width: num_bits });
        }

        let normalized = value << (32 - u32::from(num_bits));
        let mut remaining = num_bits;

        for chunk in normalized.to_be_bytes() {
            if remaining == 0 {
                break;
            }
            let bits = remaining.min(8);
            self.write_byte(chunk, bits, escape)?;
            remaining -= bits;
        }

        Ok(())
    }

    /// Escaped fixed-width write, used for all payload fields.
    pub fn write_bits(&mut self, value: u32, num_bits: u8) -> Result<()> {
        self.write_fixed(value, num_bits, true)
    }

    /// Fixed-width write that bypasses emulation prevention.
    pub fn write_bits_unescaped(&mut self, value: u32, num_bits: u8) -> Result<()> {
        self.write_fixed(value, num_bits, false)
    }

    /// ue(v)
    pub fn write_unsigned_exp_golomb(&mut self, value: u32) -> Result<()> {
        self.write_exp_golomb_code(u64::from(value))
    }

    /// se(v): positive values map to odd code numbers, the rest to even ones.
    pub fn write_signed_exp_golomb(&mut self, value: i32) -> Result<()> {
        let magnitude = u64::from(value.unsigned_abs());
        let code_num = if value > 0 {
            2 * magnitude - 1
        } else {
            2 * magnitude
        };
        self.write_exp_golomb_code(code_num)
    }

    fn write_exp_golomb_code(&mut self, code_num: u64) -> Result<()> {
        let coded = code_num
            .checked_add(1)
            .ok_or(H264GenError::ExpGolombRange { code_num })?;
        let leading_zeros = 63 - coded.leading_zeros();

        if leading_zeros > MAX_EXP_GOLOMB_PREFIX {
            return Err(H264GenError::ExpGolombRange { code_num });
        }

        if code_num == 0 {
            self.write_bits(1, 1)
        } else if leading_zeros < 16 {
            // coded needs leading_zeros + 1 bits, so the wider field carries
            // the zero prefix as well.
            self.write_bits(coded as u32, (2 * leading_zeros + 1) as u8)
        } else {
            self.write_bits(0, leading_zeros as u8)?;
            self.write_wide(coded, leading_zeros as u8 + 1)
        }
    }

    // Fields of up to 64 bits, split into a high chunk and a 32-bit low chunk.
    fn write_wide(&mut self, value: u64, num_bits: u8) -> Result<()> {
        if num_bits > 32 {
            self.write_bits((value >> 32) as u32, num_bits - 32)?;
        }
        self.write_bits(value as u32, num_bits.min(32))
    }

    /// Pad the in-progress byte with zero bits. Padding is never escaped.
    pub fn byte_align(&mut self) -> Result<()> {
        if self.bit_offset != 0 {
            self.write_fixed(0, 8 - self.bit_offset, false)?;
        }
        Ok(())
    }

    /// rbsp_trailing_bits(): stop bit followed by zero alignment.
    ///
    /// The padding belongs to the payload, so unlike [`byte_align`] the
    /// completed byte is escaped: `00 00` followed by `0b0000_0010` must
    /// still come out as `00 00 03 02`.
    ///
    /// [`byte_align`]: BitstreamWriter::byte_align
    pub fn write_trailing_bits(&mut self) -> Result<()> {
        self.write_bits(1, 1)?;
        if self.bit_offset != 0 {
            self.write_bits(0, 8 - self.bit_offset)?;
        }
        Ok(())
    }

    /// Borrow `length` finalized bytes starting at `offset`.
    pub fn export(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= self.written)
            .ok_or(H264GenError::ExportOutOfRange {
                offset,
                length,
                available: self.written,
            })?;
        Ok(&self.buffer[offset..end])
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.byte_align()?;
        self.buffer.truncate(self.written);
        Ok(self.buffer)
    }

    /// Forget the current zero run. Called at NAL unit boundaries, where the
    /// previous unit's bytes can no longer combine with the next payload.
    pub fn reset_escape_state(&mut self) {
        self.escape_state = EscapeState::NoZeros;
    }

    pub fn bit_offset(&self) -> u8 {
        self.bit_offset
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bit_offset == 0
    }

    /// Number of bytes that can no longer change.
    pub fn finalized_len(&self) -> usize {
        self.written
    }

    /// Physical bits emitted so far, including inserted escape bytes.
    pub fn bits_written(&self) -> usize {
        self.written * 8 + usize::from(self.bit_offset)
    }

    pub fn escape_count(&self) -> usize {
        self.escapes
    }

    pub fn escape_state(&self) -> EscapeState {
        self.escape_state
    }

    fn ensure_capacity(&mut self) -> Result<()> {
        if self.buffer.capacity() - self.buffer.len() < MIN_HEADROOM {
            self.buffer
                .try_reserve_exact(GROWTH_STEP)
                .map_err(|_| H264GenError::BufferAllocation {
                    requested: GROWTH_STEP,
                })?;
            trace!(capacity = self.buffer.capacity(), "grew bitstream buffer");
        }
        Ok(())
    }

    // `byte` holds `num_bits` significant bits at its top, low bits zero.
    fn write_byte(&mut self, byte: u8, num_bits: u8, escape: bool) -> Result<()> {
        self.ensure_capacity()?;

        let shift = self.bit_offset;
        self.buffer[self.written] |= byte >> shift;
        self.bit_offset = (shift + num_bits) % 8;

        if shift + num_bits >= 8 {
            if escape {
                self.escape_finalized();
            }

            let carry = if shift == 0 { 0 } else { byte << (8 - shift) };
            self.buffer.push(carry);
            self.written += 1;
        }

        Ok(())
    }

    // Runs on the byte at `written` right after it became full.
    fn escape_finalized(&mut self) {
        let byte = self.buffer[self.written];

        self.escape_state = match (self.escape_state, byte) {
            (EscapeState::TwoOrMoreZeros, 0..=3) => {
                self.buffer[self.written] = EMULATION_PREVENTION_BYTE;
                self.buffer.push(byte);
                self.written += 1;
                self.escapes += 1;
                trace!(offset = self.written - 1, byte, "inserted emulation prevention byte");

                // The re-written zero opens a new run.
                if byte == 0 {
                    EscapeState::OneZero
                } else {
                    EscapeState::NoZeros
                }
            }
            (EscapeState::NoZeros, 0) => EscapeState::OneZero,
            (EscapeState::OneZero, 0) => EscapeState::TwoOrMoreZeros,
            _ => EscapeState::NoZeros,
        };
    }
}

impl Default for BitstreamWriter {
    fn default() -> Self {
        Self::new()
    }
}
