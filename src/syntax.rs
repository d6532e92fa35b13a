// syntax.rs - Declarative syntax element descriptors
use crate::bitstream::BitstreamWriter;
use crate::error::Result;
use std::fmt;
use tracing::debug;

/// How a syntax element is coded in the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// u(n)
    Fixed { value: u32, bits: u8 },
    /// ue(v)
    Unsigned(u32),
    /// se(v)
    Signed(i32),
    /// u(n) written `count` times in a row.
    Repeated { value: u32, bits: u8, count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxElement {
    pub name: &'static str,
    pub value: FieldValue,
}

impl SyntaxElement {
    pub fn fixed(name: &'static str, value: u32, bits: u8) -> Self {
        Self {
            name,
            value: FieldValue::Fixed { value, bits },
        }
    }

    pub fn flag(name: &'static str, set: bool) -> Self {
        Self::fixed(name, u32::from(set), 1)
    }

    pub fn ue(name: &'static str, value: u32) -> Self {
        Self {
            name,
            value: FieldValue::Unsigned(value),
        }
    }

    pub fn se(name: &'static str, value: i32) -> Self {
        Self {
            name,
            value: FieldValue::Signed(value),
        }
    }

    pub fn repeated(name: &'static str, value: u32, bits: u8, count: u32) -> Self {
        Self {
            name,
            value: FieldValue::Repeated { value, bits, count },
        }
    }

    /// How many times the element appears in the bitstream.
    pub fn count(&self) -> u32 {
        match self.value {
            FieldValue::Repeated { count, .. } => count,
            _ => 1,
        }
    }

    pub fn write(&self, writer: &mut BitstreamWriter) -> Result<()> {
        match self.value {
            FieldValue::Fixed { value, bits } => writer.write_bits(value, bits),
            FieldValue::Unsigned(value) => writer.write_unsigned_exp_golomb(value),
            FieldValue::Signed(value) => writer.write_signed_exp_golomb(value),
            FieldValue::Repeated { value, bits, count } => {
                for _ in 0..count {
                    writer.write_bits(value, bits)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for SyntaxElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            FieldValue::Fixed { value, .. }
            | FieldValue::Unsigned(value)
            | FieldValue::Repeated { value, .. } => {
                write!(f, "{} = {}", self.name, value)
            }
            FieldValue::Signed(value) => write!(f, "{} = {}", self.name, value),
        }
    }
}

/// Write `elements` in order through the escaped path.
pub fn write_elements(writer: &mut BitstreamWriter, elements: &[SyntaxElement]) -> Result<()> {
    for element in elements {
        element.write(writer)?;
        debug!(field = element.name, value = ?element.value, "wrote syntax element");
    }
    Ok(())
}
