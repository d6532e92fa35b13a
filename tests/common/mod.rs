// tests/common/mod.rs - Annex B parsing helpers shared by the unit and integration suites
#![allow(dead_code)]

/// MSB-first reader over an RBSP (emulation prevention already removed).
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read_bit(&mut self) -> u64 {
        let byte = self.data[self.pos / 8];
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        u64::from(bit)
    }

    pub fn read_bits(&mut self, n: u32) -> u64 {
        (0..n).fold(0, |acc, _| (acc << 1) | self.read_bit())
    }

    pub fn read_flag(&mut self) -> bool {
        self.read_bit() == 1
    }

    pub fn read_ue(&mut self) -> u64 {
        let mut leading_zeros = 0;
        while self.read_bit() == 0 {
            leading_zeros += 1;
        }
        (1u64 << leading_zeros) - 1 + self.read_bits(leading_zeros)
    }

    pub fn read_se(&mut self) -> i64 {
        let code = self.read_ue() as i64;
        if code % 2 == 1 {
            (code + 1) / 2
        } else {
            -(code / 2)
        }
    }

    /// rbsp_trailing_bits: a one followed by zeros up to the end of the data.
    pub fn at_trailing_bits(&self) -> bool {
        let mut rest = BitReader {
            data: self.data,
            pos: self.pos,
        };
        if rest.read_bit() != 1 {
            return false;
        }
        while rest.pos < self.data.len() * 8 {
            if rest.read_bit() != 0 {
                return false;
            }
        }
        true
    }
}

pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }
    out
}

/// NAL units of an Annex B stream, each starting with its header byte.
pub fn split_nal_units(stream: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= stream.len() {
        if stream[i] == 0 && stream[i + 1] == 0 && stream[i + 2] == 1 {
            starts.push(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let mut end = starts.get(n + 1).map_or(stream.len(), |&next| next - 3);
            // leading_zero_8bits of a 4-byte start code
            while end > start && stream[end - 1] == 0 {
                end -= 1;
            }
            &stream[start..end]
        })
        .collect()
}

/// (forbidden_zero_bit, nal_ref_idc, nal_unit_type)
pub fn parse_nal_header(header: u8) -> (u8, u8, u8) {
    (header >> 7, (header >> 5) & 0x3, header & 0x1F)
}

/// Offset of the first `00 00 0x` (x <= 2) inside a NAL unit payload.
pub fn find_start_code_emulation(payload: &[u8]) -> Option<usize> {
    payload
        .windows(3)
        .position(|w| w[0] == 0 && w[1] == 0 && w[2] <= 2)
}

/// xorshift32
pub struct TestRng(pub u32);

impl TestRng {
    pub fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }
}
