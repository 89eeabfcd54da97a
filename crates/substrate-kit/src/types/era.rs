//! Transaction mortality.

use crate::error::CodecError;

/// Era length used for every mortal extrinsic built by this crate.
pub const MORTAL_PERIOD: u64 = 64;

/// The block window in which a signed extrinsic is valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Era {
    /// Valid forever.
    Immortal,
    /// Valid for `period` blocks starting at the block whose number modulo
    /// `period` equals `phase`.
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Create a mortal era anchored at `current` (a finalized block number).
    ///
    /// `period` is rounded up to a power of two in `4..=65536`, and the phase
    /// is quantized so the era survives the two-byte encoding.
    pub fn mortal(period: u64, current: u64) -> Self {
        let period = period.checked_next_power_of_two().unwrap_or(1 << 16).clamp(4, 1 << 16);
        let phase = current % period;
        let quantize_factor = (period >> 12).max(1);
        let quantized_phase = phase / quantize_factor * quantize_factor;
        Era::Mortal {
            period,
            phase: quantized_phase,
        }
    }

    /// Whether this era is immortal.
    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }

    /// First block at which an extrinsic with this era is valid, given the
    /// current block number.
    pub fn birth(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => {
                (current.max(phase) - phase) / period * period + phase
            }
        }
    }

    /// First block at which an extrinsic with this era is no longer valid.
    pub fn death(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => u64::MAX,
            Era::Mortal { period, .. } => self.birth(current) + period,
        }
    }

    /// SCALE-encode: `0x00` for immortal, otherwise two little-endian bytes
    /// packing `log2(period) - 1` in the low nibble and the quantized phase
    /// above it.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Era::Immortal => vec![0u8],
            Era::Mortal { period, phase } => {
                let quantize_factor = (period >> 12).max(1);
                let low = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16;
                let high = ((phase / quantize_factor) << 4) as u16;
                (low | high).to_le_bytes().to_vec()
            }
        }
    }

    /// SCALE-decode from the front of `input`, advancing it on success.
    pub fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let first = *input.first().ok_or(CodecError::TruncatedInput {
            needed: 1,
            available: 0,
        })?;
        if first == 0 {
            *input = &input[1..];
            return Ok(Era::Immortal);
        }
        if input.len() < 2 {
            return Err(CodecError::TruncatedInput {
                needed: 2,
                available: input.len(),
            });
        }

        let encoded = u16::from_le_bytes([input[0], input[1]]) as u64;
        let period = 2u64 << (encoded % (1 << 4));
        let quantize_factor = (period >> 12).max(1);
        let phase = (encoded >> 4) * quantize_factor;
        if period < 4 || phase >= period {
            return Err(CodecError::Invalid(format!(
                "era period {} phase {}",
                period, phase
            )));
        }

        *input = &input[2..];
        Ok(Era::Mortal { period, phase })
    }
}
