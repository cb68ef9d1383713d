//! Fixed-point encodings used by the AD5934 register map.
//!
//! Nothing in here touches the bus. The driver feeds the resulting byte
//! arrays to the register layer most significant byte first, which is the
//! order the device's multi-byte registers are laid out in.

use core::fmt;

/// Number of fractional bits in the DDS frequency code (`2^27`).
const FREQUENCY_CODE_SCALE: u128 = 1 << 27;

/// Largest code the three-byte frequency registers can hold.
pub const MAX_FREQUENCY_CODE: u32 = 0x00FF_FFFF;

/// Largest value of the 9-bit increment-count and settling-count fields.
pub const MAX_NINE_BIT: u16 = 0x1FF;

/// Largest settling-cycle count the device can be programmed with (`511 × 4`).
pub const MAX_SETTLING_CYCLES: u16 = MAX_NINE_BIT * 4;

/// Errors produced while converting values into register encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// The frequency code does not fit the 24-bit register.
    FrequencyOverflow {
        /// Requested frequency
        value: u32,
    },
    /// Clock frequency or divider is zero.
    InvalidClock,
    /// More settling cycles than `MAX_SETTLING_CYCLES`.
    SettlingOverflow {
        /// Requested settling cycles
        count: u16,
    },
    /// More than 511 frequency increments.
    IncrementsOverflow {
        /// Requested increment count
        count: u16,
    },
    /// The settling multiplier field holds the reserved pattern `0b10`.
    ReservedMultiplier,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::FrequencyOverflow { value } => {
                write!(f, "frequency {} does not fit the 24-bit frequency code", value)
            }
            CodecError::InvalidClock => f.write_str("clock frequency and divider must be non-zero"),
            CodecError::SettlingOverflow { count } => write!(
                f,
                "{} settling cycles exceeds the maximum of {}",
                count, MAX_SETTLING_CYCLES
            ),
            CodecError::IncrementsOverflow { count } => write!(
                f,
                "{} increments exceeds the maximum of {}",
                count, MAX_NINE_BIT
            ),
            CodecError::ReservedMultiplier => f.write_str("settling multiplier uses a reserved encoding"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// One raw DFT result: the signed real and imaginary register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComplexSample {
    /// Real part (registers 0x94/0x95)
    pub real: i16,
    /// Imaginary part (registers 0x96/0x97)
    pub imag: i16,
}

impl ComplexSample {
    pub const fn new(real: i16, imag: i16) -> Self {
        Self { real, imag }
    }

    /// `sqrt(real² + imag²)` of the raw codes.
    pub fn magnitude(&self) -> f32 {
        let re = self.real as f32;
        let im = self.imag as f32;
        libm::sqrtf(re * re + im * im)
    }

    /// `atan2(imag, real)` in radians.
    pub fn phase(&self) -> f32 {
        libm::atan2f(self.imag as f32, self.real as f32)
    }
}

fn frequency_scale(clock_hz: u32, divider: u32) -> Result<(u128, u128), CodecError> {
    if clock_hz == 0 || divider == 0 {
        return Err(CodecError::InvalidClock);
    }
    Ok((FREQUENCY_CODE_SCALE * divider as u128, clock_hz as u128))
}

/// Encode a frequency into the three start/increment frequency bytes.
///
/// ```text
/// code = round(value × 2^27 / (clock_hz / divider))
/// ```
///
/// The AD5934 runs its DDS from MCLK/16, the AD5933 from MCLK/4; `divider`
/// selects between them.
///
/// # Errors
///
/// [`CodecError::FrequencyOverflow`] if the code exceeds 24 bits,
/// [`CodecError::InvalidClock`] for a zero clock or divider.
pub fn encode_frequency(value: u32, clock_hz: u32, divider: u32) -> Result<[u8; 3], CodecError> {
    let (numerator_scale, clock) = frequency_scale(clock_hz, divider)?;
    let code = (value as u128 * numerator_scale + clock / 2) / clock;

    if code > MAX_FREQUENCY_CODE as u128 {
        return Err(CodecError::FrequencyOverflow { value });
    }

    let code = code as u32;
    Ok([(code >> 16) as u8, (code >> 8) as u8, code as u8])
}

/// Decode three frequency register bytes back into the nearest frequency.
///
/// Lossless for every value [`encode_frequency`] accepts as long as
/// `clock_hz / divider < 2^27`, which holds for every clock the part accepts.
pub fn decode_frequency(bytes: [u8; 3], clock_hz: u32, divider: u32) -> Result<u32, CodecError> {
    let (denominator, clock) = frequency_scale(clock_hz, divider)?;
    let code = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]) as u128;
    Ok(((code * clock + denominator / 2) / denominator) as u32)
}

/// Largest frequency whose code still fits the 24-bit register.
pub fn max_frequency(clock_hz: u32, divider: u32) -> Result<u32, CodecError> {
    let (numerator_scale, clock) = frequency_scale(clock_hz, divider)?;
    // round() stays below MAX + 1 while value × scale + clock/2 < (MAX + 1) × clock
    let limit = (MAX_FREQUENCY_CODE as u128 + 1) * clock - clock / 2 - 1;
    Ok((limit / numerator_scale).min(u32::MAX as u128) as u32)
}

/// Settling-time multiplier stored in bits 10:9 of the settling register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettlingMultiplier {
    X1,
    X2,
    X4,
}

impl SettlingMultiplier {
    pub const fn bits(self) -> u8 {
        match self {
            SettlingMultiplier::X1 => 0b00,
            SettlingMultiplier::X2 => 0b01,
            SettlingMultiplier::X4 => 0b11,
        }
    }

    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b00 => Some(SettlingMultiplier::X1),
            0b01 => Some(SettlingMultiplier::X2),
            0b11 => Some(SettlingMultiplier::X4),
            _ => None,
        }
    }

    pub const fn factor(self) -> u16 {
        match self {
            SettlingMultiplier::X1 => 1,
            SettlingMultiplier::X2 => 2,
            SettlingMultiplier::X4 => 4,
        }
    }
}

/// Split a settling-cycle count into a 9-bit base count and a multiplier.
///
/// The smallest multiplier that fits is chosen. When the count is not a
/// multiple of the factor the base count is rounded up, so the device never
/// settles for fewer cycles than requested.
pub fn settling_parts(count: u16) -> Result<(u16, SettlingMultiplier), CodecError> {
    let multiplier = match count {
        0..=MAX_NINE_BIT => SettlingMultiplier::X1,
        c if c <= MAX_NINE_BIT * 2 => SettlingMultiplier::X2,
        c if c <= MAX_SETTLING_CYCLES => SettlingMultiplier::X4,
        _ => return Err(CodecError::SettlingOverflow { count }),
    };
    let factor = multiplier.factor();
    Ok((count.div_ceil(factor), multiplier))
}

/// Encode a settling-cycle count into registers 0x8A/0x8B.
pub fn encode_settling_cycles(count: u16) -> Result<[u8; 2], CodecError> {
    let (base, multiplier) = settling_parts(count)?;
    Ok([
        (multiplier.bits() << 1) | ((base >> 8) as u8 & 0x01),
        base as u8,
    ])
}

/// Decode registers 0x8A/0x8B into the effective number of settling cycles.
pub fn decode_settling_cycles(bytes: [u8; 2]) -> Result<u16, CodecError> {
    let multiplier =
        SettlingMultiplier::from_bits(bytes[0] >> 1).ok_or(CodecError::ReservedMultiplier)?;
    let base = (((bytes[0] & 0x01) as u16) << 8) | bytes[1] as u16;
    Ok(base * multiplier.factor())
}

/// Encode the number of frequency increments into registers 0x88/0x89.
pub fn encode_increments(count: u16) -> Result<[u8; 2], CodecError> {
    if count > MAX_NINE_BIT {
        return Err(CodecError::IncrementsOverflow { count });
    }
    Ok([(count >> 8) as u8, count as u8])
}

/// Interpret the four data bytes (0x94..=0x97) as big-endian two's-complement
/// real and imaginary parts.
pub fn decode_complex_sample(raw: [u8; 4]) -> ComplexSample {
    ComplexSample {
        real: i16::from_be_bytes([raw[0], raw[1]]),
        imag: i16::from_be_bytes([raw[2], raw[3]]),
    }
}
