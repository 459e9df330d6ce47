use super::Error;

/// Location of a single value within a fixed-size record.
///
/// `byte_index` is 1-based. Bits are numbered backwards: bit 1 is the least significant bit of
/// the byte, bit 8 the most significant. Fields with `bit_high > 8` span the bytes `byte_index`
/// and `byte_index + 1`, read as a big-endian 16-bit unit with bit 16 as its most significant
/// bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FieldSpec {
    byte_index: u8,
    bit_low: u8,
    bit_high: u8,
}

impl FieldSpec {
    /// Construct a descriptor, panicking if it is malformed.
    ///
    /// Meant for the static tables, where the panic surfaces at compile time.
    pub const fn new(byte_index: u8, bit_low: u8, bit_high: u8) -> Self {
        let spec = Self { byte_index, bit_low, bit_high };
        if !spec.is_valid() {
            panic!("malformed field descriptor");
        }
        spec
    }

    pub const fn try_new(byte_index: u8, bit_low: u8, bit_high: u8) -> Result<Self, Error> {
        let spec = Self { byte_index, bit_low, bit_high };
        if spec.is_valid() { Ok(spec) } else { Err(Error::MalformedFieldSpec(spec)) }
    }

    pub const fn is_valid(&self) -> bool {
        self.byte_index >= 1 && 1 <= self.bit_low && self.bit_low <= self.bit_high
            && self.bit_high <= 16
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.is_valid() { Ok(()) } else { Err(Error::MalformedFieldSpec(*self)) }
    }

    pub const fn byte_index(&self) -> u8 {
        self.byte_index
    }

    pub const fn bit_low(&self) -> u8 {
        self.bit_low
    }

    pub const fn bit_high(&self) -> u8 {
        self.bit_high
    }

    /// Number of bits the value occupies.
    pub const fn width(&self) -> u8 {
        self.bit_high - self.bit_low + 1
    }

    /// Number of bytes the field's unit spans: 1, or 2 for fields reaching past bit 8.
    pub const fn unit_bytes(&self) -> usize {
        if self.bit_high > 8 { 2 } else { 1 }
    }

    pub const fn max_value(&self) -> u64 {
        (1u64 << self.width()) - 1
    }

    /// Offset of the field's most significant bit, counting from the first (most significant)
    /// bit of the record.
    pub const fn start_bit(&self) -> usize {
        let unit_bits = self.unit_bytes() * 8;
        (self.byte_index as usize - 1) * 8 + (unit_bits - self.bit_high as usize)
    }

    /// Offset one past the field's least significant bit, in the same numbering as
    /// [`Self::start_bit`].
    pub const fn end_bit(&self) -> usize {
        self.start_bit() + self.width() as usize
    }
}

impl std::fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.byte_index, self.bit_low, self.bit_high)
    }
}

/// Read the value at `spec` out of `chunk`.
pub fn decode(chunk: &[u8], spec: FieldSpec) -> Result<u64, Error> {
    spec.validate()?;
    let first = usize::from(spec.byte_index) - 1;
    let needed = first + spec.unit_bytes();
    let unit = chunk.get(first..needed).ok_or(Error::ByteOutOfRange {
        spec,
        needed,
        available: chunk.len(),
    })?;
    let word = unit.iter().fold(0u64, |word, &byte| word << 8 | u64::from(byte));
    Ok((word >> (spec.bit_low - 1)) & spec.max_value())
}

/// Append `value` at the position described by `spec`.
///
/// Any bits between the end of the previously written field and the start of this one are left
/// zero. Fields must be written in ascending position order.
pub fn encode(accumulator: &mut BitWriter, spec: FieldSpec, value: u64) -> Result<(), Error> {
    spec.validate()?;
    let start = spec.start_bit();
    if accumulator.len_bits() > start {
        return Err(Error::MalformedFieldSpec(spec));
    }
    if value > spec.max_value() {
        return Err(Error::FieldValueOverflow { spec, value });
    }
    accumulator.pad_to(start);
    accumulator.push(value, spec.width());
    Ok(())
}

/// Growing MSB-first bit buffer that control payloads are assembled in.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len_bits(&self) -> usize {
        self.bits
    }

    /// Extend with zero bits until `bit` bits have been written.
    pub fn pad_to(&mut self, bit: usize) {
        if bit <= self.bits {
            return;
        }
        // Bits past `self.bits` within the last byte are always zero.
        self.bytes.resize(bit.div_ceil(8), 0);
        self.bits = bit;
    }

    /// Append the `width` least significant bits of `value`, most significant first.
    pub fn push(&mut self, value: u64, width: u8) {
        for shift in (0..u32::from(width)).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> shift) & 1 == 1 {
                self.bytes[self.bits / 8] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
    }

    /// The written bits, with a partially written last byte zero-filled at the end.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
