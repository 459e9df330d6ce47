//! CRC-16 with the 0x8005 polynomial processed bit-reflected, initial value 0xFFFF and no final
//! XOR (the same parameters as the Modbus RTU checksum).
//!
//! Unlike Modbus, the console expects the register value serialised big-endian.

const REFLECTED_POLYNOMIAL: u16 = 0xA001;

static TABLE: [u16; 256] = const {
    let mut table = [0u16; 256];
    let mut index = 0;
    while index < table.len() {
        let mut crc = index as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ REFLECTED_POLYNOMIAL } else { crc >> 1 };
            bit += 1;
        }
        table[index] = crc;
        index += 1;
    }
    table
};

/// Checksum of everything between the preamble and the checksum itself.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF, |crc, &byte| {
        (crc >> 8) ^ TABLE[usize::from((crc as u8) ^ byte)]
    })
}
