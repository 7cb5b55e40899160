//! Checksum engines for the two MSP dialects.

/// CRC-8/DVB-S2 generator polynomial (x^8 + x^7 + x^6 + x^4 + x^2 + 1).
const DVB_S2_POLY: u8 = 0xD5;

/// Advance a CRC-8/DVB-S2 by one byte. MSB first, no reflection, no final
/// XOR. Start from 0.
pub fn crc8_dvb_s2(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    for _ in 0..8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ DVB_S2_POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// Fold a run of bytes into a CRC-8/DVB-S2.
pub fn crc8_dvb_s2_update(crc: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(crc, |crc, &b| crc8_dvb_s2(crc, b))
}

/// Fold a run of bytes into the v1 XOR checksum.
pub fn xor_update(acc: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(acc, |acc, &b| acc ^ b)
}
