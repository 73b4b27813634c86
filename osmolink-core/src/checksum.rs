//! Frame checksums
//!
//! Both checksums are byte-reflected, table-driven CRCs:
//!
//! ```text
//! crc = table[(crc ^ byte) & 0xFF] ^ (crc >> 8)
//! ```
//!
//! The tables are the standard reflected CRC-16 (poly 0xA001) and CRC-32
//! (poly 0xEDB88320) tables, but the protocol seeds both registers with
//! `0x3AA3` and applies no final XOR.

use tracing::trace;

/// Seed for the header checksum
pub const CRC16_SEED: u16 = 0x3AA3;

/// Seed for the frame checksum (not all-ones)
pub const CRC32_SEED: u32 = 0x0000_3AA3;

const CRC16_POLY: u16 = 0xA001;
const CRC32_POLY: u32 = 0xEDB8_8320;

/// Reflected CRC-16 lookup table
pub static CRC16_TABLE: [u16; 256] = make_crc16_table(CRC16_POLY);

/// Reflected CRC-32 lookup table
pub static CRC32_TABLE: [u32; 256] = make_crc32_table(CRC32_POLY);

const fn make_crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn make_crc32_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate the 16-bit checksum of `data` starting from `seed`
///
/// # Examples
///
/// ```
/// use osmolink_core::checksum;
///
/// let crc = checksum::crc16(b"123456789", checksum::CRC16_SEED);
/// assert_eq!(crc, 0x2752);
/// ```
pub fn crc16(data: &[u8], seed: u16) -> u16 {
    let crc = data.iter().fold(seed, |crc, &byte| {
        CRC16_TABLE[((crc ^ byte as u16) & 0xFF) as usize] ^ (crc >> 8)
    });

    trace!(
        len = data.len(),
        crc16 = format!("0x{:04X}", crc),
        "Calculated CRC16"
    );

    crc
}

/// Calculate the 32-bit checksum of `data` starting from `seed`
pub fn crc32(data: &[u8], seed: u32) -> u32 {
    let crc = data.iter().fold(seed, |crc, &byte| {
        CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
    });

    trace!(
        len = data.len(),
        crc32 = format!("0x{:08X}", crc),
        "Calculated CRC32"
    );

    crc
}

/// Header checksum with the protocol seed
pub fn header_crc(header: &[u8]) -> u16 {
    crc16(header, CRC16_SEED)
}

/// Frame checksum with the protocol seed
pub fn frame_crc(frame: &[u8]) -> u32 {
    crc32(frame, CRC32_SEED)
}

/// Verify a header checksum
pub fn verify_header(header: &[u8], expected: u16) -> bool {
    header_crc(header) == expected
}

/// Verify a frame checksum
pub fn verify_frame(frame: &[u8], expected: u32) -> bool {
    frame_crc(frame) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK_INPUT: &[u8] = b"123456789";

    #[test]
    fn test_crc16_table_entries() {
        assert_eq!(CRC16_TABLE[0], 0x0000);
        assert_eq!(CRC16_TABLE[1], 0xC0C1);
        assert_eq!(CRC16_TABLE[2], 0xC181);
        assert_eq!(CRC16_TABLE[128], 0xA001);
        assert_eq!(CRC16_TABLE[255], 0x4040);
    }

    #[test]
    fn test_crc32_table_entries() {
        assert_eq!(CRC32_TABLE[0], 0x0000_0000);
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[2], 0xEE0E_612C);
        assert_eq!(CRC32_TABLE[128], 0xEDB8_8320);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_standard_check_values() {
        // CRC-16/ARC and CRC-32/ISO-HDLC check values confirm the tables
        assert_eq!(crc16(CHECK_INPUT, 0), 0xBB3D);
        assert_eq!(crc32(CHECK_INPUT, 0xFFFF_FFFF) ^ 0xFFFF_FFFF, 0xCBF4_3926);
    }

    #[test]
    fn test_protocol_seeds() {
        assert_eq!(crc16(CHECK_INPUT, CRC16_SEED), 0x2752);
        assert_eq!(crc32(CHECK_INPUT, CRC32_SEED), 0xE4D9_DC14);
    }

    #[test]
    fn test_empty_input_returns_seed() {
        assert_eq!(header_crc(&[]), CRC16_SEED);
        assert_eq!(frame_crc(&[]), CRC32_SEED);
    }

    #[test]
    fn test_header_crc_of_known_frame() {
        let header = [0xAA, 0x17, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
        assert_eq!(header_crc(&header), 0x2E00);
        assert!(verify_header(&header, 0x2E00));
        assert!(!verify_header(&header, 0x2E01));
    }

    #[test]
    fn test_verify_frame() {
        let crc = frame_crc(CHECK_INPUT);
        assert!(verify_frame(CHECK_INPUT, crc));
        assert!(!verify_frame(CHECK_INPUT, crc.wrapping_add(1)));
    }
}
