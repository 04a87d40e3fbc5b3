//! CRC-32 (IEEE) as used by local headers, descriptors and the central directory.

const fn gen_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let poly = 0xEDB88320; // reversed IEEE polynomial

    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }

    table
}

static CRC_TABLE: [u32; 256] = gen_crc_table();

/// Compute the CRC32 of a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

/// Continue a CRC32 computation. `prev` is the value returned for the
/// preceding bytes (0 for none).
pub fn crc32_update(prev: u32, data: &[u8]) -> u32 {
    let crc = data.iter().fold(!prev, |crc, &byte| {
        (crc >> 8) ^ CRC_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    });
    !crc
}
