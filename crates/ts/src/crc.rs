use crc::{CRC_32_MPEG_2, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// CRC32 over a PSI/SI section, MPEG-2 polynomial 0x04C11DB7 (no
/// reflection). A section with its trailing CRC included checksums to zero.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
