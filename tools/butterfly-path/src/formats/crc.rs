//! CRC-64 checksums for tile files

use crc::{Crc, CRC_64_GO_ISO};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Incremental digest over a sequence of byte slices
pub struct Digest {
    inner: crc::Digest<'static, u64>,
}

impl Digest {
    pub fn new() -> Self {
        Self {
            inner: CRC64.digest(),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn finalize(self) -> u64 {
        self.inner.finalize()
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_one_shot() {
        let header = [7u8; 64];
        let body = b"tile body bytes";
        let mut digest = Digest::new();
        digest.update(&header).update(body);

        let mut joined = header.to_vec();
        joined.extend_from_slice(body);
        assert_eq!(digest.finalize(), checksum(&joined));
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let mut data = vec![0u8; 128];
        let before = checksum(&data);
        data[77] ^= 0x10;
        assert_ne!(before, checksum(&data));
    }
}
