//! 名称哈希
//!
//! 挂点、骨骼与动画名称的主键是小写名称的 CRC32（IEEE 多项式）。

use once_cell::sync::Lazy;

static CRC_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut c = i as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
        }
        *entry = c;
    }
    table
});

#[inline]
fn update(crc: u32, byte: u8) -> u32 {
    CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// 区分大小写的 CRC32
pub fn crc32(name: &str) -> u32 {
    !name.bytes().fold(!0u32, update)
}

/// 忽略大小写的 CRC32，小写规则与 `str::to_lowercase` 一致
pub fn crc32_lowercase(name: &str) -> u32 {
    if name.is_ascii() {
        !name
            .bytes()
            .fold(!0u32, |crc, b| update(crc, b.to_ascii_lowercase()))
    } else {
        crc32(&name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        // 标准测试向量
        assert_eq!(crc32("123456789"), 0xCBF4_3926);
        assert_eq!(crc32(""), 0);
    }

    #[test]
    fn test_lowercase_ignores_case() {
        assert_eq!(crc32_lowercase("Hat"), crc32_lowercase("hat"));
        assert_eq!(crc32_lowercase("HAT"), crc32("hat"));
        assert_ne!(crc32("Hat"), crc32("hat"));
    }

    #[test]
    fn test_lowercase_non_ascii() {
        assert_eq!(crc32_lowercase("ÄRMEL"), crc32_lowercase("ärmel"));
        assert_eq!(crc32_lowercase("ÄRMEL"), crc32("ärmel"));
    }
}
