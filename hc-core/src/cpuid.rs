//! Identification-word decoding
//!
//! Pure functions that turn raw identification words into topology facts.
//! Nothing here talks to a backend, so every decode rule is testable against
//! literal word values.

use hc_protocol::CpuArchitecture;

use crate::constants::freq;
use crate::registers::IdentifyWords;

/// Assemble the 12-character vendor string.
///
/// The identification convention interleaves the words: the text lives in
/// word 1, then word 3, then word 2, in that exact order.
pub fn vendor_string(words: &IdentifyWords) -> String {
    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&words[1].to_le_bytes());
    bytes[4..8].copy_from_slice(&words[3].to_le_bytes());
    bytes[8..12].copy_from_slice(&words[2].to_le_bytes());
    String::from_utf8_lossy(&bytes)
        .trim_end_matches('\0')
        .to_string()
}

/// Classify a vendor string into an architecture family
pub fn classify_vendor(vendor: &str) -> CpuArchitecture {
    if vendor.contains("GenuineIntel") {
        CpuArchitecture::Intel
    } else if vendor.contains("AuthenticAMD") {
        CpuArchitecture::Amd
    } else {
        CpuArchitecture::Unknown
    }
}

/// Core/thread counts from the Intel feature words.
///
/// Bits [16:23] of the second word hold the core count; hyperthreading is
/// assumed present, so threads are twice the cores.
pub fn intel_topology(words: &IdentifyWords) -> (u32, u32) {
    let cores = (words[1] >> 16) & 0xFF;
    (cores, cores * 2)
}

/// Core/thread counts from the AMD extended topology words.
///
/// Bits [0:7] of the third word hold cores-minus-one; threads equal cores.
pub fn amd_topology(words: &IdentifyWords) -> (u32, u32) {
    let cores = (words[2] & 0xFF) + 1;
    (cores, cores)
}

/// Assemble the brand string from the three extended identification results.
///
/// Each query contributes 16 characters from its four words in natural order.
/// Scanning left to right, the string ends at the first NUL or space byte,
/// whichever comes first.
pub fn brand_string(chunks: &[IdentifyWords; 3]) -> String {
    let mut bytes = [0u8; 48];
    for (i, chunk) in chunks.iter().enumerate() {
        for (j, word) in chunk.iter().enumerate() {
            let at = i * 16 + j * 4;
            bytes[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
    }
    let end = bytes
        .iter()
        .position(|b| *b == 0 || *b == b' ')
        .unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Base frequency in MHz from the platform-info register: bits [8:15] carry
/// the ratio, 100 MHz per step.
pub fn platform_base_frequency_mhz(value: u64) -> u32 {
    (((value >> 8) & 0xFF) as u32) * freq::PLATFORM_STEP_MHZ
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTEL_VENDOR: IdentifyWords = [0x0000_000B, 0x756E_6547, 0x6C65_746E, 0x4965_6E69];

    #[test]
    fn vendor_assembly_order_is_b_d_c() {
        assert_eq!(vendor_string(&INTEL_VENDOR), "GenuineIntel");
    }

    #[test]
    fn vendor_of_zeroed_words_is_empty() {
        assert_eq!(vendor_string(&[0; 4]), "");
    }

    #[test]
    fn vendor_classification() {
        assert_eq!(classify_vendor("GenuineIntel"), CpuArchitecture::Intel);
        assert_eq!(classify_vendor("AuthenticAMD"), CpuArchitecture::Amd);
        assert_eq!(classify_vendor("CentaurHauls"), CpuArchitecture::Unknown);
        assert_eq!(classify_vendor(""), CpuArchitecture::Unknown);
    }

    #[test]
    fn intel_core_count_comes_from_word_one() {
        // 0x000C0800: bits [16:23] = 0x0C
        let (cores, threads) = intel_topology(&[0x0009_06A0, 0x000C_0800, 0, 0]);
        assert_eq!(cores, 12);
        assert_eq!(threads, 24);
    }

    #[test]
    fn amd_core_count_is_off_by_one_encoded() {
        let (cores, threads) = amd_topology(&[0, 0, 0x0000_0007, 0]);
        assert_eq!(cores, 8);
        assert_eq!(threads, 8);
    }

    #[test]
    fn brand_truncates_at_first_space() {
        // "Intel(R) ..." stops at the space after "Intel(R)"
        let chunks = [
            [
                u32::from_le_bytes(*b"Inte"),
                u32::from_le_bytes(*b"l(R)"),
                u32::from_le_bytes(*b" Cor"),
                u32::from_le_bytes(*b"e(TM"),
            ],
            [0; 4],
            [0; 4],
        ];
        assert_eq!(brand_string(&chunks), "Intel(R)");
    }

    #[test]
    fn brand_truncates_at_first_nul() {
        let chunks = [
            [
                u32::from_le_bytes(*b"Fast"),
                u32::from_le_bytes([b'C', b'P', b'U', 0]),
                0,
                0,
            ],
            [0; 4],
            [0; 4],
        ];
        assert_eq!(brand_string(&chunks), "FastCPU");
    }

    #[test]
    fn brand_of_zeroed_words_is_empty() {
        assert_eq!(brand_string(&[[0; 4]; 3]), "");
    }

    #[test]
    fn platform_frequency_decoding() {
        assert_eq!(platform_base_frequency_mhz(0x0800_0800), 800);
        assert_eq!(platform_base_frequency_mhz(0x1E00), 3000);
        assert_eq!(platform_base_frequency_mhz(0), 0);
        // Only bits [8:15] participate
        assert_eq!(platform_base_frequency_mhz(0xFFFF_0000_0000_1E00), 3000);
    }
}
