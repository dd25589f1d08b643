//! Obfuscation primitives of the on-disk format: the security-chunk
//! scrambler, the string mask and the header encryption pass.
//!
//! All of this is pure byte shuffling over fixed key tables; nothing here
//! is cryptography. The tables are part of the format and must never
//! change.

use rand::rngs::StdRng;
use rand::Rng;

/// XOR mask applied to every language-string byte.
pub const STRING_MASK: u8 = 0xA5;

/// Key table the security chunk is scrambled against.
pub const SECURITY_KEY: [u8; 13] = [
    0x1A, 0x5C, 0x0E, 0xA3, 0x47, 0xD9, 0x62, 0x2F, 0xB8, 0x71, 0x94, 0x3D, 0xE6,
];

/// Byte positions of the verification bytes inside the security data.
pub const VERIFY_LEVEL_COUNT: usize = 5;
pub const VERIFY_OPTIONS_LOW: usize = 12;
pub const VERIFY_SETTINGS_LOW: usize = 19;

/// Permutation applied to the first 64 bytes of a protected file:
/// `out[i] = in[HEADER_PERM[i]] ^ HEADER_KEY[i % 17]`.
pub const HEADER_PERM: [u8; 64] = [
    11, 48, 21, 58, 31, 4, 41, 14, 51, 24, 61, 34, 7, 44, 17, 54, 27, 0, 37, 10, 47, 20,
    57, 30, 3, 40, 13, 50, 23, 60, 33, 6, 43, 16, 53, 26, 63, 36, 9, 46, 19, 56, 29, 2,
    39, 12, 49, 22, 59, 32, 5, 42, 15, 52, 25, 62, 35, 8, 45, 18, 55, 28, 1, 38,
];

/// Key table for the header encryption pass.
pub const HEADER_KEY: [u8; 17] = [
    0x4B, 0x96, 0x21, 0xD7, 0x3C, 0x85, 0x5E, 0xF0, 0x19, 0xA2, 0x6D, 0xC8, 0x33, 0x7A,
    0xE1, 0x0F, 0x58,
];

/// Build the raw security data block: an even number of bytes (40–56),
/// RNG-filled, with the three verification bytes embedded, a checksum at
/// byte 0, and bytes 1.. XOR-scrambled against [`SECURITY_KEY`].
pub fn security_data(
    rng: &mut StdRng,
    level_count: u8,
    options_low: u8,
    settings_low: u8,
) -> Vec<u8> {
    let words: usize = rng.random_range(20..=28);
    let mut data = vec![0u8; words * 2];
    for b in data.iter_mut().skip(1) {
        *b = rng.random::<u8>();
    }
    data[VERIFY_LEVEL_COUNT] = level_count;
    data[VERIFY_OPTIONS_LOW] = options_low;
    data[VERIFY_SETTINGS_LOW] = settings_low;

    let sum: u32 = data[1..].iter().map(|&b| u32::from(b)).sum();
    data[0] = (sum & 0xFF) as u8;

    scramble(&mut data[1..]);
    data
}

/// XOR a buffer against the security key table, cyclically.
pub fn scramble(data: &mut [u8]) {
    for (i, b) in data.iter_mut().enumerate() {
        *b ^= SECURITY_KEY[i % SECURITY_KEY.len()];
    }
}

/// Encrypt the first 64 bytes of a finished file in place. Files shorter
/// than 64 bytes are left untouched.
pub fn encrypt_header(file: &mut [u8]) {
    if file.len() < 64 {
        return;
    }
    let original: [u8; 64] = file[..64].try_into().expect("64-byte header");
    for i in 0..64 {
        file[i] = original[usize::from(HEADER_PERM[i])] ^ HEADER_KEY[i % HEADER_KEY.len()];
    }
}
