//! Name hashing for partition assignment.
//!
//! MurmurHash3 (x86, 32-bit) over the UTF-8 bytes of the object name. The result
//! must be identical on every member regardless of platform or toolchain, which
//! rules out `std`'s `DefaultHasher`.

pub const PARTITION_HASH_SEED: u32 = 0x0100_0193;

pub fn murmur3_x86_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h1 = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k1 ^= (*byte as u32) << (8 * i);
        }
        h1 ^= k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
    }

    h1 ^= data.len() as u32;
    fmix32(h1)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// `abs(hash) % partition_count`, with `i32::MIN` mapped to partition 0.
pub fn partition_id_for(name: &str, partition_count: u32) -> u32 {
    let hash = murmur3_x86_32(name.as_bytes(), PARTITION_HASH_SEED) as i32;
    if hash == i32::MIN {
        return 0;
    }
    hash.unsigned_abs() % partition_count
}
