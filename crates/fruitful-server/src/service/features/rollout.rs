//! Deterministic user bucketing for percentage rollouts.

/// Number of rollout buckets.
const BUCKETS: u32 = 100;

/// 32-bit rolling hash over the UTF-16 code units of `input`.
///
/// Computes `h = h * 31 + unit` with wrapping arithmetic, so the same
/// identifier hashes identically across processes and platforms.
pub fn rollout_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(i32::from(unit))
    })
}

/// Maps a user identifier onto a bucket in `0..100`.
///
/// A user whose bucket is below a flag's rollout percentage sees the flag,
/// so raising the percentage only ever adds users.
pub fn rollout_bucket(user_id: &str) -> u8 {
    let bucket = rollout_hash(user_id).unsigned_abs() % BUCKETS;
    // Always below 100.
    bucket as u8
}
