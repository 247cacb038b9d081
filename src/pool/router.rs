//! Key-to-lane routing
//!
//! Keys are hashed with 32-bit FNV-1a and reduced with an unsigned modulo,
//! so the index is always in `[0, worker_count)` and a given key maps to the
//! same lane for as long as the worker count stays the same.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash of `bytes`
#[inline]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Lane index for `key` in a pool of `worker_count` workers
///
/// # Panics
///
/// Panics if `worker_count` is zero. A constructed pool always has at least
/// one worker.
#[inline]
pub fn route(key: &str, worker_count: usize) -> usize {
    assert!(worker_count > 0, "worker_count must be greater than 0");
    (u64::from(fnv1a_32(key.as_bytes())) % worker_count as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_route_is_stable() {
        for key in ["", "id-1", "user-123", "ünïcödé"] {
            let first = route(key, 7);
            for _ in 0..10 {
                assert_eq!(route(key, 7), first);
            }
        }
    }

    #[test]
    fn test_route_in_range() {
        for i in 0..1_000 {
            let key = format!("id-{}", i);
            assert!(route(&key, 13) < 13);
        }
        assert_eq!(route("anything", 1), 0);
    }

    #[test]
    fn test_route_spreads_keys() {
        let lanes: HashSet<usize> = (0..1_000).map(|i| route(&format!("id-{}", i), 10)).collect();
        assert_eq!(lanes.len(), 10);
    }

    #[test]
    fn test_route_high_bit_hash_is_non_negative() {
        // 0xe40c292c has the top bit set; a signed reduction would go negative.
        assert!(fnv1a_32(b"a") > i32::MAX as u32);
        assert_eq!(route("a", 3), (0xe40c_292c_u64 % 3) as usize);
    }

    #[test]
    #[should_panic(expected = "worker_count must be greater than 0")]
    fn test_route_zero_workers_panics() {
        let _ = route("key", 0);
    }
}
