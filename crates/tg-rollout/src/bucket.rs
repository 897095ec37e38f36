// bucket.rs — Deterministic canary bucketing.
//
// bucket(tenant, seed) = BE(first two bytes of SHA-256("{seed}:{tenant}")) mod 100
//
// Stability is the contract: the same (tenant, seed) maps to the same
// bucket on every process, forever. Raising the canary percent only adds
// tenants (those with bucket between the old and new threshold); it never
// reassigns tenants already below the old threshold. Changing the seed
// reshuffles everyone.

use sha2::{Digest, Sha256};

/// Map a tenant into [0, 100) for canary routing.
pub fn bucket(tenant: &str, seed: u64) -> u32 {
    let digest = Sha256::digest(format!("{seed}:{tenant}").as_bytes());
    let n = u16::from_be_bytes([digest[0], digest[1]]);
    (n % 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(bucket("tenant-A", 1), bucket("tenant-A", 1));
        assert_eq!(bucket("tenant-A", 42), bucket("tenant-A", 42));
    }

    #[test]
    fn seed_reshuffles() {
        // With 100 buckets, a few collisions across seeds are expected;
        // check that at least one of a handful of tenants moves.
        let moved = (0..10)
            .map(|i| format!("tenant-{i}"))
            .any(|t| bucket(&t, 1) != bucket(&t, 2));
        assert!(moved);
    }

    #[test]
    fn stays_in_range() {
        for i in 0..1000 {
            let b = bucket(&format!("tenant-{i}"), 7);
            assert!(b < 100);
        }
    }

    #[test]
    fn matches_reference_construction() {
        // Independently compute the expected value for one input.
        let digest = Sha256::digest(b"1:tenant-A");
        let expected = (u16::from_be_bytes([digest[0], digest[1]]) % 100) as u32;
        assert_eq!(bucket("tenant-A", 1), expected);
    }
}
