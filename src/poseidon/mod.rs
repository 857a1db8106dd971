//! Poseidon Hasher
//!
//! Arity-2 Poseidon over the BN254 scalar field, plus a depth-keyed cache of
//! zero-subtree roots (`Z[0] = H(0)`'s subtree identity, `Z[i] = H2(Z[i-1],
//! Z[i-1])`) used by the tree service to fill empty branches without storing
//! them.
//!
//! Parameters match the construction used throughout the rest of this stack:
//! width 3 (rate 2, capacity 1), 8 full rounds, 57 partial rounds, x^5
//! S-box, Grain-LFSR round constants via arkworks' own generator. Any two
//! implementations built from these parameters agree bit-for-bit.

use crate::field::FieldElement;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use std::sync::{Mutex, OnceLock};

static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

fn config() -> &'static PoseidonConfig<Fr> {
    CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = 254;

        let (ark, mds) =
            find_poseidon_ark_and_mds::<Fr>(field_bits, rate, full_rounds, partial_rounds, 0);

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

/// `H2(a, b)` — the tree's one hash primitive.
pub fn hash2(a: FieldElement, b: FieldElement) -> FieldElement {
    let mut sponge = PoseidonSponge::new(config());
    sponge.absorb(&a.inner());
    sponge.absorb(&b.inner());
    let out: Vec<Fr> = sponge.squeeze_field_elements(1);
    FieldElement::from_inner(out[0])
}

/// Process-wide cache of zero-subtree roots, indexed by depth.
///
/// `zero_subtree(0)` is the empty-leaf value; `zero_subtree(d)` for `d > 0`
/// is the root of an empty subtree of depth `d`. Populated lazily and
/// memoized so a tree of depth 32 never recomputes more than 32 hashes
/// across the process lifetime.
pub struct ZeroCache {
    levels: Mutex<Vec<FieldElement>>,
}

impl ZeroCache {
    pub fn new() -> Self {
        ZeroCache {
            levels: Mutex::new(vec![FieldElement::ZERO]),
        }
    }

    /// Zero value for an empty subtree of the given depth (0 = leaf level).
    pub fn get(&self, depth: usize) -> FieldElement {
        let mut levels = self.levels.lock().expect("zero cache poisoned");
        while levels.len() <= depth {
            let prev = *levels.last().expect("levels always has index 0");
            levels.push(hash2(prev, prev));
        }
        levels[depth]
    }
}

impl Default for ZeroCache {
    fn default() -> Self {
        Self::new()
    }
}

static ZERO_CACHE: OnceLock<ZeroCache> = OnceLock::new();

/// The process-wide zero-subtree cache, shared by every `TreeService`
/// instance regardless of which store or tree id it serves (the zero values
/// depend only on the hash function, not on tree contents).
pub fn zero_cache() -> &'static ZeroCache {
    ZERO_CACHE.get_or_init(ZeroCache::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash2_deterministic() {
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        assert_eq!(hash2(a, b), hash2(a, b));
    }

    #[test]
    fn hash2_order_matters() {
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        assert_ne!(hash2(a, b), hash2(b, a));
    }

    #[test]
    fn zero_cache_builds_incrementally() {
        let cache = ZeroCache::new();
        let z0 = cache.get(0);
        let z1 = cache.get(1);
        assert_eq!(z1, hash2(z0, z0));
        let z3 = cache.get(3);
        let z2 = cache.get(2);
        assert_eq!(z3, hash2(z2, z2));
    }

    #[test]
    fn zero_cache_is_memoized_and_consistent() {
        let cache = ZeroCache::new();
        let a = cache.get(5);
        let b = cache.get(5);
        assert_eq!(a, b);
    }

    #[test]
    fn process_wide_cache_matches_fresh_cache() {
        let fresh = ZeroCache::new();
        assert_eq!(zero_cache().get(4), fresh.get(4));
    }
}
