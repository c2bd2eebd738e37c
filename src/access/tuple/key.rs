//! Hash-container adapters for tuples.
//!
//! [`TupleKey`] hashes with [`Tuple::hash_code`] and compares with
//! [`Tuple::equals_no_schema_check`], so two keys are equal exactly when
//! they would collide in a hash join. [`TupleHasher`] forwards the
//! precomputed tuple hash instead of hashing it a second time.

use crate::access::tuple::Tuple;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hash, Hasher};

/// Borrowed tuple usable as a `HashMap`/`HashSet` key.
#[derive(Debug, Clone, Copy)]
pub struct TupleKey<'t, 'a>(pub &'t Tuple<'a>);

impl Hash for TupleKey<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash_code());
    }
}

impl PartialEq for TupleKey<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals_no_schema_check(other.0)
    }
}

impl Eq for TupleKey<'_, '_> {}

/// Pass-through hasher for values that already carry a 64-bit hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct TupleHasher(u64);

impl Hasher for TupleHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = self.0.rotate_left(8) ^ byte as u64;
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = value;
    }
}

pub type BuildTupleHasher = BuildHasherDefault<TupleHasher>;
pub type TupleMap<'t, 'a, V> = HashMap<TupleKey<'t, 'a>, V, BuildTupleHasher>;
pub type TupleSet<'t, 'a> = HashSet<TupleKey<'t, 'a>, BuildTupleHasher>;
