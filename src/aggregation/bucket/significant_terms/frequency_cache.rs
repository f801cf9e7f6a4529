use std::io;

use rustc_hash::FxHashMap;

use crate::aggregation::values_source::FieldValueCodec;
use crate::aggregation::{AggregationLimits, MemoryConsumption, ResourceLimitGuard};
use crate::TermOrdinal;

/// Growable table of frequencies, indexed by term ordinal.
///
/// Slots are `None` until a frequency is stored in them. The table never shrinks.
struct FrequencyTable {
    freqs: Vec<Option<u64>>,
}

impl FrequencyTable {
    fn with_capacity(capacity: usize, guard: &mut ResourceLimitGuard) -> crate::Result<Self> {
        let freqs = vec![None; capacity];
        guard.add_memory_consumed(freqs.memory_consumption() as u64)?;
        Ok(FrequencyTable { freqs })
    }

    fn capacity(&self) -> usize {
        self.freqs.len()
    }

    fn get(&self, ord: TermOrdinal) -> Option<u64> {
        self.freqs.get(ord as usize).copied().flatten()
    }

    /// Grows the table so that `ord` has a slot. Capacity at least doubles, existing slots
    /// keep their position.
    fn ensure_slot(
        &mut self,
        ord: TermOrdinal,
        guard: &mut ResourceLimitGuard,
    ) -> crate::Result<()> {
        let needed = ord as usize + 1;
        if needed <= self.freqs.len() {
            return Ok(());
        }
        let new_capacity = needed.max(self.freqs.len() * 2);
        let mem_before = self.freqs.memory_consumption();
        self.freqs.resize(new_capacity, None);
        let mem_delta = self.freqs.memory_consumption().saturating_sub(mem_before);
        debug!(
            "growing background frequency table to {new_capacity} slots (+{mem_delta} bytes)"
        );
        guard.add_memory_consumed(mem_delta as u64)
    }

    fn set(&mut self, ord: TermOrdinal, freq: u64) {
        self.freqs[ord as usize] = Some(freq);
    }
}

/// Caches the background frequency of terms.
///
/// Every distinct term gets a dense ordinal on first lookup, which indexes a growable frequency
/// table. The ordinal is assigned before the frequency is computed: if the computation fails,
/// the ordinal stays reserved and its slot stays absent, and the next lookup of the term
/// computes the frequency again into the same ordinal.
///
/// The table only grows once a frequency is computed: after a failed computation,
/// [`capacity`](FrequencyCache::capacity) may be smaller than
/// [`num_ordinals`](FrequencyCache::num_ordinals).
///
/// All allocations are charged to the [`AggregationLimits`] the cache was created with, and
/// given back when the cache is dropped.
pub struct FrequencyCache {
    term_ords: FxHashMap<Box<[u8]>, TermOrdinal>,
    freqs: FrequencyTable,
    term_bytes: usize,
    map_bytes_accounted: usize,
    guard: ResourceLimitGuard,
}

impl FrequencyCache {
    /// Creates a cache with `initial_capacity` frequency slots.
    pub fn new(initial_capacity: usize, limits: &AggregationLimits) -> crate::Result<Self> {
        let mut guard = limits.new_guard();
        let freqs = FrequencyTable::with_capacity(initial_capacity, &mut guard)?;
        Ok(FrequencyCache {
            term_ords: FxHashMap::default(),
            freqs,
            term_bytes: 0,
            map_bytes_accounted: 0,
            guard,
        })
    }

    /// Returns the frequency of `term`, computing it with `compute` on a cache miss.
    ///
    /// `compute` is called at most once per successful lookup, and never for a term whose
    /// frequency is cached. Its errors are propagated as is.
    pub fn get_or_compute<F>(&mut self, term: &[u8], compute: F) -> crate::Result<u64>
    where F: FnOnce(&[u8]) -> io::Result<u64> {
        let ord = match self.term_ords.get(term) {
            Some(&ord) => {
                if let Some(freq) = self.freqs.get(ord) {
                    return Ok(freq);
                }
                ord
            }
            None => self.assign_ordinal(term)?,
        };
        let freq = compute(term)?;
        self.freqs.ensure_slot(ord, &mut self.guard)?;
        self.freqs.set(ord, freq);
        Ok(freq)
    }

    /// Same as [`FrequencyCache::get_or_compute`], for a value translated to its indexed term
    /// by `codec`.
    pub fn get_or_compute_value<F>(
        &mut self,
        value: i64,
        codec: &dyn FieldValueCodec,
        compute: F,
    ) -> crate::Result<u64>
    where
        F: FnOnce(&[u8]) -> io::Result<u64>,
    {
        let term = codec.to_indexed_bytes(value);
        self.get_or_compute(&term, compute)
    }

    fn assign_ordinal(&mut self, term: &[u8]) -> crate::Result<TermOrdinal> {
        let ord = self.term_ords.len() as TermOrdinal;
        self.term_ords.insert(Box::from(term), ord);
        self.term_bytes += term.len();
        let map_bytes = self.term_ords.memory_consumption() + self.term_bytes;
        let mem_delta = map_bytes.saturating_sub(self.map_bytes_accounted);
        self.map_bytes_accounted = map_bytes;
        self.guard.add_memory_consumed(mem_delta as u64)?;
        Ok(ord)
    }

    /// The ordinal assigned to `term`, if any.
    pub fn ordinal(&self, term: &[u8]) -> Option<TermOrdinal> {
        self.term_ords.get(term).copied()
    }

    /// The cached frequency of `term`, without computing it.
    pub fn get(&self, term: &[u8]) -> Option<u64> {
        self.ordinal(term).and_then(|ord| self.freqs.get(ord))
    }

    /// Number of ordinals assigned so far.
    pub fn num_ordinals(&self) -> usize {
        self.term_ords.len()
    }

    /// Number of slots of the frequency table.
    pub fn capacity(&self) -> usize {
        self.freqs.capacity()
    }

    /// Bytes charged to the aggregation limits by this cache.
    pub fn memory_consumption(&self) -> u64 {
        self.guard.allocated().get_bytes()
    }
}
