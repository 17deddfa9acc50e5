//! The alt-set algebra: a bitmask encoding which branches of which
//! nondeterministic choices produced a value, and the conflict predicate
//! used to reject inconsistent combinations.
//!
//! Grounded on `original_source/rt_types.h`'s `alt_set_t` (a machine word
//! of 2-bit fields) and `AS_SIZE`/`AS_MASK`/`ALT_SET_IDS`.

/// A bitmask of 2-bit fields; field `i` occupies bits `2*i, 2*i+1` and
/// encodes `{absent, branch 0, branch 1, both}`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Hash)]
pub struct AltSet(u64);

impl AltSet {
    pub const EMPTY: AltSet = AltSet(0);

    /// Number of 2-bit fields a `u64` holds (`AS_SIZE` in the original).
    pub const FIELD_COUNT: u32 = (u64::BITS) / 2;

    /// Every low bit of each 2-bit field set (`AS_MASK` in the original);
    /// used to test "both branches of a field are set".
    const LOW_MASK: u64 = 0x5555_5555_5555_5555;

    /// The single-field mask for picking branch `0` or `1` of field
    /// `id`.
    pub fn branch(id: u32, branch: u8) -> AltSet {
        debug_assert!(branch < 2);
        AltSet(1u64 << (2 * id + u32::from(branch)))
    }

    /// `true` iff `a` and `b` disagree on some shared field: both have
    /// the field set, but not identically.
    ///
    /// Per-field, a field is "set" iff either of its two bits is 1; two
    /// fields conflict iff both are set and differ. `field_is_set`
    /// collapses each 2-bit field down to its low bit so the three
    /// per-field masks (`a` set, `b` set, `a` and `b` differ) can be
    /// ANDed together in one pass.
    pub fn conflict(a: AltSet, b: AltSet) -> bool {
        fn field_is_set(x: u64) -> u64 {
            (x | (x >> 1)) & AltSet::LOW_MASK
        }
        let a_set = field_is_set(a.0);
        let b_set = field_is_set(b.0);
        let differs = field_is_set(a.0 ^ b.0);
        (a_set & b_set & differs) != 0
    }

    /// Union, to be called only after [`Self::conflict`] has been ruled
    /// out for the pair.
    pub fn union(a: AltSet, b: AltSet) -> AltSet {
        AltSet(a.0 | b.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Process-wide counter handing out fresh alt-set field ids
/// (`new_alt_id` in the original). Ids wrap after the configured `limit`
/// (at most [`AltSet::FIELD_COUNT`], the physical width of the bitmask)
/// is exhausted; per spec.md's "Alt-set width" design note, exhaustion
/// must be a recoverable failure, not a panic, so callers observe it via
/// [`AltIdAllocator::try_alloc`] returning `None` rather than silently
/// wrapping into an in-use field. Callers (`reduce_alt_op`, `funcall`'s
/// multi-branch return expansion) surface that `None` as an ordinary
/// `Response::Fail`, not a fatal error — spec.md §7 classifies alt-set
/// exhaustion among the local, recoverable conditions alongside
/// `AltConflict`/`DivisionByZero`, not among `Incomplete`/`Leak`.
#[derive(Debug)]
pub struct AltIdAllocator {
    next: u32,
    limit: u32,
}

impl Default for AltIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl AltIdAllocator {
    pub fn new() -> Self {
        Self::with_limit(AltSet::FIELD_COUNT)
    }

    /// Builds an allocator whose `try_alloc` refuses once `limit` ids
    /// are in use, clamped to [`AltSet::FIELD_COUNT`] since the bitmask
    /// physically cannot hold more fields regardless of what a
    /// [`crate::config::EngineConfig::max_alt_ids`] override asks for.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            next: 0,
            limit: limit.min(AltSet::FIELD_COUNT),
        }
    }

    /// The ceiling this allocator refuses to cross.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Reserves `k` consecutive fresh field ids, returning the base id,
    /// or `None` if doing so would exceed `self.limit`.
    pub fn try_alloc(&mut self, k: u32) -> Option<u32> {
        if self.next.checked_add(k)? > self.limit {
            return None;
        }
        let base = self.next;
        self.next += k;
        Some(base)
    }

    /// `true` once `try_alloc` can no longer satisfy even a single-field
    /// request.
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.limit
    }

    /// Resets the counter. Safe to call once every live alt-set using
    /// the previous ids has been fully reduced away (spec.md: "ids wrap
    /// after exhausting the mask, at which point new expressions starve
    /// and must be reduced to completion first") — not called
    /// automatically by the engine, since nothing here tracks whether an
    /// already-installed value's `alt_set` still references an old id,
    /// and resetting out from under one would let two unrelated choices
    /// collide on the same field. Exposed for embedders/tests that reuse
    /// one `Engine` across independent `eval` calls with no values
    /// surviving between them.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreeing_branches_do_not_conflict() {
        let a = AltSet::branch(0, 0);
        let b = AltSet::branch(0, 0);
        assert!(!AltSet::conflict(a, b));
        assert_eq!(AltSet::union(a, b), a);
    }

    #[test]
    fn disagreeing_branches_conflict() {
        let a = AltSet::branch(0, 0);
        let b = AltSet::branch(0, 1);
        assert!(AltSet::conflict(a, b));
    }

    #[test]
    fn disjoint_fields_never_conflict() {
        let a = AltSet::branch(0, 0);
        let b = AltSet::branch(1, 1);
        assert!(!AltSet::conflict(a, b));
        let u = AltSet::union(a, b);
        assert!(!u.is_empty());
    }

    #[test]
    fn allocator_exhausts_gracefully() {
        let mut alloc = AltIdAllocator::new();
        assert_eq!(alloc.try_alloc(AltSet::FIELD_COUNT), Some(0));
        assert!(alloc.is_exhausted());
        assert_eq!(alloc.try_alloc(1), None);
        alloc.reset();
        assert!(!alloc.is_exhausted());
        assert_eq!(alloc.try_alloc(1), Some(0));
    }

    #[test]
    fn with_limit_clamps_to_field_count() {
        let mut alloc = AltIdAllocator::with_limit(AltSet::FIELD_COUNT * 4);
        assert_eq!(alloc.limit(), AltSet::FIELD_COUNT);
        assert_eq!(alloc.try_alloc(AltSet::FIELD_COUNT), Some(0));
        assert!(alloc.is_exhausted());
    }

    #[test]
    fn a_configured_limit_below_field_count_exhausts_early() {
        let mut alloc = AltIdAllocator::with_limit(2);
        assert_eq!(alloc.try_alloc(1), Some(0));
        assert_eq!(alloc.try_alloc(1), Some(1));
        assert!(alloc.is_exhausted());
        assert_eq!(alloc.try_alloc(1), None);
    }
}
