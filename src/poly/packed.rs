//! Exponent vectors packed into machine words.
//!
//! A monomial in `n` variables is stored as `N` words of 64 bits, each holding
//! `64 / bits` fields. Graded orders use an extra field for the total degree.
//! The fields are laid out such that comparing the words from first to last,
//! after an xor with the compare mask, realises the monomial order.
//!
//! The top bit of every field is kept clear, so that the result of adding or subtracting
//! vectors with ordinary word arithmetic can be checked for overflow or borrows afterwards.

use std::cmp::Ordering;

use smallvec::{smallvec, SmallVec};

use super::{MonomialOrder, INLINED_EXPONENTS};

/// The smallest number of bits per field.
pub const MIN_BITS: u32 = 8;
/// The largest number of bits per field.
pub const MAX_BITS: u32 = 64;

/// Words that are kept on the stack.
pub type Mask = SmallVec<[u64; 4]>;

/// The packing of exponent vectors for a number of variables, a monomial order and a
/// number of bits per field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExponentLayout {
    bits: u32,
    words: usize,
    nvars: usize,
    nfields: usize,
    fields_per_word: usize,
    order: MonomialOrder,
    cmpmask: Mask,
    overflow_mask: Mask,
    low_mask: Mask,
}

impl ExponentLayout {
    pub fn new(nvars: usize, order: MonomialOrder, bits: u32) -> ExponentLayout {
        let bits = Self::fix_bits(bits);
        let fields_per_word = (64 / bits) as usize;
        let nfields = nvars + order.is_graded() as usize;
        let words = ((nfields + fields_per_word - 1) / fields_per_word).max(1);

        let field_mask = Self::field_mask_for(bits);

        let mut layout = ExponentLayout {
            bits,
            words,
            nvars,
            nfields,
            fields_per_word,
            order,
            cmpmask: smallvec![0; words],
            overflow_mask: smallvec![0; words],
            low_mask: smallvec![0; words],
        };

        for f in 0..nfields {
            let (w, s) = layout.position(f);
            layout.overflow_mask[w] |= 1 << (s + bits as usize - 1);
            layout.low_mask[w] |= 1 << s;

            if order == MonomialOrder::DegRevLex && f < nvars {
                layout.cmpmask[w] |= field_mask << s;
            }
        }

        layout
    }

    /// Round the number of bits per field up to the widest field that
    /// still allows the same number of fields per word.
    pub fn fix_bits(bits: u32) -> u32 {
        let bits = bits.clamp(MIN_BITS, MAX_BITS);
        64 / (64 / bits)
    }

    /// The number of bits needed to store `max` in a field, including the guard bit.
    ///
    /// Panics if the value does not fit in `63` bits.
    pub fn bits_for(max: u64) -> u32 {
        if max >> 63 != 0 {
            panic!("Exponent overflow: {} does not fit in 63 bits", max);
        }

        Self::fix_bits(64 - max.leading_zeros() + 1)
    }

    #[inline(always)]
    fn field_mask_for(bits: u32) -> u64 {
        if bits == 64 {
            u64::MAX
        } else {
            (1 << bits) - 1
        }
    }

    /// The word and the shift of field `f`. Field 0 is stored in the last word.
    #[inline(always)]
    fn position(&self, f: usize) -> (usize, usize) {
        (
            self.words - 1 - f / self.fields_per_word,
            (f % self.fields_per_word) * self.bits as usize,
        )
    }

    /// The field that stores the exponent of `var`.
    #[inline(always)]
    fn var_field(&self, var: usize) -> usize {
        match self.order {
            MonomialOrder::Lex | MonomialOrder::DegLex => self.nvars - 1 - var,
            MonomialOrder::DegRevLex => var,
        }
    }

    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The number of words per exponent vector.
    #[inline]
    pub fn words(&self) -> usize {
        self.words
    }

    #[inline]
    pub fn nvars(&self) -> usize {
        self.nvars
    }

    #[inline]
    pub fn nfields(&self) -> usize {
        self.nfields
    }

    #[inline]
    pub fn order(&self) -> MonomialOrder {
        self.order
    }

    #[inline]
    pub fn cmpmask(&self) -> &[u64] {
        &self.cmpmask
    }

    /// The top bit of every field.
    #[inline]
    pub fn overflow_mask(&self) -> &[u64] {
        &self.overflow_mask
    }

    /// The lowest bit of every field.
    #[inline]
    pub fn low_mask(&self) -> &[u64] {
        &self.low_mask
    }

    /// The largest value a field can hold.
    #[inline]
    pub fn max_field_value(&self) -> u64 {
        (1 << (self.bits - 1)) - 1
    }

    #[inline]
    pub fn get_field(&self, packed: &[u64], f: usize) -> u64 {
        let (w, s) = self.position(f);
        (packed[w] >> s) & Self::field_mask_for(self.bits)
    }

    #[inline]
    fn set_field(&self, packed: &mut [u64], f: usize, value: u64) {
        debug_assert!(value <= self.max_field_value());
        let (w, s) = self.position(f);
        packed[w] |= value << s;
    }

    /// Pack the exponents of all variables into `out`.
    pub fn pack(&self, exponents: &[u64], out: &mut [u64]) {
        debug_assert_eq!(exponents.len(), self.nvars);

        out.fill(0);
        for (v, e) in exponents.iter().enumerate() {
            self.set_field(out, self.var_field(v), *e);
        }

        if self.order.is_graded() {
            self.set_field(out, self.nvars, exponents.iter().sum());
        }
    }

    pub fn unpack(&self, packed: &[u64], out: &mut [u64]) {
        for (v, e) in out.iter_mut().enumerate() {
            *e = self.get_field(packed, self.var_field(v));
        }
    }

    /// Get the exponent of a single variable.
    #[inline]
    pub fn exponent(&self, packed: &[u64], var: usize) -> u64 {
        self.get_field(packed, self.var_field(var))
    }

    /// Pack a list of raw field values, for example obtained from [Self::unpack_fields].
    pub fn pack_fields(&self, fields: &[u64], out: &mut [u64]) {
        out.fill(0);
        for (f, v) in fields.iter().enumerate() {
            self.set_field(out, f, *v);
        }
    }

    pub fn unpack_fields(&self, packed: &[u64], out: &mut [u64]) {
        for (f, v) in out.iter_mut().enumerate() {
            *v = self.get_field(packed, f);
        }
    }

    /// Compute the maximum of every field over a list of packed exponent vectors.
    pub fn max_fields(&self, exponents: &[u64]) -> SmallVec<[u64; INLINED_EXPONENTS]> {
        let mut max: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nfields];
        let mut fields: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nfields];

        for e in exponents.chunks(self.words) {
            self.unpack_fields(e, &mut fields);
            for (m, f) in max.iter_mut().zip(&fields) {
                *m = (*m).max(*f);
            }
        }

        max
    }

    /// Repack a list of exponent vectors into the layout `to`, which must
    /// describe the same variables and order.
    pub fn repack(&self, exponents: &[u64], to: &ExponentLayout) -> Vec<u64> {
        debug_assert!(self.nvars == to.nvars && self.order == to.order);

        if self == to {
            return exponents.to_vec();
        }

        let nterms = exponents.len() / self.words;
        let mut res = vec![0; nterms * to.words];
        let mut fields: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nfields];

        for (e, r) in exponents.chunks(self.words).zip(res.chunks_mut(to.words)) {
            self.unpack_fields(e, &mut fields);
            to.pack_fields(&fields, r);
        }

        res
    }
}

#[inline]
pub fn set(out: &mut [u64], a: &[u64]) {
    out.copy_from_slice(a);
}

#[inline]
pub fn add(out: &mut [u64], a: &[u64], b: &[u64]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x.wrapping_add(*y);
    }
}

#[inline]
pub fn sub(out: &mut [u64], a: &[u64], b: &[u64]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x.wrapping_sub(*y);
    }
}

/// Compute `a - c * b`.
#[inline]
pub fn msub(out: &mut [u64], a: &[u64], c: u64, b: &[u64]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x.wrapping_sub(c.wrapping_mul(*y));
    }
}

/// Divide every field by two. Returns `false` if any field is odd.
#[inline]
pub fn halve(out: &mut [u64], a: &[u64], low_mask: &[u64]) -> bool {
    if a.iter().zip(low_mask).any(|(x, m)| x & m != 0) {
        return false;
    }

    for (o, x) in out.iter_mut().zip(a) {
        *o = x >> 1;
    }
    true
}

#[inline]
pub fn equal(a: &[u64], b: &[u64]) -> bool {
    a == b
}

#[inline]
pub fn cmp(a: &[u64], b: &[u64], cmpmask: &[u64]) -> Ordering {
    for ((x, y), m) in a.iter().zip(b).zip(cmpmask) {
        if x != y {
            return (x ^ m).cmp(&(y ^ m));
        }
    }

    Ordering::Equal
}

#[inline]
pub fn gt(a: &[u64], b: &[u64], cmpmask: &[u64]) -> bool {
    cmp(a, b, cmpmask) == Ordering::Greater
}

#[inline]
pub fn lt(a: &[u64], b: &[u64], cmpmask: &[u64]) -> bool {
    cmp(a, b, cmpmask) == Ordering::Less
}

/// Compute `a - b` into `out` and return `true` if no field went below zero.
#[inline]
pub fn divides(out: &mut [u64], a: &[u64], b: &[u64], overflow_mask: &[u64]) -> bool {
    sub(out, a, b);
    !overflows(out, overflow_mask)
}

/// Returns `true` if any field has its guard bit set.
#[inline]
pub fn overflows(a: &[u64], overflow_mask: &[u64]) -> bool {
    a.iter().zip(overflow_mask).any(|(x, m)| x & m != 0)
}

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng};

    use super::{add, cmp, divides, halve, msub, overflows, ExponentLayout};
    use crate::poly::MonomialOrder;

    const ORDERS: [MonomialOrder; 3] = [
        MonomialOrder::Lex,
        MonomialOrder::DegLex,
        MonomialOrder::DegRevLex,
    ];

    #[test]
    fn fixed_bits() {
        assert_eq!(ExponentLayout::fix_bits(1), 8);
        assert_eq!(ExponentLayout::fix_bits(9), 9);
        assert_eq!(ExponentLayout::fix_bits(11), 12);
        assert_eq!(ExponentLayout::fix_bits(17), 21);
        assert_eq!(ExponentLayout::fix_bits(33), 64);
        assert_eq!(ExponentLayout::bits_for(127), 8);
        assert_eq!(ExponentLayout::bits_for(128), 9);
        assert_eq!(ExponentLayout::bits_for((1 << 63) - 1), 64);
    }

    #[test]
    #[should_panic]
    fn too_large() {
        ExponentLayout::bits_for(1 << 63);
    }

    #[test]
    fn sizes() {
        let l = ExponentLayout::new(3, MonomialOrder::Lex, 8);
        assert_eq!(l.words(), 1);
        let l = ExponentLayout::new(8, MonomialOrder::DegLex, 8);
        assert_eq!(l.words(), 2);
        let l = ExponentLayout::new(3, MonomialOrder::DegRevLex, 64);
        assert_eq!(l.words(), 4);
        let l = ExponentLayout::new(0, MonomialOrder::Lex, 8);
        assert_eq!(l.words(), 1);
    }

    #[test]
    fn pack_and_compare() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);

        for order in ORDERS {
            for bits in [8, 12, 21, 64] {
                let layout = ExponentLayout::new(4, order, bits);
                let n = layout.words();

                for _ in 0..200 {
                    let a: Vec<u64> = (0..4).map(|_| rng.gen_range(0..8)).collect();
                    let b: Vec<u64> = (0..4).map(|_| rng.gen_range(0..8)).collect();

                    let mut pa = vec![0; n];
                    let mut pb = vec![0; n];
                    layout.pack(&a, &mut pa);
                    layout.pack(&b, &mut pb);

                    let mut ua = vec![0; 4];
                    layout.unpack(&pa, &mut ua);
                    assert_eq!(ua, a);

                    assert_eq!(cmp(&pa, &pb, layout.cmpmask()), order.cmp(&a, &b));

                    // the packed sum is the sum of the exponents
                    let mut s = vec![0; n];
                    add(&mut s, &pa, &pb);
                    let mut us = vec![0; 4];
                    layout.unpack(&s, &mut us);
                    let expected: Vec<_> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
                    assert_eq!(us, expected);

                    let mut q = vec![0; n];
                    let fits = a.iter().zip(&b).all(|(x, y)| x >= y);
                    assert_eq!(divides(&mut q, &pa, &pb, layout.overflow_mask()), fits);
                }
            }
        }
    }

    #[test]
    fn overflow_detection() {
        let layout = ExponentLayout::new(2, MonomialOrder::Lex, 8);
        let mut a = vec![0];
        layout.pack(&[100, 5], &mut a);

        let mut s = vec![0];
        add(&mut s, &a, &a);
        assert!(overflows(&s, layout.overflow_mask()));

        let mut b = vec![0];
        layout.pack(&[20, 5], &mut b);
        add(&mut s, &b, &b);
        assert!(!overflows(&s, layout.overflow_mask()));
    }

    #[test]
    fn halving_and_msub() {
        let layout = ExponentLayout::new(3, MonomialOrder::DegRevLex, 8);
        let mut a = vec![0];
        layout.pack(&[4, 2, 6], &mut a);

        let mut h = vec![0];
        assert!(halve(&mut h, &a, layout.low_mask()));
        let mut u = vec![0; 3];
        layout.unpack(&h, &mut u);
        assert_eq!(u, [2, 1, 3]);
        assert_eq!(layout.get_field(&h, 3), 6);

        assert!(!halve(&mut a.clone(), &h, layout.low_mask()));

        let mut unit = vec![0];
        layout.pack(&[0, 0, 1], &mut unit);
        let mut r = vec![0];
        msub(&mut r, &a, 6, &unit);
        layout.unpack(&r, &mut u);
        assert_eq!(u, [4, 2, 0]);
        assert_eq!(layout.get_field(&r, 3), 6);
    }

    #[test]
    fn repacking() {
        let small = ExponentLayout::new(5, MonomialOrder::DegLex, 8);
        let large = ExponentLayout::new(5, MonomialOrder::DegLex, 32);

        let mut p = vec![0; small.words()];
        small.pack(&[1, 2, 3, 4, 5], &mut p);
        let r = small.repack(&p, &large);
        assert_eq!(r.len(), large.words());

        let mut u = vec![0; 5];
        large.unpack(&r, &mut u);
        assert_eq!(u, [1, 2, 3, 4, 5]);
        assert_eq!(small.max_fields(&p).as_slice(), &[5, 4, 3, 2, 1, 15]);
    }
}
