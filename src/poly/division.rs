use std::ops::Div;

use smallvec::smallvec;
use tracing::{debug, instrument, trace};

use crate::domains::Field;

use super::heap::{MonomialHeap, RowState};
use super::packed::{self, ExponentLayout, Mask, MAX_BITS};
use super::polynomial::MultivariatePolynomial;

/// What to do with a term that is not divisible by the leading monomial of the divisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RemainderMode {
    /// Stop, as the division is not exact.
    Abort,
    Discard,
    Keep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DivisionFailure {
    NotExact,
    /// A monomial does not fit in the exponent fields.
    Overflow,
}

impl<F: Field> MultivariatePolynomial<F> {
    /// Divide `self` by `div` if the division is exact, otherwise return `None`.
    ///
    /// Panics when `div` is zero.
    #[instrument(level = "trace", skip_all, fields(a = self.nterms(), b = div.nterms()))]
    pub fn divides(&self, div: &Self) -> Option<Self> {
        if div.is_zero() {
            panic!("Cannot divide by 0 polynomial");
        }

        self.check_context(div);

        if self.is_zero() {
            return Some(self.clone());
        }

        if div.is_one() {
            return Some(self.clone());
        }

        let bits = self.bits().max(div.bits());
        let a = self.repacked(bits);
        let b = div.repacked(bits);

        // every field of the divisor, including the total degree, must fit in the dividend
        if a
            .max_fields()
            .iter()
            .zip(&b.max_fields())
            .any(|(x, y)| x < y)
        {
            return None;
        }

        match a.heap_division(&b, RemainderMode::Abort) {
            Ok((q, _)) => Some(q),
            Err(e) => {
                trace!("Division is not exact: {:?}", e);
                None
            }
        }
    }

    /// Divide `self` by `div`, returning the quotient and the remainder.
    /// No term of the remainder is divisible by the leading monomial of `div`.
    ///
    /// Panics when `div` is zero.
    #[instrument(level = "trace", skip_all, fields(a = self.nterms(), b = div.nterms()))]
    pub fn quot_rem(&self, div: &Self) -> (Self, Self) {
        if div.is_zero() {
            panic!("Cannot divide by 0 polynomial");
        }

        self.check_context(div);

        if self.is_zero() {
            return (self.clone(), self.clone());
        }

        self.division_with_retry(div, RemainderMode::Keep)
    }

    /// Compute the quotient of the division of `self` by `div`.
    ///
    /// Panics when `div` is zero.
    pub fn quot(&self, div: &Self) -> Self {
        if div.is_zero() {
            panic!("Cannot divide by 0 polynomial");
        }

        self.check_context(div);

        if self.is_zero() {
            return self.clone();
        }

        self.division_with_retry(div, RemainderMode::Discard).0
    }

    /// Compute the remainder `self % div`.
    pub fn rem(&self, div: &Self) -> Self {
        self.quot_rem(div).1
    }

    /// Divide with a growing number of bits per field until no monomial overflows.
    fn division_with_retry(&self, div: &Self, mode: RemainderMode) -> (Self, Self) {
        let mut bits = self.bits().max(div.bits());

        loop {
            let a = self.repacked(bits);
            let b = div.repacked(bits);

            match a.heap_division(&b, mode) {
                Ok(r) => return r,
                Err(_) => {
                    if bits >= MAX_BITS {
                        panic!("Exponent overflow: the quotient does not fit in 63 bits");
                    }

                    bits = ExponentLayout::fix_bits(bits * 2);
                    debug!("Exponent overflow in division: retrying with {} bits", bits);
                }
            }
        }
    }

    /// Heap division for multivariate polynomials that share the same packing.
    /// Reference: "Sparse polynomial division using a heap" by Monagan, Pearce (2011).
    ///
    /// The quotient `q` plays the role of the second factor in a heap multiplication with
    /// the divisor, but it grows while the heap is consumed. Row `0` of the heap walks through the dividend,
    /// row `i > 0` holds the products of the `i`th term of the divisor with the terms of `q`.
    fn heap_division(
        &self,
        div: &Self,
        mode: RemainderMode,
    ) -> Result<(Self, Self), DivisionFailure> {
        let field = &self.field;
        let layout = self.layout().clone();
        let mask = layout.overflow_mask();
        let (len_a, len_b) = (self.nterms(), div.nterms());

        let mut q = self.zero_with_layout(layout.clone(), len_a);
        let mut r = self.zero_with_layout(
            layout.clone(),
            if mode == RemainderMode::Keep { len_a } else { 0 },
        );

        let mut heap = MonomialHeap::new(&layout, len_b);
        let mut rows = vec![RowState::default(); len_b];
        let mut store = Vec::with_capacity(len_b);
        let mut exp: Mask = smallvec![0; layout.words()];
        let mut qexp: Mask = smallvec![0; layout.words()];
        let mut texp: Mask = smallvec![0; layout.words()];

        packed::set(heap.candidate(), self.packed_exponents(0));
        heap.insert(0, 0);

        let lc_minus_inv = field.neg(&field.inv(&div.coefficients[0]));

        // the number of rows that wait for the next quotient term
        let mut s = len_b;

        while !heap.is_empty() {
            packed::set(&mut exp, heap.top());

            if packed::overflows(&exp, mask) {
                return Err(DivisionFailure::Overflow);
            }

            store.clear();
            while !heap.is_empty() && packed::equal(heap.top(), &exp) {
                heap.pop(&mut store);
            }

            // accumulate the products minus the dividend
            let mut acc = field.zero();
            for &(i, j) in &store {
                if i == 0 {
                    field.sub_assign(&mut acc, &self.coefficients[j]);
                } else {
                    rows[i].pop();
                    field.add_mul_assign(&mut acc, &div.coefficients[i], &q.coefficients[j]);
                }
            }

            for &(i, j) in &store {
                if i == 0 {
                    if j + 1 < len_a {
                        packed::set(heap.candidate(), self.packed_exponents(j + 1));
                        heap.insert(0, j + 1);
                    }
                    continue;
                }

                if i + 1 < len_b && rows[i + 1].awaits(j) {
                    rows[i + 1].schedule(j);
                    packed::add(
                        heap.candidate(),
                        div.packed_exponents(i + 1),
                        q.packed_exponents(j),
                    );
                    heap.insert(i + 1, j);
                }

                if j + 1 == q.nterms() {
                    s += 1;
                } else if rows[i].popped() && (i == 1 || rows[i - 1].processed(j + 1)) {
                    rows[i].schedule(j + 1);
                    packed::add(
                        heap.candidate(),
                        div.packed_exponents(i),
                        q.packed_exponents(j + 1),
                    );
                    heap.insert(i, j + 1);
                }
            }

            if field.is_zero(&acc) {
                continue;
            }

            if !packed::divides(&mut qexp, &exp, div.packed_exponents(0), mask) {
                match mode {
                    RemainderMode::Abort => return Err(DivisionFailure::NotExact),
                    RemainderMode::Discard => {}
                    RemainderMode::Keep => r.push_packed(field.neg(&acc), &exp),
                }
                continue;
            }

            if mode == RemainderMode::Abort {
                // every quotient term times the last term of the divisor
                // must be at least the last term of the dividend
                packed::add(&mut texp, &qexp, div.packed_exponents(len_b - 1));
                if packed::lt(
                    &texp,
                    self.packed_exponents(len_a - 1),
                    layout.cmpmask(),
                ) {
                    return Err(DivisionFailure::NotExact);
                }
            }

            q.push_packed(field.mul(&acc, &lc_minus_inv), &qexp);

            if s > 1 {
                let j = q.nterms() - 1;
                rows[1].schedule(j);
                packed::add(
                    heap.candidate(),
                    div.packed_exponents(1),
                    q.packed_exponents(j),
                );
                heap.insert(1, j);
            }
            s = 1;
        }

        trace!(
            "Division of {} by {} terms: {} quotient and {} remainder terms",
            len_a,
            len_b,
            q.nterms(),
            r.nterms()
        );

        Ok((q, r))
    }
}

impl<'a, 'b, F: Field> Div<&'a MultivariatePolynomial<F>> for &'b MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    fn div(self, other: &'a MultivariatePolynomial<F>) -> Self::Output {
        self.quot(other)
    }
}

impl<'a, F: Field> Div<&'a MultivariatePolynomial<F>> for MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    fn div(self, other: &'a MultivariatePolynomial<F>) -> Self::Output {
        self.quot(other)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rand::{Rng, SeedableRng};

    use crate::domains::finite_field::{FiniteFieldCore, Zp64};
    use crate::domains::Ring;
    use crate::poly::polynomial::MultivariatePolynomial;
    use crate::poly::{MonomialContext, MonomialOrder};

    fn random_poly(
        field: &Zp64,
        ctx: &Arc<MonomialContext>,
        terms: usize,
        max_exp: u64,
        rng: &mut impl Rng,
    ) -> MultivariatePolynomial<Zp64> {
        let mut p = MultivariatePolynomial::new(field, None, ctx.clone());
        for _ in 0..terms {
            let e: Vec<u64> = (0..ctx.nvars()).map(|_| rng.gen_range(0..=max_exp)).collect();
            p.append_monomial(field.sample(rng), &e);
        }
        p
    }

    #[test]
    fn exact_division() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let field = Zp64::new(65521);

        for order in [
            MonomialOrder::Lex,
            MonomialOrder::DegLex,
            MonomialOrder::DegRevLex,
        ] {
            let ctx = Arc::new(MonomialContext::new(&["x", "y", "z"], order));
            for _ in 0..20 {
                let a = random_poly(&field, &ctx, 12, 5, &mut rng);
                let b = random_poly(&field, &ctx, 8, 5, &mut rng);
                if b.is_zero() {
                    continue;
                }

                let c = &a * &b;
                let q = c.divides(&b).unwrap();
                assert_eq!(q, a);
                assert!(q.is_canonical());

                let (q, r) = c.quot_rem(&b);
                assert_eq!(q, a);
                assert!(r.is_zero());
            }
        }
    }

    #[test]
    fn inexact_division() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(6);
        let field = Zp64::new(65521);
        let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::DegRevLex));

        for _ in 0..20 {
            let a = random_poly(&field, &ctx, 10, 4, &mut rng);
            let b = random_poly(&field, &ctx, 5, 3, &mut rng);
            if b.is_zero() {
                continue;
            }

            let c = &(&a * &b) + &a.one();

            let (q, r) = c.quot_rem(&b);
            assert_eq!(&(&q * &b) + &r, c);
            assert!(r.is_canonical());

            let lead = b.exponents(0);
            for t in &r {
                let e = t.exponents();
                assert!(e.iter().zip(&lead).any(|(x, y)| x < y));
            }

            match c.divides(&b) {
                Some(q) => assert_eq!(&q * &b, c),
                None => assert!(!r.is_zero()),
            }

            assert_eq!(c.quot(&b), q);
            assert_eq!(&c / &b, q);
            assert_eq!(c.rem(&b), r);
        }
    }

    #[test]
    fn divide_with_overflow() {
        let field = Zp64::new(17);
        let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::Lex));
        let a = MultivariatePolynomial::from_terms(&field, ctx.clone(), [(field.one(), [100u64, 0])]);
        let b = MultivariatePolynomial::from_terms(
            &field,
            ctx,
            [
                (field.one(), [1u64, 0]),
                (field.to_element(16), [0, 100]),
            ],
        );
        assert_eq!(a.bits(), 8);
        assert_eq!(b.bits(), 8);

        let (q, r) = a.quot_rem(&b);
        assert_eq!(q.nterms(), 100);
        assert_eq!(r, r.monomial(field.one(), &[0, 10000]));
        assert_eq!(&(&q * &b) + &r, a);
        assert_eq!(a.divides(&b), None);
    }

    #[test]
    #[should_panic(expected = "Cannot divide by 0 polynomial")]
    fn divide_by_zero() {
        let field = Zp64::new(17);
        let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
        let a = MultivariatePolynomial::from_terms(&field, ctx, [(field.one(), [1u64])]);
        a.divides(&a.zero());
    }

    #[test]
    #[should_panic(expected = "Cannot divide by 0 polynomial")]
    fn divrem_by_zero() {
        let field = Zp64::new(17);
        let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
        let a = MultivariatePolynomial::new(&field, None, ctx);
        a.quot_rem(&a.zero());
    }
}
