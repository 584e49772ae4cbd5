use std::ops::{Mul, MulAssign};

use smallvec::smallvec;
use tracing::{instrument, trace};

use crate::domains::Ring;

use super::heap::{MonomialHeap, RowState};
use super::packed::{self, ExponentLayout, Mask};
use super::polynomial::MultivariatePolynomial;

impl<F: Ring> MultivariatePolynomial<F> {
    /// The number of bits per field that is sufficient to store the product of `self` and `rhs`.
    fn product_bits(&self, rhs: &Self) -> u32 {
        let max = self
            .max_fields()
            .iter()
            .zip(&rhs.max_fields())
            .map(|(a, b)| a + b)
            .max()
            .unwrap_or(0);

        ExponentLayout::bits_for(max)
            .max(self.bits())
            .max(rhs.bits())
    }

    /// Multiplication for multivariate polynomials using the heap method of Johnson,
    /// as described in "Sparse polynomial division using a heap" by Monagan, Pearce (2011).
    ///
    /// The terms of the shorter polynomial form the rows of a grid of products `(i, j)`. The heap holds at most one product
    /// of every row, so that it never has more entries than the shorter polynomial has terms.
    /// A product is only inserted once all larger products that could precede it have been
    /// taken out of the heap, which generates the terms of the result in order.
    #[instrument(level = "trace", skip_all, fields(a = self.nterms(), b = rhs.nterms()))]
    pub fn heap_mul(&self, rhs: &Self) -> Self {
        self.check_context(rhs);

        if self.is_zero() || rhs.is_zero() {
            return self.zero();
        }

        // place the smallest polynomial first, as this is faster
        // in the heap algorithm
        if self.nterms() > rhs.nterms() {
            return rhs.heap_mul(self);
        }

        // the output fields are wide enough to hold the sum of the largest fields,
        // so that no product can overflow
        let bits = self.product_bits(rhs);
        let a = self.repacked(bits);
        let b = rhs.repacked(bits);

        let field = &self.field;
        let layout = a.layout().clone();
        let (len_a, len_b) = (a.nterms(), b.nterms());

        let mut res = a.zero_with_layout(layout.clone(), len_b);
        let mut heap = MonomialHeap::new(&layout, len_a);
        let mut rows = vec![RowState::default(); len_a];
        let mut store = Vec::with_capacity(len_a);
        let mut exp: Mask = smallvec![0; layout.words()];

        packed::add(
            heap.candidate(),
            a.packed_exponents(0),
            b.packed_exponents(0),
        );
        rows[0].schedule(0);
        heap.insert(0, 0);

        while !heap.is_empty() {
            packed::set(&mut exp, heap.top());

            store.clear();
            while !heap.is_empty() && packed::equal(heap.top(), &exp) {
                heap.pop(&mut store);
            }

            let mut coefficient = field.zero();
            for &(i, j) in &store {
                rows[i].pop();
                field.add_mul_assign(&mut coefficient, &a.coefficients[i], &b.coefficients[j]);
            }

            for &(i, j) in &store {
                // the next row starts with this column once it is idle
                if i + 1 < len_a && rows[i + 1].awaits(j) {
                    rows[i + 1].schedule(j);
                    packed::add(
                        heap.candidate(),
                        a.packed_exponents(i + 1),
                        b.packed_exponents(j),
                    );
                    heap.insert(i + 1, j);
                }

                // advance the row if the previous row is ahead
                if j + 1 < len_b && rows[i].popped() && (i == 0 || rows[i - 1].processed(j + 1))
                {
                    rows[i].schedule(j + 1);
                    packed::add(
                        heap.candidate(),
                        a.packed_exponents(i),
                        b.packed_exponents(j + 1),
                    );
                    heap.insert(i, j + 1);
                }
            }

            if !field.is_zero(&coefficient) {
                res.push_packed(coefficient, &exp);
            }
        }

        trace!(
            "Product of {} and {} terms has {} terms at {} bits",
            len_a,
            len_b,
            res.nterms(),
            layout.bits()
        );

        res
    }

    /// Compute `self^e` by repeated squaring.
    pub fn pow(&self, mut e: usize) -> Self {
        if e == 0 {
            return self.one();
        }

        let mut x = self.clone();
        let mut y = self.one();
        while e != 1 {
            if e % 2 == 1 {
                y = y.heap_mul(&x);
            }

            x = x.heap_mul(&x);
            e /= 2;
        }

        x.heap_mul(&y)
    }
}

impl<'a, 'b, F: Ring> Mul<&'a MultivariatePolynomial<F>> for &'b MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    #[inline]
    fn mul(self, rhs: &'a MultivariatePolynomial<F>) -> Self::Output {
        self.heap_mul(rhs)
    }
}

impl<'a, F: Ring> Mul<&'a MultivariatePolynomial<F>> for MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    #[inline]
    fn mul(self, rhs: &'a MultivariatePolynomial<F>) -> Self::Output {
        self.heap_mul(rhs)
    }
}

impl<F: Ring> Mul for MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    #[inline]
    fn mul(self, rhs: MultivariatePolynomial<F>) -> Self::Output {
        self.heap_mul(&rhs)
    }
}

impl<'a, F: Ring> MulAssign<&'a MultivariatePolynomial<F>> for MultivariatePolynomial<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: &'a MultivariatePolynomial<F>) {
        *self = self.heap_mul(rhs);
    }
}
