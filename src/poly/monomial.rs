use smallvec::{smallvec, SmallVec};

use crate::domains::Ring;

use super::packed::ExponentLayout;
use super::polynomial::MultivariatePolynomial;
use super::INLINED_EXPONENTS;

/// View object for a term in a multivariate polynomial.
pub struct MonomialView<'a, F: 'a + Ring> {
    pub coefficient: &'a F::Element,
    /// The packed exponent vector of the term.
    pub packed: &'a [u64],
    layout: &'a ExponentLayout,
}

impl<'a, F: Ring> Clone for MonomialView<'a, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, F: Ring> Copy for MonomialView<'a, F> {}

impl<'a, F: Ring> std::fmt::Debug for MonomialView<'a, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{{ {:?}, {:?} }}", self.coefficient, self.exponents())
    }
}

impl<'a, F: Ring> MonomialView<'a, F> {
    #[inline]
    pub(crate) fn new(
        coefficient: &'a F::Element,
        packed: &'a [u64],
        layout: &'a ExponentLayout,
    ) -> MonomialView<'a, F> {
        MonomialView {
            coefficient,
            packed,
            layout,
        }
    }

    /// Get the exponent of the variable `var`.
    #[inline]
    pub fn exponent(&self, var: usize) -> u64 {
        self.layout.exponent(self.packed, var)
    }

    /// Unpack the exponents into `out`.
    #[inline]
    pub fn unpack(&self, out: &mut [u64]) {
        self.layout.unpack(self.packed, out);
    }

    pub fn exponents(&self) -> SmallVec<[u64; INLINED_EXPONENTS]> {
        let mut e = smallvec![0; self.layout.nvars()];
        self.unpack(&mut e);
        e
    }

    /// The total degree of the term.
    pub fn total_degree(&self) -> u64 {
        self.exponents().iter().sum()
    }
}

/// Iterator over terms in a multivariate polynomial.
pub struct MonomialViewIterator<'a, F: Ring> {
    poly: &'a MultivariatePolynomial<F>,
    index: usize,
}

impl<'a, F: Ring> Iterator for MonomialViewIterator<'a, F> {
    type Item = MonomialView<'a, F>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index == self.poly.nterms() {
            None
        } else {
            let view = self.poly.to_monomial_view(self.index);
            self.index += 1;
            Some(view)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.poly.nterms() - self.index;
        (n, Some(n))
    }
}

impl<'a, F: Ring> ExactSizeIterator for MonomialViewIterator<'a, F> {}

impl<'a, F: Ring> IntoIterator for &'a MultivariatePolynomial<F> {
    type Item = MonomialView<'a, F>;
    type IntoIter = MonomialViewIterator<'a, F>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            poly: self,
            index: 0,
        }
    }
}
