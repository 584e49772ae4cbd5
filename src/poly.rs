//! Sparse multivariate polynomials over finite fields.
//!
//! Terms are stored in a [MultivariatePolynomial](polynomial::MultivariatePolynomial) sorted from the
//! largest to the smallest monomial, with the exponents packed into machine words
//! (see [packed]). Multiplication, division and square roots are computed with a heap
//! of monomials, so that the terms of the result are generated in order.
pub mod division;
pub mod heap;
pub mod monomial;
pub mod mul;
pub mod packed;
pub mod polynomial;
pub mod sqrt;

use std::cmp::Ordering;
use std::fmt::{Display, Error, Formatter};

use smartstring::{LazyCompact, SmartString};

use self::packed::ExponentLayout;

/// The number of exponents that can be stored on the stack.
pub const INLINED_EXPONENTS: usize = 6;

/// A monomial order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MonomialOrder {
    /// Lexicographic order, where the first variable is the most significant.
    Lex,
    /// Total degree first, ties broken lexicographically.
    DegLex,
    /// Total degree first, ties broken by the reverse lexicographic order: the monomial
    /// with the smaller exponent in the last variable that differs is larger.
    DegRevLex,
}

impl MonomialOrder {
    /// Returns `true` if the total degree is compared first.
    #[inline]
    pub fn is_graded(&self) -> bool {
        !matches!(self, MonomialOrder::Lex)
    }

    /// Compare two unpacked exponent vectors.
    pub fn cmp(&self, a: &[u64], b: &[u64]) -> Ordering {
        if self.is_graded() {
            let da: u64 = a.iter().sum();
            let db: u64 = b.iter().sum();
            if da != db {
                return da.cmp(&db);
            }
        }

        match self {
            MonomialOrder::Lex | MonomialOrder::DegLex => a.cmp(b),
            MonomialOrder::DegRevLex => {
                for (x, y) in a.iter().zip(b).rev() {
                    if x != y {
                        return y.cmp(x);
                    }
                }
                Ordering::Equal
            }
        }
    }
}

impl Display for MonomialOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            MonomialOrder::Lex => f.write_str("lex"),
            MonomialOrder::DegLex => f.write_str("deglex"),
            MonomialOrder::DegRevLex => f.write_str("degrevlex"),
        }
    }
}

/// The variables and the monomial order of a polynomial. Polynomials can
/// only be combined when they share a context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MonomialContext {
    variables: Vec<SmartString<LazyCompact>>,
    order: MonomialOrder,
}

impl MonomialContext {
    pub fn new<S: AsRef<str>>(variables: &[S], order: MonomialOrder) -> MonomialContext {
        MonomialContext {
            variables: variables.iter().map(|v| v.as_ref().into()).collect(),
            order,
        }
    }

    #[inline]
    pub fn nvars(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn variables(&self) -> &[SmartString<LazyCompact>] {
        &self.variables
    }

    #[inline]
    pub fn order(&self) -> MonomialOrder {
        self.order
    }

    /// Get the packing of exponents with `bits` bits per field.
    pub fn layout(&self, bits: u32) -> ExponentLayout {
        ExponentLayout::new(self.nvars(), self.order, bits)
    }
}
