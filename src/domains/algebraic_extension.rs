//! Galois fields `GF(q^d)` as algebraic extensions of a finite field with `q` elements.

use smallvec::SmallVec;
use std::fmt::{Display, Error, Formatter};

use super::finite_field::GaloisField;
use super::{EuclideanDomain, Field, Ring};

/// An element of an [AlgebraicExtension], stored as the dense list of
/// coefficients of a polynomial in the generator `a` of degree less than `d`,
/// from the constant term upwards.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AlgebraicNumber<F: Ring> {
    pub(crate) coeffs: SmallVec<[F::Element; 4]>,
}

impl<F: Ring> AlgebraicNumber<F> {
    /// The coefficients of the element as a polynomial in the generator.
    pub fn coefficients(&self) -> &[F::Element] {
        &self.coeffs
    }
}

/// The field `GF(q^d) = GF(q)[a]/m(a)`, where `m` is the first monic irreducible
/// polynomial of degree `d` over the base field `GF(q)` in the order of [GaloisField::element].
///
/// The base field may itself be an extension.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AlgebraicExtension<F: Ring> {
    field: F,
    modulus: Vec<F::Element>,
    order: u64,
}

impl<F: GaloisField> AlgebraicExtension<F> {
    /// Construct the extension of degree `degree` of the finite field `field`.
    ///
    /// Panics if the field would have more than `2^64-1` elements.
    pub fn new(field: F, degree: u32) -> Self {
        assert!(degree > 0, "The extension degree must be positive");

        let q = field.order();
        let order = q
            .checked_pow(degree)
            .unwrap_or_else(|| panic!("GF({}^{}) has too many elements", q, degree));

        let modulus = if degree == 1 {
            vec![field.zero(), field.one()]
        } else {
            Self::find_irreducible(&field, degree as usize)
        };

        AlgebraicExtension {
            field,
            modulus,
            order,
        }
    }

    /// Enumerate the monic polynomials of degree `d` with nonzero constant
    /// term and return the first irreducible one.
    fn find_irreducible(field: &F, d: usize) -> Vec<F::Element> {
        let q = field.order();
        let mut candidate = vec![field.zero(); d + 1];
        candidate[d] = field.one();

        for k in 1.. {
            let mut n: u64 = k;
            for c in &mut candidate[..d] {
                *c = field.element(n % q);
                n /= q;
            }

            if !field.is_zero(&candidate[0]) && is_irreducible(field, &candidate) {
                return candidate;
            }
        }

        unreachable!("Every degree has an irreducible polynomial")
    }

    pub fn base_field(&self) -> &F {
        &self.field
    }

    /// The defining polynomial, from the constant term upwards.
    pub fn modulus(&self) -> &[F::Element] {
        &self.modulus
    }

    pub fn degree(&self) -> usize {
        self.modulus.len() - 1
    }

    /// Map an element of the base field into the extension.
    pub fn constant(&self, c: F::Element) -> AlgebraicNumber<F> {
        let mut coeffs: SmallVec<_> = (0..self.degree()).map(|_| self.field.zero()).collect();
        coeffs[0] = c;
        AlgebraicNumber { coeffs }
    }

    /// Create the element `sum_i c_i a^i`, reducing modulo the defining polynomial.
    pub fn to_element(&self, coeffs: &[F::Element]) -> AlgebraicNumber<F> {
        let mut r = coeffs.to_vec();
        reduce(&self.field, &mut r, &self.modulus);
        self.densify(r)
    }

    fn densify(&self, mut r: Vec<F::Element>) -> AlgebraicNumber<F> {
        r.resize(self.degree(), self.field.zero());
        AlgebraicNumber {
            coeffs: SmallVec::from_vec(r),
        }
    }
}

impl<F: GaloisField> Display for AlgebraicExtension<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "GF({}^{})", self.field.order(), self.degree())
    }
}

impl<F: GaloisField> Ring for AlgebraicExtension<F> {
    type Element = AlgebraicNumber<F>;

    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        AlgebraicNumber {
            coeffs: a
                .coeffs
                .iter()
                .zip(&b.coeffs)
                .map(|(x, y)| self.field.add(x, y))
                .collect(),
        }
    }

    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        AlgebraicNumber {
            coeffs: a
                .coeffs
                .iter()
                .zip(&b.coeffs)
                .map(|(x, y)| self.field.sub(x, y))
                .collect(),
        }
    }

    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.densify(mul_mod(&self.field, &a.coeffs, &b.coeffs, &self.modulus))
    }

    fn add_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        for (x, y) in a.coeffs.iter_mut().zip(&b.coeffs) {
            self.field.add_assign(x, y);
        }
    }

    fn sub_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        for (x, y) in a.coeffs.iter_mut().zip(&b.coeffs) {
            self.field.sub_assign(x, y);
        }
    }

    fn mul_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.mul(a, b);
    }

    fn add_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        self.add_assign(a, &self.mul(b, c));
    }

    fn sub_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        self.sub_assign(a, &self.mul(b, c));
    }

    fn neg(&self, a: &Self::Element) -> Self::Element {
        AlgebraicNumber {
            coeffs: a.coeffs.iter().map(|x| self.field.neg(x)).collect(),
        }
    }

    fn zero(&self) -> Self::Element {
        self.constant(self.field.zero())
    }

    fn one(&self) -> Self::Element {
        self.constant(self.field.one())
    }

    fn nth(&self, n: u64) -> Self::Element {
        self.constant(self.field.nth(n))
    }

    fn pow(&self, b: &Self::Element, mut e: u64) -> Self::Element {
        if self.is_zero(b) {
            return if e == 0 { self.one() } else { self.zero() };
        }

        e %= self.order - 1;

        let mut x = b.clone();
        let mut y = self.one();
        while e != 0 {
            if e % 2 == 1 {
                y = self.mul(&y, &x);
            }
            e /= 2;
            if e != 0 {
                x = self.mul(&x, &x);
            }
        }

        y
    }

    fn is_zero(&self, a: &Self::Element) -> bool {
        a.coeffs.iter().all(|c| self.field.is_zero(c))
    }

    fn is_one(&self, a: &Self::Element) -> bool {
        self.field.is_one(&a.coeffs[0]) && a.coeffs[1..].iter().all(|c| self.field.is_zero(c))
    }

    fn characteristic(&self) -> u64 {
        self.field.characteristic()
    }

    fn size(&self) -> u64 {
        self.order
    }

    fn sample(&self, rng: &mut impl rand::RngCore) -> Self::Element {
        AlgebraicNumber {
            coeffs: (0..self.degree()).map(|_| self.field.sample(rng)).collect(),
        }
    }

    fn format(&self, element: &Self::Element, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut first = true;
        for (i, c) in element.coeffs.iter().enumerate().rev() {
            if self.field.is_zero(c) {
                continue;
            }

            if !first {
                f.write_str("+")?;
            }
            first = false;

            match i {
                0 => self.field.format(c, f)?,
                _ => {
                    if !self.field.is_one(c) {
                        let c = self.field.printer(c).to_string();
                        if c.contains('+') {
                            write!(f, "({})*", c)?;
                        } else {
                            write!(f, "{}*", c)?;
                        }
                    }
                    f.write_str("a")?;
                    if i > 1 {
                        write!(f, "^{}", i)?;
                    }
                }
            }
        }

        if first {
            f.write_str("0")?;
        }

        Ok(())
    }
}

impl<F: GaloisField> EuclideanDomain for AlgebraicExtension<F> {
    fn rem(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        self.zero()
    }

    fn quot_rem(&self, a: &Self::Element, b: &Self::Element) -> (Self::Element, Self::Element) {
        (self.div(a, b), self.zero())
    }

    fn gcd(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        self.one()
    }
}

impl<F: GaloisField> Field for AlgebraicExtension<F> {
    fn div(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.mul(a, &self.inv(b))
    }

    fn div_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.div(a, b);
    }

    /// Invert `a` using `a^(q-2) = a^-1`.
    fn inv(&self, a: &Self::Element) -> Self::Element {
        assert!(!self.is_zero(a), "0 is not invertible");
        self.pow(a, self.order - 2)
    }
}

impl<F: GaloisField> GaloisField for AlgebraicExtension<F> {
    type Extension = AlgebraicExtension<Self>;

    fn extension_degree(&self) -> u32 {
        self.degree() as u32 * self.field.extension_degree()
    }

    /// The digits of `index` in base `q` are the coefficients of the element.
    fn element(&self, mut index: u64) -> Self::Element {
        let q = self.field.order();
        let mut coeffs = SmallVec::with_capacity(self.degree());
        for _ in 0..self.degree() {
            coeffs.push(self.field.element(index % q));
            index /= q;
        }
        AlgebraicNumber { coeffs }
    }

    fn evaluation_field(&self, min_order: u64) -> AlgebraicExtension<Self> {
        let mut degree = 1;
        let mut order = self.order;
        while order < min_order {
            match order.checked_mul(self.order) {
                Some(o) => order = o,
                None => break,
            }
            degree += 1;
        }

        AlgebraicExtension::new(self.clone(), degree)
    }

    fn embed(
        &self,
        ext: &AlgebraicExtension<Self>,
        a: &Self::Element,
    ) -> <AlgebraicExtension<Self> as Ring>::Element {
        ext.constant(a.clone())
    }
}

fn trim<F: Ring>(field: &F, a: &mut Vec<F::Element>) {
    while a.last().map(|c| field.is_zero(c)).unwrap_or(false) {
        a.pop();
    }
}

/// Reduce `a` modulo the monic polynomial `modulus`.
fn reduce<F: Ring>(field: &F, a: &mut Vec<F::Element>, modulus: &[F::Element]) {
    let d = modulus.len() - 1;
    while a.len() > d {
        let Some(c) = a.pop() else { break };
        if field.is_zero(&c) {
            continue;
        }

        let shift = a.len() - d;
        for (k, m) in modulus[..d].iter().enumerate() {
            field.sub_mul_assign(&mut a[shift + k], &c, m);
        }
    }
}

fn mul_mod<F: Ring>(
    field: &F,
    a: &[F::Element],
    b: &[F::Element],
    modulus: &[F::Element],
) -> Vec<F::Element> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }

    let mut r = vec![field.zero(); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        if field.is_zero(x) {
            continue;
        }
        for (j, y) in b.iter().enumerate() {
            field.add_mul_assign(&mut r[i + j], x, y);
        }
    }

    reduce(field, &mut r, modulus);
    r
}

fn pow_mod<F: Ring>(
    field: &F,
    b: &[F::Element],
    mut e: u64,
    modulus: &[F::Element],
) -> Vec<F::Element> {
    let mut x = b.to_vec();
    reduce(field, &mut x, modulus);
    let mut y = vec![field.one()];
    while e != 0 {
        if e % 2 == 1 {
            y = mul_mod(field, &y, &x, modulus);
        }
        e /= 2;
        if e != 0 {
            x = mul_mod(field, &x, &x, modulus);
        }
    }
    y
}

fn gcd<F: Field>(field: &F, a: &[F::Element], b: &[F::Element]) -> Vec<F::Element> {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    trim(field, &mut a);
    trim(field, &mut b);

    while let Some(lc) = b.last().cloned() {
        let inv = field.inv(&lc);
        for c in &mut b {
            field.mul_assign(c, &inv);
        }

        reduce(field, &mut a, &b);
        trim(field, &mut a);
        std::mem::swap(&mut a, &mut b);
    }

    a
}

/// Rabin's test: a polynomial `f` of degree `n` over `GF(q)` is irreducible if and only if
/// `x^(q^n) = x mod f` and `gcd(x^(q^(n/r)) - x, f) = 1` for every prime `r | n`.
fn is_irreducible<F: Field>(field: &F, f: &[F::Element]) -> bool {
    let n = f.len() - 1;
    let q = field.size();

    let x = vec![field.zero(), field.one()];
    let x_minus = |mut h: Vec<F::Element>| {
        h.resize(n.max(2), field.zero());
        field.sub_assign(&mut h[1], &field.one());
        h
    };

    let mut frobenius = vec![x.clone()];
    for k in 1..=n {
        let next = pow_mod(field, &frobenius[k - 1], q, f);
        frobenius.push(next);
    }

    let mut top = x_minus(frobenius[n].clone());
    trim(field, &mut top);
    if !top.is_empty() {
        return false;
    }

    let mut m = n;
    let mut r = 2;
    while m > 1 {
        if m % r == 0 {
            while m % r == 0 {
                m /= r;
            }

            let g = gcd(field, &x_minus(frobenius[n / r].clone()), f);
            if g.len() != 1 {
                return false;
            }
        }
        r += 1;
    }

    true
}
