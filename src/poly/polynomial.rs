use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::Display;
use std::ops::{Add, Neg, Sub};
use std::sync::Arc;

use ahash::HashMap;
use smallvec::{smallvec, SmallVec};

use crate::domains::Ring;

use super::monomial::MonomialView;
use super::packed::{self, ExponentLayout, Mask, MIN_BITS};
use super::{MonomialContext, INLINED_EXPONENTS};

/// Multivariate polynomial with a sparse representation and packed exponents.
#[derive(Clone)]
pub struct MultivariatePolynomial<F: Ring> {
    // Data format: the i-th monomial is stored as coefficients[i] and
    // exponents[i * N .. (i + 1) * N], where N is the number of words per exponent vector.
    // Terms are sorted from the largest to the smallest monomial and no coefficient is zero.
    pub coefficients: Vec<F::Element>,
    pub exponents: Vec<u64>,
    pub field: F,
    layout: ExponentLayout,
    context: Arc<MonomialContext>,
}

impl<F: Ring> MultivariatePolynomial<F> {
    /// Constructs a zero polynomial. Instead of using this constructor,
    /// prefer to create new polynomials from existing ones, so that the
    /// context and field are inherited.
    #[inline]
    pub fn new(field: &F, cap: Option<usize>, context: Arc<MonomialContext>) -> Self {
        let layout = context.layout(MIN_BITS);
        Self {
            coefficients: Vec::with_capacity(cap.unwrap_or(0)),
            exponents: Vec::with_capacity(cap.unwrap_or(0) * layout.words()),
            field: field.clone(),
            layout,
            context,
        }
    }

    /// Constructs a polynomial from a list of coefficients and unpacked exponents, in any order.
    pub fn from_terms<I, E>(field: &F, context: Arc<MonomialContext>, terms: I) -> Self
    where
        I: IntoIterator<Item = (F::Element, E)>,
        E: AsRef<[u64]>,
    {
        let mut res = Self::new(field, None, context);
        for (c, e) in terms {
            res.append_monomial(c, e.as_ref());
        }
        res
    }

    /// Constructs a zero polynomial with the packing `layout`, inheriting the field and context from `self`.
    pub(crate) fn zero_with_layout(&self, layout: ExponentLayout, cap: usize) -> Self {
        Self {
            coefficients: Vec::with_capacity(cap),
            exponents: Vec::with_capacity(cap * layout.words()),
            field: self.field.clone(),
            layout,
            context: self.context.clone(),
        }
    }

    /// Constructs a zero polynomial, inheriting the field and context from `self`.
    #[inline]
    pub fn zero(&self) -> Self {
        self.zero_with_capacity(0)
    }

    /// Constructs a zero polynomial with the given capacity,
    /// inheriting the field and context from `self`.
    #[inline]
    pub fn zero_with_capacity(&self, cap: usize) -> Self {
        self.zero_with_layout(self.layout.clone(), cap)
    }

    /// Constructs a constant polynomial,
    /// inheriting the field and context from `self`.
    #[inline]
    pub fn constant(&self, coeff: F::Element) -> Self {
        let mut res = self.zero_with_capacity(1);
        if !self.field.is_zero(&coeff) {
            res.coefficients.push(coeff);
            res.exponents.resize(res.words(), 0);
        }
        res
    }

    /// Constructs a polynomial that is one, inheriting the field and context from `self`.
    #[inline]
    pub fn one(&self) -> Self {
        self.constant(self.field.one())
    }

    /// Constructs a polynomial with a single term.
    pub fn monomial(&self, coeff: F::Element, exponents: &[u64]) -> Self {
        let mut res = self.zero_with_capacity(1);
        res.append_monomial(coeff, exponents);
        res
    }

    /// Get the ith monomial.
    #[inline]
    pub fn to_monomial_view(&self, i: usize) -> MonomialView<'_, F> {
        MonomialView::new(
            &self.coefficients[i],
            self.packed_exponents(i),
            &self.layout,
        )
    }

    #[inline]
    pub fn reserve(&mut self, cap: usize) -> &mut Self {
        self.coefficients.reserve(cap);
        self.exponents.reserve(cap * self.words());
        self
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.nterms() == 0
    }

    #[inline]
    pub fn is_one(&self) -> bool {
        self.nterms() == 1
            && self.field.is_one(&self.coefficients[0])
            && self.exponents.iter().all(|x| *x == 0)
    }

    /// Returns the number of terms in the polynomial.
    #[inline]
    pub fn nterms(&self) -> usize {
        self.coefficients.len()
    }

    /// Returns the number of variables in the polynomial.
    #[inline]
    pub fn nvars(&self) -> usize {
        self.context.nvars()
    }

    /// Returns true if the polynomial is constant.
    #[inline]
    pub fn is_constant(&self) -> bool {
        match self.nterms() {
            0 => true,
            1 => self.exponents.iter().all(|e| *e == 0),
            _ => false,
        }
    }

    /// The number of words per exponent vector.
    #[inline]
    pub fn words(&self) -> usize {
        self.layout.words()
    }

    /// The number of bits per exponent field.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.layout.bits()
    }

    #[inline]
    pub fn layout(&self) -> &ExponentLayout {
        &self.layout
    }

    #[inline]
    pub fn context(&self) -> &Arc<MonomialContext> {
        &self.context
    }

    /// Get the leading coefficient. Returns zero for the zero polynomial.
    pub fn lcoeff(&self) -> F::Element {
        self.coefficients
            .first()
            .cloned()
            .unwrap_or_else(|| self.field.zero())
    }

    /// Get the packed exponents of the `index`th term.
    #[inline]
    pub fn packed_exponents(&self, index: usize) -> &[u64] {
        let n = self.words();
        &self.exponents[index * n..(index + 1) * n]
    }

    /// Get the unpacked exponents of the `index`th term.
    pub fn exponents(&self, index: usize) -> SmallVec<[u64; INLINED_EXPONENTS]> {
        let mut e = smallvec![0; self.nvars()];
        self.layout.unpack(self.packed_exponents(index), &mut e);
        e
    }

    /// Get the largest exponent of every variable.
    pub fn max_exponents(&self) -> SmallVec<[u64; INLINED_EXPONENTS]> {
        let mut max: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nvars()];
        for t in self {
            for (v, m) in max.iter_mut().enumerate() {
                *m = (*m).max(t.exponent(v));
            }
        }
        max
    }

    /// Get the degree of the variable `x`.
    pub fn degree(&self, x: usize) -> u64 {
        self.into_iter().map(|t| t.exponent(x)).max().unwrap_or(0)
    }

    /// Get the largest value of every field of the packed exponents.
    #[inline]
    pub(crate) fn max_fields(&self) -> SmallVec<[u64; INLINED_EXPONENTS]> {
        self.layout.max_fields(&self.exponents)
    }

    /// Append a term with packed exponents in the layout of the polynomial.
    /// The term must be smaller than all terms in the polynomial.
    #[inline]
    pub(crate) fn push_packed(&mut self, coefficient: F::Element, packed: &[u64]) {
        self.coefficients.push(coefficient);
        self.exponents.extend_from_slice(packed);
    }

    /// The number of bits needed to store the exponents.
    fn required_bits(&self, exponents: &[u64]) -> u32 {
        let mut max = exponents.iter().copied().max().unwrap_or(0);
        if self.layout.order().is_graded() {
            let deg = exponents
                .iter()
                .try_fold(0u64, |acc, e| acc.checked_add(*e))
                .unwrap_or_else(|| panic!("Exponent overflow: total degree does not fit in 64 bits"));
            max = max.max(deg);
        }

        ExponentLayout::bits_for(max)
    }

    /// Appends a monomial to the polynomial, merging it with an existing
    /// term with the same exponents.
    pub fn append_monomial(&mut self, coefficient: F::Element, exponents: &[u64]) {
        if self.field.is_zero(&coefficient) {
            return;
        }
        if self.nvars() != exponents.len() {
            panic!(
                "nvars mismatched: got {}, expected {}",
                exponents.len(),
                self.nvars()
            );
        }

        let bits = self.required_bits(exponents);
        if bits > self.bits() {
            self.fit_bits(bits);
        }

        let n = self.words();
        let mut p: Mask = smallvec![0; n];
        self.layout.pack(exponents, &mut p);
        let cmpmask = self.layout.cmpmask();

        // should we append to the back?
        if self.nterms() == 0
            || packed::gt(self.packed_exponents(self.nterms() - 1), &p, cmpmask)
        {
            self.push_packed(coefficient, &p);
            return;
        }

        // Binary search to find the insert-point.
        let mut l = 0;
        let mut r = self.nterms();
        while l < r {
            let m = (l + r) / 2;

            match packed::cmp(&p, self.packed_exponents(m), cmpmask) {
                Ordering::Equal => {
                    // Add the two coefficients.
                    self.field
                        .add_assign(&mut self.coefficients[m], &coefficient);
                    if self.field.is_zero(&self.coefficients[m]) {
                        // The coefficient becomes zero. Remove this monomial.
                        self.coefficients.remove(m);
                        self.exponents.drain(m * n..(m + 1) * n);
                    }
                    return;
                }
                Ordering::Greater => r = m,
                Ordering::Less => l = m + 1,
            }
        }

        self.coefficients.insert(l, coefficient);
        self.exponents.splice(l * n..l * n, p);
    }

    /// Widen the exponent fields to at least `bits` bits.
    pub fn fit_bits(&mut self, bits: u32) {
        let bits = ExponentLayout::fix_bits(bits);
        if bits <= self.bits() {
            return;
        }

        let layout = self.context.layout(bits);
        self.exponents = self.layout.repack(&self.exponents, &layout);
        self.layout = layout;
    }

    /// Get the polynomial with at least `bits` bits per exponent field.
    pub fn repacked(&self, bits: u32) -> Cow<'_, Self> {
        if ExponentLayout::fix_bits(bits) <= self.bits() {
            Cow::Borrowed(self)
        } else {
            let mut r = self.clone();
            r.fit_bits(bits);
            Cow::Owned(r)
        }
    }

    /// Panics when the polynomials do not share the same variables and monomial order.
    pub(crate) fn check_context(&self, other: &Self) {
        if !Arc::ptr_eq(&self.context, &other.context) && self.context != other.context {
            panic!("Polynomials have incompatible variable maps or monomial orders");
        }
    }

    /// Returns `true` if the terms are sorted in strictly decreasing order, all coefficients
    /// are non-zero and all exponents fit in their fields.
    pub fn is_canonical(&self) -> bool {
        if self.exponents.len() != self.nterms() * self.words() {
            return false;
        }

        if self.coefficients.iter().any(|c| self.field.is_zero(c)) {
            return false;
        }

        if packed::overflows(&self.exponents, &self.overflow_mask_repeated()) {
            return false;
        }

        (1..self.nterms()).all(|t| {
            packed::gt(
                self.packed_exponents(t - 1),
                self.packed_exponents(t),
                self.layout.cmpmask(),
            )
        })
    }

    fn overflow_mask_repeated(&self) -> Vec<u64> {
        self.layout
            .overflow_mask()
            .iter()
            .copied()
            .cycle()
            .take(self.exponents.len())
            .collect()
    }

    /// Check if the polynomial is sorted and has only non-zero coefficients.
    pub fn check_consistency(&self) {
        assert_eq!(self.exponents.len(), self.nterms() * self.words());

        for c in &self.coefficients {
            if self.field.is_zero(c) {
                panic!("Inconsistent polynomial (0 coefficient): {}", self);
            }
        }

        if packed::overflows(&self.exponents, &self.overflow_mask_repeated()) {
            panic!("Inconsistent polynomial (exponent overflow): {:?}", self);
        }

        for t in 1..self.nterms() {
            match packed::cmp(
                self.packed_exponents(t - 1),
                self.packed_exponents(t),
                self.layout.cmpmask(),
            ) {
                Ordering::Equal => panic!("Inconsistent polynomial (equal monomials): {}", self),
                Ordering::Less => panic!(
                    "Inconsistent polynomial (wrong monomial ordering): {}",
                    self
                ),
                Ordering::Greater => {}
            }
        }
    }

    /// Multiply every coefficient with `other`.
    pub fn mul_coeff(mut self, other: F::Element) -> Self {
        if self.field.is_zero(&other) {
            return self.zero();
        }

        for c in &mut self.coefficients {
            self.field.mul_assign(c, &other);
        }

        // zero divisors may remove terms
        if self.coefficients.iter().any(|c| self.field.is_zero(c)) {
            let mut res = self.zero_with_capacity(self.nterms());
            for t in &self {
                if !self.field.is_zero(t.coefficient) {
                    res.push_packed(t.coefficient.clone(), t.packed);
                }
            }
            return res;
        }

        self
    }

    /// Evaluate the polynomial at the point `point`, with one value per variable.
    pub fn evaluate(&self, point: &[F::Element]) -> F::Element {
        self.evaluate_with(&self.field, |c| c.clone(), point)
    }

    /// Evaluate the polynomial in the ring `ring`, mapping every coefficient with `embed`.
    pub fn evaluate_with<R: Ring>(
        &self,
        ring: &R,
        embed: impl Fn(&F::Element) -> R::Element,
        point: &[R::Element],
    ) -> R::Element {
        assert_eq!(point.len(), self.nvars(), "Wrong number of values");

        // cache powers of the variables, as many terms share them
        let mut cache: HashMap<(usize, u64), R::Element> = HashMap::default();
        let mut exp: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nvars()];

        let mut res = ring.zero();
        for t in self {
            t.unpack(&mut exp);

            let mut m = embed(t.coefficient);
            for (v, e) in exp.iter().enumerate() {
                if *e == 0 {
                    continue;
                }

                let p = cache
                    .entry((v, *e))
                    .or_insert_with(|| ring.pow(&point[v], *e));
                ring.mul_assign(&mut m, p);
            }

            ring.add_assign(&mut res, &m);
        }

        res
    }

    /// Replace the variable `n` by the value `v`.
    pub fn replace(&self, n: usize, v: &F::Element) -> Self {
        assert!(n < self.nvars(), "Variable index out of range");

        let words = self.words();
        let mut unit: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nvars()];
        unit[n] = 1;
        let mut unit_packed: Mask = smallvec![0; words];
        self.layout.pack(&unit, &mut unit_packed);

        let mut terms: Vec<(F::Element, Mask)> = Vec::with_capacity(self.nterms());
        for t in self {
            let e = t.exponent(n);
            let c = self.field.mul(t.coefficient, &self.field.pow(v, e));
            if self.field.is_zero(&c) {
                continue;
            }

            let mut p: Mask = smallvec![0; words];
            packed::msub(&mut p, t.packed, e, &unit_packed);
            terms.push((c, p));
        }

        let cmpmask = self.layout.cmpmask();
        terms.sort_by(|a, b| packed::cmp(&b.1, &a.1, cmpmask));

        let mut res = self.zero_with_capacity(terms.len());
        for (c, p) in terms {
            let last = res.nterms();
            if last > 0 && packed::equal(res.packed_exponents(last - 1), &p) {
                self.field.add_assign(&mut res.coefficients[last - 1], &c);
                if self.field.is_zero(&res.coefficients[last - 1]) {
                    res.coefficients.pop();
                    res.exponents.truncate((last - 1) * words);
                }
            } else {
                res.push_packed(c, &p);
            }
        }

        res
    }

    /// Compute `self + other` or `self - other`, merging the sorted term lists.
    fn merge(&self, other: &Self, subtract: bool) -> Self {
        self.check_context(other);

        let bits = self.bits().max(other.bits());
        let a = self.repacked(bits);
        let b = other.repacked(bits);

        let map = |c: &F::Element| {
            if subtract {
                self.field.neg(c)
            } else {
                c.clone()
            }
        };

        let mut res = a.zero_with_capacity(a.nterms() + b.nterms());
        let cmpmask = a.layout.cmpmask();

        let (mut i, mut j) = (0, 0);
        while i < a.nterms() && j < b.nterms() {
            match packed::cmp(a.packed_exponents(i), b.packed_exponents(j), cmpmask) {
                Ordering::Greater => {
                    res.push_packed(a.coefficients[i].clone(), a.packed_exponents(i));
                    i += 1;
                }
                Ordering::Less => {
                    res.push_packed(map(&b.coefficients[j]), b.packed_exponents(j));
                    j += 1;
                }
                Ordering::Equal => {
                    let c = self.field.add(&a.coefficients[i], &map(&b.coefficients[j]));
                    if !self.field.is_zero(&c) {
                        res.push_packed(c, a.packed_exponents(i));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }

        for k in i..a.nterms() {
            res.push_packed(a.coefficients[k].clone(), a.packed_exponents(k));
        }
        for k in j..b.nterms() {
            res.push_packed(map(&b.coefficients[k]), b.packed_exponents(k));
        }

        res
    }
}

impl<F: Ring> std::fmt::Debug for MultivariatePolynomial<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_zero() {
            return write!(f, "[]");
        }
        let mut first = true;
        write!(f, "[ ")?;
        for monomial in self {
            if first {
                first = false;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", monomial)?;
        }
        write!(f, " ]")
    }
}

impl<F: Ring> Display for MultivariatePolynomial<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }

        let mut exp: SmallVec<[u64; INLINED_EXPONENTS]> = smallvec![0; self.nvars()];
        for (i, t) in self.into_iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }

            t.unpack(&mut exp);

            let mut first = true;
            if !self.field.is_one(t.coefficient) || exp.iter().all(|e| *e == 0) {
                write!(f, "{}", self.field.printer(t.coefficient))?;
                first = false;
            }

            for (v, e) in self.context.variables().iter().zip(&exp) {
                if *e == 0 {
                    continue;
                }

                if !first {
                    f.write_str("*")?;
                }
                first = false;

                f.write_str(v)?;
                if *e > 1 {
                    write!(f, "^{}", e)?;
                }
            }
        }

        Ok(())
    }
}

impl<F: Ring> PartialEq for MultivariatePolynomial<F> {
    fn eq(&self, other: &Self) -> bool {
        if self.context != other.context || self.nterms() != other.nterms() {
            return false;
        }

        if self.coefficients != other.coefficients {
            return false;
        }

        match self.bits().cmp(&other.bits()) {
            Ordering::Equal => self.exponents == other.exponents,
            Ordering::Less => self.layout.repack(&self.exponents, &other.layout) == other.exponents,
            Ordering::Greater => other.layout.repack(&other.exponents, &self.layout) == self.exponents,
        }
    }
}

impl<F: Ring> Eq for MultivariatePolynomial<F> {}

impl<F: Ring> Add for MultivariatePolynomial<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        if self.is_zero() {
            self.check_context(&other);
            return other;
        }
        if other.is_zero() {
            self.check_context(&other);
            return self;
        }

        self.merge(&other, false)
    }
}

impl<'a, 'b, F: Ring> Add<&'a MultivariatePolynomial<F>> for &'b MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    fn add(self, other: &'a MultivariatePolynomial<F>) -> Self::Output {
        self.merge(other, false)
    }
}

impl<F: Ring> Sub for MultivariatePolynomial<F> {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self.merge(&other, true)
    }
}

impl<'a, 'b, F: Ring> Sub<&'a MultivariatePolynomial<F>> for &'b MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    fn sub(self, other: &'a MultivariatePolynomial<F>) -> Self::Output {
        self.merge(other, true)
    }
}

impl<F: Ring> Neg for MultivariatePolynomial<F> {
    type Output = Self;

    fn neg(mut self) -> Self::Output {
        for c in &mut self.coefficients {
            *c = self.field.neg(c);
        }
        self
    }
}

impl<'a, F: Ring> Neg for &'a MultivariatePolynomial<F> {
    type Output = MultivariatePolynomial<F>;

    fn neg(self) -> Self::Output {
        self.clone().neg()
    }
}
