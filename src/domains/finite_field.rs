//! Finite fields of prime order and the [GaloisField] interface shared by all finite fields.

use rand::{Rng, SeedableRng};
use std::fmt::{Display, Error, Formatter};

use super::algebraic_extension::AlgebraicExtension;
use super::{EuclideanDomain, Field, Ring};

const HENSEL_LIFTING_MASK: [u8; 128] = [
    255, 85, 51, 73, 199, 93, 59, 17, 15, 229, 195, 89, 215, 237, 203, 33, 31, 117, 83, 105, 231,
    125, 91, 49, 47, 5, 227, 121, 247, 13, 235, 65, 63, 149, 115, 137, 7, 157, 123, 81, 79, 37, 3,
    153, 23, 45, 11, 97, 95, 181, 147, 169, 39, 189, 155, 113, 111, 69, 35, 185, 55, 77, 43, 129,
    127, 213, 179, 201, 71, 221, 187, 145, 143, 101, 67, 217, 87, 109, 75, 161, 159, 245, 211, 233,
    103, 253, 219, 177, 175, 133, 99, 249, 119, 141, 107, 193, 191, 21, 243, 9, 135, 29, 251, 209,
    207, 165, 131, 25, 151, 173, 139, 225, 223, 53, 19, 41, 167, 61, 27, 241, 239, 197, 163, 57,
    183, 205, 171, 1,
];

/// A 64-bit prime field.
pub type Zp64 = FiniteField<u64>;
/// The field with two elements.
pub type Z2 = FiniteField<Two>;

/// A number in a finite field.
#[derive(Debug, Copy, Clone, Hash, PartialEq, PartialOrd, Eq)]
pub struct FiniteFieldElement<UField>(pub(crate) UField);

/// A Galois field `GF(p,d)` is a finite field with `q = p^d` elements.
///
/// Besides the order, it provides square roots and a way to move elements into a field
/// with at least a given number of elements. The latter is used to evaluate polynomials at
/// random points with a good probability of detecting non-squares, even when the
/// field itself is tiny.
pub trait GaloisField: Field {
    /// The field in which elements are evaluated when more elements are needed.
    type Extension: GaloisField;

    fn extension_degree(&self) -> u32;

    /// The number of elements `q = p^d` in the field.
    fn order(&self) -> u64 {
        self.size()
    }

    /// Returns `true` iff `a` is a square, using Euler's criterion.
    fn is_square(&self, a: &Self::Element) -> bool {
        if self.characteristic() == 2 || self.is_zero(a) {
            return true;
        }

        self.is_one(&self.pow(a, (self.order() - 1) / 2))
    }

    /// Compute a square root of `a`, if it exists.
    fn sqrt(&self, a: &Self::Element) -> Option<Self::Element> {
        if self.is_zero(a) {
            return Some(self.zero());
        }

        let q = self.order();

        // the Frobenius map is a bijection
        if self.characteristic() == 2 {
            return Some(self.pow(a, q / 2));
        }

        if !self.is_square(a) {
            return None;
        }

        // Tonelli-Shanks with q - 1 = 2^s * t
        let mut s = 0;
        let mut t = q - 1;
        while t % 2 == 0 {
            t /= 2;
            s += 1;
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(q);
        let z = loop {
            let z = self.sample(&mut rng);
            if !self.is_zero(&z) && !self.is_square(&z) {
                break z;
            }
        };

        let mut m = s;
        let mut c = self.pow(&z, t);
        let mut x = self.pow(a, (t + 1) / 2);
        let mut b = self.pow(a, t);

        while !self.is_one(&b) {
            let mut i = 0;
            let mut b2 = b.clone();
            while !self.is_one(&b2) {
                b2 = self.mul(&b2, &b2);
                i += 1;
            }

            let mut e = c;
            for _ in 0..m - i - 1 {
                e = self.mul(&e, &e);
            }

            x = self.mul(&x, &e);
            c = self.mul(&e, &e);
            b = self.mul(&b, &c);
            m = i;
        }

        Some(x)
    }

    /// The `index`th element of the field in a fixed enumeration, for `index < order()`.
    /// The `0`th element is zero.
    fn element(&self, index: u64) -> Self::Element;

    /// Get a field that contains `self` and has at least `min_order` elements, if
    /// such a field can be constructed. Otherwise, a field with fewer elements may be returned.
    fn evaluation_field(&self, min_order: u64) -> Self::Extension;

    /// Map an element into a field obtained from [GaloisField::evaluation_field].
    fn embed(
        &self,
        ext: &Self::Extension,
        a: &Self::Element,
    ) -> <Self::Extension as Ring>::Element;
}

pub trait FiniteFieldCore<UField>: Field {
    fn get_prime(&self) -> UField;
    /// Convert a number to a representative in a prime field.
    fn to_element(&self, a: UField) -> Self::Element;
    /// Convert a number from the finite field to standard form `[0,p)`.
    fn from_element(&self, a: &Self::Element) -> UField;
}

/// A finite field over a prime that uses Montgomery modular arithmetic
/// to increase the performance of the multiplication operator.
///
/// For the prime `2`, use [type@Z2] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiniteField<UField> {
    p: UField,
    m: UField,
    one: FiniteFieldElement<UField>,
}

impl<UField: Display> Display for FiniteField<UField> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, " % {}", self.p)
    }
}

impl Zp64 {
    /// Create a new finite field. `p` must be a prime larger than 2.
    pub fn new(p: u64) -> Zp64 {
        if p == 2 {
            panic!("Prime 2 is not supported: use Z2 instead.");
        }

        if !is_prime_u64(p) {
            panic!("{} is not a prime", p);
        }

        Self::new_unchecked(p)
    }

    fn new_unchecked(p: u64) -> Zp64 {
        FiniteField {
            p,
            m: Self::inv_2_64(p),
            one: FiniteFieldElement(Self::get_one(p)),
        }
    }

    /// Returns the unit element in Montgomory form, ie.e 1 + 2^64 mod a.
    fn get_one(a: u64) -> u64 {
        if a as u128 <= 1u128 << 63 {
            let res = (((1u128 << 63) % a as u128) << 1) as u64;

            if res < a {
                res
            } else {
                res - a
            }
        } else {
            a.wrapping_neg()
        }
    }

    /// Returns -a^-1 mod 2^64.
    fn inv_2_64(a: u64) -> u64 {
        let mut ret: u64 = HENSEL_LIFTING_MASK[((a >> 1) & 127) as usize] as u64;
        ret = ret.wrapping_mul(a.wrapping_mul(ret).wrapping_add(2));
        ret = ret.wrapping_mul(a.wrapping_mul(ret).wrapping_add(2));
        ret = ret.wrapping_mul(a.wrapping_mul(ret).wrapping_add(2));
        ret
    }
}

impl FiniteFieldCore<u64> for Zp64 {
    fn get_prime(&self) -> u64 {
        self.p
    }

    /// Convert a number in a prime field a % n to Montgomory form.
    #[inline(always)]
    fn to_element(&self, a: u64) -> FiniteFieldElement<u64> {
        FiniteFieldElement((((a as u128) << 64) % self.p as u128) as u64)
    }

    /// Convert a number from Montgomory form to standard form.
    #[inline(always)]
    fn from_element(&self, a: &FiniteFieldElement<u64>) -> u64 {
        self.mul(a, &FiniteFieldElement(1)).0
    }
}

impl Ring for Zp64 {
    type Element = FiniteFieldElement<u64>;

    /// Add two numbers in Montgomory form.
    #[inline(always)]
    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        let (r, overflow) = a.0.overflowing_add(b.0);
        if overflow || r >= self.p {
            FiniteFieldElement(r.wrapping_sub(self.p))
        } else {
            FiniteFieldElement(r)
        }
    }

    /// Subtract `b` from `a`, where `a` and `b` are in Montgomory form.
    #[inline(always)]
    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        if a.0 >= b.0 {
            FiniteFieldElement(a.0 - b.0)
        } else {
            FiniteFieldElement(a.0 + (self.p - b.0))
        }
    }

    /// Multiply two numbers in Montgomory form.
    #[inline(always)]
    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        let t = a.0 as u128 * b.0 as u128;
        let m = (t as u64).wrapping_mul(self.m);
        let (t, overflow) = t.overflowing_add(m as u128 * self.p as u128);
        let u = (t >> 64) as u64;

        if overflow {
            FiniteFieldElement(u.wrapping_sub(self.p))
        } else if u >= self.p {
            FiniteFieldElement(u - self.p)
        } else {
            FiniteFieldElement(u)
        }
    }

    #[inline]
    fn add_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.add(a, b);
    }

    #[inline]
    fn sub_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.sub(a, b);
    }

    #[inline]
    fn mul_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.mul(a, b);
    }

    #[inline]
    fn add_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        self.add_assign(a, &self.mul(b, c));
    }

    #[inline]
    fn sub_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        self.sub_assign(a, &self.mul(b, c));
    }

    /// Computes -x mod n.
    #[inline]
    fn neg(&self, a: &Self::Element) -> Self::Element {
        if a.0 == 0 {
            *a
        } else {
            FiniteFieldElement(self.p - a.0)
        }
    }

    #[inline]
    fn zero(&self) -> Self::Element {
        FiniteFieldElement(0)
    }

    /// Return the unit element in Montgomory form.
    #[inline]
    fn one(&self) -> Self::Element {
        self.one
    }

    #[inline]
    fn nth(&self, n: u64) -> Self::Element {
        self.to_element(n % self.p)
    }

    /// Compute b^e % n.
    #[inline]
    fn pow(&self, b: &Self::Element, mut e: u64) -> Self::Element {
        if b.0 == 0 {
            return if e == 0 { self.one() } else { *b };
        }

        if e >= self.p - 1 {
            e %= self.p - 1;
        }

        if e == 0 {
            return self.one();
        }

        let mut x = *b;
        let mut y = self.one();
        while e != 1 {
            if e % 2 == 1 {
                y = self.mul(&y, &x);
            }

            x = self.mul(&x, &x);
            e /= 2;
        }

        self.mul(&x, &y)
    }

    #[inline]
    fn is_zero(&self, a: &Self::Element) -> bool {
        a.0 == 0
    }

    #[inline]
    fn is_one(&self, a: &Self::Element) -> bool {
        a == &self.one
    }

    fn characteristic(&self) -> u64 {
        self.p
    }

    fn size(&self) -> u64 {
        self.p
    }

    fn sample(&self, rng: &mut impl rand::RngCore) -> Self::Element {
        FiniteFieldElement(rng.gen_range(0..self.p))
    }

    fn format(&self, element: &Self::Element, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.from_element(element))
    }
}

impl EuclideanDomain for Zp64 {
    #[inline]
    fn rem(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        FiniteFieldElement(0)
    }

    #[inline]
    fn quot_rem(&self, a: &Self::Element, b: &Self::Element) -> (Self::Element, Self::Element) {
        (self.mul(a, &self.inv(b)), FiniteFieldElement(0))
    }

    #[inline]
    fn gcd(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        self.one()
    }
}

impl Field for Zp64 {
    #[inline]
    fn div(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.mul(a, &self.inv(b))
    }

    #[inline]
    fn div_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.mul(a, &self.inv(b));
    }

    /// Computes x^-1 mod n.
    fn inv(&self, a: &Self::Element) -> Self::Element {
        assert!(a.0 != 0, "0 is not invertible");

        // apply multiplication with 1 twice to get the correct scaling of R=2^64
        // see the paper [Montgomery Arithmetic from a Software Perspective](https://eprint.iacr.org/2017/1057.pdf).
        let x_mont = self
            .mul(&self.mul(a, &FiniteFieldElement(1)), &FiniteFieldElement(1))
            .0;

        // extended Euclidean algorithm: a x + b p = gcd(x, p) = 1 or a x = 1 (mod p)
        let mut u1: u64 = 1;
        let mut u3 = x_mont;
        let mut v1: u64 = 0;
        let mut v3 = self.p;
        let mut even_iter: bool = true;

        while v3 != 0 {
            let q = u3 / v3;
            let t3 = u3 % v3;
            let t1 = u1 + q * v1;
            u1 = v1;
            v1 = t1;
            u3 = v3;
            v3 = t3;
            even_iter = !even_iter;
        }

        debug_assert!(u3 == 1);
        if even_iter {
            FiniteFieldElement(u1)
        } else {
            FiniteFieldElement(self.p - u1)
        }
    }
}

impl GaloisField for Zp64 {
    type Extension = AlgebraicExtension<Zp64>;

    fn extension_degree(&self) -> u32 {
        1
    }

    fn element(&self, index: u64) -> Self::Element {
        self.to_element(index % self.p)
    }

    fn evaluation_field(&self, min_order: u64) -> AlgebraicExtension<Zp64> {
        let mut degree = 1;
        let mut order = self.p;
        while order < min_order {
            match order.checked_mul(self.p) {
                Some(o) => order = o,
                None => break,
            }
            degree += 1;
        }

        AlgebraicExtension::new(*self, degree)
    }

    fn embed(&self, ext: &AlgebraicExtension<Zp64>, a: &Self::Element) -> <AlgebraicExtension<Zp64> as Ring>::Element {
        ext.constant(*a)
    }
}

/// The prime `2`, which selects the binary field [type@Z2].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Two(pub(crate) u8);

impl Display for Two {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.0)
    }
}

impl Z2 {
    /// Create the field with two elements.
    pub fn new() -> Z2 {
        FiniteField {
            p: Two(2),
            m: Two(2),
            one: FiniteFieldElement(Two(1)),
        }
    }
}

impl Default for Z2 {
    fn default() -> Self {
        Self::new()
    }
}

impl FiniteFieldCore<Two> for Z2 {
    fn get_prime(&self) -> Two {
        Two(2)
    }

    fn to_element(&self, a: Two) -> Self::Element {
        a.0 % 2
    }

    fn from_element(&self, a: &Self::Element) -> Two {
        Two(*a)
    }
}

impl Ring for Z2 {
    type Element = u8;

    #[inline(always)]
    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a ^ b
    }

    #[inline(always)]
    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a ^ b
    }

    #[inline(always)]
    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a & b
    }

    #[inline]
    fn add_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a ^= b;
    }

    #[inline]
    fn sub_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a ^= b;
    }

    #[inline]
    fn mul_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a &= b;
    }

    fn add_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a ^= b & c;
    }

    fn sub_mul_assign(&self, a: &mut Self::Element, b: &Self::Element, c: &Self::Element) {
        *a ^= b & c;
    }

    #[inline]
    fn neg(&self, a: &Self::Element) -> Self::Element {
        *a
    }

    #[inline]
    fn zero(&self) -> Self::Element {
        0
    }

    #[inline]
    fn one(&self) -> Self::Element {
        1
    }

    #[inline]
    fn nth(&self, n: u64) -> Self::Element {
        (n % 2) as u8
    }

    #[inline]
    fn pow(&self, b: &Self::Element, e: u64) -> Self::Element {
        if e == 0 {
            1
        } else {
            *b
        }
    }

    #[inline]
    fn is_zero(&self, a: &Self::Element) -> bool {
        *a == 0
    }

    #[inline]
    fn is_one(&self, a: &Self::Element) -> bool {
        *a == 1
    }

    fn characteristic(&self) -> u64 {
        2
    }

    fn size(&self) -> u64 {
        2
    }

    fn sample(&self, rng: &mut impl rand::RngCore) -> Self::Element {
        rng.gen_range(0..2)
    }

    fn format(&self, element: &Self::Element, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", element)
    }
}

impl EuclideanDomain for Z2 {
    #[inline]
    fn rem(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        0
    }

    #[inline]
    fn quot_rem(&self, a: &Self::Element, b: &Self::Element) -> (Self::Element, Self::Element) {
        (self.mul(a, &self.inv(b)), 0)
    }

    #[inline]
    fn gcd(&self, _: &Self::Element, _: &Self::Element) -> Self::Element {
        1
    }
}

impl Field for Z2 {
    #[inline]
    fn div(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.mul(a, &self.inv(b))
    }

    #[inline]
    fn div_assign(&self, a: &mut Self::Element, b: &Self::Element) {
        *a = self.mul(a, &self.inv(b));
    }

    fn inv(&self, a: &Self::Element) -> Self::Element {
        assert!(*a != 0, "0 is not invertible");
        1
    }
}

impl GaloisField for Z2 {
    type Extension = AlgebraicExtension<Z2>;

    fn extension_degree(&self) -> u32 {
        1
    }

    fn element(&self, index: u64) -> u8 {
        (index % 2) as u8
    }

    fn evaluation_field(&self, min_order: u64) -> AlgebraicExtension<Z2> {
        let mut degree = 1;
        while degree < 63 && (1u64 << degree) < min_order {
            degree += 1;
        }

        AlgebraicExtension::new(*self, degree)
    }

    fn embed(&self, ext: &AlgebraicExtension<Z2>, a: &u8) -> <AlgebraicExtension<Z2> as Ring>::Element {
        ext.constant(*a)
    }
}

/// Do a deterministic Miller test to check if `n` is a prime.
/// Since `n` is a `u64`, a basis of only 7 witnesses has to be tested.
///
/// Based on [Wojciech Izykowski's implementation](https://github.com/wizykowski/miller-rabin).
pub fn is_prime_u64(n: u64) -> bool {
    // shortest SPRP basis from Jim Sinclair for testing primality of u64
    let witnesses: [u64; 7] = [2, 325, 9375, 28178, 450775, 9780504, 1795265022];

    if n < 2 {
        return false;
    }

    if n % 2 == 0 {
        return n == 2;
    }

    if n < 9 {
        return true;
    }

    let mut s = 0;
    let mut d = n - 1;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    let f = Zp64::new_unchecked(n);
    let neg_one = FiniteFieldElement(n.wrapping_sub(f.one().0));

    'test: for a in witnesses {
        let a = f.to_element(a);

        if a.0 == 0 {
            continue;
        }

        let mut x = f.one();
        let mut b = a;
        let mut e = d;
        while e != 0 {
            if e & 1 != 0 {
                x = f.mul(&x, &b);
            }
            b = f.mul(&b, &b);
            e /= 2;
        }

        if x == f.one() || x == neg_one {
            continue;
        }

        for _ in 0..s {
            x = f.mul(&x, &x);

            if x == f.one() {
                return false;
            }
            if x == neg_one {
                continue 'test;
            }
        }

        return false;
    }

    true
}

#[cfg(test)]
mod test {
    use super::{is_prime_u64, FiniteFieldCore, GaloisField, Z2, Zp64};
    use crate::domains::{Field, Ring};

    #[test]
    fn pow() {
        let field = Zp64::new(31);

        let mut q = field.one();
        let x = field.to_element(3);
        for i in 0..100 {
            let r = field.pow(&x, i);
            assert_eq!(r, q);
            q = field.mul(&q, &x);
        }
    }

    #[test]
    fn arithmetic_matches_naive() {
        let p = 1000003;
        let field = Zp64::new(p);
        for (a, b) in [(0, 5), (17, 999999), (1000002, 1000002), (123456, 654321)] {
            let (x, y) = (field.to_element(a), field.to_element(b));
            assert_eq!(field.from_element(&field.add(&x, &y)), (a + b) % p);
            assert_eq!(field.from_element(&field.sub(&x, &y)), (a + p - b) % p);
            assert_eq!(field.from_element(&field.mul(&x, &y)), a * b % p);
            assert_eq!(field.from_element(&field.neg(&x)), (p - a) % p);
        }
    }

    #[test]
    fn inverse() {
        let field = Zp64::new(18446744073709551557);
        for a in [1, 2, 3, 1 << 40, 18446744073709551556] {
            let x = field.to_element(a);
            assert!(field.is_one(&field.mul(&x, &field.inv(&x))));
        }
    }

    #[test]
    fn square_roots() {
        let field = Zp64::new(41);
        let mut squares = 0;
        for a in 1..41 {
            let x = field.to_element(a);
            match field.sqrt(&x) {
                Some(r) => {
                    assert_eq!(field.mul(&r, &r), x);
                    squares += 1;
                }
                None => assert!(!field.is_square(&x)),
            }
        }
        assert_eq!(squares, 20);

        // p = 1 mod 2^4 exercises the Tonelli-Shanks loop
        let field = Zp64::new(97);
        for a in 1..97 {
            let x = field.to_element(a);
            let sq = field.mul(&x, &x);
            let r = field.sqrt(&sq).unwrap();
            assert_eq!(field.mul(&r, &r), sq);
        }
    }

    #[test]
    fn binary_field() {
        let field = Z2::new();
        assert_eq!(field.add(&1, &1), 0);
        assert_eq!(field.mul(&1, &1), 1);
        assert_eq!(field.neg(&1), 1);
        assert_eq!(field.sqrt(&1), Some(1));
        assert!(field.is_square(&1));
    }

    #[test]
    fn primes() {
        let primes: Vec<_> = (0..50).filter(|n| is_prime_u64(*n)).collect();
        assert_eq!(
            primes,
            [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]
        );
        assert!(is_prime_u64(18446744073709551557));
        assert!(!is_prime_u64(18446744073709551559));
    }

    #[test]
    #[should_panic(expected = "4 is not a prime")]
    fn even_modulus() {
        Zp64::new(4);
    }

    #[test]
    #[should_panic(expected = "use Z2 instead")]
    fn binary_prime() {
        Zp64::new(2);
    }

    #[test]
    fn element_enumeration() {
        let field = Zp64::new(7);
        let elements: Vec<_> = (0..7).map(|i| field.element(i)).collect();
        assert!(field.is_zero(&elements[0]));
        for (i, a) in elements.iter().enumerate() {
            assert_eq!(field.from_element(a), i as u64);
        }

        let z2 = Z2::new();
        assert_eq!((z2.element(0), z2.element(1)), (0, 1));
    }

    #[test]
    fn evaluation_field_size() {
        let field = Zp64::new(5);
        let ext = field.evaluation_field(1000);
        assert_eq!(ext.order(), 3125);
        assert_eq!(field.evaluation_field(3).order(), 5);
    }
}
