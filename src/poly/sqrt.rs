use rand::RngCore;
use smallvec::smallvec;
use tracing::{debug, instrument, trace};

use crate::domains::finite_field::GaloisField;
use crate::domains::Ring;

use super::heap::MonomialHeap;
use super::packed::{self, Mask};
use super::polynomial::MultivariatePolynomial;

/// Settings for the detection of non-squares during the computation of a square root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SquareRootSettings {
    /// The number of random points at which the input is evaluated in every check.
    pub random_trials: usize,
    /// The minimal number of elements of the field the points are sampled from.
    pub min_evaluation_order: u64,
}

impl Default for SquareRootSettings {
    fn default() -> Self {
        SquareRootSettings {
            random_trials: 3,
            min_evaluation_order: 1 << 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SqrtFailure {
    NotSquare,
    /// A product does not fit in the exponent fields.
    Overflow,
    /// The input evaluates to a non-square at a random point.
    NonResidue,
}

impl<F: GaloisField> MultivariatePolynomial<F> {
    /// Compute the square root of the polynomial, if it is a perfect square.
    /// For odd characteristic, the sign of the result is fixed by the square root of the leading coefficient.
    pub fn sqrt(&self) -> Option<Self> {
        self.sqrt_with_settings(&SquareRootSettings::default(), &mut rand::thread_rng())
    }

    /// Compute the square root of the polynomial, if it is a perfect square, using
    /// the random number generator `rng` to detect non-squares early.
    #[instrument(level = "trace", skip_all, fields(n = self.nterms()))]
    pub fn sqrt_with_settings<R: RngCore>(
        &self,
        settings: &SquareRootSettings,
        rng: &mut R,
    ) -> Option<Self> {
        if self.is_zero() {
            return Some(self.clone());
        }

        let r = if self.field.characteristic() == 2 {
            self.frobenius_sqrt()
        } else {
            self.heap_sqrt(settings, rng)
        };

        match r {
            Ok(q) => Some(q),
            Err(e) => {
                debug!("Polynomial is not a square: {:?}", e);
                None
            }
        }
    }

    /// In characteristic 2, `(a + b)^2 = a^2 + b^2`, so every term is a square on its own.
    fn frobenius_sqrt(&self) -> Result<Self, SqrtFailure> {
        let layout = self.layout();
        let mut q = self.zero_with_layout(layout.clone(), self.nterms());
        let mut exp: Mask = smallvec![0; layout.words()];

        for t in self {
            if !packed::halve(&mut exp, t.packed, layout.low_mask()) {
                return Err(SqrtFailure::NotSquare);
            }

            let c = self
                .field
                .sqrt(t.coefficient)
                .ok_or(SqrtFailure::NotSquare)?;
            q.push_packed(c, &exp);
        }

        Ok(q)
    }

    /// Returns `true` if the polynomial evaluates to a non-square at a random point.
    /// A `false` does not prove that the polynomial is a square.
    fn has_non_square_value<R: RngCore>(&self, settings: &SquareRootSettings, rng: &mut R) -> bool {
        let field = &self.field;
        let ext = field.evaluation_field(settings.min_evaluation_order);

        let mut point = Vec::with_capacity(self.nvars());
        for _ in 0..settings.random_trials {
            point.clear();
            for _ in 0..self.nvars() {
                point.push(ext.sample(rng));
            }

            let v = self.evaluate_with(&ext, |c| field.embed(&ext, c), &point);
            if !ext.is_square(&v) {
                debug!("Found a non-square value over {}", ext);
                return true;
            }
        }

        false
    }

    /// Compute the square root `q` of the polynomial in odd characteristic, by cancelling
    /// the terms of `q^2 - self` from large to small.
    ///
    /// If `q_0` is the leading term of the root, the `k`th term follows from the largest monomial
    /// of `self - sum_{1 <= i, j < k} q_i q_j`, divided by `2 q_0`.
    /// The products `q_i q_j` with `1 <= j <= i` are generated in order with a heap that has
    /// one row per term of `q`, where the off-diagonal products are counted twice.
    fn heap_sqrt<R: RngCore>(
        &self,
        settings: &SquareRootSettings,
        rng: &mut R,
    ) -> Result<Self, SqrtFailure> {
        let field = &self.field;
        let layout = self.layout().clone();
        let mask = layout.overflow_mask();
        let cmpmask = layout.cmpmask();
        let len_a = self.nterms();

        let mut q = self.zero_with_layout(layout.clone(), len_a);
        let mut exp: Mask = smallvec![0; layout.words()];
        let mut qexp: Mask = smallvec![0; layout.words()];
        let mut final_exp: Mask = smallvec![0; layout.words()];

        // the last term of the root squares to the last term of the input
        if !packed::halve(
            &mut final_exp,
            self.packed_exponents(len_a - 1),
            layout.low_mask(),
        ) || !field.is_square(&self.coefficients[len_a - 1])
        {
            return Err(SqrtFailure::NotSquare);
        }

        if !packed::halve(&mut qexp, self.packed_exponents(0), layout.low_mask()) {
            return Err(SqrtFailure::NotSquare);
        }
        let lc = field
            .sqrt(&self.coefficients[0])
            .ok_or(SqrtFailure::NotSquare)?;
        let lc_inv = field.inv(&field.add(&lc, &lc));
        q.push_packed(lc, &qexp);

        let mut heap = MonomialHeap::new(&layout, len_a);
        let mut store = Vec::new();
        let mut next_check = len_a;
        let mut ai = 1;

        while ai < len_a || !heap.is_empty() {
            let mut acc = if ai < len_a
                && (heap.is_empty() || !packed::lt(self.packed_exponents(ai), heap.top(), cmpmask))
            {
                packed::set(&mut exp, self.packed_exponents(ai));
                ai += 1;
                self.coefficients[ai - 1].clone()
            } else {
                packed::set(&mut exp, heap.top());
                field.zero()
            };

            if packed::overflows(&exp, mask) {
                return Err(SqrtFailure::Overflow);
            }

            store.clear();
            while !heap.is_empty() && packed::equal(heap.top(), &exp) {
                heap.pop(&mut store);
            }

            let mut diagonal = field.zero();
            let mut off_diagonal = field.zero();
            for &(i, j) in &store {
                if i == j {
                    field.add_mul_assign(&mut diagonal, &q.coefficients[i], &q.coefficients[j]);
                } else {
                    field.add_mul_assign(&mut off_diagonal, &q.coefficients[i], &q.coefficients[j]);
                }
            }

            for &(i, j) in &store {
                if j < i {
                    packed::add(
                        heap.candidate(),
                        q.packed_exponents(i),
                        q.packed_exponents(j + 1),
                    );
                    heap.insert(i, j + 1);
                }
            }

            field.sub_assign(&mut acc, &diagonal);
            field.sub_assign(&mut acc, &off_diagonal);
            field.sub_assign(&mut acc, &off_diagonal);

            if field.is_zero(&acc) {
                continue;
            }

            // the new term times 2 q_0 must cancel the monomial
            if !packed::divides(&mut qexp, &exp, q.packed_exponents(0), mask)
                || packed::lt(&qexp, &final_exp, cmpmask)
            {
                return Err(SqrtFailure::NotSquare);
            }

            q.push_packed(field.mul(&acc, &lc_inv), &qexp);

            let k = q.nterms() - 1;
            packed::add(
                heap.candidate(),
                q.packed_exponents(k),
                q.packed_exponents(1),
            );
            heap.insert(k, 1);

            if q.nterms() > next_check {
                if self.has_non_square_value(settings, rng) {
                    return Err(SqrtFailure::NonResidue);
                }

                next_check = 2 * q.nterms();
            }
        }

        trace!("Square root of {} terms has {} terms", len_a, q.nterms());

        Ok(q)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rand::{Rng, SeedableRng};

    use super::{SqrtFailure, SquareRootSettings};
    use crate::domains::algebraic_extension::AlgebraicExtension;
    use crate::domains::finite_field::{FiniteFieldCore, GaloisField, Z2, Zp64};
    use crate::domains::Ring;
    use crate::poly::polynomial::MultivariatePolynomial;
    use crate::poly::{MonomialContext, MonomialOrder};

    fn random_poly<F: Ring>(
        field: &F,
        ctx: &Arc<MonomialContext>,
        terms: usize,
        max_exp: u64,
        rng: &mut impl Rng,
    ) -> MultivariatePolynomial<F> {
        let mut p = MultivariatePolynomial::new(field, None, ctx.clone());
        for _ in 0..terms {
            let e: Vec<u64> = (0..ctx.nvars()).map(|_| rng.gen_range(0..=max_exp)).collect();
            p.append_monomial(field.sample(rng), &e);
        }
        p
    }

    #[test]
    fn binary_square() {
        let field = Z2::new();
        let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
        let a = MultivariatePolynomial::from_terms(
            &field,
            ctx,
            [(1, [4u64]), (1, [2]), (1, [0])],
        );

        let q = a.sqrt().unwrap();
        assert_eq!(format!("{}", q), "x^2+x+1");

        let b = &a + &a.monomial(1, &[1]);
        assert_eq!(b.sqrt(), None);
    }

    #[test]
    fn odd_square() {
        let field = Zp64::new(5);
        let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
        let a = MultivariatePolynomial::from_terms(
            &field,
            ctx.clone(),
            [
                (field.one(), [2u64]),
                (field.to_element(2), [1]),
                (field.one(), [0]),
            ],
        );

        let q = a.sqrt().unwrap();
        assert_eq!(format!("{}", q), "x+1");

        // 3 is not a square modulo 5
        assert_eq!(a.constant(field.to_element(3)).sqrt(), None);
        assert_eq!(a.zero().sqrt(), Some(a.zero()));
    }

    #[test]
    fn random_squares() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(17);
        let field = Zp64::new(1000003);

        for order in [
            MonomialOrder::Lex,
            MonomialOrder::DegLex,
            MonomialOrder::DegRevLex,
        ] {
            let ctx = Arc::new(MonomialContext::new(&["x", "y", "z"], order));
            for _ in 0..10 {
                let q = random_poly(&field, &ctx, 15, 8, &mut rng);
                let a = &q * &q;

                let r = a
                    .sqrt_with_settings(&SquareRootSettings::default(), &mut rng)
                    .unwrap();
                assert!(r.is_canonical());
                assert!(r == q || r == -&q);
                assert_eq!(&r * &r, a);
            }
        }
    }

    #[test]
    fn non_squares() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(23);
        let field = Zp64::new(3);
        let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::DegRevLex));
        let x = MultivariatePolynomial::from_terms(&field, ctx.clone(), [(field.one(), [1u64, 0])]);

        for _ in 0..10 {
            let q = random_poly(&field, &ctx, 10, 6, &mut rng);
            if q.is_zero() {
                continue;
            }

            // x has odd multiplicity
            let a = &(&q * &q) * &x;
            assert_eq!(a.sqrt_with_settings(&SquareRootSettings::default(), &mut rng), None);

            let b = &(&q * &q) * &(&x + &x.one());
            assert_eq!(b.sqrt_with_settings(&SquareRootSettings::default(), &mut rng), None);

            let no_checks = SquareRootSettings {
                random_trials: 0,
                ..Default::default()
            };
            assert_eq!(b.sqrt_with_settings(&no_checks, &mut rng), None);
        }
    }

    #[test]
    fn extension_coefficients() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(29);

        let field = AlgebraicExtension::new(Zp64::new(3), 3);
        let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::DegLex));
        for _ in 0..5 {
            let q = random_poly(&field, &ctx, 8, 5, &mut rng);
            let r = (&q * &q).sqrt().unwrap();
            assert!(r == q || r == -&q);
        }

        let field = AlgebraicExtension::new(Z2::new(), 4);
        let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::Lex));
        for _ in 0..5 {
            let q = random_poly(&field, &ctx, 8, 5, &mut rng);
            assert_eq!((&q * &q).sqrt(), Some(q));
        }
    }

    #[test]
    fn non_square_values() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(31);
        let field = Zp64::new(3);
        let settings = SquareRootSettings {
            random_trials: 64,
            ..Default::default()
        };
        assert_eq!(field.evaluation_field(settings.min_evaluation_order).order(), 1594323);

        let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::DegLex));
        let x = MultivariatePolynomial::from_terms(&field, ctx.clone(), [(field.one(), [1u64, 0])]);
        assert!(x.has_non_square_value(&settings, &mut rng));

        for _ in 0..5 {
            let q = random_poly(&field, &ctx, 6, 4, &mut rng);
            assert!(!(&q * &q).has_non_square_value(&settings, &mut rng));
        }
    }

    #[test]
    fn early_abort() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(37);
        let field = Zp64::new(1000003);
        let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));

        // the root has more terms than the input before the first mismatch
        let a = MultivariatePolynomial::from_terms(
            &field,
            ctx,
            [(field.one(), [6u64]), (field.one(), [5]), (field.one(), [0])],
        );

        let settings = SquareRootSettings {
            random_trials: 64,
            ..Default::default()
        };
        assert_eq!(
            a.heap_sqrt(&settings, &mut rng).err(),
            Some(SqrtFailure::NonResidue)
        );

        let no_checks = SquareRootSettings {
            random_trials: 0,
            ..Default::default()
        };
        assert_eq!(
            a.heap_sqrt(&no_checks, &mut rng).err(),
            Some(SqrtFailure::NotSquare)
        );
        assert_eq!(a.sqrt_with_settings(&settings, &mut rng), None);
    }
}
