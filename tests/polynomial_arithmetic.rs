use std::sync::Arc;

use ffpoly::domains::algebraic_extension::AlgebraicExtension;
use ffpoly::domains::finite_field::{FiniteFieldCore, GaloisField, Z2, Zp64};
use ffpoly::domains::Ring;
use ffpoly::poly::polynomial::MultivariatePolynomial;
use ffpoly::poly::sqrt::SquareRootSettings;
use ffpoly::poly::{MonomialContext, MonomialOrder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ORDERS: [MonomialOrder; 3] = [
    MonomialOrder::Lex,
    MonomialOrder::DegLex,
    MonomialOrder::DegRevLex,
];

fn random_poly<F: Ring>(
    field: &F,
    ctx: &Arc<MonomialContext>,
    terms: usize,
    max_exp: u64,
    rng: &mut StdRng,
) -> MultivariatePolynomial<F> {
    let mut p = MultivariatePolynomial::new(field, None, ctx.clone());
    for _ in 0..terms {
        let e: Vec<u64> = (0..ctx.nvars()).map(|_| rng.gen_range(0..=max_exp)).collect();
        p.append_monomial(field.sample(rng), &e);
    }
    p
}

/// Check the ring axioms that the engines must respect for random inputs.
fn check_engines<F: GaloisField>(field: &F, seed: u64, max_exp: u64) {
    let mut rng = StdRng::seed_from_u64(seed);

    for order in ORDERS {
        let ctx = Arc::new(MonomialContext::new(&["x", "y", "z", "w"], order));
        for _ in 0..8 {
            let a = random_poly(field, &ctx, 10, max_exp, &mut rng);
            let b = random_poly(field, &ctx, 6, max_exp, &mut rng);
            let c = random_poly(field, &ctx, 4, max_exp, &mut rng);
            if b.is_zero() {
                continue;
            }

            let ab = &a * &b;
            assert!(ab.is_canonical());
            assert_eq!(ab, &b * &a);
            assert_eq!(&ab * &c, &a * &(&b * &c));
            assert_eq!(&(&a + &c) * &b, &ab + &(&c * &b));

            let point: Vec<_> = (0..4).map(|_| field.sample(&mut rng)).collect();
            assert_eq!(
                ab.evaluate(&point),
                field.mul(&a.evaluate(&point), &b.evaluate(&point))
            );

            assert_eq!(ab.divides(&b), Some(a.clone()));

            let (q, r) = (&ab + &c).quot_rem(&b);
            assert_eq!(&(&q * &b) + &r, &ab + &c);
            let lead = b.exponents(0);
            for t in &r {
                assert!(t.exponents().iter().zip(&lead).any(|(x, y)| x < y));
            }

            let s = (&a * &a)
                .sqrt_with_settings(&SquareRootSettings::default(), &mut rng)
                .unwrap();
            assert!(s == a || s == -&a);
        }
    }
}

#[test]
fn prime_field_engines() {
    check_engines(&Zp64::new(18446744073709551557), 1, 6);
    check_engines(&Zp64::new(101), 2, 12);
}

#[test]
fn binary_field_engines() {
    check_engines(&Z2::new(), 3, 6);
}

#[test]
fn extension_field_engines() {
    check_engines(&AlgebraicExtension::new(Zp64::new(5), 2), 4, 5);
    check_engines(&AlgebraicExtension::new(Z2::new(), 5), 5, 5);
}

#[test]
fn nested_extension_engines() {
    let gf9 = AlgebraicExtension::new(Zp64::new(3), 2);
    check_engines(&AlgebraicExtension::new(gf9, 2), 6, 4);
}

#[test]
fn binary_square_root() {
    let field = Z2::new();
    let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
    let a = MultivariatePolynomial::from_terms(&field, ctx, [(1, [4u64]), (1, [2]), (1, [0])]);

    assert_eq!(format!("{}", a.sqrt().unwrap()), "x^2+x+1");
}

#[test]
fn odd_square_root() {
    let field = Zp64::new(5);
    let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::DegLex));
    let a = MultivariatePolynomial::from_terms(
        &field,
        ctx,
        [
            (field.one(), [2u64]),
            (field.to_element(2), [1]),
            (field.one(), [0]),
        ],
    );

    assert_eq!(format!("{}", a.sqrt().unwrap()), "x+1");
}

#[test]
fn exact_quotient() {
    let field = Zp64::new(7);
    let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::Lex));
    let a = MultivariatePolynomial::from_terms(
        &field,
        ctx,
        [(field.one(), [1u64, 1]), (field.one(), [1, 0])],
    );
    let x = a.monomial(field.one(), &[1, 0]);

    let q = a.divides(&x).unwrap();
    assert_eq!(format!("{}", q), "y+1");
}

#[test]
fn inexact_quotient() {
    let field = Zp64::new(7);
    let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
    let a = MultivariatePolynomial::from_terms(&field, ctx, [(field.one(), [2u64])]);
    let b = a.monomial(field.one(), &[3]);

    assert_eq!(a.divides(&b), None);

    let (q, r) = a.quot_rem(&b);
    assert!(q.is_zero());
    assert_eq!(r, a);
}

#[test]
#[should_panic(expected = "Cannot divide by 0 polynomial")]
fn quotient_by_zero() {
    let field = Zp64::new(7);
    let ctx = Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex));
    let a = MultivariatePolynomial::from_terms(&field, ctx, [(field.one(), [2u64])]);
    let _ = &a / &a.zero();
}

#[test]
#[should_panic(expected = "incompatible")]
fn mixed_contexts() {
    let field = Zp64::new(7);
    let a = MultivariatePolynomial::from_terms(
        &field,
        Arc::new(MonomialContext::new(&["x"], MonomialOrder::Lex)),
        [(field.one(), [2u64])],
    );
    let b = MultivariatePolynomial::from_terms(
        &field,
        Arc::new(MonomialContext::new(&["x"], MonomialOrder::DegLex)),
        [(field.one(), [1u64])],
    );
    let _ = &a * &b;
}

#[test]
fn large_exponents() {
    let field = Zp64::new(65537);
    let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::DegRevLex));
    let a = MultivariatePolynomial::from_terms(
        &field,
        ctx,
        [
            (field.one(), [1u64 << 40, 3]),
            (field.to_element(3), [5, 1 << 30]),
            (field.one(), [0, 0]),
        ],
    );

    let square = &a * &a;
    assert_eq!(square.degree(0), 1 << 41);
    assert_eq!(square.sqrt(), Some(a.clone()));
    assert_eq!(square.divides(&a), Some(a));
}
