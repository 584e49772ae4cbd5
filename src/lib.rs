//! ffpoly is a library for fast arithmetic with sparse multivariate polynomials
//! over finite fields.
//!
//! Exponent vectors are packed into machine words and the terms of products,
//! quotients and square roots are generated in order with a heap of monomials.
//!
//! For example:
//!
//! ```
//! use std::sync::Arc;
//!
//! use ffpoly::domains::finite_field::{FiniteFieldCore, Zp64};
//! use ffpoly::domains::Ring;
//! use ffpoly::poly::polynomial::MultivariatePolynomial;
//! use ffpoly::poly::{MonomialContext, MonomialOrder};
//!
//! let field = Zp64::new(7);
//! let ctx = Arc::new(MonomialContext::new(&["x", "y"], MonomialOrder::DegRevLex));
//! let a = MultivariatePolynomial::from_terms(
//!     &field,
//!     ctx,
//!     [(field.one(), [1u64, 1]), (field.one(), [1, 0])],
//! );
//! let x = a.monomial(field.one(), &[1, 0]);
//!
//! let q = a.divides(&x).unwrap();
//! assert_eq!(format!("{}", q), "y+1");
//!
//! let s = &q * &q;
//! assert_eq!(s.sqrt(), Some(q));
//! ```

pub mod domains;
pub mod poly;
