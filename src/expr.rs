use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::iter::{Product, Sum};
use std::ops::{Add, Mul, Neg, Sub};

use itertools::Itertools;
use num_rational::Rational64;
use num_traits::{One, Zero};

use crate::symbol::Symbol;

/// A symbolic expression
///
/// Expressions are kept in a canonical form, so that structural
/// equality coincides with equality up to reordering of sums and
/// products:
///
/// * `Mul` holds at least two factors, none of which is itself a
///   product. A numeric coefficient other than one comes first, the
///   remaining factors are sorted and equal bases are combined into a
///   single power.
/// * `Add` holds at least two terms, none of which is itself a sum.
///   Terms differing only by their coefficient are combined.
/// * `Pow` never has exponent zero or one and never a numeric base.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Num(Rational64),
    Sym(Symbol),
    Fn(Symbol, Vec<Expr>),
    Pow(Box<Expr>, i32),
    Mul(Vec<Expr>),
    Add(Vec<Expr>),
}

impl Default for Expr {
    fn default() -> Self {
        Self::zero()
    }
}

impl Expr {
    pub fn zero() -> Self {
        Self::Num(Rational64::zero())
    }

    pub fn one() -> Self {
        Self::Num(Rational64::one())
    }

    pub fn num(n: i64) -> Self {
        Self::Num(Rational64::from_integer(n))
    }

    pub fn rational(r: Rational64) -> Self {
        Self::Num(r)
    }

    pub fn symbol(s: Symbol) -> Self {
        Self::Sym(s)
    }

    pub fn function(name: Symbol, args: Vec<Expr>) -> Self {
        Self::Fn(name, args)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Num(n) if n.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Self::Num(n) if n.is_one())
    }

    pub fn pow(base: Expr, exp: i32) -> Self {
        match (base, exp) {
            (_, 0) => Self::one(),
            (base, 1) => base,
            (Self::Num(n), exp) => {
                debug_assert!(!(n.is_zero() && exp < 0));
                Self::Num(n.pow(exp))
            }
            (Self::Pow(base, e), exp) => Self::pow(*base, e * exp),
            (Self::Mul(factors), exp) => {
                factors.into_iter().map(|f| Self::pow(f, exp)).product()
            }
            (base, exp) => Self::Pow(Box::new(base), exp),
        }
    }

    /// Canonical product of the given factors
    pub fn product<I: IntoIterator<Item = Expr>>(factors: I) -> Self {
        let mut coeff = Rational64::one();
        let mut powers: BTreeMap<Expr, i32> = BTreeMap::new();
        let mut add_factor =
            |f: Expr, coeff: &mut Rational64| match f {
                Self::Num(n) => *coeff *= n,
                Self::Pow(base, e) => *powers.entry(*base).or_default() += e,
                f => *powers.entry(f).or_default() += 1,
            };
        for factor in factors {
            match factor {
                Self::Mul(inner) => {
                    for f in inner {
                        add_factor(f, &mut coeff);
                    }
                }
                f => add_factor(f, &mut coeff),
            }
        }
        if coeff.is_zero() {
            return Self::zero();
        }
        let mut res = Vec::with_capacity(powers.len() + 1);
        if !coeff.is_one() {
            res.push(Self::Num(coeff));
        }
        res.extend(
            powers
                .into_iter()
                .filter(|(_, e)| *e != 0)
                .map(|(base, e)| Self::pow(base, e)),
        );
        match res.len() {
            0 => Self::one(),
            1 => res.pop().unwrap(),
            _ => Self::Mul(res),
        }
    }

    /// Canonical sum of the given terms
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Self {
        let mut coeffs: BTreeMap<Expr, Rational64> = BTreeMap::new();
        let mut add_term = |t: Expr| {
            let (c, rest) = t.split_coefficient();
            *coeffs.entry(rest).or_insert_with(Rational64::zero) += c;
        };
        for term in terms {
            match term {
                Self::Add(inner) => inner.into_iter().for_each(&mut add_term),
                t => add_term(t),
            }
        }
        let mut res = Vec::from_iter(
            coeffs
                .into_iter()
                .filter(|(_, c)| !c.is_zero())
                .map(|(rest, c)| Self::product([Self::Num(c), rest])),
        );
        match res.len() {
            0 => Self::zero(),
            1 => res.pop().unwrap(),
            _ => Self::Add(res),
        }
    }

    /// Split into numeric coefficient and the remaining monomial
    pub fn split_coefficient(self) -> (Rational64, Expr) {
        match self {
            Self::Num(n) => (n, Self::one()),
            Self::Mul(mut factors) => {
                if let Some(Self::Num(n)) = factors.first() {
                    let n = *n;
                    factors.remove(0);
                    (n, Self::product(factors))
                } else {
                    (Rational64::one(), Self::Mul(factors))
                }
            }
            e => (Rational64::one(), e),
        }
    }

    /// Terms of a sum, or the expression itself if it is not a sum
    pub fn terms(&self) -> &[Expr] {
        match self {
            Self::Add(terms) => terms,
            e => std::slice::from_ref(e),
        }
    }

    /// Number of occurrences of the function `name`, counting powers
    /// with their exponent
    pub fn count_function(&self, name: Symbol) -> i64 {
        match self {
            Self::Num(_) | Self::Sym(_) => 0,
            Self::Fn(f, args) => {
                let inner: i64 =
                    args.iter().map(|a| a.count_function(name)).sum();
                inner + i64::from(*f == name)
            }
            Self::Pow(base, e) => i64::from(*e) * base.count_function(name),
            Self::Mul(args) | Self::Add(args) => {
                args.iter().map(|a| a.count_function(name)).sum()
            }
        }
    }

    fn is_composite(&self) -> bool {
        match self {
            Self::Num(n) => !n.is_integer() || *n < Rational64::zero(),
            Self::Mul(_) | Self::Add(_) | Self::Pow(_, _) => true,
            Self::Sym(_) | Self::Fn(_, _) => false,
        }
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Self::num(n)
    }
}

impl From<Rational64> for Expr {
    fn from(n: Rational64) -> Self {
        Self::Num(n)
    }
}

impl From<Symbol> for Expr {
    fn from(s: Symbol) -> Self {
        Self::Sym(s)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, other: Expr) -> Self::Output {
        Expr::sum([self, other])
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, other: Expr) -> Self::Output {
        Expr::sum([self, -other])
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, other: Expr) -> Self::Output {
        Expr::product([self, other])
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Self::Output {
        match self {
            Self::Add(terms) => Expr::sum(terms.into_iter().map(|t| -t)),
            e => Expr::product([Expr::num(-1), e]),
        }
    }
}

impl Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Self {
        Expr::sum(iter)
    }
}

impl Product for Expr {
    fn product<I: Iterator<Item = Expr>>(iter: I) -> Self {
        Expr::product(iter)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => {
                if n.is_integer() {
                    write!(f, "{}", n.numer())
                } else {
                    write!(f, "{}/{}", n.numer(), n.denom())
                }
            }
            Self::Sym(s) => s.fmt(f),
            Self::Fn(name, args) => write!(f, "{name}({})", args.iter().join(", ")),
            Self::Pow(base, e) => {
                let base = if base.is_composite() {
                    format!("({base})")
                } else {
                    base.to_string()
                };
                if *e < 0 {
                    write!(f, "{base}^({e})")
                } else {
                    write!(f, "{base}^{e}")
                }
            }
            Self::Mul(factors) => {
                let mut factors = factors.iter().peekable();
                if let Some(Self::Num(n)) = factors.peek() {
                    if *n == -Rational64::one() {
                        write!(f, "-")?;
                        factors.next();
                    }
                }
                let factors = factors.map(|factor| match factor {
                    Self::Add(_) => format!("({factor})"),
                    Self::Num(n) if !n.is_integer() => format!("({factor})"),
                    _ => factor.to_string(),
                });
                write!(f, "{}", factors.format("*"))
            }
            Self::Add(terms) => {
                for (n, term) in terms.iter().enumerate() {
                    let term = term.to_string();
                    match (n, term.strip_prefix('-')) {
                        (0, _) => write!(f, "{term}")?,
                        (_, Some(rest)) => write!(f, " - {rest}")?,
                        (_, None) => write!(f, " + {term}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols;

    #[test]
    fn canonical_products() {
        symbols!(x, y);
        let x = Expr::from(x);
        let y = Expr::from(y);

        assert_eq!(x.clone() * y.clone(), y.clone() * x.clone());
        assert_eq!(
            x.clone() * x.clone(),
            Expr::Pow(Box::new(x.clone()), 2)
        );
        assert_eq!(
            Expr::pow(x.clone(), -1) * x.clone(),
            Expr::one()
        );
        assert_eq!(Expr::zero() * x.clone(), Expr::zero());
        assert_eq!(Expr::num(2) * Expr::num(3) * x.clone(), Expr::num(6) * x);
    }

    #[test]
    fn canonical_sums() {
        symbols!(x, y);
        let x = Expr::from(x);
        let y = Expr::from(y);

        assert_eq!(x.clone() + x.clone(), Expr::num(2) * x.clone());
        assert_eq!(x.clone() - x.clone(), Expr::zero());
        assert_eq!(x.clone() + y.clone(), y.clone() + x.clone());
        assert_eq!((x.clone() + y.clone()).terms().len(), 2);
        assert_eq!(-(-x.clone()), x);
    }

    #[test]
    fn powers_of_numbers() {
        symbols!(pi);
        let two_pi = Expr::num(2) * Expr::from(pi);
        let res = Expr::pow(two_pi, -4);
        assert_eq!(
            res,
            Expr::product([
                Expr::rational(Rational64::new(1, 16)),
                Expr::pow(Expr::from(pi), -4)
            ])
        );
        assert_eq!(res.to_string(), "(1/16)*pi^(-4)");
    }

    #[test]
    fn count_functions() {
        symbols!(f, g, x);
        let fx = Expr::function(f, vec![x.into()]);
        let e = Expr::pow(fx.clone(), 2) * Expr::function(g, vec![fx]);
        assert_eq!(e.count_function(f), 3);
        assert_eq!(e.count_function(g), 1);
    }
}
