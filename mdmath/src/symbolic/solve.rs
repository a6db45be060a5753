//! Solving `expr = 0` for a single unknown.
//!
//! The expression is reduced to a ratio of two polynomials in the unknown.
//! Roots of the numerator are found in closed form up to degree two and by
//! Durand-Kerner iteration above that; roots that also zero the denominator
//! are dropped.

use super::{Constant, Sym, SymbolicError};

/// Coefficients, lowest degree first.
type Poly = Vec<f64>;

const EPS: f64 = 1e-12;

/// Highest degree either side of a [`Rational`] may reach.
const MAX_DEGREE: usize = 64;

// ── Complex arithmetic ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    const fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }

    fn add(self, o: Complex) -> Complex {
        Complex::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Complex) -> Complex {
        Complex::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: Complex) -> Complex {
        Complex::new(self.re * o.re - self.im * o.im, self.re * o.im + self.im * o.re)
    }

    fn div(self, o: Complex) -> Complex {
        let d = o.re * o.re + o.im * o.im;
        Complex::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }

    fn norm(self) -> f64 {
        self.re.hypot(self.im)
    }
}

// ── Polynomials ───────────────────────────────────────────────────────────────

fn trim(mut p: Poly) -> Poly {
    while p.len() > 1 && p.last().is_some_and(|c| c.abs() < EPS) {
        p.pop();
    }
    p
}

fn poly_add(a: &[f64], b: &[f64]) -> Poly {
    let mut out = vec![0.0; a.len().max(b.len())];
    for (i, c) in a.iter().enumerate() {
        out[i] += c;
    }
    for (i, c) in b.iter().enumerate() {
        out[i] += c;
    }
    trim(out)
}

fn poly_mul(a: &[f64], b: &[f64]) -> Poly {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    trim(out)
}

fn poly_scale(a: &[f64], k: f64) -> Poly {
    trim(a.iter().map(|c| c * k).collect())
}

fn is_zero(p: &[f64]) -> bool {
    p.iter().all(|c| c.abs() < EPS)
}

fn eval_poly(p: &[f64], z: Complex) -> Complex {
    p.iter()
        .rev()
        .fold(Complex::new(0.0, 0.0), |acc, &c| acc.mul(z).add(Complex::new(c, 0.0)))
}

/// `num / den`, both polynomials in the unknown.
struct Rational {
    num: Poly,
    den: Poly,
}

impl Rational {
    fn constant(c: f64) -> Self {
        Rational { num: vec![c], den: vec![1.0] }
    }

    /// Fails once the numerator or denominator exceeds [`MAX_DEGREE`].
    fn checked(self) -> Result<Rational, SymbolicError> {
        if self.num.len() > MAX_DEGREE + 1 || self.den.len() > MAX_DEGREE + 1 {
            return Err(SymbolicError::Solve("degree too high".into()));
        }
        Ok(self)
    }

    fn add(self, o: Rational) -> Result<Rational, SymbolicError> {
        Rational {
            num: poly_add(&poly_mul(&self.num, &o.den), &poly_mul(&o.num, &self.den)),
            den: poly_mul(&self.den, &o.den),
        }
        .checked()
    }

    fn neg(self) -> Rational {
        Rational { num: poly_scale(&self.num, -1.0), den: self.den }
    }

    fn mul(self, o: Rational) -> Result<Rational, SymbolicError> {
        Rational { num: poly_mul(&self.num, &o.num), den: poly_mul(&self.den, &o.den) }.checked()
    }

    fn recip(self) -> Result<Rational, SymbolicError> {
        if is_zero(&self.num) {
            return Err(SymbolicError::Solve("division by zero".into()));
        }
        Ok(Rational { num: self.den, den: self.num })
    }

    fn powi(self, n: u32) -> Result<Rational, SymbolicError> {
        let mut out = Rational::constant(1.0);
        for _ in 0..n {
            out = out.mul(Rational { num: self.num.clone(), den: self.den.clone() })?;
        }
        Ok(out)
    }
}

fn to_rational(e: &Sym, x: &str) -> Result<Rational, SymbolicError> {
    if !e.contains_var(x) {
        let v = e.eval().map_err(|err| match err {
            SymbolicError::Evaluate(m) => SymbolicError::Solve(m),
            other => other,
        })?;
        return Ok(Rational::constant(v));
    }
    match e {
        Sym::Var(_) => Ok(Rational { num: vec![0.0, 1.0], den: vec![1.0] }),
        Sym::Neg(a) => Ok(to_rational(a, x)?.neg()),
        Sym::Add(a, b) => to_rational(a, x)?.add(to_rational(b, x)?),
        Sym::Sub(a, b) => to_rational(a, x)?.add(to_rational(b, x)?.neg()),
        Sym::Mul(a, b) => to_rational(a, x)?.mul(to_rational(b, x)?),
        Sym::Div(a, b) => to_rational(a, x)?.mul(to_rational(b, x)?.recip()?),
        Sym::Pow(base, exp) if !exp.contains_var(x) => {
            let n = exp.eval().map_err(|err| SymbolicError::Solve(err.to_string()))?;
            if n != n.trunc() || n.abs() > 64.0 {
                return Err(SymbolicError::Solve(format!("{e} is not polynomial in {x}")));
            }
            let base = to_rational(base, x)?;
            if n >= 0.0 {
                base.powi(n as u32)
            } else {
                base.powi((-n) as u32)?.recip()
            }
        }
        _ => Err(SymbolicError::Solve(format!("{e} is not polynomial in {x}"))),
    }
}

// ── Root finding ──────────────────────────────────────────────────────────────

fn poly_roots(p: &[f64]) -> Vec<Complex> {
    match p.len() {
        0 | 1 => Vec::new(),
        2 => vec![Complex::new(-p[0] / p[1], 0.0)],
        3 => {
            let (c, b, a) = (p[0], p[1], p[2]);
            let disc = b * b - 4.0 * a * c;
            if disc >= 0.0 {
                let s = disc.sqrt();
                vec![
                    Complex::new((-b - s) / (2.0 * a), 0.0),
                    Complex::new((-b + s) / (2.0 * a), 0.0),
                ]
            } else {
                let re = -b / (2.0 * a);
                let im = (-disc).sqrt() / (2.0 * a).abs();
                vec![Complex::new(re, -im), Complex::new(re, im)]
            }
        }
        _ => durand_kerner(p),
    }
}

fn durand_kerner(p: &[f64]) -> Vec<Complex> {
    let lead = p[p.len() - 1];
    let monic: Poly = p.iter().map(|c| c / lead).collect();
    let degree = monic.len() - 1;
    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex> = Vec::with_capacity(degree);
    let mut z = Complex::new(1.0, 0.0);
    for _ in 0..degree {
        roots.push(z);
        z = z.mul(seed);
    }

    for _ in 0..1000 {
        let mut delta = 0.0f64;
        for k in 0..degree {
            let mut denom = Complex::new(1.0, 0.0);
            for (j, r) in roots.iter().enumerate() {
                if j != k {
                    denom = denom.mul(roots[k].sub(*r));
                }
            }
            let step = eval_poly(&monic, roots[k]).div(denom);
            roots[k] = roots[k].sub(step);
            delta = delta.max(step.norm());
        }
        if delta < 1e-14 {
            break;
        }
    }
    roots
}

/// Snap iteration noise: near-integers become integers, tiny parts zero.
fn clean(v: f64) -> f64 {
    if (v - v.round()).abs() < 1e-9 {
        v.round() + 0.0
    } else {
        v
    }
}

fn root_to_sym(z: Complex) -> Sym {
    if z.im == 0.0 {
        return Sym::Num(z.re);
    }
    let magnitude = z.im.abs();
    let imag = if magnitude == 1.0 {
        Sym::Const(Constant::I)
    } else {
        Sym::Mul(Box::new(Sym::Num(magnitude)), Box::new(Sym::Const(Constant::I)))
    };
    match (z.re == 0.0, z.im < 0.0) {
        (true, true) => Sym::Neg(Box::new(imag)),
        (true, false) => imag,
        (false, true) => Sym::Sub(Box::new(Sym::Num(z.re)), Box::new(imag)),
        (false, false) => Sym::Add(Box::new(Sym::Num(z.re)), Box::new(imag)),
    }
}

/// Solve `expr = 0` for `x`.  Real roots come first in ascending order,
/// then complex roots ordered by real and imaginary part.
pub fn solve(expr: &Sym, x: &str) -> Result<Vec<Sym>, SymbolicError> {
    let Rational { num, den } = to_rational(expr, x)?;
    let num = trim(num);
    if num.iter().any(|c| !c.is_finite()) {
        return Err(SymbolicError::Solve("coefficients are not finite".into()));
    }

    let mut roots: Vec<Complex> = Vec::new();
    for z in poly_roots(&num) {
        let z = Complex::new(clean(z.re), clean(z.im));
        if eval_poly(&den, z).norm() < 1e-9 {
            continue;
        }
        if roots.iter().any(|r| r.sub(z).norm() < 1e-6) {
            continue;
        }
        roots.push(z);
    }

    roots.sort_by(|a, b| {
        let key = |z: &Complex| (z.im != 0.0, z.re, z.im);
        let (ka, kb) = (key(a), key(b));
        ka.0.cmp(&kb.0)
            .then(ka.1.total_cmp(&kb.1))
            .then(ka.2.total_cmp(&kb.2))
    });
    Ok(roots.into_iter().map(root_to_sym).collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
