//! Brent's root finder: bisection, secant, and inverse quadratic
//! interpolation, with an absolute interval stopping test.

use openetran_core::error::Result;

/// Find a root of `f` in [a, b], where f(a) and f(b) have opposite signs.
/// Stops when the bracket shrinks below `eps_abs` or after `max_iter`
/// iterations, returning the best estimate either way.
pub fn brent<F>(mut f: F, a: f64, b: f64, eps_abs: f64, max_iter: usize) -> Result<f64>
where
    F: FnMut(f64) -> Result<f64>,
{
    let mut a = a;
    let mut b = b;
    let mut fa = f(a)?;
    let mut fb = f(b)?;
    debug_assert!(fa * fb <= 0.0, "brent requires a sign change");

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iter {
        if fb * fc > 0.0 {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }
        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * eps_abs;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok(b);
        }
        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // attempt inverse quadratic interpolation
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }
        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += tol1.copysign(xm);
        }
        fb = f(b)?;
    }
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_polynomial_root() {
        let root = brent(|x| Ok(x * x - 2.0), 0.0, 2.0, 1e-12, 100).unwrap();
        assert!((root - 2.0f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn respects_absolute_tolerance() {
        let mut evals = 0;
        let root = brent(
            |x| {
                evals += 1;
                Ok(x - 123.456)
            },
            0.0,
            500e3,
            1.0,
            200,
        )
        .unwrap();
        assert!((root - 123.456).abs() < 1.0);
        assert!(evals < 60);
    }

    #[test]
    fn handles_steep_penalized_objective() {
        // shaped like the critical-current objective: negative below the
        // root, jumping to a large positive penalty above it
        let threshold = 37.5e3;
        let root = brent(
            |x| {
                if x >= threshold {
                    Ok((x - threshold) / 500e3 + 1.0e4)
                } else {
                    Ok((x - threshold) / 500e3)
                }
            },
            3e3,
            500e3,
            1.0,
            200,
        )
        .unwrap();
        assert!((root - threshold).abs() < 2.0);
    }

    #[test]
    fn propagates_objective_errors() {
        let r = brent(
            |_| Err(openetran_core::Error::MathCalc("boom".into())),
            0.0,
            1.0,
            1e-6,
            10,
        );
        assert!(r.is_err());
    }
}
