//! Unwrapped phase along a ray

use num_complex::Complex;

/// Phase of the conjugate product `a * conj(b)` (deg)
///
/// This is the phase change from `b` to `a`, wrapped
/// into `(-180, 180]`.
#[inline]
pub fn phase_diff_deg(a: Complex<f64>, b: Complex<f64>) -> f64 {
    (a * b.conj()).arg().to_degrees()
}

/// Accumulate phase from gate to gate
///
/// Each output is the sum of the wrapped phase changes from
/// the first gate onward, starting from the phase of the
/// first phasor. Because each step is wrapped, but the sum
/// is not, the output is an "unwrapped" phase which may
/// grow without bound. A linear phase ramp in the input
/// yields a linear ramp in the output.
///
/// `out` is cleared and refilled with one value per phasor.
pub fn accumulate_phase<I>(phasors: I, out: &mut Vec<f64>)
where
    I: IntoIterator<Item = Complex<f64>>,
{
    out.clear();

    let mut iter = phasors.into_iter();
    let mut prev = match iter.next() {
        Some(first) => first,
        None => return,
    };

    let mut sum = prev.arg().to_degrees();
    out.push(sum);
    for cur in iter {
        sum += phase_diff_deg(cur, prev);
        out.push(sum);
        prev = cur;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    fn phasor_deg(deg: f64) -> Complex<f64> {
        Complex::from_polar(1.0, deg.to_radians())
    }

    #[test]
    fn test_phase_diff() {
        assert_approx_eq!(phase_diff_deg(phasor_deg(30.0), phasor_deg(10.0)), 20.0);
        assert_approx_eq!(phase_diff_deg(phasor_deg(-170.0), phasor_deg(170.0)), 20.0);
        assert_approx_eq!(phase_diff_deg(phasor_deg(170.0), phasor_deg(-170.0)), -20.0);
    }

    #[test]
    fn test_unwrap_ramp() {
        // 50 deg per gate wraps many times but the sum keeps growing
        let phasors: Vec<_> = (0..20).map(|i| phasor_deg(50.0 * i as f64)).collect();
        let mut out = vec![];
        accumulate_phase(phasors.iter().copied(), &mut out);
        assert_eq!(out.len(), 20);
        for (i, ph) in out.iter().enumerate() {
            assert_approx_eq!(*ph, 50.0 * i as f64, 1.0e-9);
        }
    }

    #[test]
    fn test_empty() {
        let mut out = vec![1.0, 2.0];
        accumulate_phase(std::iter::empty(), &mut out);
        assert!(out.is_empty());
    }
}
