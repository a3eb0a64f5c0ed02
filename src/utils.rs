use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Log-probability of an impossible event
pub const LOG_ZERO: f32 = f32::NEG_INFINITY;

/// Log-probability of a certain event
pub const LOG_ONE: f32 = 0.0;

/// Computes `ln(e^a + e^b)` without leaving log space.
///
/// Negative infinity is the identity, so summing with an impossible event
/// returns the other operand unchanged rather than NaN.
///
/// ```
/// use chartparse::utils::{log_sum, LOG_ZERO};
///
/// assert_eq!(log_sum(LOG_ZERO, -2.5), -2.5);
/// assert_eq!(log_sum(-1.0, LOG_ZERO), -1.0);
/// assert!((log_sum(0.5f32.ln(), 0.5f32.ln())).abs() < 1e-6);
/// ```
pub fn log_sum(a: f32, b: f32) -> f32 {
  if a == LOG_ZERO {
    return b;
  }
  if b == LOG_ZERO {
    return a;
  }

  let (hi, lo) = if a > b { (a, b) } else { (b, a) };
  hi + (lo - hi).exp().ln_1p()
}

/// `log_sum` over an iterator, `LOG_ZERO` when empty
pub fn log_sum_all<I>(scores: I) -> f32
where
  I: IntoIterator<Item = f32>,
{
  scores.into_iter().fold(LOG_ZERO, log_sum)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_sum_identity() {
    assert_eq!(log_sum(LOG_ZERO, LOG_ZERO), LOG_ZERO);
    assert_eq!(log_sum(LOG_ZERO, -3.0), -3.0);
    assert_eq!(log_sum_all(Vec::new()), LOG_ZERO);
  }

  #[test]
  fn test_log_sum_matches_linear_space() {
    let (p, q) = (0.2f32, 0.3f32);
    let summed = log_sum(p.ln(), q.ln());
    assert!((summed.exp() - 0.5).abs() < 1e-6);

    let all = log_sum_all(vec![0.25f32.ln(); 4]);
    assert!((all - LOG_ONE).abs() < 1e-6);
  }

  #[test]
  fn test_viterbi_addition_propagates_log_zero() {
    // plain addition, as used for inside scores, keeps impossibility sticky
    assert_eq!(-1.5 + LOG_ZERO, LOG_ZERO);
  }
}
