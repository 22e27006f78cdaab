// SPDX-License-Identifier: LGPL-2.1

use crate::{RawError, Result};

/// Ceiling of the 14-bit sample range, also the fixed upper control
/// point of the tone curve.
pub const CURVE_MAX: u16 = 0x3fff;

/// Divisor mapping the 0..=0x3fff sample range into the 0..5 abscissa
/// domain the curve was fitted over.
const DOMAIN_SCALE: f64 = 0xCCC as f64;

const DEGREE: usize = 5;

/// Tone-mapping polynomial fitted exactly through the camera's gamma
/// control points. Six coefficients, low-to-high degree, owned by the
/// decode that produced them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCurve {
  coeffs: [f64; DEGREE + 1],
}

impl ToneCurve {
  /// Fit a degree-5 polynomial through the four extracted control
  /// ordinates plus the fixed endpoints 0 and [`CURVE_MAX`], placed at
  /// abscissas 0..=5. Six points, six coefficients: this is exact
  /// interpolation, not least squares.
  pub fn fit(controls: [u16; 4]) -> Result<Self> {
    let targets = [
      0.0,
      controls[0] as f64,
      controls[1] as f64,
      controls[2] as f64,
      controls[3] as f64,
      CURVE_MAX as f64,
    ];
    let coeffs = solve_vandermonde(&targets)?;
    Ok(Self { coeffs })
  }

  /// Evaluate the curve for a sample value. Inputs above the 14-bit
  /// ceiling return the ceiling verbatim.
  pub fn eval(&self, x: f64) -> f64 {
    if x > CURVE_MAX as f64 {
      return CURVE_MAX as f64;
    }
    let x = x / DOMAIN_SCALE;

    let x2 = x * x;
    let x3 = x2 * x;
    let x4 = x3 * x;
    let x5 = x4 * x;
    self.coeffs[0] + self.coeffs[1] * x + self.coeffs[2] * x2 + self.coeffs[3] * x3 + self.coeffs[4] * x4 + self.coeffs[5] * x5
  }

  pub fn coeffs(&self) -> &[f64; DEGREE + 1] {
    &self.coeffs
  }
}

/// Solve the 6x6 Vandermonde system over abscissas 0..=5 for the given
/// targets, by Gaussian elimination with partial pivoting. The system is
/// square and the abscissas distinct, so this is exact up to floating
/// point; a vanishing pivot still surfaces as an error instead of NaN
/// coefficients.
fn solve_vandermonde(targets: &[f64; DEGREE + 1]) -> Result<[f64; DEGREE + 1]> {
  const N: usize = DEGREE + 1;
  let mut m = [[0.0f64; N + 1]; N];
  for (i, row) in m.iter_mut().enumerate() {
    let mut p = 1.0;
    for cell in row.iter_mut().take(N) {
      *cell = p;
      p *= i as f64;
    }
    row[N] = targets[i];
  }

  for col in 0..N {
    let pivot = (col..N)
      .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
      .expect("column range is never empty");
    if m[pivot][col].abs() < 1e-12 {
      return Err(RawError::Numeric("gamma curve fit: singular system".to_string()));
    }
    m.swap(col, pivot);
    for row in col + 1..N {
      let f = m[row][col] / m[col][col];
      for k in col..=N {
        m[row][k] -= f * m[col][k];
      }
    }
  }

  let mut coeffs = [0.0f64; N];
  for row in (0..N).rev() {
    let mut acc = m[row][N];
    for k in row + 1..N {
      acc -= m[row][k] * coeffs[k];
    }
    coeffs[row] = acc / m[row][row];
  }
  Ok(coeffs)
}
