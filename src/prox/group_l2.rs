use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, Zip};

use crate::{MlErr, Result};

/// The proximal operator of the group lasso penalty, taking every column as a group.
///
/// A column whose L2 norm does not exceed its threshold is zeroed, any other column is
/// shrunk toward the origin by its threshold.
#[derive(Debug, Clone)]
pub struct ProxGroupL2 {
    alpha: f32,
    omega: Option<Array1<f32>>,
}

impl ProxGroupL2 {
    /// Creates a new `ProxGroupL2` with the same threshold for every group.
    ///
    /// # Arguments
    /// * `alpha` - The threshold, must be finite and non negative.
    pub fn new(alpha: f32) -> Result<Self> {
        validate_threshold(alpha)?;
        Ok(Self { alpha, omega: None })
    }

    /// Creates a new `ProxGroupL2` where group `c` uses the threshold `alpha * omega[c]`.
    ///
    /// # Arguments
    /// * `alpha` - The base threshold, must be finite and non negative.
    /// * `omega` - One non negative weight per group.
    pub fn weighted(alpha: f32, omega: Array1<f32>) -> Result<Self> {
        validate_threshold(alpha)?;
        for &w in &omega {
            validate_threshold(w)?;
        }

        Ok(Self {
            alpha,
            omega: Some(omega),
        })
    }

    /// Checks that this operator can be applied to a matrix of shape `dim`.
    pub fn check_shape(&self, dim: (usize, usize)) -> Result<()> {
        match &self.omega {
            Some(omega) if omega.len() != dim.1 => Err(MlErr::ShapeMismatch {
                what: "group weights",
                got: (1, omega.len()),
                expected: (1, dim.1),
            }),
            _ => Ok(()),
        }
    }

    fn thresholds(&self, ngroups: usize) -> Array1<f32> {
        match &self.omega {
            Some(omega) => omega * self.alpha,
            None => Array1::from_elem(ngroups, self.alpha),
        }
    }

    /// Shrinks or prunes the columns of `w` in place.
    ///
    /// # Errors
    /// `ShapeMismatch` if there isn't one group weight per column.
    pub fn apply_inplace(&self, mut w: ArrayViewMut2<f32>) -> Result<()> {
        self.check_shape(w.dim())?;
        let thresholds = self.thresholds(w.ncols());

        Zip::from(w.columns_mut())
            .and(&thresholds)
            .par_for_each(|mut col, &g| {
                let norm = col.dot(&col).sqrt();

                // A zero norm never exceeds the threshold, so no division by zero below.
                if norm > g {
                    col *= 1. - g / norm;
                } else {
                    col.fill(0.);
                }
            });

        Ok(())
    }

    /// Returns a shrunk copy of `w`, leaving `w` unchanged.
    pub fn apply(&self, w: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut out = w.to_owned();
        self.apply_inplace(out.view_mut())?;
        Ok(out)
    }
}

fn validate_threshold(value: f32) -> Result<()> {
    if !value.is_finite() || value < 0. {
        return Err(MlErr::InvalidInput(
            "group thresholds must be finite and non negative",
        ));
    }

    Ok(())
}
