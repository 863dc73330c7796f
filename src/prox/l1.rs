use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};

use crate::{MlErr, Result, annotations::AnnotationMask};

/// Soft-thresholding: shrinks `x` toward zero by `alpha`, clipping at zero.
#[inline]
pub fn soft_threshold(x: f32, alpha: f32) -> f32 {
    if x >= alpha {
        x - alpha
    } else if x <= -alpha {
        x + alpha
    } else {
        0.
    }
}

/// The proximal operator of `alpha * ||W||_1`.
///
/// When built with an annotation mask, entries whose gene is annotated to the term are
/// left untouched and only the unannotated entries are thresholded.
#[derive(Debug, Clone)]
pub struct ProxL1 {
    alpha: f32,
    exempt: Option<Array2<bool>>,
}

impl ProxL1 {
    /// Creates a new `ProxL1` that thresholds every entry.
    ///
    /// # Arguments
    /// * `alpha` - The threshold, must be finite and non negative.
    ///
    /// # Returns
    /// A new `ProxL1` instance or an `InvalidInput` error.
    pub fn new(alpha: f32) -> Result<Self> {
        validate_alpha(alpha)?;
        Ok(Self {
            alpha,
            exempt: None,
        })
    }

    /// Creates a new `ProxL1` that skips the annotated gene-term entries.
    ///
    /// # Arguments
    /// * `alpha` - The threshold, must be finite and non negative.
    /// * `mask` - The annotation mask, shaped like the weight block it will be applied to.
    ///
    /// # Returns
    /// A new `ProxL1` instance or an `InvalidInput` error.
    pub fn masked(alpha: f32, mask: &AnnotationMask) -> Result<Self> {
        validate_alpha(alpha)?;
        Ok(Self {
            alpha,
            exempt: Some(mask.view().to_owned()),
        })
    }

    /// Checks that this operator can be applied to a matrix of shape `dim`.
    pub fn check_shape(&self, dim: (usize, usize)) -> Result<()> {
        match &self.exempt {
            Some(exempt) if exempt.dim() != dim => Err(MlErr::ShapeMismatch {
                what: "annotation mask",
                got: exempt.dim(),
                expected: dim,
            }),
            _ => Ok(()),
        }
    }

    /// Thresholds `w` in place.
    ///
    /// # Errors
    /// `ShapeMismatch` if the mask and `w` differ in shape.
    pub fn apply_inplace(&self, mut w: ArrayViewMut2<f32>) -> Result<()> {
        let alpha = self.alpha;

        let Some(exempt) = &self.exempt else {
            w.par_mapv_inplace(|x| soft_threshold(x, alpha));
            return Ok(());
        };

        self.check_shape(w.dim())?;
        Zip::from(&mut w).and(exempt).par_for_each(|x, &keep| {
            if !keep {
                *x = soft_threshold(*x, alpha);
            }
        });

        Ok(())
    }

    /// Returns a thresholded copy of `w`, leaving `w` unchanged.
    pub fn apply(&self, w: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut out = w.to_owned();
        self.apply_inplace(out.view_mut())?;
        Ok(out)
    }
}

fn validate_alpha(alpha: f32) -> Result<()> {
    if !alpha.is_finite() || alpha < 0. {
        return Err(MlErr::InvalidInput(
            "the L1 threshold must be finite and non negative",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, StandardNormal};

    use super::*;

    #[test]
    fn shrinks_every_entry_without_mask() {
        let prox = ProxL1::new(0.5).unwrap();
        let w = array![[1.0, -1.0], [0.25, -0.5]];

        let out = prox.apply(w.view()).unwrap();

        assert_eq!(out, array![[0.5, -0.5], [0.0, 0.0]]);
        assert_eq!(w, array![[1.0, -1.0], [0.25, -0.5]]);
    }

    #[test]
    fn magnitude_is_bounded_and_idempotent_on_shrunk_entries() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = Array2::<f32>::from_shape_simple_fn((20, 6), || StandardNormal.sample(&mut rng));
        let alpha = 0.3;
        let prox = ProxL1::new(alpha).unwrap();

        let once = prox.apply(w.view()).unwrap();
        Zip::from(&once).and(&w).for_each(|&o, &x| {
            assert!(o.abs() <= (x.abs() - alpha).max(0.) + 1e-6);
        });

        let twice = prox.apply(once.view()).unwrap();
        Zip::from(&twice).and(&once).for_each(|&t, &o| {
            if o == 0. {
                assert_eq!(t, 0.);
            }
        });
    }

    #[test]
    fn annotated_entries_are_untouched() {
        let mask = AnnotationMask::new(array![[true, false], [false, true]]);
        let prox = ProxL1::masked(1.0, &mask).unwrap();
        let mut w = array![[0.1, 0.2], [-3.0, -0.4]];

        prox.apply_inplace(w.view_mut()).unwrap();

        assert_eq!(w, array![[0.1, 0.0], [-2.0, -0.4]]);
    }

    #[test]
    fn zero_threshold_keeps_masked_entries_exact() {
        let mask = AnnotationMask::new(array![[true, false]]);
        let prox = ProxL1::masked(0.0, &mask).unwrap();
        let mut w = array![[-0.0, 2.5]];

        prox.apply_inplace(w.view_mut()).unwrap();

        assert_eq!(w[[0, 0]].to_bits(), (-0.0f32).to_bits());
        assert_eq!(w[[0, 1]], 2.5);
    }

    #[test]
    fn mask_shape_must_match() {
        let mask = AnnotationMask::new(Array2::from_elem((3, 2), false));
        let prox = ProxL1::masked(0.1, &mask).unwrap();
        let mut w = Array2::<f32>::ones((3, 3));

        let err = prox.apply_inplace(w.view_mut()).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }

    #[test]
    fn negative_threshold_is_rejected() {
        assert!(ProxL1::new(-0.1).is_err());
        assert!(ProxL1::new(f32::NAN).is_err());
    }
}
