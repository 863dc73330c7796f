use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use super::{ProxGroupL2, ProxL1};
use crate::Result;

/// A single proximal operator.
#[derive(Debug, Clone)]
pub enum ProxOp {
    L1(ProxL1),
    GroupL2(ProxGroupL2),
}
use ProxOp::*;

impl ProxOp {
    pub fn check_shape(&self, dim: (usize, usize)) -> Result<()> {
        match self {
            L1(op) => op.check_shape(dim),
            GroupL2(op) => op.check_shape(dim),
        }
    }

    pub fn apply_inplace(&self, w: ArrayViewMut2<f32>) -> Result<()> {
        match self {
            L1(op) => op.apply_inplace(w),
            GroupL2(op) => op.apply_inplace(w),
        }
    }
}

impl From<ProxL1> for ProxOp {
    fn from(value: ProxL1) -> Self {
        L1(value)
    }
}

impl From<ProxGroupL2> for ProxOp {
    fn from(value: ProxGroupL2) -> Self {
        GroupL2(value)
    }
}

/// An ordered composition of proximal operators, applied first to last.
///
/// The empty pipeline is the identity.
#[derive(Debug, Clone, Default)]
pub struct ProxPipeline {
    ops: Vec<ProxOp>,
}

impl ProxPipeline {
    /// Returns the identity pipeline.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Appends `op` so that it runs after every operator already in the pipeline.
    pub fn then<P: Into<ProxOp>>(mut self, op: P) -> Self {
        self.ops.push(op.into());
        self
    }

    pub fn ops(&self) -> &[ProxOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks that every operator can be applied to a matrix of shape `dim`.
    pub fn check_shape(&self, dim: (usize, usize)) -> Result<()> {
        self.ops.iter().try_for_each(|op| op.check_shape(dim))
    }

    /// Runs every operator over `w`, in place.
    pub fn apply_inplace(&self, mut w: ArrayViewMut2<f32>) -> Result<()> {
        for op in &self.ops {
            op.apply_inplace(w.view_mut())?;
        }

        Ok(())
    }

    /// Runs every operator over a copy of `w`.
    pub fn apply(&self, w: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut out = w.to_owned();
        self.apply_inplace(out.view_mut())?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn identity_leaves_the_matrix_alone() {
        let w = array![[0.3, -7.0], [1e-9, 0.0]];
        let out = ProxPipeline::identity().apply(w.view()).unwrap();
        assert_eq!(out, w);
    }

    #[test]
    fn operators_run_in_order() {
        // L1 first: every entry is below the threshold and the column dies before the
        // group step. Group first would keep a shrunk, non zero column.
        let w = array![[0.6], [0.6], [0.6], [0.6]];

        let l1_then_group = ProxPipeline::identity()
            .then(ProxL1::new(1.).unwrap())
            .then(ProxGroupL2::new(0.1).unwrap());
        let group_then_l1 = ProxPipeline::identity()
            .then(ProxGroupL2::new(0.1).unwrap())
            .then(ProxL1::new(0.1).unwrap());

        assert!(l1_then_group.apply(w.view()).unwrap().iter().all(|&x| x == 0.));
        assert!(group_then_l1.apply(w.view()).unwrap().iter().all(|&x| x > 0.));
        assert_eq!(l1_then_group.ops().len(), 2);
        assert!(matches!(l1_then_group.ops()[0], ProxOp::L1(_)));
    }
}
