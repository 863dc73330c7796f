use std::fmt::{self, Display};

use log::debug;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, linalg::general_mat_mul, s};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::{MlErr, Result};

/// The kinds of latent terms, in the order their blocks are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    Annotated,
    Sparse,
    Dense,
}
use TermKind::*;

impl TermKind {
    pub const ALL: [TermKind; 3] = [Annotated, Sparse, Dense];

    pub fn name(self) -> &'static str {
        match self {
            Annotated => "annotated",
            Sparse => "sparse",
            Dense => "dense",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Annotated => 0,
            Sparse => 1,
            Dense => 2,
        }
    }
}

impl Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The weights of one kind of term, genes × terms, with its gradient.
#[derive(Debug, Clone)]
pub struct WeightBlock {
    kind: TermKind,
    offset: usize,
    weights: Array2<f32>,
    grad: Array2<f32>,
}

impl WeightBlock {
    pub fn kind(&self) -> TermKind {
        self.kind
    }

    /// Index of this block's first column in the concatenated weight matrix.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn n_terms(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    pub fn weights_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.weights.view_mut()
    }

    pub fn grad(&self) -> ArrayView2<'_, f32> {
        self.grad.view()
    }

    /// Gives the raw weights and gradient of this block as flat slices.
    ///
    /// # Returns
    /// `None` if the storage is not contiguous, which never happens for blocks built by the
    /// decoder.
    pub fn param_group(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        let params = self.weights.as_slice_mut()?;
        let grad = self.grad.as_slice_mut()?;
        Some((params, grad))
    }

    /// Counts the columns whose L2 norm is not strictly positive.
    pub fn n_inactive_terms(&self) -> usize {
        self.weights
            .axis_iter(Axis(1))
            .filter(|col| !(col.dot(col).sqrt() > 0.))
            .count()
    }
}

/// A linear decoder without bias whose weight matrix is split into one block per kind of
/// term.
///
/// The set of blocks is fixed at construction. Blocks are always visited in
/// `TermKind::ALL` order, which is also the order of the latent columns.
#[derive(Debug, Clone)]
pub struct CompositeLinearDecoder {
    n_vars: usize,
    n_terms: usize,
    blocks: [Option<WeightBlock>; 3],
}

impl CompositeLinearDecoder {
    /// Creates a new decoder with random weights drawn from `N(0, 1) / sqrt(n_terms)`.
    ///
    /// A size of `None` or zero leaves that kind of term out.
    ///
    /// # Arguments
    /// * `n_vars` - The amount of genes, the output width.
    /// * `n_ann` - The amount of annotated terms.
    /// * `n_sparse` - The amount of sparse terms.
    /// * `n_dense` - The amount of dense terms.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// A new decoder, or `NoTermTypes` if every size is absent.
    pub fn new<R: Rng + ?Sized>(
        n_vars: usize,
        n_ann: Option<usize>,
        n_sparse: Option<usize>,
        n_dense: Option<usize>,
        rng: &mut R,
    ) -> Result<Self> {
        let sizes = [n_ann, n_sparse, n_dense].map(|s| s.filter(|&n| n > 0));
        let n_terms: usize = sizes.iter().flatten().sum();
        if n_terms == 0 {
            return Err(MlErr::NoTermTypes);
        }

        let scale = (n_terms as f32).sqrt();
        let weights = sizes.map(|size| {
            size.map(|n| {
                Array2::from_shape_simple_fn((n_vars, n), || {
                    let w: f32 = StandardNormal.sample(&mut *rng);
                    w / scale
                })
            })
        });

        Self::from_weights(n_vars, weights)
    }

    /// Creates a new decoder from explicit weight blocks, in `TermKind::ALL` order.
    ///
    /// # Errors
    /// `NoTermTypes` if there are no non-empty blocks, `ShapeMismatch` if a block does not
    /// have `n_vars` rows.
    pub fn from_weights(n_vars: usize, weights: [Option<Array2<f32>>; 3]) -> Result<Self> {
        let mut offset = 0;
        let mut blocks = [None, None, None];

        for (kind, w) in TermKind::ALL.into_iter().zip(weights) {
            let Some(w) = w.filter(|w| w.ncols() > 0) else {
                continue;
            };

            if w.nrows() != n_vars {
                return Err(MlErr::ShapeMismatch {
                    what: "decoder block",
                    got: w.dim(),
                    expected: (n_vars, w.ncols()),
                });
            }

            // Owned copies are always in standard layout.
            let weights = w.as_standard_layout().into_owned();
            let block = WeightBlock {
                kind,
                offset,
                grad: Array2::zeros(weights.dim()),
                weights,
            };

            debug!("decoder block {kind}: {} terms at column {offset}", block.n_terms());
            offset += block.n_terms();
            blocks[kind.index()] = Some(block);
        }

        if offset == 0 {
            return Err(MlErr::NoTermTypes);
        }

        Ok(Self {
            n_vars,
            n_terms: offset,
            blocks,
        })
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// The total amount of terms, the latent width this decoder expects.
    pub fn n_terms(&self) -> usize {
        self.n_terms
    }

    pub fn block(&self, kind: TermKind) -> Option<&WeightBlock> {
        self.blocks[kind.index()].as_ref()
    }

    pub fn block_mut(&mut self, kind: TermKind) -> Option<&mut WeightBlock> {
        self.blocks[kind.index()].as_mut()
    }

    /// Iterates the active blocks in `TermKind::ALL` order.
    pub fn blocks(&self) -> impl Iterator<Item = &WeightBlock> {
        self.blocks.iter().flatten()
    }

    /// Iterates the active blocks mutably in `TermKind::ALL` order.
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut WeightBlock> {
        self.blocks.iter_mut().flatten()
    }

    /// Returns the horizontal concatenation of every active block, genes × terms.
    pub fn concatenated(&self) -> Array2<f32> {
        let mut w = Array2::zeros((self.n_vars, self.n_terms));

        for block in self.blocks() {
            let (lo, hi) = (block.offset, block.offset + block.n_terms());
            w.slice_mut(s![.., lo..hi]).assign(&block.weights);
        }

        w
    }

    /// Decodes a batch of latent vectors: `x · Wᵗ`.
    ///
    /// # Arguments
    /// * `x` - The latent batch, batch × terms.
    ///
    /// # Returns
    /// The decoded batch, batch × genes.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.n_terms {
            return Err(MlErr::ShapeMismatch {
                what: "decoder input",
                got: x.dim(),
                expected: (x.nrows(), self.n_terms),
            });
        }

        Ok(x.dot(&self.concatenated().t()))
    }

    /// Accumulates the weight gradients of every block and returns the gradient with
    /// respect to the latent input.
    ///
    /// # Arguments
    /// * `x` - The latent batch that was decoded, batch × terms.
    /// * `d` - The loss gradient with respect to the decoded batch, batch × genes.
    pub fn backward(&mut self, x: ArrayView2<f32>, d: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.n_terms || d.dim() != (x.nrows(), self.n_vars) {
            return Err(MlErr::ShapeMismatch {
                what: "decoder gradient",
                got: d.dim(),
                expected: (x.nrows(), self.n_vars),
            });
        }

        let mut dx = Array2::zeros(x.dim());

        for block in self.blocks_mut() {
            let (lo, hi) = (block.offset, block.offset + block.n_terms());

            general_mat_mul(1., &d.t(), &x.slice(s![.., lo..hi]), 1., &mut block.grad);
            general_mat_mul(
                1.,
                &d,
                &block.weights,
                0.,
                &mut dx.slice_mut(s![.., lo..hi]),
            );
        }

        Ok(dx)
    }

    /// Counts, across every block, the terms whose weight column has a zero L2 norm.
    pub fn n_inactive_terms(&self) -> usize {
        self.blocks().map(WeightBlock::n_inactive_terms).sum()
    }
}
