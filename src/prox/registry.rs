use log::debug;
use serde::{Deserialize, Serialize};

use super::{ProxGroupL2, ProxL1, ProxPipeline};
use crate::{
    MlErr, Result,
    annotations::AnnotationMask,
    arch::decoder::{CompositeLinearDecoder, TermKind},
};

/// The regularization strengths of the decoder.
///
/// * `lambda1` - L1 on the unannotated entries of the annotated block.
/// * `lambda2` - L1 on the sparse block.
/// * `lambda3` - Group lasso on the columns of every block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegularizationCoeffs {
    #[serde(default)]
    pub lambda1: Option<f32>,
    #[serde(default)]
    pub lambda2: Option<f32>,
    #[serde(default)]
    pub lambda3: Option<f32>,
}

/// Maps each kind of term to the proximal pipeline of its weight block.
#[derive(Debug, Clone)]
pub struct ProxRegistry {
    pipelines: [Option<ProxPipeline>; 3],
}

impl ProxRegistry {
    /// Builds the pipelines for every kind of term.
    ///
    /// The annotated pipeline is a masked L1 when `lambda1` is set, the sparse pipeline an L1
    /// when `lambda2` is set. When `lambda3` is set a group lasso step is appended to all
    /// three. The dense pipeline is always present and is the identity without `lambda3`.
    ///
    /// # Arguments
    /// * `mask` - The annotation mask used to exempt annotated entries.
    /// * `coeffs` - The regularization strengths.
    pub fn new(mask: &AnnotationMask, coeffs: RegularizationCoeffs) -> Result<Self> {
        let group = coeffs.lambda3.map(ProxGroupL2::new).transpose()?;
        let with_group = |pipeline: ProxPipeline| match &group {
            Some(op) => pipeline.then(op.clone()),
            None => pipeline,
        };

        let annotated = coeffs
            .lambda1
            .map(|alpha| ProxL1::masked(alpha, mask))
            .transpose()?
            .map(|op| with_group(ProxPipeline::identity().then(op)));

        let sparse = coeffs
            .lambda2
            .map(ProxL1::new)
            .transpose()?
            .map(|op| with_group(ProxPipeline::identity().then(op)));

        let dense = Some(with_group(ProxPipeline::identity()));

        Ok(Self {
            pipelines: [annotated, sparse, dense],
        })
    }

    pub fn get(&self, kind: TermKind) -> Option<&ProxPipeline> {
        self.pipelines[kind.index()].as_ref()
    }

    /// Checks that every block of `decoder` has a pipeline that fits its shape.
    ///
    /// # Errors
    /// `MissingRegularization` naming the first block without a pipeline, or
    /// `ShapeMismatch` if a pipeline cannot be applied to its block.
    pub fn validate(&self, decoder: &CompositeLinearDecoder) -> Result<()> {
        for block in decoder.blocks() {
            let kind = block.kind();
            let pipeline = self.get(kind).ok_or(MlErr::MissingRegularization {
                term: kind.name(),
            })?;

            pipeline.check_shape(block.weights().dim())?;
        }

        Ok(())
    }

    /// Applies each block's pipeline to its weights, in place, one block after the other.
    pub fn apply(&self, decoder: &mut CompositeLinearDecoder) -> Result<()> {
        for block in decoder.blocks_mut() {
            let kind = block.kind();
            let pipeline = self.get(kind).ok_or(MlErr::MissingRegularization {
                term: kind.name(),
            })?;

            if pipeline.is_identity() {
                continue;
            }

            pipeline.apply_inplace(block.weights_mut())?;
        }

        debug!("applied proximal step");
        Ok(())
    }
}
