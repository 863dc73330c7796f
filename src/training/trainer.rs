use log::{debug, info};
use ndarray::{Array2, ArrayView2};

use super::diagnostics::{Diagnostics, EvalSplit, TrainEvent};
use crate::{
    MlErr, Result,
    annotations::AnnotationMask,
    arch::{
        Autoencoder, Encoder, Mode,
        loss::{LossFn, Sse},
    },
    configs::TrainConfig,
    dataset::DataSource,
    optimization::Optimizer,
    prox::ProxRegistry,
};

/// The evaluation results of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub split: EvalSplit,
    pub reconstruction: f32,
    pub regularization: f32,
    pub inactive_terms: usize,
    /// `None` when there is no annotated block or no unannotated gene-term pair.
    pub deactivated_share: Option<f32>,
}

impl EpochSummary {
    pub fn total(&self) -> f32 {
        self.reconstruction + self.regularization
    }
}

/// Trains an autoencoder by alternating gradient steps with proximal steps on the decoder.
///
/// Holds one optimizer per parameter group: the encoder first, then each decoder block.
pub struct ProxTrainer<E, O>
where
    E: Encoder,
    O: Optimizer,
{
    model: Autoencoder<E>,
    registry: ProxRegistry,
    optimizers: Vec<O>,
    config: TrainConfig,
    loss_fn: Sse,
}

impl<E, O> ProxTrainer<E, O>
where
    E: Encoder,
    O: Optimizer,
{
    /// Creates a new `ProxTrainer`.
    ///
    /// # Arguments
    /// * `model` - The autoencoder that will be trained.
    /// * `registry` - The proximal pipelines of the decoder blocks.
    /// * `config` - The training hyperparameters.
    /// * `make_optimizer` - Builds the optimizer of a parameter group given its length.
    ///
    /// # Errors
    /// `MissingRegularization` or `ShapeMismatch` if the registry can't regularize every
    /// decoder block.
    pub fn new<F>(
        model: Autoencoder<E>,
        registry: ProxRegistry,
        config: TrainConfig,
        make_optimizer: F,
    ) -> Result<Self>
    where
        F: FnMut(usize) -> O,
    {
        registry.validate(model.decoder())?;

        let optimizers = model
            .param_group_sizes()
            .into_iter()
            .map(make_optimizer)
            .collect();

        debug!(
            terms = model.n_terms(), vars = model.n_vars();
            "validated proximal registry against the decoder"
        );

        Ok(Self {
            model,
            registry,
            optimizers,
            config,
            loss_fn: Sse::new(),
        })
    }

    pub fn model(&self) -> &Autoencoder<E> {
        &self.model
    }

    pub fn into_model(self) -> Autoencoder<E> {
        self.model
    }

    pub fn registry(&self) -> &ProxRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Runs every epoch of the training.
    ///
    /// # Arguments
    /// * `data` - The training observations.
    /// * `test` - An optional held-out matrix, evaluated at the end of each epoch instead of
    ///   the training matrix.
    /// * `diagnostics` - The sink of the training events.
    ///
    /// # Returns
    /// The evaluation summary of every epoch.
    pub fn train<S, D>(
        &mut self,
        data: &mut S,
        test: Option<ArrayView2<f32>>,
        diagnostics: &mut D,
    ) -> Result<Vec<EpochSummary>>
    where
        S: DataSource,
        D: Diagnostics + ?Sized,
    {
        self.check_width("training data", data.x())?;
        if let Some(test) = test {
            self.check_width("test data", test)?;
        }

        let batch_size = self.config.batch_size.get();
        let steps = data.n_obs() / batch_size;
        let zeros = Array2::zeros((batch_size, self.model.n_terms()));
        let mut summaries = Vec::with_capacity(self.config.epochs);

        info!(
            "training for {} epochs of {steps} steps with batches of {batch_size}",
            self.config.epochs
        );

        for epoch in 0..self.config.epochs {
            self.model.set_mode(Mode::Train);

            for step in 0..steps {
                let batch = data.sample_batch(batch_size);
                let loss = self.step(batch.view(), zeros.view(), epoch, step)?;

                if step % self.config.log_every.get() == 0 {
                    diagnostics.record(&TrainEvent::BatchLoss { epoch, step, loss });
                }
            }

            let (split, eval_x) = match test {
                Some(test) => (EvalSplit::Test, test),
                None => (EvalSplit::Train, data.x()),
            };

            let summary = self.evaluate(epoch, split, eval_x, data.annotations())?;
            report(&summary, diagnostics);
            summaries.push(summary);
        }

        Ok(summaries)
    }

    /// Takes one proximal gradient step on a batch.
    ///
    /// # Returns
    /// The batch loss before the step.
    fn step(
        &mut self,
        batch: ArrayView2<f32>,
        zeros: ArrayView2<f32>,
        epoch: usize,
        step: usize,
    ) -> Result<f32> {
        let b = batch.nrows() as f32;
        let lambda0 = self.config.lambda0;

        let (encoded, decoded) = self.model.forward(batch)?;
        let loss = (self.loss_fn.loss(decoded.view(), batch)
            + lambda0 * self.loss_fn.loss(encoded.view(), zeros))
            / b;

        if !loss.is_finite() {
            return Err(MlErr::NonFiniteLoss { epoch, step });
        }

        for (optimizer, (_, grad)) in
            self.optimizers.iter_mut().zip(self.model.param_groups()?)
        {
            optimizer.zero_grad(grad);
        }

        let d_decoded = self.loss_fn.loss_prime(decoded.view(), batch) / b;
        let d_encoded = self.loss_fn.loss_prime(encoded.view(), zeros) * (lambda0 / b);
        self.model
            .backward(encoded.view(), d_encoded.view(), d_decoded.view())?;

        for (optimizer, (params, grad)) in
            self.optimizers.iter_mut().zip(self.model.param_groups()?)
        {
            optimizer.update_params(grad, params)?;
        }

        self.registry.apply(self.model.decoder_mut())?;
        Ok(loss)
    }

    /// Evaluates the model on a whole matrix in eval mode.
    fn evaluate(
        &mut self,
        epoch: usize,
        split: EvalSplit,
        x: ArrayView2<f32>,
        mask: &AnnotationMask,
    ) -> Result<EpochSummary> {
        self.model.set_mode(Mode::Eval);

        let n = x.nrows().max(1) as f32;
        let (encoded, decoded) = self.model.forward(x)?;
        let zeros = Array2::zeros(encoded.dim());

        let reconstruction = self.loss_fn.loss(decoded.view(), x) / n;
        let regularization =
            self.config.lambda0 * self.loss_fn.loss(encoded.view(), zeros.view()) / n;

        Ok(EpochSummary {
            epoch,
            split,
            reconstruction,
            regularization,
            inactive_terms: self.model.decoder().n_inactive_terms(),
            deactivated_share: self.deactivated_share(mask),
        })
    }

    /// The zero entries of the annotated block over the unannotated gene-term pairs.
    fn deactivated_share(&self, mask: &AnnotationMask) -> Option<f32> {
        let weights = self.model.annotated_weights()?;
        let n_unannotated = mask.n_unannotated();
        if n_unannotated == 0 {
            return None;
        }

        let n_zero = weights.iter().filter(|w| !(w.abs() > 0.)).count();
        Some(n_zero as f32 / n_unannotated as f32)
    }

    fn check_width(&self, what: &'static str, x: ArrayView2<f32>) -> Result<()> {
        if x.ncols() != self.model.n_vars() {
            return Err(MlErr::ShapeMismatch {
                what,
                got: x.dim(),
                expected: (x.nrows(), self.model.n_vars()),
            });
        }

        Ok(())
    }
}

fn report<D: Diagnostics + ?Sized>(summary: &EpochSummary, diagnostics: &mut D) {
    let epoch = summary.epoch;

    diagnostics.record(&TrainEvent::EpochLoss {
        epoch,
        split: summary.split,
        reconstruction: summary.reconstruction,
        regularization: summary.regularization,
    });
    diagnostics.record(&TrainEvent::InactiveTerms {
        epoch,
        count: summary.inactive_terms,
    });

    if let Some(share) = summary.deactivated_share {
        diagnostics.record(&TrainEvent::DeactivatedGenes { epoch, share });
    }
}
