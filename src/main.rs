use std::env;

use anyhow::{Context, bail};
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};

use sparse_autoencoder::{
    annotations::{AnnotationMask, read_gene_sets},
    arch::Autoencoder,
    configs::RunConfig,
    dataset::InMemoryDataset,
    prox::ProxRegistry,
    training::{LogDiagnostics, ProxTrainer},
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        bail!("usage: sparse-autoencoder <config.json>");
    };

    let config = RunConfig::from_path(&path).with_context(|| format!("loading {path}"))?;
    let data = &config.data;

    let (var_names, x) = InMemoryDataset::read_table(&data.matrix)
        .with_context(|| format!("reading {}", data.matrix.display()))?;

    let test = match &data.test_matrix {
        Some(test_path) => {
            let (test_names, test) = InMemoryDataset::read_table(test_path)
                .with_context(|| format!("reading {}", test_path.display()))?;
            if test_names != var_names {
                bail!("the test matrix genes differ from the training matrix genes");
            }
            Some(test)
        }
        None => None,
    };

    let mut sets = Vec::new();
    for file in &data.gene_sets {
        let parsed =
            read_gene_sets(file).with_context(|| format!("reading {}", file.display()))?;
        sets.extend(parsed);
    }

    let mask = AnnotationMask::from_gene_sets(&var_names, &sets, data.min_genes);
    info!("{} annotated terms over {} genes", mask.n_terms(), mask.n_vars());

    let mut rng = config.training.rng();
    let model = Autoencoder::feed_forward(x.ncols(), &config.model, &mut rng)?;
    let registry = ProxRegistry::new(&mask, config.training.coeffs())?;
    let optimizer = config.training.optimizer;
    let mut trainer = ProxTrainer::new(model, registry, config.training.clone(), |len| {
        optimizer.build(len)
    })?;

    let sampler = StdRng::seed_from_u64(rng.random());
    let mut dataset = InMemoryDataset::new(x, var_names, mask, sampler)?;
    let test = test.as_ref().map(|t| t.view());
    let summaries = trainer.train(&mut dataset, test, &mut LogDiagnostics)?;

    if let Some(last) = summaries.last() {
        info!(
            "finished with {} inactive terms and a {} loss of {:.4}",
            last.inactive_terms,
            last.split,
            last.total()
        );
    }

    Ok(())
}
