use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{self, Command},
};

use sparse_autoencoder::{
    annotations::{AnnotationMask, read_gene_sets},
    arch::{Autoencoder, TermKind},
    configs::RunConfig,
    dataset::{DataSource, InMemoryDataset},
    prox::ProxRegistry,
    training::{ProxTrainer, Recorder},
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("sparse-autoencoder-{name}-{}", process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_inputs(dir: &Path) {
    let mut table = String::from("CDK1 CCNB1 MCM2 CASP3 CASP8 GAPDH\n");
    for i in 0..24 {
        let row: Vec<String> = (0..6)
            .map(|j| format!("{:.3}", ((i * 7 + j * 3) % 11) as f32 / 5.))
            .collect();
        table.push_str(&row.join(" "));
        table.push('\n');
    }
    fs::write(dir.join("x.txt"), table).unwrap();
    fs::write(
        dir.join("sets.gmt"),
        "REACTOME_CELL_CYCLE cdk1 ccnb1 mcm2\nKEGG_APOPTOSIS casp3 casp8\nGO_SINGLE gapdh\n",
    )
    .unwrap();
}

#[test]
fn a_run_config_drives_a_whole_training() {
    let dir = scratch_dir("run");
    write_inputs(&dir);

    let config = format!(
        r#"{{
            "data": {{
                "matrix": {matrix:?},
                "gene_sets": [{sets:?}],
                "min_genes": 1
            }},
            "model": {{ "n_ann": 2, "n_dense": 1, "mid_layers_size": 8 }},
            "training": {{
                "batch_size": 8,
                "epochs": 2,
                "lambda1": 0.05,
                "lambda3": 0.01,
                "optimizer": {{ "gradient_descent": {{ "learning_rate": 0.01 }} }},
                "seed": 17
            }}
        }}"#,
        matrix = dir.join("x.txt"),
        sets = dir.join("sets.gmt"),
    );
    fs::write(dir.join("config.json"), config).unwrap();

    let config = RunConfig::from_path(dir.join("config.json")).unwrap();
    let (var_names, x) = InMemoryDataset::read_table(&config.data.matrix).unwrap();
    let sets = read_gene_sets(&config.data.gene_sets[0]).unwrap();
    let mask = AnnotationMask::from_gene_sets(&var_names, &sets, config.data.min_genes);
    assert_eq!(mask.terms(), ["CELL_CYCLE", "APOPTOSIS"]);

    let mut rng = config.training.rng();
    let model = Autoencoder::feed_forward(x.ncols(), &config.model, &mut rng).unwrap();
    let registry = ProxRegistry::new(&mask, config.training.coeffs()).unwrap();
    let optimizer = config.training.optimizer;
    let mut trainer =
        ProxTrainer::new(model, registry, config.training.clone(), |len| optimizer.build(len))
            .unwrap();

    let mut data = InMemoryDataset::from_matrix(x, mask, 0).unwrap();
    assert_eq!(data.n_obs(), 24);
    let summaries = trainer.train(&mut data, None, &mut Recorder::new()).unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.total().is_finite()));
    assert!(trainer.model().decoder().block(TermKind::Annotated).is_some());

    fs::remove_dir_all(dir).ok();
}

#[test]
fn an_unreadable_config_is_an_io_error() {
    let dir = scratch_dir("missing");
    let err = RunConfig::from_path(dir.join("nope.json")).unwrap_err();
    assert!(matches!(err, sparse_autoencoder::MlErr::Io(_)));
    fs::remove_dir_all(dir).ok();
}

#[test]
fn a_run_without_term_sizes_is_rejected() {
    let dir = scratch_dir("no-terms");
    write_inputs(&dir);

    let config = format!(
        r#"{{
            "data": {{ "matrix": {matrix:?}, "gene_sets": [{sets:?}], "min_genes": 1 }},
            "model": {{ "mid_layers_size": 4 }},
            "training": {{ "batch_size": 8, "epochs": 1, "lambda1": 0.05, "seed": 3 }}
        }}"#,
        matrix = dir.join("x.txt"),
        sets = dir.join("sets.gmt"),
    );
    let path = dir.join("config.json");
    fs::write(&path, config).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sparse-autoencoder"))
        .arg(&path)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least one type of terms should be chosen"));

    fs::remove_dir_all(dir).ok();
}
