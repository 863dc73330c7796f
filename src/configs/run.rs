use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::{ModelConfig, TrainConfig};
use crate::Result;

/// Where the expression data and the annotations come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// A whitespace separated table, gene names on the first line.
    pub matrix: PathBuf,
    /// An optional held-out table with the same genes, used for evaluation.
    #[serde(default)]
    pub test_matrix: Option<PathBuf>,
    /// Gene set files, one `TERM gene gene ...` line per term.
    #[serde(default)]
    pub gene_sets: Vec<PathBuf>,
    /// Terms need more member genes than this to be kept.
    #[serde(default)]
    pub min_genes: usize,
}

/// The whole configuration of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    pub training: TrainConfig,
}

impl RunConfig {
    /// Loads a JSON run configuration.
    ///
    /// # Errors
    /// `MlErr::Io` if the file can't be read, `MlErr::Config` if it is not a valid config.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let text = r#"{
            "data": { "matrix": "x.tsv", "gene_sets": ["a.gmt"], "min_genes": 12 },
            "model": { "n_ann": 40, "n_dense": 5 },
            "training": { "batch_size": 128, "epochs": 10, "lambda1": 0.1, "seed": 3 }
        }"#;

        let config: RunConfig = serde_json::from_str(text).unwrap();

        assert_eq!(config.data.test_matrix, None);
        assert_eq!(config.data.min_genes, 12);
        assert_eq!(config.model.mid_layers_size, 400);
        assert_eq!(config.model.n_sparse, None);
        assert_eq!(config.training.seed, Some(3));
    }
}
