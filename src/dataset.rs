use std::{fs, path::Path};

use log::info;
use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{MlErr, Result, annotations::AnnotationMask};

/// A source of observations for the training loop.
pub trait DataSource {
    /// The amount of observations, rows of `x`.
    fn n_obs(&self) -> usize;

    /// The amount of genes, columns of `x`.
    fn n_vars(&self) -> usize;

    /// Draws `batch_size` rows uniformly at random, with replacement.
    fn sample_batch(&mut self, batch_size: usize) -> Array2<f32>;

    /// The full observation matrix.
    fn x(&self) -> ArrayView2<'_, f32>;

    /// The gene × term annotation of the genes.
    fn annotations(&self) -> &AnnotationMask;
}

/// An owned expression matrix with its gene names and annotations.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    x: Array2<f32>,
    var_names: Vec<String>,
    annotations: AnnotationMask,
    rng: StdRng,
}

impl InMemoryDataset {
    /// Creates a new `InMemoryDataset`.
    ///
    /// # Arguments
    /// * `x` - The observations × genes matrix.
    /// * `var_names` - One name per gene.
    /// * `annotations` - The annotation mask, one row per gene.
    /// * `rng` - The generator used for sampling batches.
    ///
    /// # Errors
    /// `ShapeMismatch` if the names or the mask don't have one entry per gene.
    pub fn new(
        x: Array2<f32>,
        var_names: Vec<String>,
        annotations: AnnotationMask,
        rng: StdRng,
    ) -> Result<Self> {
        if var_names.len() != x.ncols() {
            return Err(MlErr::ShapeMismatch {
                what: "var names",
                got: (1, var_names.len()),
                expected: (1, x.ncols()),
            });
        }

        if annotations.n_vars() != x.ncols() {
            return Err(MlErr::ShapeMismatch {
                what: "annotation mask",
                got: annotations.shape(),
                expected: (x.ncols(), annotations.n_terms()),
            });
        }

        Ok(Self {
            x,
            var_names,
            annotations,
            rng,
        })
    }

    /// Creates a dataset with generated gene names `gene_{i}` and a seeded generator.
    pub fn from_matrix(x: Array2<f32>, annotations: AnnotationMask, seed: u64) -> Result<Self> {
        let var_names = (0..x.ncols()).map(|i| format!("gene_{i}")).collect();
        Self::new(x, var_names, annotations, StdRng::seed_from_u64(seed))
    }

    /// Loads a whitespace separated table whose first non blank line holds the gene names.
    ///
    /// # Returns
    /// The gene names and the observations × genes matrix.
    ///
    /// # Errors
    /// `MlErr::Io` if the file can't be read, `MlErr::Parse` on a malformed line.
    pub fn read_table<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Array2<f32>)> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let (names, x) = parse_table(&text)?;

        info!(
            "loaded {} observations of {} genes from {}",
            x.nrows(),
            x.ncols(),
            path.display()
        );
        Ok((names, x))
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }
}

/// Parses a whitespace separated table with a header line of names.
pub fn parse_table(text: &str) -> Result<(Vec<String>, Array2<f32>)> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(MlErr::Parse {
            line: 1,
            detail: "missing header".into(),
        });
    };

    let names: Vec<String> = header.split_whitespace().map(str::to_string).collect();
    let mut values = Vec::new();
    let mut nrows = 0;

    for (i, line) in lines {
        let start = values.len();
        for field in line.split_whitespace() {
            let value = field.parse::<f32>().map_err(|e| MlErr::Parse {
                line: i + 1,
                detail: format!("{field:?}: {e}"),
            })?;
            values.push(value);
        }

        let got = values.len() - start;
        if got != names.len() {
            return Err(MlErr::Parse {
                line: i + 1,
                detail: format!("expected {} values, got {got}", names.len()),
            });
        }

        nrows += 1;
    }

    let x = Array2::from_shape_vec((nrows, names.len()), values).map_err(|e| MlErr::Parse {
        line: 0,
        detail: e.to_string(),
    })?;

    Ok((names, x))
}

impl DataSource for InMemoryDataset {
    fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    fn n_vars(&self) -> usize {
        self.x.ncols()
    }

    fn sample_batch(&mut self, batch_size: usize) -> Array2<f32> {
        let n_obs = self.n_obs();
        if n_obs == 0 {
            return Array2::zeros((0, self.n_vars()));
        }

        let rows: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.random_range(0..n_obs))
            .collect();

        self.x.select(Axis(0), &rows)
    }

    fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    fn annotations(&self) -> &AnnotationMask {
        &self.annotations
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn table_is_parsed_row_major() {
        let (names, x) = parse_table("A B C\n\n1 2 3\n4 5 6.5\n").unwrap();

        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(x, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.5]]);
    }

    #[test]
    fn ragged_rows_are_a_parse_error() {
        let err = parse_table("A B\n1 2\n3\n").unwrap_err();
        assert!(matches!(err, MlErr::Parse { line: 3, .. }));
    }

    #[test]
    fn batches_are_rows_of_the_matrix() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let mask = AnnotationMask::new(Array2::from_elem((2, 1), true));
        let mut data = InMemoryDataset::from_matrix(x, mask, 5).unwrap();

        let batch = data.sample_batch(10);

        assert_eq!(batch.dim(), (10, 2));
        for row in batch.rows() {
            assert_eq!(row[0], row[1]);
            assert!([1.0, 2.0, 3.0].contains(&row[0]));
        }
    }

    #[test]
    fn mask_must_cover_every_gene() {
        let mask = AnnotationMask::new(Array2::from_elem((3, 1), true));
        assert!(InMemoryDataset::from_matrix(Array2::zeros((2, 2)), mask, 0).is_err());
    }
}
