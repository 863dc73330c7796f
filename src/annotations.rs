use std::{collections::HashSet, fs, path::Path};

use log::debug;
use ndarray::{Array2, ArrayView2, Axis};

use crate::{MlErr, Result};

/// Longest term name kept after stripping the collection prefix.
const MAX_TERM_NAME: usize = 30;

/// A named set of genes, one line of a gene-set file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneSet {
    pub name: String,
    pub genes: Vec<String>,
}

/// Binary gene × term membership matrix.
///
/// `mask[[g, t]]` is `true` when gene `g` is annotated to term `t`.
#[derive(Debug, Clone)]
pub struct AnnotationMask {
    mask: Array2<bool>,
    terms: Vec<String>,
}

impl AnnotationMask {
    /// Wraps a membership matrix, naming the terms by their column index.
    pub fn new(mask: Array2<bool>) -> Self {
        let terms = (0..mask.ncols()).map(|i| format!("term_{i}")).collect();
        Self { mask, terms }
    }

    /// Wraps a membership matrix with explicit term names.
    ///
    /// # Errors
    /// `ShapeMismatch` if there isn't exactly one name per column.
    pub fn with_terms(mask: Array2<bool>, terms: Vec<String>) -> Result<Self> {
        if terms.len() != mask.ncols() {
            return Err(MlErr::ShapeMismatch {
                what: "annotation term names",
                got: (1, terms.len()),
                expected: (1, mask.ncols()),
            });
        }

        Ok(Self { mask, terms })
    }

    /// Builds the membership matrix of `var_names` against `sets`.
    ///
    /// Names are compared case-insensitively. Terms annotating `min_genes` genes or fewer
    /// are dropped.
    ///
    /// # Arguments
    /// * `var_names` - The gene names, one per row of the resulting mask.
    /// * `sets` - The gene sets, one candidate column each.
    /// * `min_genes` - Terms need strictly more member genes than this to be kept.
    pub fn from_gene_sets<S: AsRef<str>>(
        var_names: &[S],
        sets: &[GeneSet],
        min_genes: usize,
    ) -> Self {
        let members: Vec<HashSet<String>> = sets
            .iter()
            .map(|set| set.genes.iter().map(|g| g.to_uppercase()).collect())
            .collect();

        let full = Array2::from_shape_fn((var_names.len(), sets.len()), |(g, t)| {
            members[t].contains(&var_names[g].as_ref().to_uppercase())
        });

        let kept: Vec<usize> = full
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| col.iter().filter(|&&m| m).count() > min_genes)
            .map(|(t, _)| t)
            .collect();

        debug!(
            "kept {} of {} gene sets with more than {min_genes} genes",
            kept.len(),
            sets.len()
        );

        let mask = full.select(Axis(1), &kept);
        let terms = kept.iter().map(|&t| term_name(&sets[t].name)).collect();
        Self { mask, terms }
    }

    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    pub fn n_vars(&self) -> usize {
        self.mask.nrows()
    }

    pub fn n_terms(&self) -> usize {
        self.mask.ncols()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Returns the amount of gene-term pairs without an annotation.
    pub fn n_unannotated(&self) -> usize {
        self.mask.iter().filter(|&&m| !m).count()
    }
}

/// Normalizes a raw gene-set name: upper-cased, collection prefix stripped, truncated.
fn term_name(raw: &str) -> String {
    let upper = raw.to_uppercase();
    let name = upper.split_once('_').map_or(upper.as_str(), |(_, rest)| rest);
    name.chars().take(MAX_TERM_NAME).collect()
}

/// Parses gene-set lines of the form `TERM gene gene ...`, skipping blank lines.
pub fn parse_gene_sets(text: &str) -> Vec<GeneSet> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?.to_string();
            let genes = fields.map(str::to_string).collect();
            Some(GeneSet { name, genes })
        })
        .collect()
}

/// Reads a gene-set file.
///
/// # Errors
/// `MlErr::Io` if the file cannot be read.
pub fn read_gene_sets<P: AsRef<Path>>(path: P) -> Result<Vec<GeneSet>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_gene_sets(&text))
}
