//! Labeled vectors and matrices shared by every pipeline stage.
//!
//! A [`Target`] is one named value per sample; a [`NamedMatrix`] holds one
//! feature per row over the same sample universe. Both are immutable for the
//! duration of an association run.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};

use crate::error::AssocError;

/// Value domain of a target or feature matrix. Carried through to the
/// rendering collaborator; scoring always operates on the numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Continuous,
    Categorical,
    Binary,
}

impl FromStr for ValueType {
    type Err = AssocError;

    fn from_str(s: &str) -> Result<Self, AssocError> {
        match s {
            "continuous" => Ok(ValueType::Continuous),
            "categorical" => Ok(ValueType::Categorical),
            "binary" => Ok(ValueType::Binary),
            other => Err(AssocError::InvalidConfiguration(format!(
                "value type must be one of continuous, categorical, binary; got '{}'",
                other
            ))),
        }
    }
}

/// An ordered, named vector of per-sample values.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub samples: Vec<String>,
    pub values: Array1<f64>,
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        samples: Vec<String>,
        values: Array1<f64>,
    ) -> Result<Self, AssocError> {
        if samples.len() != values.len() {
            return Err(AssocError::InvalidConfiguration(format!(
                "target has {} sample identifiers but {} values",
                samples.len(),
                values.len()
            )));
        }
        let unique: HashSet<&str> = samples.iter().map(String::as_str).collect();
        if unique.len() != samples.len() {
            return Err(AssocError::InvalidConfiguration(
                "target sample identifiers are not unique".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            samples,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A feature-by-sample matrix with unique row and column identifiers.
#[derive(Debug, Clone)]
pub struct NamedMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl NamedMatrix {
    pub fn new(
        rows: Vec<String>,
        columns: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, AssocError> {
        if values.nrows() != rows.len() || values.ncols() != columns.len() {
            return Err(AssocError::InvalidConfiguration(format!(
                "matrix shape {}x{} does not match {} row and {} column identifiers",
                values.nrows(),
                values.ncols(),
                rows.len(),
                columns.len()
            )));
        }
        for (ids, axis) in [(&rows, "row"), (&columns, "column")] {
            let unique: HashSet<&str> = ids.iter().map(String::as_str).collect();
            if unique.len() != ids.len() {
                return Err(AssocError::InvalidConfiguration(format!(
                    "matrix {} identifiers are not unique",
                    axis
                )));
            }
        }
        Ok(Self {
            rows,
            columns,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Sub-matrix of the given row positions, in the given order.
    pub fn select_rows(&self, positions: &[usize]) -> NamedMatrix {
        NamedMatrix {
            rows: positions.iter().map(|&i| self.rows[i].clone()).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), positions),
        }
    }

    /// Sub-matrix of the given row identifiers, in the given order.
    pub fn select_rows_by_id(&self, ids: &[String]) -> Result<NamedMatrix, AssocError> {
        let positions = self.positions_of(&self.rows, ids, "row")?;
        Ok(self.select_rows(&positions))
    }

    /// Sub-matrix of the given column identifiers, in the given order.
    pub fn select_columns_by_id(&self, ids: &[String]) -> Result<NamedMatrix, AssocError> {
        let positions = self.positions_of(&self.columns, ids, "column")?;
        Ok(NamedMatrix {
            rows: self.rows.clone(),
            columns: ids.to_vec(),
            values: self.values.select(Axis(1), &positions),
        })
    }

    /// Swap rows and columns.
    pub fn transposed(&self) -> NamedMatrix {
        NamedMatrix {
            rows: self.columns.clone(),
            columns: self.rows.clone(),
            values: self.values.t().to_owned(),
        }
    }

    fn positions_of(
        &self,
        universe: &[String],
        ids: &[String],
        axis: &str,
    ) -> Result<Vec<usize>, AssocError> {
        let index: HashMap<&str, usize> = universe
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        ids.iter()
            .map(|id| {
                index.get(id.as_str()).copied().ok_or_else(|| {
                    AssocError::InvalidConfiguration(format!(
                        "unknown {} identifier '{}'",
                        axis, id
                    ))
                })
            })
            .collect()
    }
}

/// Restrict target and features to their shared samples and fix the sample
/// order by sorting the target descending by value (ties in any order).
///
/// Every downstream stage relies on this order; it is what makes the panel
/// read left to right from the highest target value.
pub fn align(target: &Target, features: &NamedMatrix) -> Result<(Target, NamedMatrix), AssocError> {
    let column_positions: HashMap<&str, usize> = features
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut shared: Vec<(usize, usize)> = target
        .samples
        .iter()
        .enumerate()
        .filter_map(|(ti, sample)| column_positions.get(sample.as_str()).map(|&ci| (ti, ci)))
        .collect();

    if shared.is_empty() {
        return Err(AssocError::EmptyIntersection {
            target_samples: target.len(),
            feature_samples: features.ncols(),
        });
    }

    shared.sort_by(|a, b| target.values[b.0].total_cmp(&target.values[a.0]));

    let samples: Vec<String> = shared
        .iter()
        .map(|&(ti, _)| target.samples[ti].clone())
        .collect();
    let values = Array1::from_iter(shared.iter().map(|&(ti, _)| target.values[ti]));
    let column_order: Vec<usize> = shared.iter().map(|&(_, ci)| ci).collect();

    let aligned_features = NamedMatrix {
        rows: features.rows.clone(),
        columns: samples.clone(),
        values: features.values.select(Axis(1), &column_order),
    };
    let aligned_target = Target {
        name: target.name.clone(),
        samples,
        values,
    };
    Ok((aligned_target, aligned_features))
}

/// Drop feature rows with fewer than `min_unique` distinct values; such rows
/// cannot carry signal. Returns the retained matrix and the dropped count.
pub fn drop_degenerate(
    features: &NamedMatrix,
    min_unique: usize,
) -> Result<(NamedMatrix, usize), AssocError> {
    let keep: Vec<usize> = (0..features.nrows())
        .filter(|&i| distinct_values(features.values.row(i).iter().copied()) >= min_unique)
        .collect();
    if keep.is_empty() {
        return Err(AssocError::NoViableFeatures { min_unique });
    }
    let dropped = features.nrows() - keep.len();
    Ok((features.select_rows(&keep), dropped))
}

fn distinct_values(values: impl Iterator<Item = f64>) -> usize {
    let mut seen = HashSet::new();
    for v in values {
        // 0.0 and -0.0 count as one value
        let bits = if v == 0.0 { 0u64 } else { v.to_bits() };
        seen.insert(bits);
    }
    seen.len()
}

/// Read a tab-separated feature-by-sample matrix. The first header field is a
/// corner label and is ignored; the rest are sample identifiers. Each data
/// row is a feature identifier followed by one numeric value per sample.
pub fn read_matrix_tsv(path: &Path) -> Result<NamedMatrix, AssocError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = lines.next().transpose()?.ok_or_else(|| AssocError::Parse {
        path: path.to_path_buf(),
        message: "file is empty".to_string(),
    })?;
    let columns: Vec<String> = header.split('\t').skip(1).map(str::to_string).collect();
    if columns.is_empty() {
        return Err(AssocError::Parse {
            path: path.to_path_buf(),
            message: "header declares no sample columns".to_string(),
        });
    }

    let mut rows = Vec::new();
    let mut flat = Vec::new();
    for (line_number, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let id = fields.next().unwrap_or_default();
        rows.push(id.to_string());
        let mut count = 0usize;
        for field in fields {
            let value: f64 = field.parse().map_err(|_| AssocError::Parse {
                path: path.to_path_buf(),
                message: format!(
                    "line {}: '{}' is not a number",
                    line_number + 2,
                    field
                ),
            })?;
            flat.push(value);
            count += 1;
        }
        if count != columns.len() {
            return Err(AssocError::Parse {
                path: path.to_path_buf(),
                message: format!(
                    "line {}: expected {} values, found {}",
                    line_number + 2,
                    columns.len(),
                    count
                ),
            });
        }
    }

    let values = Array2::from_shape_vec((rows.len(), columns.len()), flat).map_err(|e| {
        AssocError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    NamedMatrix::new(rows, columns, values)
}

/// Read a two-column tab-separated target file. The header names the value
/// column (`sample\t<target name>`); each data row is `sample\tvalue`.
pub fn read_target_tsv(path: &Path) -> Result<Target, AssocError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = lines.next().transpose()?.ok_or_else(|| AssocError::Parse {
        path: path.to_path_buf(),
        message: "file is empty".to_string(),
    })?;
    let name = header
        .split('\t')
        .nth(1)
        .unwrap_or("target")
        .to_string();

    let mut samples = Vec::new();
    let mut values = Vec::new();
    for (line_number, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let sample = fields.next().unwrap_or_default();
        let value = fields.next().ok_or_else(|| AssocError::Parse {
            path: path.to_path_buf(),
            message: format!("line {}: missing value field", line_number + 2),
        })?;
        samples.push(sample.to_string());
        values.push(value.parse::<f64>().map_err(|_| AssocError::Parse {
            path: path.to_path_buf(),
            message: format!("line {}: '{}' is not a number", line_number + 2, value),
        })?);
    }

    Target::new(name, samples, Array1::from_vec(values))
}
