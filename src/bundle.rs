//! Bundle descriptors: named groups of feature matrices processed in batch.
//!
//! A descriptor pairs a matrix source (already in memory, or a file to
//! load) with a value-type tag, a sort direction, and an optional
//! sub-matrix extraction. Descriptors are resolved once into plain
//! [`NamedMatrix`] values; the source variant never leaks past this module.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;

use crate::error::AssocError;
use crate::matrix::{self, NamedMatrix, ValueType};

/// Where a bundle entry's matrix comes from.
#[derive(Debug, Clone)]
pub enum MatrixSource {
    InMemory(NamedMatrix),
    File(PathBuf),
}

/// Which axis an extraction selects identifiers on. Selecting columns
/// transposes the result so the extracted identifiers become feature rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractAxis {
    Rows,
    Columns,
}

impl FromStr for ExtractAxis {
    type Err = AssocError;

    fn from_str(s: &str) -> Result<Self, AssocError> {
        match s {
            "rows" => Ok(ExtractAxis::Rows),
            "columns" => Ok(ExtractAxis::Columns),
            other => Err(AssocError::InvalidConfiguration(format!(
                "extraction axis must be 'rows' or 'columns'; got '{}'",
                other
            ))),
        }
    }
}

/// Optional sub-matrix instruction: identifiers to pull, and aliases to
/// rename the resulting rows.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub axis: ExtractAxis,
    pub ids: Vec<String>,
    pub aliases: Option<Vec<String>>,
}

/// One entry of a features bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub name: String,
    pub source: MatrixSource,
    pub value_type: ValueType,
    pub ascending: bool,
    pub extract: Option<Extraction>,
}

/// A bundle entry after resolution: a uniform in-memory matrix plus the
/// per-entry run settings.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub name: String,
    pub matrix: NamedMatrix,
    pub value_type: ValueType,
    pub ascending: bool,
}

impl BundleEntry {
    /// Load the matrix if needed and apply the extraction.
    pub fn resolve(self) -> Result<ResolvedEntry, AssocError> {
        let matrix = match self.source {
            MatrixSource::InMemory(matrix) => matrix,
            MatrixSource::File(path) => matrix::read_matrix_tsv(&path)?,
        };

        let matrix = match self.extract {
            None => matrix,
            Some(extraction) => {
                let mut sub = match extraction.axis {
                    ExtractAxis::Rows => matrix.select_rows_by_id(&extraction.ids)?,
                    ExtractAxis::Columns => {
                        matrix.select_columns_by_id(&extraction.ids)?.transposed()
                    }
                };
                if let Some(aliases) = extraction.aliases {
                    if aliases.len() != sub.rows.len() {
                        return Err(AssocError::InvalidConfiguration(format!(
                            "bundle entry '{}': {} aliases for {} extracted rows",
                            self.name,
                            aliases.len(),
                            sub.rows.len()
                        )));
                    }
                    sub.rows = aliases;
                }
                sub
            }
        };

        Ok(ResolvedEntry {
            name: self.name,
            matrix,
            value_type: self.value_type,
            ascending: self.ascending,
        })
    }
}

/// Read a JSON bundle file: an array of objects with `name` and `file`
/// (required), `value_type`, `ascending`, and the extraction fields `axis`,
/// `ids`, `aliases`.
pub fn read_bundle_file(path: &Path) -> Result<Vec<BundleEntry>, AssocError> {
    let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))
        .map_err(|e| AssocError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let entries = value.as_array().ok_or_else(|| AssocError::Parse {
        path: path.to_path_buf(),
        message: "bundle file must be a JSON array of entries".to_string(),
    })?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(entry, i, path))
        .collect()
}

fn parse_entry(entry: &Value, index: usize, path: &Path) -> Result<BundleEntry, AssocError> {
    let context = |message: String| AssocError::Parse {
        path: path.to_path_buf(),
        message: format!("bundle entry {}: {}", index, message),
    };

    let object = entry
        .as_object()
        .ok_or_else(|| context("not a JSON object".to_string()))?;
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| context("missing string field 'name'".to_string()))?
        .to_string();
    let file = object
        .get("file")
        .and_then(Value::as_str)
        .ok_or_else(|| context("missing string field 'file'".to_string()))?;

    let value_type = match object.get("value_type") {
        None => ValueType::Continuous,
        Some(tag) => tag
            .as_str()
            .ok_or_else(|| context("'value_type' must be a string".to_string()))?
            .parse()?,
    };
    let ascending = object
        .get("ascending")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let ids = string_list(object.get("ids"), "ids", &context)?;
    let aliases = string_list(object.get("aliases"), "aliases", &context)?;
    let axis = match object.get("axis") {
        None => None,
        Some(axis) => Some(
            axis.as_str()
                .ok_or_else(|| context("'axis' must be a string".to_string()))?
                .parse::<ExtractAxis>()?,
        ),
    };

    let extract = match (ids, axis) {
        (None, None) => {
            if aliases.is_some() {
                return Err(AssocError::InvalidConfiguration(format!(
                    "bundle entry '{}' has aliases but no extraction ids",
                    name
                )));
            }
            None
        }
        (Some(ids), Some(axis)) => Some(Extraction { axis, ids, aliases }),
        (Some(_), None) => {
            return Err(AssocError::InvalidConfiguration(format!(
                "bundle entry '{}' has extraction ids but no axis",
                name
            )))
        }
        (None, Some(_)) => {
            return Err(AssocError::InvalidConfiguration(format!(
                "bundle entry '{}' has an axis but no extraction ids",
                name
            )))
        }
    };

    Ok(BundleEntry {
        name,
        source: MatrixSource::File(PathBuf::from(file)),
        value_type,
        ascending,
        extract,
    })
}

fn string_list(
    value: Option<&Value>,
    field: &str,
    context: &impl Fn(String) -> AssocError,
) -> Result<Option<Vec<String>>, AssocError> {
    match value {
        None => Ok(None),
        Some(value) => {
            let items = value
                .as_array()
                .ok_or_else(|| context(format!("'{}' must be an array of strings", field)))?;
            items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        context(format!("'{}' must contain only strings", field))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> NamedMatrix {
        NamedMatrix::new(
            vec!["g1".into(), "g2".into(), "g3".into()],
            vec!["a".into(), "b".into()],
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn row_extraction_with_aliases() {
        let entry = BundleEntry {
            name: "demo".into(),
            source: MatrixSource::InMemory(matrix()),
            value_type: ValueType::Continuous,
            ascending: false,
            extract: Some(Extraction {
                axis: ExtractAxis::Rows,
                ids: vec!["g3".into(), "g1".into()],
                aliases: Some(vec!["late".into(), "early".into()]),
            }),
        };
        let resolved = entry.resolve().unwrap();
        assert_eq!(resolved.matrix.rows, vec!["late".to_string(), "early".to_string()]);
        assert_eq!(resolved.matrix.values.row(0).to_vec(), vec![5.0, 6.0]);
    }

    #[test]
    fn column_extraction_transposes() {
        let entry = BundleEntry {
            name: "demo".into(),
            source: MatrixSource::InMemory(matrix()),
            value_type: ValueType::Binary,
            ascending: true,
            extract: Some(Extraction {
                axis: ExtractAxis::Columns,
                ids: vec!["b".into()],
                aliases: None,
            }),
        };
        let resolved = entry.resolve().unwrap();
        assert_eq!(resolved.matrix.rows, vec!["b".to_string()]);
        assert_eq!(
            resolved.matrix.columns,
            vec!["g1".to_string(), "g2".to_string(), "g3".to_string()]
        );
        assert_eq!(resolved.matrix.values.row(0).to_vec(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn alias_arity_mismatch_is_rejected() {
        let entry = BundleEntry {
            name: "demo".into(),
            source: MatrixSource::InMemory(matrix()),
            value_type: ValueType::Continuous,
            ascending: false,
            extract: Some(Extraction {
                axis: ExtractAxis::Rows,
                ids: vec!["g1".into(), "g2".into()],
                aliases: Some(vec!["only-one".into()]),
            }),
        };
        assert!(matches!(
            entry.resolve().unwrap_err(),
            AssocError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn invalid_axis_and_value_type_tags_are_rejected() {
        assert!("diagonal".parse::<ExtractAxis>().is_err());
        assert!("ordinal".parse::<ValueType>().is_err());
    }
}
