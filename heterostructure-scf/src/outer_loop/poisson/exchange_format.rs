//! Text tables exchanged with the external elliptic solver
//!
//! Input tables carry the axis positions followed by the values in row-major order:
//!
//! ```text
//! y 3
//! -10 0 10
//!
//! z 2
//! -5 0
//! data
//! 0.1 0.2 0.3 0.4 0.5 0.6
//! ```
//!
//! Result files are a flat list of whitespace separated values in the same ordering.

use super::PoissonError;
use crate::fields::GridField;
use itertools::Itertools;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Write `field` as an input table at `path`
pub(crate) fn write_table(path: &Path, field: &GridField) -> Result<(), PoissonError> {
    let io = |e| PoissonError::io(path, e);
    let (ny, nz) = field.shape();
    let mut writer = BufWriter::new(File::create(path).map_err(io)?);
    let y_positions = (0..ny).map(|i| field.ymin() + i as f64 * field.dy());
    let z_positions = (0..nz).map(|j| field.zmin() + j as f64 * field.dz());
    writeln!(writer, "y {ny}").map_err(io)?;
    writeln!(writer, "{}", y_positions.format(" ")).map_err(io)?;
    writeln!(writer).map_err(io)?;
    writeln!(writer, "z {nz}").map_err(io)?;
    writeln!(writer, "{}", z_positions.format(" ")).map_err(io)?;
    writeln!(writer, "data").map_err(io)?;
    for value in field.values().iter() {
        writeln!(writer, "{value}").map_err(io)?;
    }
    writer.flush().map_err(io)
}

/// Write `key value` pairs, one per line
pub(crate) fn write_key_values(path: &Path, pairs: &[(&str, f64)]) -> Result<(), PoissonError> {
    let io = |e| PoissonError::io(path, e);
    let mut writer = BufWriter::new(File::create(path).map_err(io)?);
    for (key, value) in pairs {
        writeln!(writer, "{key} {value}").map_err(io)?;
    }
    writer.flush().map_err(io)
}

/// Parse a result file holding exactly `expected` values
pub(crate) fn read_values(path: &Path, expected: usize) -> Result<Vec<f64>, PoissonError> {
    let contents = std::fs::read_to_string(path).map_err(|e| PoissonError::io(path, e))?;
    let values = contents
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| PoissonError::Parse {
                file: path.to_path_buf(),
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != expected {
        return Err(PoissonError::PointCount {
            file: path.to_path_buf(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use super::{read_values, write_table};
    use crate::{fields::GridField, outer_loop::poisson::PoissonError};
    use heterostructure_mesher::RegularGrid2d;

    #[test]
    fn tables_list_positions_then_row_major_values() {
        let grid = RegularGrid2d::new([3, 4], [10., 5.], [-10., -15.]).unwrap();
        let field = GridField::from_fn(&grid, |(i, j)| (10 * i + j) as f64);
        let path = std::env::temp_dir().join("heterostructure_exchange_table.dat");
        write_table(&path, &field).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "y 3");
        assert_eq!(lines[1], "-10 0 10");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "z 4");
        assert_eq!(lines[4], "-15 -10 -5 0");
        assert_eq!(lines[5], "data");
        assert_eq!(lines[6..9], ["0", "1", "2"]);
        assert_eq!(lines[10], "10");
        assert_eq!(lines.len(), 6 + 12);
    }

    #[test]
    fn short_results_are_rejected() {
        let path = std::env::temp_dir().join("heterostructure_short_result.dat");
        std::fs::write(&path, "1.0 2.0\n3.0\n\n").unwrap();
        let result = read_values(&path, 4);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            result,
            Err(PoissonError::PointCount {
                expected: 4,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn malformed_tokens_are_reported() {
        let path = std::env::temp_dir().join("heterostructure_malformed_result.dat");
        std::fs::write(&path, "1.0 nope 3.0").unwrap();
        let result = read_values(&path, 3);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(PoissonError::Parse { token, .. }) if token == "nope"));
    }
}
