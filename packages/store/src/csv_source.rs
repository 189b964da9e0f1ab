//! Respondent rows from a CSV export.
//!
//! The export carries one row per respondent. The `barrio`, `localidad`,
//! `coordx` and `coordsy` columns describe where the respondent lives;
//! every other column is a question id whose cell holds the response.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::{Respondent, StoreError};

const BARRIO_COLUMN: &str = "barrio";
const LOCALIDAD_COLUMN: &str = "localidad";
const X_COLUMN: &str = "coordx";
const Y_COLUMN: &str = "coordsy";

/// Reads respondents from a CSV file on disk.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be opened or the header row is
/// missing the `barrio` column.
pub fn load_respondents(path: &Path) -> Result<Vec<Respondent>, StoreError> {
    let file = std::fs::File::open(path)?;
    let respondents = read_respondents(file)?;
    log::info!(
        "Loaded {} respondents from {}",
        respondents.len(),
        path.display()
    );
    Ok(respondents)
}

/// Reads respondents from any CSV source.
///
/// Rows without a neighborhood are skipped. Blank cells are treated as
/// unanswered questions. Coordinates accept either `.` or `,` as the
/// decimal separator.
///
/// # Errors
///
/// Returns [`StoreError`] if the CSV is malformed or has no `barrio` column.
pub fn read_respondents(reader: impl Read) -> Result<Vec<Respondent>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let Some(barrio_idx) = column(BARRIO_COLUMN) else {
        return Err(StoreError::Backend {
            message: format!("respondent CSV has no '{BARRIO_COLUMN}' column"),
        });
    };
    let localidad_idx = column(LOCALIDAD_COLUMN);
    let x_idx = column(X_COLUMN);
    let y_idx = column(Y_COLUMN);

    let fixed = [Some(barrio_idx), localidad_idx, x_idx, y_idx];
    let question_columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| !h.is_empty() && !fixed.contains(&Some(*i)))
        .map(|(i, h)| (i, h.as_str()))
        .collect();

    let mut respondents = Vec::new();
    let mut skipped = 0u64;

    for result in reader.records() {
        let record = result?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let Some(barrio) = cell(Some(barrio_idx)) else {
            skipped += 1;
            continue;
        };

        let answers: BTreeMap<String, String> = question_columns
            .iter()
            .filter_map(|(i, question_id)| {
                cell(Some(*i)).map(|v| ((*question_id).to_string(), v.to_string()))
            })
            .collect();

        respondents.push(Respondent {
            barrio: barrio.to_string(),
            localidad: cell(localidad_idx).unwrap_or_default().to_string(),
            coordx: cell(x_idx).and_then(parse_coordinate),
            coordsy: cell(y_idx).and_then(parse_coordinate),
            answers,
        });
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} respondent rows without a barrio");
    }

    Ok(respondents)
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok().filter(|v: &f64| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
barrio,localidad,coordx,coordsy,43,12
Riomar,Riomar,\"-74,82\",11.01,Subsidiado / SISBÉN,Primaria
 El Prado ,Norte Centro Histórico,-74.80,10.99,Contributivo,
,Riomar,-74.8,11.0,Contributivo,Primaria
";

    #[test]
    fn reads_answers_and_coordinates() {
        let respondents = read_respondents(SAMPLE.as_bytes()).unwrap();
        assert_eq!(respondents.len(), 2);

        let riomar = &respondents[0];
        assert_eq!(riomar.answer("43"), Some("Subsidiado / SISBÉN"));
        assert_eq!(riomar.coordx, Some(-74.82));

        let prado = &respondents[1];
        assert_eq!(prado.barrio, "El Prado");
        assert_eq!(prado.answer("12"), None);
        assert!(!prado.answers.contains_key("barrio"));
    }

    #[test]
    fn missing_barrio_column_is_an_error() {
        let err = read_respondents("localidad,43\nRiomar,Sí\n".as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
