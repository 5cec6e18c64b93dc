use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use csv::StringRecord;
use paro_core::ReviewEntry;
use thiserror::Error;

const HEADER: [&str; 4] = ["Fecha", "Legajo", "Nombre", "Domicilio"];

/// CSV sheet of addresses that need a manual look.
///
/// Each append reads the existing rows, adds one, and replaces the file
/// through a sibling temp file. Existing rows are carried over verbatim, so
/// hand-edited cells never block later appends.
#[derive(Debug, Clone)]
pub struct ReviewSheet {
    path: PathBuf,
}

impl ReviewSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends an entry and returns the number of rows now in the sheet.
    pub async fn append(&self, entry: ReviewEntry) -> Result<usize, ReviewSheetError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_blocking(&path, &entry))
            .await
            .map_err(|err| ReviewSheetError::Io(io::Error::new(io::ErrorKind::Other, err)))?
    }

    /// Reads every entry currently in the sheet; a missing file is empty.
    #[cfg(test)]
    pub async fn entries(&self) -> Result<Vec<ReviewEntry>, ReviewSheetError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let Some(file) = open_existing(&path)? else {
                return Ok(Vec::new());
            };
            csv::Reader::from_reader(file)
                .deserialize()
                .collect::<Result<Vec<ReviewEntry>, _>>()
                .map_err(ReviewSheetError::from)
        })
        .await
        .map_err(|err| ReviewSheetError::Io(io::Error::new(io::ErrorKind::Other, err)))?
    }
}

fn open_existing(path: &Path) -> Result<Option<fs::File>, ReviewSheetError> {
    match fs::File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Header and rows of the current sheet, untyped.
fn read_rows(path: &Path) -> Result<(StringRecord, Vec<StringRecord>), ReviewSheetError> {
    let default_header = || StringRecord::from(HEADER.to_vec());
    let Some(file) = open_existing(path)? else {
        return Ok((default_header(), Vec::new()));
    };
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let header = reader.headers()?.clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    if header.is_empty() {
        return Ok((default_header(), rows));
    }
    Ok((header, rows))
}

fn append_blocking(path: &Path, entry: &ReviewEntry) -> Result<usize, ReviewSheetError> {
    let (header, rows) = read_rows(path)?;
    let new_row = StringRecord::from(vec![
        entry.fecha.to_string(),
        entry.legajo.to_string(),
        entry.nombre.clone(),
        entry.domicilio.clone(),
    ]);

    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&tmp)?;
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.write_record(&new_row)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(rows.len() + 1)
}

#[derive(Debug, Error)]
pub enum ReviewSheetError {
    #[error("review sheet io error: {0}")]
    Io(#[from] io::Error),
    #[error("review sheet csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(legajo: i64, domicilio: &str) -> ReviewEntry {
        ReviewEntry {
            fecha: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            legajo,
            nombre: "Perez, Ana".to_string(),
            domicilio: domicilio.to_string(),
        }
    }

    #[tokio::test]
    async fn creates_sheet_with_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sheet = ReviewSheet::new(dir.path().join("review.csv"));

        let count = sheet.append(entry(7, "Mza 4 Casa 2, Argentina")).await.expect("append");
        assert_eq!(count, 1);

        let contents = std::fs::read_to_string(sheet.path()).expect("read");
        assert_eq!(
            contents,
            "Fecha,Legajo,Nombre,Domicilio\n2024-03-01,7,\"Perez, Ana\",\"Mza 4 Casa 2, Argentina\"\n"
        );
    }

    #[tokio::test]
    async fn preserves_existing_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sheet = ReviewSheet::new(dir.path().join("review.csv"));

        sheet.append(entry(1, "Lote 5")).await.expect("first");
        let count = sheet.append(entry(2, "Casa 3")).await.expect("second");
        assert_eq!(count, 2);

        let entries = sheet.entries().await.expect("entries");
        let legajos: Vec<i64> = entries.iter().map(|entry| entry.legajo).collect();
        assert_eq!(legajos, vec![1, 2]);
        assert!(!dir.path().join("review.csv.tmp").exists());
    }

    #[tokio::test]
    async fn hand_edited_rows_are_kept_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("review.csv");
        let existing = "Fecha,Legajo,Nombre,Domicilio\n01/03/2024,7,Ana,Mza 1 Casa 2\nrevisado,,,\n";
        std::fs::write(&path, existing).expect("seed sheet");
        let sheet = ReviewSheet::new(&path);

        let count = sheet.append(entry(8, "Lote 5")).await.expect("append");
        assert_eq!(count, 3);

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(
            contents,
            format!("{existing}2024-03-01,8,\"Perez, Ana\",Lote 5\n")
        );
    }

    #[tokio::test]
    async fn missing_sheet_reads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sheet = ReviewSheet::new(dir.path().join("none.csv"));
        assert!(sheet.entries().await.expect("entries").is_empty());
    }
}
