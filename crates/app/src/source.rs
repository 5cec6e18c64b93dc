use std::{
    io,
    path::{Path, PathBuf},
};

use calamine::{open_workbook_auto, Data, Reader};
use paro_core::{AddressLayout, EmployeeRecord};
use paro_storage::{HrDirectory, HrDirectoryError};
use paro_util::{AppConfig, EmployeeSourceConfig};
use thiserror::Error;

const LEGAJO: &[&str] = &["legajo"];
const NOMBRE: &[&str] = &["apellido y nombre", "apellidonombre", "nombre"];
const BARRIO: &[&str] = &["barrio"];
const PARTIDO: &[&str] = &["partido"];
const LOCALIDAD: &[&str] = &["localidad"];
const PROVINCIA: &[&str] = &["provincia"];
const SITIO: &[&str] = &["sitio", "sucursal"];
const CALLE: &[&str] = &["calle"];
const NUMERO: &[&str] = &["nº", "n°", "no", "numero", "número"];

/// Where a batch reads its employees from.
#[derive(Clone)]
pub enum EmployeeSource {
    Spreadsheet(PathBuf),
    HrDirectory(HrDirectory),
}

/// A dataset row that could not become an [`EmployeeRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based row number in the sheet, counting the header.
    pub row: usize,
    pub nombre: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedDataset {
    pub records: Vec<EmployeeRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl EmployeeSource {
    pub async fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        match &config.source {
            EmployeeSourceConfig::Spreadsheet { path } => Ok(Self::Spreadsheet(path.clone())),
            EmployeeSourceConfig::HrDatabase { url } => {
                Ok(Self::HrDirectory(HrDirectory::connect(url).await?))
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Spreadsheet(_) => "spreadsheet",
            Self::HrDirectory(_) => "hr_directory",
        }
    }

    /// Loads the full dataset in source order.
    pub async fn load(&self) -> Result<LoadedDataset, SourceError> {
        match self {
            Self::Spreadsheet(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_spreadsheet(&path))
                    .await
                    .map_err(|err| SourceError::Io(io::Error::new(io::ErrorKind::Other, err)))?
            }
            Self::HrDirectory(directory) => Ok(LoadedDataset {
                records: directory.fetch_active().await?,
                rejected: Vec::new(),
            }),
        }
    }
}

fn load_spreadsheet(path: &Path) -> Result<LoadedDataset, SourceError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let rows = if is_csv {
        read_csv_rows(path)?
    } else {
        read_workbook_rows(path)?
    };
    parse_rows(rows)
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| SourceError::Csv(path.to_path_buf(), err))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| SourceError::Csv(path.to_path_buf(), err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<String>>, SourceError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|err| SourceError::Workbook(path.to_path_buf(), err))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SourceError::EmptyWorkbook(path.to_path_buf()))?
        .map_err(|err| SourceError::Workbook(path.to_path_buf(), err))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Renders a cell as text; integral numbers lose their `.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::Float(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        other => other.to_string(),
    }
}

struct Columns {
    legajo: usize,
    nombre: Option<usize>,
    barrio: Option<usize>,
    partido: Option<usize>,
    localidad: Option<usize>,
    provincia: Option<usize>,
    sitio: Option<usize>,
    calle: Option<usize>,
    numero: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Result<Self, SourceError> {
        let find = |names: &[&str]| {
            header.iter().position(|cell| {
                let cell = cell.trim().to_lowercase();
                names.iter().any(|name| *name == cell)
            })
        };
        Ok(Self {
            legajo: find(LEGAJO).ok_or(SourceError::MissingColumn("Legajo"))?,
            nombre: find(NOMBRE),
            barrio: find(BARRIO),
            partido: find(PARTIDO),
            localidad: find(LOCALIDAD),
            provincia: find(PROVINCIA),
            sitio: find(SITIO),
            calle: find(CALLE),
            numero: find(NUMERO),
        })
    }
}

fn parse_rows(rows: Vec<Vec<String>>) -> Result<LoadedDataset, SourceError> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(LoadedDataset::default());
    };
    let columns = Columns::from_header(&header)?;

    let mut dataset = LoadedDataset::default();
    for (index, row) in rows.enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let cell = |column: Option<usize>| {
            column
                .and_then(|column| row.get(column))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let nombre = cell(columns.nombre);
        let row_number = index + 2;

        let legajo = match cell(Some(columns.legajo)) {
            None => {
                dataset.rejected.push(RejectedRow {
                    row: row_number,
                    nombre,
                    reason: "legajo faltante".to_string(),
                });
                continue;
            }
            Some(raw) => match raw.parse::<i64>() {
                Ok(legajo) => legajo,
                Err(_) => {
                    dataset.rejected.push(RejectedRow {
                        row: row_number,
                        nombre,
                        reason: format!("legajo inválido: {raw}"),
                    });
                    continue;
                }
            },
        };

        dataset.records.push(EmployeeRecord {
            legajo,
            apellido_nombre: nombre.unwrap_or_default(),
            barrio: cell(columns.barrio),
            partido: cell(columns.partido),
            localidad: cell(columns.localidad),
            provincia: cell(columns.provincia),
            sitio: cell(columns.sitio),
            calle: cell(columns.calle),
            numero: cell(columns.numero),
            layout: AddressLayout::Spreadsheet,
        });
    }
    Ok(dataset)
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read spreadsheet {0}: {1}")]
    Workbook(PathBuf, calamine::Error),
    #[error("failed to read csv {0}: {1}")]
    Csv(PathBuf, csv::Error),
    #[error("spreadsheet {0} has no sheets")]
    EmptyWorkbook(PathBuf),
    #[error("spreadsheet header is missing the {0} column")]
    MissingColumn(&'static str),
    #[error("employee source io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Directory(#[from] HrDirectoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Legajo,Apellido y Nombre,Barrio,Partido,Localidad,Provincia,Sitio,Calle,Nº\n";

    fn write_csv(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("DOMICILIOS.csv");
        std::fs::write(&path, format!("{HEADER}{body}")).expect("write csv");
        path
    }

    #[tokio::test]
    async fn loads_csv_rows_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            &dir,
            "42,\"Perez, Ana\",Centro,Capital,Cordoba,Cordoba,AVE,Calle 9,100\n\
             43, Gomez Luis ,Norte,  ,Rio Cuarto,Cordoba,SM,Belgrano,\n",
        );

        let dataset = EmployeeSource::Spreadsheet(path).load().await.expect("load");
        assert!(dataset.rejected.is_empty());
        assert_eq!(dataset.records.len(), 2);

        let first = &dataset.records[0];
        assert_eq!(first.legajo, 42);
        assert_eq!(first.apellido_nombre, "Perez, Ana");
        assert_eq!(
            first.normalized_address().as_str(),
            "Calle 9 100, Centro, Cordoba, Cordoba, Argentina"
        );

        let second = &dataset.records[1];
        assert_eq!(second.apellido_nombre, "Gomez Luis");
        assert_eq!(second.partido, None);
        assert_eq!(second.numero, None);
    }

    #[tokio::test]
    async fn rejects_rows_without_valid_legajo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_csv(
            &dir,
            ",Sin Legajo,,,,,,,\nabc,Legajo Raro,,,,,,,\n,,,,,,,,\n7,Valido,,,,,,,\n",
        );

        let dataset = EmployeeSource::Spreadsheet(path).load().await.expect("load");
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].legajo, 7);
        assert_eq!(dataset.rejected.len(), 2);
        assert_eq!(dataset.rejected[0].row, 2);
        assert_eq!(dataset.rejected[0].nombre.as_deref(), Some("Sin Legajo"));
        assert_eq!(dataset.rejected[1].reason, "legajo inválido: abc");
    }

    #[tokio::test]
    async fn missing_legajo_column_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "Nombre,Calle\nAna,Calle 9\n").expect("write");

        let err = EmployeeSource::Spreadsheet(path).load().await.expect_err("no legajo");
        assert!(matches!(err, SourceError::MissingColumn("Legajo")));
    }

    #[tokio::test]
    async fn missing_workbook_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = EmployeeSource::Spreadsheet(dir.path().join("DOMICILIOS.xlsx"))
            .load()
            .await
            .expect_err("missing file");
        assert!(matches!(err, SourceError::Workbook(..)));
    }

    #[test]
    fn integral_floats_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(1234.0)), "1234");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Calle 9".into())), "Calle 9");
    }
}
