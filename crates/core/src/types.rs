use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::address::NormalizedAddress;

/// Geographic point expressed in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// A coordinate together with the address string it was resolved from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub address: NormalizedAddress,
}

/// The two fixed reference sites every employee is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Ave,
    Sm,
}

impl Site {
    /// Returns the label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ave => "AVE",
            Self::Sm => "SM",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinates of the AVE and SM reference sites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePoints {
    pub ave: Coordinate,
    pub sm: Coordinate,
}

impl ReferencePoints {
    pub fn get(&self, site: Site) -> Coordinate {
        match site {
            Site::Ave => self.ave,
            Site::Sm => self.sm,
        }
    }
}

/// Which address segments a record source provides to the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressLayout {
    /// `street number, barrio, localidad, provincia, country`
    #[default]
    Spreadsheet,
    /// `street number, barrio, partido, country`
    HrDirectory,
}

/// One employee as loaded from the input dataset. Immutable for a batch run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmployeeRecord {
    pub legajo: i64,
    pub apellido_nombre: String,
    pub barrio: Option<String>,
    pub partido: Option<String>,
    pub localidad: Option<String>,
    pub provincia: Option<String>,
    pub sitio: Option<String>,
    pub calle: Option<String>,
    pub numero: Option<String>,
    pub layout: AddressLayout,
}

impl EmployeeRecord {
    /// Builds the geocoding query for this record according to its layout.
    pub fn normalized_address(&self) -> NormalizedAddress {
        let street = self.calle.as_deref();
        let number = self.numero.as_deref();
        match self.layout {
            AddressLayout::Spreadsheet => NormalizedAddress::from_parts(
                street,
                number,
                &[
                    self.barrio.as_deref(),
                    self.localidad.as_deref(),
                    self.provincia.as_deref(),
                ],
            ),
            AddressLayout::HrDirectory => NormalizedAddress::from_parts(
                street,
                number,
                &[self.barrio.as_deref(), self.partido.as_deref()],
            ),
        }
    }

    /// Combines the record with computed distances into the persisted row.
    pub fn into_result_row(
        self,
        direccion: NormalizedAddress,
        distancia_ave: Option<u32>,
        distancia_sm: Option<u32>,
    ) -> ResultRow {
        ResultRow {
            legajo: self.legajo,
            apellido_nombre: self.apellido_nombre,
            barrio: self.barrio,
            partido: self.partido,
            direccion: direccion.into_string(),
            localidad: self.localidad,
            sitio: self.sitio,
            distancia_ave,
            distancia_sm,
        }
    }
}

/// Unit of persistence in `empleados_paro`, keyed by `legajo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub legajo: i64,
    pub apellido_nombre: String,
    pub barrio: Option<String>,
    pub partido: Option<String>,
    pub direccion: String,
    pub localidad: Option<String>,
    pub sitio: Option<String>,
    pub distancia_ave: Option<u32>,
    pub distancia_sm: Option<u32>,
}

/// Row appended to the manual review sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    #[serde(rename = "Fecha")]
    pub fecha: NaiveDate,
    #[serde(rename = "Legajo")]
    pub legajo: i64,
    #[serde(rename = "Nombre")]
    pub nombre: String,
    #[serde(rename = "Domicilio")]
    pub domicilio: String,
}

impl ReviewEntry {
    pub fn for_row(row: &ResultRow, fecha: NaiveDate) -> Self {
        Self {
            fecha,
            legajo: row.legajo,
            nombre: row.apellido_nombre.clone(),
            domicilio: row.direccion.clone(),
        }
    }
}

/// Aggregate counters describing one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub flagged: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(layout: AddressLayout) -> EmployeeRecord {
        EmployeeRecord {
            legajo: 42,
            apellido_nombre: "Perez, Ana".to_string(),
            barrio: Some("Centro".to_string()),
            partido: Some("Capital".to_string()),
            localidad: Some("Cordoba".to_string()),
            provincia: Some("Cordoba".to_string()),
            sitio: Some("AVE".to_string()),
            calle: Some("Calle 9".to_string()),
            numero: Some("100".to_string()),
            layout,
        }
    }

    #[test]
    fn spreadsheet_layout_uses_locality_and_province() {
        let address = record(AddressLayout::Spreadsheet).normalized_address();
        assert_eq!(
            address.as_str(),
            "Calle 9 100, Centro, Cordoba, Cordoba, Argentina"
        );
    }

    #[test]
    fn hr_layout_uses_partido() {
        let address = record(AddressLayout::HrDirectory).normalized_address();
        assert_eq!(address.as_str(), "Calle 9 100, Centro, Capital, Argentina");
    }

    #[test]
    fn result_row_keeps_zero_distance() {
        let rec = record(AddressLayout::Spreadsheet);
        let address = rec.normalized_address();
        let row = rec.into_result_row(address, Some(0), None);
        assert_eq!(row.distancia_ave, Some(0));
        assert_eq!(row.distancia_sm, None);
        assert_eq!(row.direccion, "Calle 9 100, Centro, Cordoba, Cordoba, Argentina");
    }

    #[test]
    fn result_row_serializes_with_column_names() {
        let rec = record(AddressLayout::Spreadsheet);
        let address = rec.normalized_address();
        let row = rec.into_result_row(address, Some(500), Some(750));
        let value = serde_json::to_value(&row).expect("serialize");
        assert_eq!(value["apellido_nombre"], "Perez, Ana");
        assert_eq!(value["distancia_ave"], 500);
        assert_eq!(value["distancia_sm"], 750);
    }
}
