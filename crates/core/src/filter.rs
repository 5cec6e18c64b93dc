use serde::Deserialize;

use crate::types::ResultRow;

/// Optional criteria accepted by the employee listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeFilter {
    #[serde(default)]
    pub legajo: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub sitio: Option<String>,
    #[serde(default)]
    pub distancia_ave_min: Option<u32>,
    #[serde(default)]
    pub distancia_ave_max: Option<u32>,
    #[serde(default)]
    pub distancia_sm_min: Option<u32>,
    #[serde(default)]
    pub distancia_sm_max: Option<u32>,
}

impl EmployeeFilter {
    /// Returns `true` when no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies every set criterion; unset criteria always pass.
    pub fn matches(&self, row: &ResultRow) -> bool {
        if let Some(legajo) = non_blank(&self.legajo) {
            if !row.legajo.to_string().contains(legajo) {
                return false;
            }
        }
        if let Some(nombre) = non_blank(&self.nombre) {
            if !contains_ignore_case(&row.apellido_nombre, nombre) {
                return false;
            }
        }
        if let Some(sitio) = non_blank(&self.sitio) {
            let matched = row
                .sitio
                .as_deref()
                .map(|value| contains_ignore_case(value, sitio))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }
        within(row.distancia_ave, self.distancia_ave_min, self.distancia_ave_max)
            && within(row.distancia_sm, self.distancia_sm_min, self.distancia_sm_max)
    }

    /// Keeps only the rows matching this filter, preserving order.
    pub fn apply(&self, rows: Vec<ResultRow>) -> Vec<ResultRow> {
        if self.is_empty() {
            return rows;
        }
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// A row without a distance only passes when no bound is requested.
fn within(value: Option<u32>, min: Option<u32>, max: Option<u32>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        legajo: i64,
        nombre: &str,
        sitio: Option<&str>,
        ave: Option<u32>,
        sm: Option<u32>,
    ) -> ResultRow {
        ResultRow {
            legajo,
            apellido_nombre: nombre.to_string(),
            barrio: None,
            partido: None,
            direccion: "Calle 1 1, , , , Argentina".to_string(),
            localidad: None,
            sitio: sitio.map(str::to_string),
            distancia_ave: ave,
            distancia_sm: sm,
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let rows = vec![
            row(1, "Gomez", None, None, None),
            row(2, "Lopez", Some("SM"), Some(10), Some(20)),
        ];
        let filter = EmployeeFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(rows.clone()), rows);
    }

    #[test]
    fn text_criteria_are_case_insensitive_substrings() {
        let filter = EmployeeFilter {
            nombre: Some("gom".to_string()),
            sitio: Some("ave".to_string()),
            ..EmployeeFilter::default()
        };
        assert!(filter.matches(&row(7, "Gomez, Ana", Some("AVE Centro"), None, None)));
        assert!(!filter.matches(&row(8, "Gomez, Luis", None, None, None)));
        assert!(!filter.matches(&row(9, "Lopez", Some("AVE"), None, None)));
    }

    #[test]
    fn legajo_matches_decimal_substring() {
        let filter = EmployeeFilter {
            legajo: Some("12".to_string()),
            ..EmployeeFilter::default()
        };
        assert!(filter.matches(&row(3120, "A", None, None, None)));
        assert!(!filter.matches(&row(31, "A", None, None, None)));
    }

    #[test]
    fn distance_bounds_are_inclusive_and_exclude_missing() {
        let filter = EmployeeFilter {
            distancia_ave_min: Some(100),
            distancia_ave_max: Some(500),
            ..EmployeeFilter::default()
        };
        assert!(filter.matches(&row(1, "A", None, Some(100), None)));
        assert!(filter.matches(&row(2, "A", None, Some(500), None)));
        assert!(!filter.matches(&row(3, "A", None, Some(501), None)));
        assert!(!filter.matches(&row(4, "A", None, None, Some(200))));
    }

    #[test]
    fn blank_text_is_ignored() {
        let filter = EmployeeFilter {
            nombre: Some("  ".to_string()),
            ..EmployeeFilter::default()
        };
        assert!(filter.matches(&row(1, "Anyone", None, None, None)));
    }
}
