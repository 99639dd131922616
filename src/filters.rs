use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

use crate::calc::CalcError;
use crate::db::AttendanceRecord;

/// Data-quality caveat shown next to the week filter: week numbers are only
/// mapped correctly for the 2022/23 through 2024/25 academic years.
pub const WEEK_NOTE: &str = "A representação atual das datas académicas está corretamente mapeada apenas para os anos letivos de 2022/23, 2023/24 e 2024/25, pelo que os valores de semanas letivas em anos anteriores poderão não estar corretos.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRange {
    pub min: i64,
    pub max: i64,
}

/// One immutable filter selection. Empty vectors restrict nothing; the week
/// range is inclusive on both ends.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSelection {
    pub years: Vec<String>,
    pub schools: Vec<String>,
    pub courses: Vec<String>,
    pub regimes: Vec<String>,
    pub curricular_units: Vec<String>,
    pub shifts: Vec<String>,
    pub components: Vec<String>,
    pub week_range: Option<WeekRange>,
    pub exclude_evaluations: bool,
}

pub fn parse_selection(raw: Option<&serde_json::Value>) -> Result<FilterSelection, CalcError> {
    let Some(raw) = raw else {
        return Ok(FilterSelection::default());
    };
    if raw.is_null() {
        return Ok(FilterSelection::default());
    }
    if !raw.is_object() {
        return Err(CalcError::new("bad_params", "selection must be an object"));
    }
    let selection: FilterSelection = serde_json::from_value(raw.clone())
        .map_err(|e| CalcError::new("bad_params", format!("invalid selection: {}", e)))?;
    if let Some(range) = &selection.week_range {
        if range.min > range.max {
            return Err(CalcError::with_details(
                "bad_params",
                "weekRange.min must not exceed weekRange.max",
                json!({ "weekRange": range }),
            ));
        }
    }
    Ok(selection)
}

/// Dependent option sets, one field per sidebar widget.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub schools: Vec<String>,
    pub courses: Vec<String>,
    pub regimes: Vec<String>,
    pub curricular_units: Vec<String>,
    pub shifts: Vec<String>,
    pub components: Vec<String>,
    pub week_range: Option<WeekRange>,
}

/// Evaluation/non-regular session: week zero, or the explicit no-shift marker.
pub fn is_evaluation(record: &AttendanceRecord) -> bool {
    record.semana == 0
        || (record.turno.as_deref() == Some("Sem Turno")
            && record.componente.as_deref() == Some("N/A"))
}

/// Derives the cascading option sets. Each stage narrows only by the
/// dimensions that come before it, so a selection never hides its own options.
pub fn cascade_options(records: &[AttendanceRecord], sel: &FilterSelection) -> FilterOptions {
    let mut years = distinct(records.iter().map(|r| Some(r.ano_letivo.as_str())));
    years.reverse();
    let schools = distinct(records.iter().map(|r| r.unidade.as_deref()));

    let by_school: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| {
            in_values(&sel.years, Some(r.ano_letivo.as_str()))
                && in_values(&sel.schools, r.unidade.as_deref())
        })
        .collect();
    let courses = distinct(by_school.iter().map(|r| r.curso.as_deref()));

    let by_course: Vec<&AttendanceRecord> = by_school
        .iter()
        .copied()
        .filter(|r| in_values(&sel.courses, r.curso.as_deref()))
        .collect();
    let regimes = distinct(by_course.iter().map(|r| r.regime.as_deref()));
    let curricular_units = distinct(by_course.iter().map(|r| r.uc.as_deref()));

    // The regime selection participates in final filtering only; options step
    // from course straight to curricular unit.
    let by_unit: Vec<&AttendanceRecord> = by_course
        .iter()
        .copied()
        .filter(|r| in_values(&sel.curricular_units, r.uc.as_deref()))
        .collect();
    let shifts = order_shifts(distinct(by_unit.iter().map(|r| r.turno.as_deref())));
    let components = distinct(by_unit.iter().map(|r| r.componente.as_deref()));
    let week_range = week_bounds(by_unit.iter().copied());

    FilterOptions {
        years,
        schools,
        courses,
        regimes,
        curricular_units,
        shifts,
        components,
        week_range,
    }
}

/// Applies the whole selection to the full base table, returning a fresh
/// working copy.
pub fn apply_selection(records: &[AttendanceRecord], sel: &FilterSelection) -> Vec<AttendanceRecord> {
    records
        .iter()
        .filter(|r| matches_selection(r, sel))
        .cloned()
        .collect()
}

fn matches_selection(record: &AttendanceRecord, sel: &FilterSelection) -> bool {
    if !in_values(&sel.years, Some(record.ano_letivo.as_str())) {
        return false;
    }
    if !in_values(&sel.schools, record.unidade.as_deref()) {
        return false;
    }
    if !in_values(&sel.courses, record.curso.as_deref()) {
        return false;
    }
    if !in_values(&sel.regimes, record.regime.as_deref()) {
        return false;
    }
    if !in_values(&sel.curricular_units, record.uc.as_deref()) {
        return false;
    }
    if !in_values(&sel.shifts, record.turno.as_deref()) {
        return false;
    }
    if !in_values(&sel.components, record.componente.as_deref()) {
        return false;
    }
    if let Some(range) = &sel.week_range {
        if record.semana < range.min || record.semana > range.max {
            return false;
        }
    }
    if sel.exclude_evaluations && is_evaluation(record) {
        return false;
    }
    true
}

/// Empty selection passes everything; a NULL cell never matches a non-empty
/// selection.
fn in_values(selected: &[String], value: Option<&str>) -> bool {
    if selected.is_empty() {
        return true;
    }
    match value {
        Some(v) => selected.iter().any(|s| s == v),
        None => false,
    }
}

pub fn week_bounds<'a, I>(records: I) -> Option<WeekRange>
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut bounds: Option<(i64, i64)> = None;
    for r in records {
        bounds = Some(match bounds {
            None => (r.semana, r.semana),
            Some((lo, hi)) => (lo.min(r.semana), hi.max(r.semana)),
        });
    }
    bounds.map(|(min, max)| WeekRange { min, max })
}

/// Shift dropdown order: named shifts first in lexical order, then numeric
/// shifts by integer value.
pub fn order_shifts(values: Vec<String>) -> Vec<String> {
    let (mut numeric, mut named): (Vec<String>, Vec<String>) =
        values.into_iter().partition(|v| is_numeric_shift(v));
    numeric.sort_by_key(|v| v.parse::<i64>().unwrap_or(i64::MAX));
    named.sort();
    named.extend(numeric);
    named
}

fn is_numeric_shift(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn distinct<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut set = BTreeSet::new();
    for v in values.into_iter().flatten() {
        set.insert(v.to_string());
    }
    set.into_iter().collect()
}
