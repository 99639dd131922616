use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::db::AttendanceRecord;

/// Weekly chart marker: week five is the course-wide attendance control
/// checkpoint, drawn on every series regardless of the filtered range.
pub const CHECKPOINT_WEEK: i64 = 5;
pub const CHECKPOINT_LABEL: &str = "Controlo de Presenças";

pub const RANKING_LIMIT: usize = 15;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: &str, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }
}

/// Impact band for one session: under 10 present is low, 10 to 15 inclusive
/// is medium, above 15 is high.
pub fn impact_for(presencas: i64) -> Impact {
    if presencas < 10 {
        Impact::Low
    } else if presencas <= 15 {
        Impact::Medium
    } else {
        Impact::High
    }
}

/// Compact shift label used by the aggregations: component glued to the shift
/// text, with the regime in parentheses. Absent parts render as empty text.
pub fn shift_label(componente: Option<&str>, turno: Option<&str>, regime: Option<&str>) -> String {
    format!(
        "{}{} ({})",
        componente.unwrap_or(""),
        turno.unwrap_or(""),
        regime.unwrap_or("")
    )
}

/// One report row after filtering: the school-year column is dropped (it is a
/// filter dimension, not a display column) and the derived fields are attached.
#[derive(Debug, Clone)]
pub struct DerivedRow {
    pub unidade: Option<String>,
    pub curso: Option<String>,
    pub regime: Option<String>,
    pub uc: Option<String>,
    pub turno: Option<String>,
    pub componente: Option<String>,
    pub semana: i64,
    pub data: NaiveDate,
    pub presencas: i64,
    pub impacto: Impact,
    pub turno_simples: String,
}

/// Builds display rows from the filtered records, newest session first.
/// Same-day rows keep their load order.
pub fn derive_rows(filtered: &[AttendanceRecord]) -> Vec<DerivedRow> {
    let mut rows: Vec<DerivedRow> = filtered
        .iter()
        .map(|r| DerivedRow {
            unidade: r.unidade.clone(),
            curso: r.curso.clone(),
            regime: r.regime.clone(),
            uc: r.uc.clone(),
            turno: r.turno.clone(),
            componente: r.componente.clone(),
            semana: r.semana,
            data: r.data,
            presencas: r.presencas,
            impacto: impact_for(r.presencas),
            turno_simples: shift_label(
                r.componente.as_deref(),
                r.turno.as_deref(),
                r.regime.as_deref(),
            ),
        })
        .collect();
    rows.sort_by(|a, b| b.data.cmp(&a.data));
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekPoint {
    pub semana: i64,
    pub presencas: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesLine {
    pub turno_simples: String,
    pub points: Vec<WeekPoint>,
}

#[derive(Debug, Clone)]
pub struct WeeklySeries {
    pub series: Vec<SeriesLine>,
    pub week_min: i64,
    pub week_max: i64,
}

/// Sums attendance per shift label per teaching week. Lines come out in label
/// order, points in week order.
pub fn weekly_series(rows: &[DerivedRow]) -> Option<WeeklySeries> {
    if rows.is_empty() {
        return None;
    }

    let mut sums: BTreeMap<String, BTreeMap<i64, i64>> = BTreeMap::new();
    let mut week_min = i64::MAX;
    let mut week_max = i64::MIN;
    for r in rows {
        *sums
            .entry(r.turno_simples.clone())
            .or_default()
            .entry(r.semana)
            .or_insert(0) += r.presencas;
        week_min = week_min.min(r.semana);
        week_max = week_max.max(r.semana);
    }

    let series = sums
        .into_iter()
        .map(|(turno_simples, weeks)| SeriesLine {
            turno_simples,
            points: weeks
                .into_iter()
                .map(|(semana, presencas)| WeekPoint { semana, presencas })
                .collect(),
        })
        .collect();

    Some(WeeklySeries {
        series,
        week_min,
        week_max,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub curso: String,
    pub uc: String,
    pub regime: String,
    pub turno: String,
    pub componente: String,
    pub turno_simples: String,
    pub media: f64,
}

/// Lowest mean attendance per (course, UC, regime, shift, component) group,
/// ascending, capped at RANKING_LIMIT entries. Sessions with zero present are
/// left out of the mean, and groups missing any key field are left out of the
/// ranking altogether.
pub fn low_attendance_ranking(rows: &[DerivedRow]) -> Vec<RankingEntry> {
    let mut groups: BTreeMap<(String, String, String, String, String), (i64, usize)> =
        BTreeMap::new();
    for r in rows {
        if r.presencas <= 0 {
            continue;
        }
        let (Some(curso), Some(uc), Some(regime), Some(turno), Some(componente)) = (
            r.curso.as_ref(),
            r.uc.as_ref(),
            r.regime.as_ref(),
            r.turno.as_ref(),
            r.componente.as_ref(),
        ) else {
            continue;
        };
        let key = (
            curso.clone(),
            uc.clone(),
            regime.clone(),
            turno.clone(),
            componente.clone(),
        );
        let slot = groups.entry(key).or_insert((0, 0));
        slot.0 += r.presencas;
        slot.1 += 1;
    }

    let mut entries: Vec<RankingEntry> = groups
        .into_iter()
        .map(|((curso, uc, regime, turno, componente), (total, count))| RankingEntry {
            turno_simples: shift_label(Some(&componente), Some(&turno), Some(&regime)),
            media: total as f64 / count as f64,
            curso,
            uc,
            regime,
            turno,
            componente,
        })
        .collect();
    entries.sort_by(|a, b| a.media.partial_cmp(&b.media).unwrap_or(Ordering::Equal));
    entries.truncate(RANKING_LIMIT);
    entries
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftStats {
    pub turno_simples: String,
    pub minimo: i64,
    pub mediana: f64,
    pub maximo: i64,
}

/// Min, median and max attendance per shift label, weakest shift first.
/// Zero-attendance sessions are excluded here as well.
pub fn shift_stats(rows: &[DerivedRow]) -> Vec<ShiftStats> {
    let mut groups: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for r in rows {
        if r.presencas > 0 {
            groups
                .entry(r.turno_simples.clone())
                .or_default()
                .push(r.presencas);
        }
    }

    let mut stats: Vec<ShiftStats> = groups
        .into_iter()
        .map(|(turno_simples, counts)| ShiftStats {
            turno_simples,
            minimo: counts.iter().copied().min().unwrap_or(0),
            mediana: median(&counts),
            maximo: counts.iter().copied().max().unwrap_or(0),
        })
        .collect();
    stats.sort_by(|a, b| a.minimo.cmp(&b.minimo));
    stats
}

pub fn median(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) as f64 / 2.0
    }
}
