//! Read-only data-quality report on the raw dataset.

use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, Float64Array, Scalar};
use arrow::compute::kernels::aggregate::{max, min, sum};
use arrow::compute::kernels::boolean::or;
use arrow::compute::kernels::cmp::{eq, gt, lt};
use arrow::compute::kernels::numeric::{mul, sub};
use arrow::datatypes::DataType;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::core::frame::{as_floats, as_lists, as_strings, cast_lenient, MovieFrame};
use crate::utils::ReelResult;

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Columns where a negative number is always an error.
const NON_NEGATIVE_COLUMNS: [&str; 4] = ["vote_count", "budget", "revenue", "runtime"];

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub rows: usize,
    pub nulls: BTreeMap<String, usize>,
    pub empty_strings: BTreeMap<String, usize>,
    pub zeros: BTreeMap<String, usize>,
    pub empty_lists: BTreeMap<String, usize>,
    pub numeric: BTreeMap<String, NumericSummary>,
    pub malformed_dates: Option<usize>,
    pub negatives: BTreeMap<String, usize>,
    pub votes_out_of_scale: Option<usize>,
}

fn scalar(v: f64) -> Scalar<Float64Array> {
    Scalar::new(Float64Array::from(vec![v]))
}

fn floats(col: &ArrayRef) -> ReelResult<ArrayRef> {
    cast_lenient(col, &DataType::Float64)
}

fn summarize(values: &ArrayRef) -> ReelResult<Option<NumericSummary>> {
    let nums = as_floats(values)?;
    let count = nums.len() - nums.null_count();
    let (Some(total), Some(lo), Some(hi)) = (sum(nums), min(nums), max(nums)) else {
        return Ok(None);
    };
    let mean = total / count as f64;
    // sample standard deviation, 0 for a single value
    let std_dev = if count > 1 {
        let deviation = sub(values, &scalar(mean))?;
        let squared = mul(&deviation, &deviation)?;
        (sum(as_floats(&squared)?).unwrap_or(0.0) / (count as f64 - 1.0)).sqrt()
    } else {
        0.0
    };
    Ok(Some(NumericSummary { count, mean, min: lo, max: hi, std_dev }))
}

pub fn inspect(frame: &MovieFrame) -> ReelResult<QualityReport> {
    let mut report = QualityReport { rows: frame.height(), ..Default::default() };
    let schema = frame.batch().schema();

    for (field, col) in schema.fields().iter().zip(frame.batch().columns()) {
        let name = field.name().clone();
        report.nulls.insert(name.clone(), col.logical_null_count());

        match field.data_type() {
            DataType::Utf8 => {
                let empty = as_strings(col)?.iter().filter(|s| *s == Some("")).count();
                report.empty_strings.insert(name, empty);
            }
            dtype if dtype.is_numeric() => {
                let values = floats(col)?;
                report.zeros.insert(name.clone(), eq(&values, &scalar(0.0))?.true_count());
                if let Some(summary) = summarize(&values)? {
                    report.numeric.insert(name, summary);
                }
            }
            DataType::List(_) => {
                let lists = as_lists(col)?;
                let empty = (0..lists.len())
                    .filter(|&i| lists.is_valid(i) && lists.value_length(i) == 0)
                    .count();
                report.empty_lists.insert(name, empty);
            }
            _ => {}
        }
    }

    if let Some(col) = frame.column("release_date") {
        let text = cast_lenient(col, &DataType::Utf8)?;
        let malformed = as_strings(&text)?
            .iter()
            .flatten()
            .filter(|s| !s.is_empty() && !ISO_DATE_RE.is_match(s))
            .count();
        report.malformed_dates = Some(malformed);
    }

    for name in NON_NEGATIVE_COLUMNS {
        if let Some(col) = frame.column(name) {
            let negative = lt(&floats(col)?, &scalar(0.0))?.true_count();
            report.negatives.insert(name.to_string(), negative);
        }
    }

    if let Some(col) = frame.column("vote_average") {
        let values = floats(col)?;
        let out = or(&lt(&values, &scalar(0.0))?, &gt(&values, &scalar(10.0))?)?;
        report.votes_out_of_scale = Some(out.true_count());
    }

    Ok(report)
}

impl QualityReport {
    /// Total of every problem counter: nulls, blanks, empty lists, malformed and out-of-range values.
    /// Zeros are not counted; they are often legitimate.
    pub fn issue_count(&self) -> usize {
        self.nulls.values().sum::<usize>()
            + self.empty_strings.values().sum::<usize>()
            + self.empty_lists.values().sum::<usize>()
            + self.negatives.values().sum::<usize>()
            + self.malformed_dates.unwrap_or(0)
            + self.votes_out_of_scale.unwrap_or(0)
    }

    pub fn log(&self) {
        info!(target: "reelpipe::quality", rows = self.rows, issues = self.issue_count(), "Data quality report");
        let non_zero = |m: &BTreeMap<String, usize>| -> String {
            m.iter()
                .filter(|(_, n)| **n > 0)
                .map(|(k, n)| format!("{k}={n}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        info!(target: "reelpipe::quality", "  nulls: [{}]", non_zero(&self.nulls));
        info!(target: "reelpipe::quality", "  empty strings: [{}]", non_zero(&self.empty_strings));
        info!(target: "reelpipe::quality", "  zeros: [{}]", non_zero(&self.zeros));
        info!(target: "reelpipe::quality", "  empty lists: [{}]", non_zero(&self.empty_lists));
        info!(target: "reelpipe::quality", "  negatives: [{}]", non_zero(&self.negatives));
        if let Some(n) = self.malformed_dates {
            info!(target: "reelpipe::quality", "  malformed release dates: {n}");
        }
        if let Some(n) = self.votes_out_of_scale {
            info!(target: "reelpipe::quality", "  vote averages outside 0-10: {n}");
        }
        for (name, s) in &self.numeric {
            info!(
                target: "reelpipe::quality",
                "  {name}: count={} mean={:.2} min={:.2} max={:.2} std={:.2}",
                s.count, s.mean, s.min, s.max, s.std_dev
            );
        }
    }
}
