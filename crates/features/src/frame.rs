//! Column-oriented table of named numeric features over ordered timestamps.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use kilnwatch_core::{
    AnalyticsError, AnalyticsResult, MATERIAL_COLUMNS, MaterialSample, QUALITY_COLUMNS,
    QualitySample, SENSOR_CHANNELS, SensorSample,
};

/// Named feature columns sharing one timestamp axis.
///
/// Column order is insertion order and is significant: model schemas are
/// built from it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    timestamps: Vec<DateTime<Utc>>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
}

impl FeatureFrame {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    /// Column by name, or `MissingColumn`.
    pub fn require(&self, name: &str) -> AnalyticsResult<&[f64]> {
        self.column(name)
            .ok_or_else(|| AnalyticsError::missing_column(name))
    }

    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name).and_then(|c| c.get(row).copied())
    }

    /// Insert a column, replacing an existing one of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> AnalyticsResult<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(AnalyticsError::malformed(format!(
                "column `{name}` has {} rows, frame has {}",
                values.len(),
                self.len()
            )));
        }
        match self.index.get(&name) {
            Some(&i) => self.columns[i] = values,
            None => {
                self.index.insert(name.clone(), self.names.len());
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    pub(crate) fn column_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.columns[i]
    }

    /// Row-major matrix of the given columns, in the given order.
    pub fn select(&self, names: &[String]) -> AnalyticsResult<Vec<Vec<f64>>> {
        let cols = names
            .iter()
            .map(|n| self.require(n))
            .collect::<AnalyticsResult<Vec<_>>>()?;
        Ok((0..self.len())
            .map(|r| cols.iter().map(|c| c[r]).collect())
            .collect())
    }

    /// All columns of one row keyed by name.
    pub fn row_map(&self, row: usize) -> BTreeMap<String, f64> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter_map(|(n, c)| c.get(row).map(|v| (n.clone(), *v)))
            .collect()
    }

    /// Keep only rows where `keep[row]` is true.
    pub fn filter_rows(&self, keep: &[bool]) -> FeatureFrame {
        let pick = |i: usize| keep.get(i).copied().unwrap_or(false);
        let mut out = FeatureFrame::new(
            self.timestamps
                .iter()
                .enumerate()
                .filter(|(i, _)| pick(*i))
                .map(|(_, t)| *t)
                .collect(),
        );
        out.names = self.names.clone();
        out.index = self.index.clone();
        out.columns = self
            .columns
            .iter()
            .map(|c| {
                c.iter()
                    .enumerate()
                    .filter(|(i, _)| pick(*i))
                    .map(|(_, v)| *v)
                    .collect()
            })
            .collect();
        out
    }

    /// The trailing `n` rows (all rows if fewer).
    pub fn tail(&self, n: usize) -> FeatureFrame {
        let start = self.len().saturating_sub(n);
        let keep: Vec<bool> = (0..self.len()).map(|i| i >= start).collect();
        self.filter_rows(&keep)
    }

    pub fn from_sensor_samples(samples: &[SensorSample]) -> Self {
        let mut frame = Self::new(samples.iter().map(|s| s.timestamp).collect());
        for (i, name) in SENSOR_CHANNELS.iter().enumerate() {
            frame.push_unchecked(name, samples.iter().map(|s| s.channels()[i]).collect());
        }
        frame
    }

    /// Material samples are repaired (see [`MaterialSample::repaired`]) on the way in.
    pub fn from_material_samples(samples: &[MaterialSample]) -> Self {
        let repaired: Vec<MaterialSample> = samples.iter().map(MaterialSample::repaired).collect();
        let mut frame = Self::new(repaired.iter().map(|s| s.timestamp).collect());
        for (i, name) in MATERIAL_COLUMNS.iter().enumerate() {
            frame.push_unchecked(name, repaired.iter().map(|s| s.columns()[i]).collect());
        }
        frame
    }

    pub fn from_quality_samples(samples: &[QualitySample]) -> Self {
        let mut frame = Self::new(samples.iter().map(|s| s.timestamp).collect());
        for (i, name) in QUALITY_COLUMNS.iter().enumerate() {
            frame.push_unchecked(name, samples.iter().map(|s| s.columns()[i]).collect());
        }
        frame.push_unchecked(
            "quality_grade",
            samples.iter().map(|s| f64::from(s.grade().as_u8())).collect(),
        );
        frame
    }

    fn push_unchecked(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.len());
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.columns.push(values);
    }

    /// Attach the columns of `right` to every row of `self`, taking the
    /// `right` row whose timestamp is nearest (ties go to the earlier row).
    ///
    /// Both frames must be ordered by timestamp. Columns already present in
    /// `self` are kept from `self`. When `right` is empty its columns are
    /// absent and nothing is attached.
    pub fn merge_asof_nearest(&self, right: &FeatureFrame) -> FeatureFrame {
        let mut out = self.clone();
        if right.is_empty() {
            return out;
        }

        let picks: Vec<usize> = self
            .timestamps
            .iter()
            .map(|t| nearest_index(&right.timestamps, *t))
            .collect();

        for (name, col) in right.names.iter().zip(&right.columns) {
            if out.contains(name) {
                continue;
            }
            out.push_unchecked(name, picks.iter().map(|&j| col[j]).collect());
        }
        out
    }
}

fn nearest_index(sorted: &[DateTime<Utc>], t: DateTime<Utc>) -> usize {
    let after = sorted.partition_point(|x| *x < t);
    if after == 0 {
        return 0;
    }
    if after == sorted.len() {
        return sorted.len() - 1;
    }
    let before = after - 1;
    if t - sorted[before] <= sorted[after] - t {
        before
    } else {
        after
    }
}
