use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::integrator::IntegrationStats;
use crate::config::Configuration;

/// Integrated amounts per compartment, paired with the configuration that
/// produced them. Immutable once created.
#[derive(Debug, Clone)]
pub struct Solution {
    times: Vec<f64>,
    trajectory: DMatrix<f64>,
    labels: Vec<String>,
    configuration: Configuration,
    stats: IntegrationStats,
}

/// Peak and exposure metrics of one compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSummary {
    pub label: String,
    pub max_amount: f64,
    pub time_to_max: f64,
    pub auc: f64,
}

impl Solution {
    pub(crate) fn new(
        times: Vec<f64>,
        states: &[Vec<f64>],
        labels: Vec<String>,
        configuration: Configuration,
        stats: IntegrationStats,
    ) -> Self {
        let trajectory = DMatrix::from_fn(labels.len(), times.len(), |row, col| states[col][row]);
        Self {
            times,
            trajectory,
            labels,
            configuration,
            stats,
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// `[compartments x time points]` matrix of amounts.
    pub fn trajectory(&self) -> &DMatrix<f64> {
        &self.trajectory
    }

    pub fn shape(&self) -> (usize, usize) {
        self.trajectory.shape()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    pub fn compartment(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.trajectory.nrows() {
            return None;
        }
        Some(self.trajectory.row(index).iter().copied().collect())
    }

    pub fn central_index(&self) -> usize {
        self.labels.iter().position(|l| l == "central").unwrap_or(0)
    }

    pub fn central(&self) -> Vec<f64> {
        self.trajectory.row(self.central_index()).iter().copied().collect()
    }

    /// Total amount across compartments at each time point.
    pub fn total_amount(&self) -> Vec<f64> {
        let ones = DVector::from_element(self.trajectory.nrows(), 1.0);
        (self.trajectory.transpose() * ones).iter().copied().collect()
    }

    pub fn max_amount(&self, index: usize) -> Option<f64> {
        self.compartment(index)
            .map(|amounts| amounts.into_iter().fold(0.0, f64::max))
    }

    pub fn time_to_max(&self, index: usize) -> Option<f64> {
        let amounts = self.compartment(index)?;
        amounts
            .iter()
            .zip(&self.times)
            .max_by(|a, b| a.0.total_cmp(b.0))
            .map(|(_, &t)| t)
    }

    /// Area under the amount-time curve by the trapezoidal rule.
    pub fn auc(&self, index: usize) -> Option<f64> {
        let amounts = self.compartment(index)?;
        let mut auc = 0.0;
        for (t, q) in self.times.windows(2).zip(amounts.windows(2)) {
            auc += (t[1] - t[0]) * (q[0] + q[1]) / 2.0;
        }
        Some(auc)
    }

    pub fn summary(&self) -> Vec<CompartmentSummary> {
        (0..self.labels.len())
            .map(|i| CompartmentSummary {
                label: self.labels[i].clone(),
                max_amount: self.max_amount(i).unwrap_or(0.0),
                time_to_max: self.time_to_max(i).unwrap_or(0.0),
                auc: self.auc(i).unwrap_or(0.0),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn sample() -> Solution {
        let times = vec![0.0, 1.0, 2.0];
        let states = vec![vec![0.0, 0.0], vec![2.0, 1.0], vec![1.0, 3.0]];
        Solution::new(
            times,
            &states,
            vec!["central".to_string(), "periph_1".to_string()],
            Configuration::new(json!({"name": "sample"})),
            IntegrationStats::default(),
        )
    }

    #[test]
    fn test_shape_and_rows() {
        let solution = sample();
        assert_eq!(solution.shape(), (2, 3));
        assert_eq!(solution.central(), vec![0.0, 2.0, 1.0]);
        assert_eq!(solution.compartment(1), Some(vec![0.0, 1.0, 3.0]));
        assert_eq!(solution.compartment(2), None);
        assert_eq!(solution.total_amount(), vec![0.0, 3.0, 4.0]);
        assert_eq!(solution.configuration().name(), Some("sample"));
    }

    #[test]
    fn test_summary_metrics() {
        let solution = sample();
        assert_eq!(solution.max_amount(0), Some(2.0));
        assert_eq!(solution.time_to_max(0), Some(1.0));
        assert_relative_eq!(solution.auc(0).unwrap(), 2.5);
        assert_relative_eq!(solution.auc(1).unwrap(), 2.5);

        let summary = solution.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[1].label, "periph_1");
        assert_eq!(summary[1].time_to_max, 2.0);
    }
}
