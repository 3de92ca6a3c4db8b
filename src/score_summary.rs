use crate::models::ScoreRecord;

/// Profile statistics derived from a user's score history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSummary {
    pub completed_count: usize,
    pub average_percentage: u32,
}

impl ScoreSummary {
    /// Average of the per-record ratios, not of pooled scores over pooled totals.
    pub fn from_records(records: &[ScoreRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let ratio_sum: f64 = records.iter().map(ScoreRecord::ratio).sum();
        let mean = ratio_sum / records.len() as f64;

        Self {
            completed_count: records.len(),
            average_percentage: (mean * 100.0).round() as u32,
        }
    }
}
