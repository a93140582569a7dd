use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CurveError;

/// Loss and precision recorded at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub epoch: usize,
    pub loss: f32,
    pub prec: f32,
}

/// Per-epoch training history, kept in epoch order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingCurve {
    points: Vec<CurvePoint>,
}

impl TrainingCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an epoch. Recording an epoch at or before the last recorded
    /// one discards the later history first, as happens when a run resumes
    /// from an older checkpoint.
    pub fn record(&mut self, epoch: usize, loss: f32, prec: f32) {
        self.truncate_from(epoch);
        self.points.push(CurvePoint { epoch, loss, prec });
    }

    /// Drop every point with `epoch >= from`.
    pub fn truncate_from(&mut self, from: usize) {
        self.points.retain(|p| p.epoch < from);
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn epochs(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.epoch).collect()
    }

    pub fn losses(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.loss).collect()
    }

    pub fn precisions(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.prec).collect()
    }

    /// Point with the highest precision; the earliest wins ties.
    pub fn best(&self) -> Option<CurvePoint> {
        self.points
            .iter()
            .copied()
            .fold(None, |best: Option<CurvePoint>, p| match best {
                Some(b) if b.prec >= p.prec => Some(b),
                _ => Some(p),
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), CurveError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CurveError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
