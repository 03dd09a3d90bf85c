use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// One feedback-loop iteration as seen by the controller.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LoopSample {
    pub maneuver: &'static str,
    pub iteration: u64,
    pub elapsed_ms: f64,
    /// Reflectance per side, `None` where that sensor was not read this iteration.
    pub left_reading: Option<f64>,
    pub right_reading: Option<f64>,
    pub left_speed: Option<i32>,
    pub right_speed: Option<i32>,
    pub angle: Option<i32>,
}

/// Per-iteration telemetry store.
/// Clones share the same buffer, so one recorder can be handed to every controller.
#[derive(Clone, Default)]
pub struct TelemetryRecorder {
    samples: Arc<Mutex<Vec<LoopSample>>>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::with_capacity(10_000))),
        }
    }

    pub fn record(&self, sample: LoopSample) {
        if let Ok(mut data) = self.samples.lock() {
            data.push(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self) -> Vec<LoopSample> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Samples recorded for one maneuver name, in order.
    pub fn samples_for(&self, maneuver: &str) -> Vec<LoopSample> {
        self.samples()
            .into_iter()
            .filter(|s| s.maneuver == maneuver)
            .collect()
    }

    pub fn save_to_csv(&self, path: impl AsRef<Path>) -> Result<usize, csv::Error> {
        let data = self.samples();
        let mut wtr = csv::Writer::from_path(path)?;
        for record in &data {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(data.len())
    }
}
