//! Per-set-point acquisition and averaging.
//!
//! `SampleAverager` collects `readings_per_setpoint` accepted frames for one
//! bank, averages them per sensor and appends `(pressure, mean)` to the
//! running `CalibrationHistory`. Transport and decode failures are retried
//! with a linear backoff; anything else surfaces unchanged.

use tracing::{debug, error, info, warn};

use crate::bank::SensorBank;
use crate::config::AcquisitionCfg;
use crate::datalog::{DataLog, NullDataLog};
use crate::error::{BuildError, CalError, Result};
use crate::util::mean;

/// One `(reference pressure, average reading)` pair for a sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPoint {
    pub pressure: f64,
    pub reading: f64,
}

/// Sensor index → set-points in acquisition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationHistory {
    per_sensor: Vec<Vec<SetPoint>>,
}

impl CalibrationHistory {
    pub fn new(sensor_count: usize) -> Self {
        Self {
            per_sensor: vec![Vec::new(); sensor_count],
        }
    }

    pub fn sensor_count(&self) -> usize {
        self.per_sensor.len()
    }

    /// Number of set-points recorded.
    pub fn setpoints(&self) -> usize {
        self.per_sensor.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.setpoints() == 0
    }

    /// Append one set-point; `means` must hold one value per sensor.
    pub fn push(&mut self, pressure: f64, means: &[f64]) -> Result<()> {
        if means.len() != self.per_sensor.len() {
            return Err(CalError::DimensionMismatch {
                readings: means.len(),
                coefficients: self.per_sensor.len(),
            });
        }
        for (points, &reading) in self.per_sensor.iter_mut().zip(means) {
            points.push(SetPoint { pressure, reading });
        }
        Ok(())
    }

    pub fn points(&self, sensor: usize) -> &[SetPoint] {
        self.per_sensor.get(sensor).map_or(&[], Vec::as_slice)
    }

    /// Regression inputs for one sensor: x = average readings, y = pressures.
    pub fn xy(&self, sensor: usize) -> (Vec<f64>, Vec<f64>) {
        self.points(sensor)
            .iter()
            .map(|p| (p.reading, p.pressure))
            .unzip()
    }

    pub fn clear(&mut self) {
        for points in &mut self.per_sensor {
            points.clear();
        }
    }
}

/// Sensor index → samples for the current set-point.
#[derive(Debug, Clone, Default)]
pub struct ReadingSet {
    samples: Vec<Vec<f32>>,
}

impl ReadingSet {
    pub fn new(sensor_count: usize) -> Self {
        Self {
            samples: vec![Vec::new(); sensor_count],
        }
    }

    fn push_frame(&mut self, values: &[f32]) {
        for (samples, &v) in self.samples.iter_mut().zip(values) {
            samples.push(v);
        }
    }

    pub fn samples(&self, sensor: usize) -> &[f32] {
        self.samples.get(sensor).map_or(&[], Vec::as_slice)
    }

    /// Samples held for the sensor with the fewest.
    pub fn len(&self) -> usize {
        self.samples.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.iter().all(Vec::is_empty)
    }

    fn clear(&mut self) {
        for samples in &mut self.samples {
            samples.clear();
        }
    }
}

pub struct SampleAverager {
    sensor_count: usize,
    cfg: AcquisitionCfg,
    readings: ReadingSet,
    history: CalibrationHistory,
    raw_log: Box<dyn DataLog>,
    avg_log: Box<dyn DataLog>,
}

impl core::fmt::Debug for SampleAverager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SampleAverager")
            .field("sensor_count", &self.sensor_count)
            .field("cfg", &self.cfg)
            .field("pending", &self.readings.len())
            .field("setpoints", &self.history.setpoints())
            .finish()
    }
}

impl SampleAverager {
    pub fn new(sensor_count: usize, cfg: AcquisitionCfg) -> eyre::Result<Self> {
        if sensor_count == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor_count must be > 0",
            )));
        }
        if cfg.readings_per_setpoint == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "readings_per_setpoint must be >= 1",
            )));
        }
        Ok(Self {
            sensor_count,
            cfg,
            readings: ReadingSet::new(sensor_count),
            history: CalibrationHistory::new(sensor_count),
            raw_log: Box::new(NullDataLog),
            avg_log: Box::new(NullDataLog),
        })
    }

    /// Route accepted samples and set-point averages to the given logs.
    pub fn with_logs(mut self, raw: Box<dyn DataLog>, avg: Box<dyn DataLog>) -> Self {
        self.raw_log = raw;
        self.avg_log = avg;
        self
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    pub fn cfg(&self) -> &AcquisitionCfg {
        &self.cfg
    }

    pub fn readings(&self) -> &ReadingSet {
        &self.readings
    }

    pub fn history(&self) -> &CalibrationHistory {
        &self.history
    }

    /// Acquire one accepted sample from `bank` and add it to the reading set.
    ///
    /// On the first sample of a set-point the link is resynchronized once
    /// before reading; a failed resync is retried like any failed frame.
    pub fn take_reading(
        &mut self,
        bank: &SensorBank,
        is_first_of_set: bool,
        pressure: f64,
    ) -> Result<Vec<f32>> {
        if bank.sensor_count() != self.sensor_count {
            return Err(CalError::DimensionMismatch {
                readings: bank.sensor_count(),
                coefficients: self.sensor_count,
            });
        }
        let max_attempts = self.cfg.max_attempts.max(1);
        let mut pending_resync = is_first_of_set;
        let mut last = String::new();

        for attempt in 1..=max_attempts {
            match Self::attempt(bank, &mut pending_resync) {
                Ok(values) => {
                    let row: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
                    self.raw_log.record(pressure, &row)?;
                    self.readings.push_frame(&values);
                    debug!(bank = %bank.id(), attempt, pressure, "sample accepted");
                    return Ok(values);
                }
                Err(e) if e.is_retryable() => {
                    warn!(bank = %bank.id(), attempt, max_attempts, error = %e, "frame rejected");
                    last = e.to_string();
                    if attempt < max_attempts {
                        bank.clock().sleep(self.cfg.backoff_for(attempt));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        error!(bank = %bank.id(), attempts = max_attempts, last = %last, "acquisition exhausted");
        Err(CalError::AcquisitionExhausted {
            attempts: max_attempts,
            last,
        })
    }

    fn attempt(bank: &SensorBank, pending_resync: &mut bool) -> Result<Vec<f32>> {
        if *pending_resync {
            bank.read_frame(true)?;
            *pending_resync = false;
        }
        bank.read_decoded(false)
    }

    /// Average the reading set, log it, append it to the history and clear it.
    ///
    /// Nothing is committed unless the average row was logged.
    pub fn compute_average(&mut self, pressure: f64) -> Result<Vec<f64>> {
        let expected = self.cfg.readings_per_setpoint;
        let means = (0..self.sensor_count)
            .map(|sensor| {
                let samples: Vec<f64> = self
                    .readings
                    .samples(sensor)
                    .iter()
                    .map(|&v| f64::from(v))
                    .collect();
                match mean(&samples) {
                    Some(m) if samples.len() == expected => Ok(m),
                    _ => Err(CalError::IncompleteSample {
                        sensor,
                        expected,
                        actual: samples.len(),
                    }),
                }
            })
            .collect::<Result<Vec<f64>>>()?;

        self.avg_log.record(pressure, &means)?;
        self.history.push(pressure, &means)?;
        self.readings.clear();
        info!(pressure, setpoints = self.history.setpoints(), "set-point averaged");
        Ok(means)
    }

    /// Take `readings_per_setpoint` samples and average them.
    pub fn acquire_setpoint(&mut self, bank: &SensorBank, pressure: f64) -> Result<Vec<f64>> {
        self.acquire_setpoint_with(bank, pressure, |_| {})
    }

    /// Like `acquire_setpoint`, calling `on_sample` with the count taken so far.
    pub fn acquire_setpoint_with<F: FnMut(usize)>(
        &mut self,
        bank: &SensorBank,
        pressure: f64,
        mut on_sample: F,
    ) -> Result<Vec<f64>> {
        let total = self.cfg.readings_per_setpoint;
        for i in 0..total {
            self.take_reading(bank, i == 0, pressure)?;
            on_sample(i + 1);
        }
        self.compute_average(pressure)
    }

    /// Drop any partially collected set-point.
    pub fn discard_pending(&mut self) {
        self.readings.clear();
    }

    /// Replace the history, e.g. with one rebuilt from an average log.
    pub fn set_history(&mut self, history: CalibrationHistory) -> Result<()> {
        if history.sensor_count() != self.sensor_count {
            return Err(CalError::DimensionMismatch {
                readings: history.sensor_count(),
                coefficients: self.sensor_count,
            });
        }
        self.history = history;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_push_checks_width() {
        let mut h = CalibrationHistory::new(2);
        h.push(10.0, &[0.5, 0.6]).unwrap();
        assert_eq!(h.setpoints(), 1);
        assert!(matches!(
            h.push(20.0, &[0.5]),
            Err(CalError::DimensionMismatch { readings: 1, coefficients: 2 })
        ));
        let (x, y) = h.xy(1);
        assert_eq!(x, vec![0.6]);
        assert_eq!(y, vec![10.0]);
    }

    #[test]
    fn average_requires_full_reading_set() {
        let mut avg = SampleAverager::new(
            1,
            AcquisitionCfg {
                readings_per_setpoint: 2,
                ..AcquisitionCfg::default()
            },
        )
        .unwrap();
        avg.readings.push_frame(&[1.0]);
        assert_eq!(
            avg.compute_average(0.0),
            Err(CalError::IncompleteSample {
                sensor: 0,
                expected: 2,
                actual: 1
            })
        );
        avg.readings.push_frame(&[2.0]);
        assert_eq!(avg.compute_average(0.0).unwrap(), vec![1.5]);
        assert!(avg.readings().is_empty());
        assert_eq!(avg.history().points(0), &[SetPoint { pressure: 0.0, reading: 1.5 }]);
    }

    #[test]
    fn rejects_empty_set_points() {
        let cfg = AcquisitionCfg {
            readings_per_setpoint: 0,
            ..AcquisitionCfg::default()
        };
        let err = SampleAverager::new(2, cfg).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::InvalidConfig(m)) if m.contains("readings_per_setpoint")
        ));
        assert!(SampleAverager::new(0, AcquisitionCfg::default()).is_err());
    }
}
