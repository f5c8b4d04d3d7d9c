//! Calibration session over every configured bank.
//!
//! Each bank is paired with its own `SampleAverager` and `CalibrationStore`.
//! `acquire_setpoint` reads all banks concurrently, one scoped thread per
//! bank, and reports progress over a channel drained on the caller's thread.

use std::sync::Arc;

use crossbeam_channel as xch;
use ptcal_traits::SerialLink;
use tracing::{error, info};

use crate::apply::{TestReport, run_test};
use crate::averager::{CalibrationHistory, SampleAverager};
use crate::bank::SensorBank;
use crate::builder::SensorBankBuilder;
use crate::config::AcquisitionCfg;
use crate::datalog::FileDataLog;
use crate::error::{BuildError, CalError, Result};
use crate::regression::{Coefficients, fit_all_and_store};
use crate::store::CalibrationStore;

/// Events emitted while a set-point is being acquired.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Sample {
        bank_id: String,
        taken: usize,
        total: usize,
    },
    Averaged {
        bank_id: String,
        means: Vec<f64>,
        /// Wall time spent on the set-point, measured on the bank's clock.
        elapsed_ms: u64,
    },
    Failed {
        bank_id: String,
        error: CalError,
    },
}

/// A bank with the state that accumulates against it.
#[derive(Debug)]
pub struct BankRig {
    bank: Arc<SensorBank>,
    averager: SampleAverager,
    store: CalibrationStore,
}

impl BankRig {
    pub fn new(bank: SensorBank, averager: SampleAverager, store: CalibrationStore) -> Self {
        Self {
            bank: Arc::new(bank),
            averager,
            store,
        }
    }

    pub fn bank(&self) -> &Arc<SensorBank> {
        &self.bank
    }

    pub fn averager(&self) -> &SampleAverager {
        &self.averager
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    fn acquire(&mut self, pressure: f64, tx: &xch::Sender<Progress>) -> Result<Vec<f64>> {
        let bank_id = self.bank.id().to_string();
        let total = self.averager.cfg().readings_per_setpoint;
        let started = self.bank.clock().now();
        self.averager.discard_pending();
        let result = self
            .averager
            .acquire_setpoint_with(&self.bank, pressure, |taken| {
                // Receiver gone means the caller stopped listening; keep acquiring.
                let _ = tx.send(Progress::Sample {
                    bank_id: bank_id.clone(),
                    taken,
                    total,
                });
            });
        let event = match &result {
            Ok(means) => Progress::Averaged {
                bank_id: bank_id.clone(),
                means: means.clone(),
                elapsed_ms: self.bank.clock().ms_since(started),
            },
            Err(e) => Progress::Failed {
                bank_id: bank_id.clone(),
                error: e.clone(),
            },
        };
        let _ = tx.send(event);
        result
    }
}

#[derive(Debug, Default)]
pub struct CalibrationSession {
    rigs: Vec<BankRig>,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a rig per configured bank. `open_link` supplies each bank's
    /// transport. With `record_data`, raw and average logs are truncated
    /// and written under `[logs].dir` and the calibration log is opened for
    /// appending; otherwise every log is left untouched.
    pub fn from_config<F>(
        cfg: &ptcal_config::Config,
        record_data: bool,
        open_link: F,
    ) -> eyre::Result<Self>
    where
        F: FnMut(&ptcal_config::BankCfg) -> eyre::Result<Box<dyn SerialLink + Send>>,
    {
        let banks: Vec<&ptcal_config::BankCfg> = cfg.banks.iter().collect();
        Self::from_config_banks(cfg, &banks, record_data, open_link)
    }

    /// Like [`CalibrationSession::from_config`], for a subset of the
    /// configured banks. Links of banks not listed are never opened.
    pub fn from_config_banks<F>(
        cfg: &ptcal_config::Config,
        banks: &[&ptcal_config::BankCfg],
        record_data: bool,
        mut open_link: F,
    ) -> eyre::Result<Self>
    where
        F: FnMut(&ptcal_config::BankCfg) -> eyre::Result<Box<dyn SerialLink + Send>>,
    {
        let acq: AcquisitionCfg = (&cfg.acquisition).into();
        let mut session = Self::new();
        for &bank_cfg in banks {
            let link = open_link(bank_cfg)?;
            let bank = SensorBankBuilder::from_config(cfg, bank_cfg)
                .with_boxed_link(link)
                .build()?;
            let id = bank.id().to_string();
            let mut averager = SampleAverager::new(bank.sensor_count(), acq.clone())?;
            let store = if record_data {
                averager = averager.with_logs(
                    Box::new(FileDataLog::create(cfg.logs.raw_path(&id))?),
                    Box::new(FileDataLog::create(cfg.logs.avg_path(&id))?),
                );
                CalibrationStore::open(cfg.logs.cal_path(&id))?
            } else {
                CalibrationStore::reader(cfg.logs.cal_path(&id))
            };
            session.add_bank(BankRig::new(bank, averager, store))?;
        }
        Ok(session)
    }

    pub fn add_bank(&mut self, rig: BankRig) -> eyre::Result<()> {
        if self.rigs.iter().any(|r| r.bank.id() == rig.bank.id()) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "bank ids must be unique",
            )));
        }
        self.rigs.push(rig);
        Ok(())
    }

    pub fn bank_ids(&self) -> impl Iterator<Item = &str> {
        self.rigs.iter().map(|r| r.bank.id())
    }

    pub fn rigs(&self) -> &[BankRig] {
        &self.rigs
    }

    pub fn rig(&self, bank_id: &str) -> Result<&BankRig> {
        self.rigs
            .iter()
            .find(|r| r.bank.id() == bank_id)
            .ok_or_else(|| CalError::UnknownBank(bank_id.to_string()))
    }

    fn rig_mut(&mut self, bank_id: &str) -> Result<&mut BankRig> {
        self.rigs
            .iter_mut()
            .find(|r| r.bank.id() == bank_id)
            .ok_or_else(|| CalError::UnknownBank(bank_id.to_string()))
    }

    /// Take a full set of samples for one bank at `pressure`.
    pub fn start_acquisition(&mut self, bank_id: &str, pressure: f64) -> Result<()> {
        let rig = self.rig_mut(bank_id)?;
        rig.averager.discard_pending();
        let total = rig.averager.cfg().readings_per_setpoint;
        for i in 0..total {
            rig.averager.take_reading(&rig.bank, i == 0, pressure)?;
        }
        Ok(())
    }

    pub fn compute_averages(&mut self, bank_id: &str, pressure: f64) -> Result<Vec<f64>> {
        self.rig_mut(bank_id)?.averager.compute_average(pressure)
    }

    /// Fit the bank's history and persist the coefficients.
    pub fn run_regression(&mut self, bank_id: &str) -> Result<Vec<Coefficients>> {
        let rig = self.rig(bank_id)?;
        fit_all_and_store(rig.averager.history(), &rig.store)
    }

    pub fn apply_test(&self, bank_id: &str) -> Result<TestReport> {
        let rig = self.rig(bank_id)?;
        run_test(&rig.bank, &rig.store)
    }

    pub fn history(&self, bank_id: &str) -> Result<&CalibrationHistory> {
        Ok(self.rig(bank_id)?.averager.history())
    }

    pub fn set_history(&mut self, bank_id: &str, history: CalibrationHistory) -> Result<()> {
        self.rig_mut(bank_id)?.averager.set_history(history)
    }

    /// Acquire and average one set-point on every bank concurrently.
    ///
    /// Every bank runs to completion or failure before this returns. On
    /// failure the first error in bank order is returned; banks that
    /// succeeded keep their new set-point.
    pub fn acquire_setpoint<F: FnMut(Progress)>(
        &mut self,
        pressure: f64,
        mut on_progress: F,
    ) -> Result<Vec<(String, Vec<f64>)>> {
        let (tx, rx) = xch::unbounded::<Progress>();
        let results: Vec<(String, Result<Vec<f64>>)> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .rigs
                .iter_mut()
                .map(|rig| {
                    let tx = tx.clone();
                    let id = rig.bank.id().to_string();
                    let handle = s.spawn(move || rig.acquire(pressure, &tx));
                    (id, handle)
                })
                .collect();
            drop(tx);
            for event in rx.iter() {
                on_progress(event);
            }
            handles
                .into_iter()
                .map(|(id, h)| {
                    let res = h.join().unwrap_or_else(|_| {
                        Err(CalError::Io(format!("{id}: acquisition thread panicked")))
                    });
                    (id, res)
                })
                .collect()
        });

        let mut out = Vec::with_capacity(results.len());
        let mut first_err = None;
        for (id, res) in results {
            match res {
                Ok(means) => out.push((id, means)),
                Err(e) => {
                    error!(bank = %id, error = %e, pressure, "set-point failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        info!(pressure, banks = out.len(), "set-point acquired on all banks");
        Ok(out)
    }

    /// Fit and persist every bank.
    pub fn run_all_regressions(&mut self) -> Result<Vec<(String, Vec<Coefficients>)>> {
        self.rigs
            .iter()
            .map(|rig| {
                fit_all_and_store(rig.averager.history(), &rig.store)
                    .map(|c| (rig.bank.id().to_string(), c))
            })
            .collect()
    }
}
