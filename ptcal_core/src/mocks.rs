//! Test and helper mocks for ptcal_core

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ptcal_traits::SerialLink;

use crate::datalog::DataLog;
use crate::error::Result;
use crate::frame::encode;

enum Step {
    Data(Vec<u8>),
    Idle,
    Fail(String),
    TimedOut,
}

/// A link that replays a fixed script of reads.
///
/// Data chunks are handed out at most `buf.len()` bytes at a time; the rest
/// of a chunk is served by the next read. An exhausted script reads as idle.
/// `clear_input` only counts calls, since scripted bytes model what arrives
/// after the flush.
#[derive(Default)]
pub struct ScriptedLink {
    steps: VecDeque<Step>,
    clears: Arc<AtomicUsize>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.steps.push_back(Step::Data(bytes.to_vec()));
        self
    }

    /// One encoded frame, terminator included.
    pub fn frame(self, readings: &[f32], stop: &[u8]) -> Self {
        self.data(&encode(readings, stop))
    }

    pub fn idle(mut self, reads: usize) -> Self {
        for _ in 0..reads {
            self.steps.push_back(Step::Idle);
        }
        self
    }

    pub fn fail(mut self, msg: &str) -> Self {
        self.steps.push_back(Step::Fail(msg.to_string()));
        self
    }

    pub fn timed_out(mut self) -> Self {
        self.steps.push_back(Step::TimedOut);
        self
    }

    /// Shared counter of `clear_input` calls.
    pub fn clears(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.clears)
    }
}

impl SerialLink for ScriptedLink {
    fn clear_input(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.clears.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> std::result::Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        match self.steps.pop_front() {
            None | Some(Step::Idle) => Ok(0),
            Some(Step::Fail(msg)) => Err(Box::new(std::io::Error::other(msg))),
            Some(Step::TimedOut) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "scripted timeout",
            ))),
            Some(Step::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.steps.push_front(Step::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

/// Rows recorded in memory; clones share the same rows.
#[derive(Debug, Default, Clone)]
pub struct MemoryDataLog {
    rows: Arc<Mutex<Vec<(f64, Vec<f64>)>>>,
}

impl MemoryDataLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<(f64, Vec<f64>)> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl DataLog for MemoryDataLog {
    fn record(&mut self, pressure: f64, values: &[f64]) -> Result<()> {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push((pressure, values.to_vec()));
        }
        Ok(())
    }
}
