//! Parameter-change handling off the real-time thread
//!
//! Parameter notifications may arrive on any thread. Recording one is an
//! atomic store plus a non-blocking `try_send` wake. The store is free of
//! syscalls; the wake may unpark the worker (a futex call on Linux), so a
//! real-time caller should prefer recording changes from its control side.
//! A dedicated worker thread coalesces pending changes, runs the designer
//! and publishes the result.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::signal_processing::{CoefficientPublisher, FilterSpec, FilterType, design};

/// Externally controllable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterId {
    /// Cutoff frequency in Hz
    Cutoff,
    /// Filter type choice index (0 = lowpass, 1 = highpass)
    Type,
}

impl ParameterId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterId::Cutoff => "cutoff",
            ParameterId::Type => "type",
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterId {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "cutoff" => Ok(ParameterId::Cutoff),
            "type" => Ok(ParameterId::Type),
            other => Err(FilterError::Config(format!("unknown parameter: {}", other))),
        }
    }
}

/// One parameter-change notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    pub id: ParameterId,
    pub value: f32,
}

impl ParameterChange {
    pub fn cutoff(hz: f32) -> Self {
        Self {
            id: ParameterId::Cutoff,
            value: hz,
        }
    }

    pub fn filter_type(filter_type: FilterType) -> Self {
        Self {
            id: ParameterId::Type,
            value: filter_type.choice_index(),
        }
    }
}

/// Parses `"<id> <value>"` or `"<id>=<value>"`
///
/// The type value may be a choice index or a name such as `highpass`.
impl FromStr for ParameterChange {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (id, value) = s
            .split_once('=')
            .or_else(|| s.split_once(char::is_whitespace))
            .ok_or_else(|| FilterError::Config(format!("expected '<parameter> <value>': {}", s)))?;

        let id: ParameterId = id.parse()?;
        let value = value.trim();

        let value = match (id, value.parse::<f32>()) {
            (_, Ok(v)) => v,
            (ParameterId::Type, Err(_)) => value
                .parse::<FilterType>()
                .map_err(FilterError::Config)?
                .choice_index(),
            (ParameterId::Cutoff, Err(_)) => {
                return Err(FilterError::Config(format!("invalid cutoff: {}", value)));
            }
        };

        Ok(Self { id, value })
    }
}

/// The core's externally visible state: what a host would persist
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub cutoff_hz: f32,
    pub filter_type: FilterType,
}

impl FilterState {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            cutoff_hz: config.clamp_cutoff(config.default_cutoff_hz),
            filter_type: config.default_type,
        }
    }

    /// Validated, clamped copy of this state under `config`
    fn constrained(self, config: &FilterConfig) -> Self {
        let cutoff_hz = if self.cutoff_hz.is_finite() {
            config.clamp_cutoff(self.cutoff_hz)
        } else {
            config.clamp_cutoff(config.default_cutoff_hz)
        };
        let filter_type = if config.type_choice {
            self.filter_type
        } else {
            FilterType::Lowpass
        };
        Self {
            cutoff_hz,
            filter_type,
        }
    }

    /// Design request for this state
    pub fn spec(&self, tap_count: usize, sample_rate: f64) -> Result<FilterSpec> {
        FilterSpec::new(
            self.cutoff_hz as f64,
            self.filter_type,
            tap_count,
            sample_rate,
        )
    }
}

/// Latest requested state, writable from any thread without blocking
struct FilterTarget {
    cutoff_bits: AtomicU32,
    filter_type: AtomicU8,
}

impl FilterTarget {
    fn new(state: FilterState) -> Self {
        Self {
            cutoff_bits: AtomicU32::new(state.cutoff_hz.to_bits()),
            filter_type: AtomicU8::new(type_to_u8(state.filter_type)),
        }
    }

    fn load(&self) -> FilterState {
        FilterState {
            cutoff_hz: f32::from_bits(self.cutoff_bits.load(Ordering::Acquire)),
            filter_type: type_from_u8(self.filter_type.load(Ordering::Acquire)),
        }
    }

    fn store_cutoff(&self, hz: f32) {
        self.cutoff_bits.store(hz.to_bits(), Ordering::Release);
    }

    fn store_type(&self, filter_type: FilterType) {
        self.filter_type
            .store(type_to_u8(filter_type), Ordering::Release);
    }
}

fn type_to_u8(filter_type: FilterType) -> u8 {
    match filter_type {
        FilterType::Lowpass => 0,
        FilterType::Highpass => 1,
    }
}

fn type_from_u8(value: u8) -> FilterType {
    if value == 0 {
        FilterType::Lowpass
    } else {
        FilterType::Highpass
    }
}

enum ControlMessage {
    Wake,
    Sync(Sender<()>),
    SampleRate(f64, Sender<()>),
    Shutdown,
}

/// Cloneable, non-blocking front end of the control worker
#[derive(Clone)]
pub struct ControlHandle {
    target: Arc<FilterTarget>,
    wake: Sender<ControlMessage>,
    config: FilterConfig,
}

impl ControlHandle {
    /// Record a parameter change and wake the worker
    ///
    /// Never blocks or allocates, but waking a parked worker is a syscall.
    /// Returns false if the change was ignored (non-finite cutoff, or a type
    /// change while type choice is disabled).
    pub fn set_parameter(&self, change: ParameterChange) -> bool {
        match change.id {
            ParameterId::Cutoff => {
                if !change.value.is_finite() {
                    return false;
                }
                self.target
                    .store_cutoff(self.config.clamp_cutoff(change.value));
            }
            ParameterId::Type => {
                if !self.config.type_choice {
                    return false;
                }
                self.target
                    .store_type(FilterType::from_choice_index(change.value));
            }
        }
        self.notify();
        true
    }

    pub fn set_cutoff(&self, hz: f32) -> bool {
        self.set_parameter(ParameterChange::cutoff(hz))
    }

    pub fn set_filter_type(&self, filter_type: FilterType) -> bool {
        self.set_parameter(ParameterChange::filter_type(filter_type))
    }

    /// Replace the whole state, e.g. from host persistence
    pub fn restore(&self, state: FilterState) {
        let state = state.constrained(&self.config);
        self.target.store_cutoff(state.cutoff_hz);
        self.target.store_type(state.filter_type);
        self.notify();
    }

    /// Most recently requested state (may not be designed yet)
    pub fn state(&self) -> FilterState {
        self.target.load()
    }

    /// Block until the worker has published everything requested so far
    pub fn sync(&self) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.wake
            .send(ControlMessage::Sync(ack_tx))
            .map_err(|_| FilterError::Control("control worker stopped".into()))?;
        ack_rx
            .recv()
            .map_err(|_| FilterError::Control("control worker stopped".into()))
    }

    /// Redesign for a new stream rate; blocks until published
    pub fn set_sample_rate(&self, sample_rate: f64) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(FilterError::Config(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }

        let (ack_tx, ack_rx) = bounded(1);
        self.wake
            .send(ControlMessage::SampleRate(sample_rate, ack_tx))
            .map_err(|_| FilterError::Control("control worker stopped".into()))?;
        ack_rx
            .recv()
            .map_err(|_| FilterError::Control("control worker stopped".into()))
    }

    fn notify(&self) {
        // A full queue already holds a pending wake; the worker reads the
        // target when it gets to it, so this change is not lost.
        let _ = self.wake.try_send(ControlMessage::Wake);
    }
}

struct Designer {
    target: Arc<FilterTarget>,
    publisher: CoefficientPublisher,
    tap_count: usize,
    sample_rate: f64,
    last: FilterState,
}

impl Designer {
    fn refresh(&mut self) {
        let state = self.target.load();
        if state != self.last {
            self.publish(state);
        }
    }

    fn publish(&mut self, state: FilterState) {
        match state.spec(self.tap_count, self.sample_rate) {
            Ok(spec) => {
                self.publisher.publish(design(&spec));
                log::debug!(
                    "Published {} {} taps at {:.1} Hz",
                    self.tap_count,
                    state.filter_type,
                    state.cutoff_hz
                );
                self.last = state;
            }
            Err(e) => log::error!("Filter design rejected: {}", e),
        }
    }

    fn run(mut self, rx: Receiver<ControlMessage>) {
        while let Ok(message) = rx.recv() {
            match message {
                ControlMessage::Wake => self.refresh(),
                ControlMessage::Sync(ack) => {
                    self.refresh();
                    let _ = ack.send(());
                }
                ControlMessage::SampleRate(sample_rate, ack) => {
                    self.sample_rate = sample_rate;
                    self.publish(self.target.load());
                    let _ = ack.send(());
                }
                ControlMessage::Shutdown => break,
            }
        }
        log::debug!("Control worker stopped");
    }
}

/// Owns the control thread; stops and joins it on drop
pub struct ControlWorker {
    handle: ControlHandle,
    thread: Option<JoinHandle<()>>,
}

impl ControlWorker {
    /// Start the worker
    ///
    /// `initial` must already be designed and published; the worker only
    /// publishes when the requested state moves away from it.
    pub fn spawn(
        config: &FilterConfig,
        sample_rate: f64,
        publisher: CoefficientPublisher,
        initial: FilterState,
    ) -> Result<Self> {
        let initial = initial.constrained(config);
        // Validate once here so the worker never sees a bad tap count or rate
        initial.spec(config.tap_count, sample_rate)?;

        let target = Arc::new(FilterTarget::new(initial));
        let (tx, rx) = bounded(1);

        let designer = Designer {
            target: Arc::clone(&target),
            publisher,
            tap_count: config.tap_count,
            sample_rate,
            last: initial,
        };

        let thread = thread::Builder::new()
            .name("firscope-control".into())
            .spawn(move || designer.run(rx))?;

        log::debug!("Control worker started at {} Hz", sample_rate);

        Ok(Self {
            handle: ControlHandle {
                target,
                wake: tx,
                config: config.clone(),
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &ControlHandle {
        &self.handle
    }
}

impl Drop for ControlWorker {
    fn drop(&mut self) {
        let _ = self.handle.wake.send(ControlMessage::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::warn!("Control worker panicked");
        }
    }
}
