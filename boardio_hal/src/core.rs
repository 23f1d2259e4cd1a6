//! IoCore struct and polling loop management.
//!
//! `IoCore` owns the board description, builds the driver from the
//! registry and drives `IoDriver::cycle()` at the board's poll interval.
//!
//! Read handlers fire while the loop holds the driver lock. A handler that
//! wants to act on the driver posts a command to the [`CommandQueue`]; the
//! loop applies queued commands right after the cycle, in posting order.

use boardio_common::config::ConfigLoader;
use boardio_common::hal::config::BoardConfig;
use boardio_common::hal::consts::IO_SERVICE_NAME;
use boardio_common::hal::driver::{IoDriver, IoError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::driver_registry::DriverRegistry;

/// Driver handle shared between the polling loop and callers.
///
/// Locked for the whole of `IoCore::step`. Never lock it from a read
/// handler; post to the [`CommandQueue`] instead.
pub type SharedDriver = Arc<Mutex<Box<dyn IoDriver>>>;

/// Deferred driver call.
pub type Command = Box<dyn FnOnce(&mut dyn IoDriver) -> Result<(), IoError> + Send>;

/// Commands posted by read handlers (or any thread) for the polling loop.
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandQueue {
    /// Queue `command` for the end of the current (or next) cycle.
    pub fn post<F>(&self, command: F)
    where
        F: FnOnce(&mut dyn IoDriver) -> Result<(), IoError> + Send + 'static,
    {
        self.inner.lock().push_back(Box::new(command));
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no command is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn take(&self) -> VecDeque<Command> {
        std::mem::take(&mut *self.inner.lock())
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// IoCore manages the driver and the polling loop.
pub struct IoCore {
    /// Board description
    config: BoardConfig,
    /// Available drivers
    registry: DriverRegistry,
    /// Active driver instance
    driver: Option<SharedDriver>,
    /// Commands deferred by read handlers
    commands: CommandQueue,
    /// Running flag for loop control
    running: Arc<AtomicBool>,
    /// Poll interval from config
    poll_interval: Duration,
    /// Timing statistics
    stats: TimingStats,
    /// Time of the previous cycle
    last_cycle: Option<Instant>,
}

/// Timing statistics for loop monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Number of cycles that overran the poll interval
    pub timing_violations: u64,
    /// Maximum observed cycle time
    pub max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    /// Average cycle time in microseconds.
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }
}

impl IoCore {
    /// Create a new IoCore for a board description.
    ///
    /// # Errors
    /// Returns error if the board description is invalid.
    pub fn new(config: BoardConfig, registry: DriverRegistry) -> Result<Self, IoError> {
        config.validate()?;

        let poll_interval = config.poll_interval();
        info!(
            "IoCore created for board '{}' ({} pins), poll_interval={}us",
            config.name,
            config.pins.len(),
            config.poll_interval_us
        );

        Ok(Self {
            config,
            registry,
            driver: None,
            commands: CommandQueue::default(),
            running: Arc::new(AtomicBool::new(false)),
            poll_interval,
            stats: TimingStats::default(),
            last_cycle: None,
        })
    }

    /// Load a board description from a TOML file.
    pub fn load_config(config_path: &Path) -> Result<BoardConfig, IoError> {
        info!("Loading board description from {:?}", config_path);
        let config = BoardConfig::load(config_path)?;
        info!(
            "Loaded board '{}': {} pins, {} serial ports, {} I2C devices",
            config.name,
            config.pins.len(),
            config.serial_ports.len(),
            config.i2c_devices.len()
        );
        Ok(config)
    }

    /// Create and initialize the named driver.
    ///
    /// # Errors
    /// Returns error if the driver is unknown or its initialization fails.
    pub fn init(&mut self, driver_name: &str) -> Result<SharedDriver, IoError> {
        info!("Initializing {} with driver '{}'...", IO_SERVICE_NAME, driver_name);

        let mut driver = self.registry.create_driver(driver_name)?;
        info!("Created driver: {} v{}", driver.name(), driver.version());

        driver.init(&self.config)?;

        let shared = Arc::new(Mutex::new(driver));
        self.driver = Some(Arc::clone(&shared));
        self.last_cycle = None;
        info!("IoCore initialized successfully");
        Ok(shared)
    }

    /// Handle to the active driver.
    pub fn driver(&self) -> Option<SharedDriver> {
        self.driver.clone()
    }

    /// Queue for acting on the driver from read handlers.
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Run one polling cycle, then apply commands posted during it.
    ///
    /// A failing command is logged and does not stop the loop.
    ///
    /// # Errors
    /// Returns `NotReady` if no driver has been initialized.
    pub fn step(&mut self) -> Result<Duration, IoError> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| IoError::NotReady(IO_SERVICE_NAME.to_string()))?;

        let cycle_start = Instant::now();
        let dt = self
            .last_cycle
            .map_or(self.poll_interval, |last| cycle_start.duration_since(last));
        self.last_cycle = Some(cycle_start);

        {
            let mut driver = driver.lock();
            driver.cycle(dt);
            for command in self.commands.take() {
                if let Err(e) = command(&mut **driver) {
                    warn!("Deferred command failed: {}", e);
                }
            }
        }

        let elapsed = cycle_start.elapsed();
        let cycle_time_us = elapsed.as_micros() as u64;
        self.stats.cycle_count += 1;
        self.stats.total_cycle_time_us += cycle_time_us;
        self.stats.max_cycle_time_us = self.stats.max_cycle_time_us.max(cycle_time_us);

        if elapsed > self.poll_interval {
            self.stats.timing_violations += 1;
            if self.stats.timing_violations <= 10 || self.stats.timing_violations % 1000 == 0 {
                warn!(
                    "Timing violation #{}: cycle took {}us (target {}us)",
                    self.stats.timing_violations,
                    cycle_time_us,
                    self.config.poll_interval_us
                );
            }
        }

        Ok(elapsed)
    }

    /// Run the polling loop.
    ///
    /// Blocks until the running flag is cleared (signal handler or
    /// `running_flag()` holder).
    pub fn run(&mut self) -> Result<(), IoError> {
        if self.driver.is_none() {
            return Err(IoError::NotReady(IO_SERVICE_NAME.to_string()));
        }

        info!(
            "Starting IoCore loop (poll_interval={}us)...",
            self.poll_interval.as_micros()
        );
        self.running.store(true, Ordering::SeqCst);

        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        while self.running.load(Ordering::SeqCst) {
            let elapsed = self.step()?;

            if elapsed < self.poll_interval {
                std::thread::sleep(self.poll_interval - elapsed);
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "Loop: {} cycles, avg={}us, max={}us, violations={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations
                );
            }
        }

        info!(
            "IoCore loop stopped after {} cycles (violations: {})",
            self.stats.cycle_count, self.stats.timing_violations
        );
        Ok(())
    }

    /// Stop the loop and shut the driver down.
    pub fn shutdown(&mut self) -> Result<(), IoError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);

        let dropped = self.commands.take().len();
        if dropped > 0 {
            debug!("Dropped {} pending command(s)", dropped);
        }
        if let Some(driver) = self.driver.take() {
            driver.lock().shutdown()?;
        }
        Ok(())
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Board description in use.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Timing statistics.
    pub fn stats(&self) -> TimingStats {
        self.stats
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        unsafe {
            let policy = sched_getscheduler(0);
            policy == SCHED_FIFO || policy == SCHED_RR
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
