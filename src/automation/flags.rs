// Shared control flags between the input listener and the automation loop
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct FlagState {
    running: bool,
    stop_after_sequence: bool,
    /// Bumped by every emergency stop, so a loop that slept through the
    /// stop-then-resume grace window still notices it
    stop_epoch: u64,
}

/// Cheap to clone; every clone shares the same lock.
#[derive(Debug, Clone)]
pub struct ControlFlags {
    inner: Arc<Mutex<FlagState>>,
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlFlags {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FlagState {
                running: true,
                stop_after_sequence: false,
                stop_epoch: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlagState> {
        // A panic while holding the guard cannot leave the booleans torn
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Emergency stop. Returns the epoch this stop started.
    pub fn request_stop(&self) -> u64 {
        let mut state = self.lock();
        state.running = false;
        state.stop_epoch += 1;
        state.stop_epoch
    }

    /// Accept new triggers again after a stop
    pub fn resume(&self) {
        self.lock().running = true;
    }

    /// Resume only if no later stop has been requested since `epoch`
    pub fn resume_if(&self, epoch: u64) -> bool {
        let mut state = self.lock();
        if state.stop_epoch == epoch {
            state.running = true;
        }
        state.running
    }

    pub fn request_stop_after_sequence(&self) {
        self.lock().stop_after_sequence = true;
    }

    pub fn stop_after_sequence_armed(&self) -> bool {
        self.lock().stop_after_sequence
    }

    /// Read and clear in one step
    pub fn take_stop_after_sequence(&self) -> bool {
        std::mem::take(&mut self.lock().stop_after_sequence)
    }

    /// Token identifying the current run; see `still_running`
    pub fn epoch(&self) -> u64 {
        self.lock().stop_epoch
    }

    /// True while running and no stop has been requested since `epoch`
    pub fn still_running(&self, epoch: u64) -> bool {
        let state = self.lock();
        state.running && state.stop_epoch == epoch
    }
}
