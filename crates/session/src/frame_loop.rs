use std::fmt::Debug;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("host refused to schedule a frame callback: {0}")]
    Request(String),
}

pub trait FrameScheduler {
    type Token: Copy + Debug;

    fn request_frame(&mut self) -> Result<Self::Token, SchedulerError>;
    fn cancel_frame(&mut self, token: Self::Token);
}

/// At most one frame request is outstanding, so ticks never overlap.
#[derive(Debug)]
pub struct PollLoop<S: FrameScheduler> {
    scheduler: S,
    pending: Option<S::Token>,
    ticks: u64,
}

impl<S: FrameScheduler> PollLoop<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: None,
            ticks: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.pending.is_some() {
            return Ok(());
        }
        self.pending = Some(self.scheduler.request_frame()?);
        info!("poll_loop_started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel_frame(token);
            info!(ticks = self.ticks, "poll_loop_stopped");
        }
    }

    /// Called from the frame callback. Returns whether the caller should poll
    /// this frame; the next frame is already requested when it does.
    pub fn on_frame(&mut self) -> Result<bool, SchedulerError> {
        if self.pending.take().is_none() {
            debug!("poll_loop_stale_frame");
            return Ok(false);
        }
        self.ticks = self.ticks.saturating_add(1);
        self.pending = Some(self.scheduler.request_frame()?);
        Ok(true)
    }
}
