use std::{
    ops::ControlFlow,
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::polling::Cancellation;

/// A function that polls a fallible closure for some period of time and errors if it fails to get
/// a result within that period.
///
/// Given a closure that returns a [`Result<ControlFlow<O, ()>>`], this function calls the closure
/// repeatedly, sleeping `interval` between attempts, until it returns a [`ControlFlow::Break`] or
/// until it returns an [`Err`], in which case polling stops and the error is returned as
/// [`PollError::Aborted`]. The last sleep is cut short at the deadline.
///
/// The deadline is measured as elapsed wall-clock time since the first attempt, so slow attempts
/// count against it just like the sleeps do. The [`Cancellation`] flag is checked before every
/// attempt.
///
/// [`Break`]: ControlFlow::Break
/// [`Continue`]: ControlFlow::Continue
pub fn poll<O>(
    polling_duration: Duration,
    interval: Duration,
    cancellation: &Cancellation,
    mut attempt: impl FnMut() -> anyhow::Result<ControlFlow<O, ()>>,
) -> Result<O, PollError> {
    let start = Instant::now();
    let mut retries = 0u32;

    loop {
        if cancellation.is_cancelled() {
            break Err(PollError::Cancelled { retries });
        }

        match attempt().map_err(PollError::Aborted)? {
            ControlFlow::Break(output) => break Ok(output),
            ControlFlow::Continue(()) => {
                let elapsed = start.elapsed();
                if elapsed >= polling_duration {
                    break Err(PollError::TimedOut { retries, elapsed });
                }

                retries += 1;
                thread::sleep(interval.min(polling_duration - elapsed));
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Polling timed out after {retries} retries and {elapsed:?}")]
    TimedOut { retries: u32, elapsed: Duration },

    #[error("Polling was cancelled after {retries} retries")]
    Cancelled { retries: u32 },

    #[error("Polled function returned an error during polling loop: {0:#}")]
    Aborted(#[source] anyhow::Error),
}
