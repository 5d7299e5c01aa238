// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GrbError;
use crate::control::CancelToken;
use crate::observability::ProgressSink;

/// Optional hooks threaded through a replay: cancellation and progress.
#[derive(Clone, Copy, Default)]
pub struct ExecutionContext<'a> {
    pub cancel: Option<&'a CancelToken>,
    pub progress: Option<&'a dyn ProgressSink>,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with no optional hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the optional cancellation token.
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sets an optional progress sink.
    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns true when cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Returns a cancelled error when cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), GrbError> {
        if self.is_cancelled() {
            return Err(GrbError::cancelled());
        }
        Ok(())
    }

    pub fn report_progress(&self, row: usize, total_rows: usize) {
        if let Some(progress) = self.progress {
            progress.on_progress(row, total_rows);
        }
    }
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.map(|_| "<sink>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionContext;
    use crate::{CancelToken, GrbError, ProgressSink};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        rows: Mutex<Vec<(usize, usize)>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, row: usize, total_rows: usize) {
            self.rows
                .lock()
                .expect("sink mutex should not be poisoned")
                .push((row, total_rows));
        }
    }

    #[test]
    fn default_context_is_never_cancelled() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.is_cancelled());
        assert!(ctx.check_cancelled().is_ok());
        ctx.report_progress(3, 10);
    }

    #[test]
    fn cancelled_token_surfaces_cancelled_error() {
        let cancel = CancelToken::new();
        let ctx = ExecutionContext::new().with_cancel(&cancel);
        assert!(ctx.check_cancelled().is_ok());
        cancel.cancel();
        assert_eq!(ctx.check_cancelled(), Err(GrbError::Cancelled));
    }

    #[test]
    fn progress_is_forwarded_to_sink() {
        let sink = RecordingSink::default();
        let ctx = ExecutionContext::new().with_progress_sink(&sink);
        ctx.report_progress(0, 4);
        ctx.report_progress(1, 4);
        let rows = sink.rows.lock().expect("sink mutex should not be poisoned");
        assert_eq!(*rows, vec![(0, 4), (1, 4)]);
    }
}
