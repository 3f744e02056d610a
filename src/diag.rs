//! Diagnostic lines with a thread-local capture sink, so tests can assert on what a request
//! recorded without racing on the global logger.

use std::cell::RefCell;

/// Log target diagnostic lines are routed to.
pub const DIAG_TARGET: &str = "recordqa::diag";

thread_local! {
    static SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the sink for this thread when dropped.
pub struct DiagSinkGuard;

impl Drop for DiagSinkGuard {
    fn drop(&mut self) {
        SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Start capturing diagnostic lines emitted on the current thread.
#[must_use]
pub fn enable_thread_sink() -> DiagSinkGuard {
    SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    DiagSinkGuard
}

#[doc(hidden)]
pub fn write_str(msg: &str) {
    SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Take the captured lines, leaving the sink enabled and empty.
pub fn drain() -> Vec<String> {
    SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

#[must_use]
pub fn snapshot() -> Vec<String> {
    SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Emit a diagnostic line to the `recordqa::diag` target and the thread sink.
#[macro_export]
macro_rules! diag {
    ($($arg:tt)*) => {{
        let __line = format!($($arg)*);
        $crate::diag::write_str(&__line);
        log::debug!(target: $crate::diag::DIAG_TARGET, "{}", __line);
    }};
}
