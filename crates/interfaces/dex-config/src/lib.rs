//! Central configuration constants for editor limits and defaults.

/// Default number of undoable edits kept per session.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Minimum allowed undo history length.
pub const MIN_UNDO_LIMIT: usize = 1;

/// Maximum allowed undo history length.
pub const MAX_UNDO_LIMIT: usize = 1000;

/// Capacity of the channel carrying background task updates to the UI thread.
pub const DEFAULT_TASK_CHANNEL_CAPACITY: usize = 256;

/// Poll interval used by headless drivers waiting for tasks to settle.
pub const IDLE_POLL_INTERVAL_MS: u64 = 10;

/// How long command-line drivers wait for background tasks before giving up.
pub const HEADLESS_TASK_TIMEOUT_SECS: u64 = 60;

/// Terminal status published when a task succeeds.
pub const STATUS_DONE: &str = "Done!";

/// Terminal status published when a task is cancelled or superseded.
pub const STATUS_CANCELLED: &str = "Cancelled!";

/// Prefix of the terminal status published when a task fails.
pub const STATUS_FAILED: &str = "Failed!";

/// Convenience function to clamp an undo limit into allowed range.
pub fn clamp_undo_limit(v: usize) -> usize {
    v.clamp(MIN_UNDO_LIMIT, MAX_UNDO_LIMIT)
}

/// Clamp a channel capacity so a misconfigured value never yields a zero-sized channel.
pub fn clamp_channel_capacity(v: usize) -> usize {
    v.max(1)
}
