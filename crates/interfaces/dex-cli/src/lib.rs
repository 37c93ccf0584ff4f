pub mod commands;

use std::time::Duration;

/// Upper bound on how long a command waits for background tasks.
pub const TASK_TIMEOUT: Duration = Duration::from_secs(dex_config::HEADLESS_TASK_TIMEOUT_SECS);
