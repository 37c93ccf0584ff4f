use std::error::Error;
use std::fmt::Write;

/// Multi-line diagnostic for a failed task: task name, error type, cause, message,
/// and the raw (debug) message when it says something the display form does not.
pub fn describe_failure(task: &str, error_type: &str, error: &(dyn Error + 'static)) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task: {task}");
    let _ = writeln!(out, "Error: {error_type}");
    if let Some(cause) = error.source() {
        let _ = writeln!(out, "Cause: {cause}");
    }
    let message = error.to_string();
    let _ = writeln!(out, "Message: {message}");
    let raw = format!("{error:?}");
    if raw != message {
        let _ = writeln!(out, "Raw message: {raw}");
    }
    out.truncate(out.trim_end().len());
    out
}

/// Last path segment of a type name, e.g. `ValidateModelTask`.
pub(crate) fn short_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
