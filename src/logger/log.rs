use crate::logger::severity::LogSeverity;
use crate::logger::time::now;
use once_cell::sync::OnceCell;

static MIN_SEVERITY: OnceCell<LogSeverity> = OnceCell::new();

/// Sets the minimum severity that gets printed. May only be set once; later
/// calls are ignored.
pub fn set_min_severity(severity: LogSeverity) {
    let _ = MIN_SEVERITY.set(severity);
}

pub fn log(msg: String, log_severity: LogSeverity) {
    let min = *MIN_SEVERITY.get_or_init(|| LogSeverity::Info);
    if log_severity >= min {
        println!("[{}] {} {}", log_severity, now(), msg);
    }
}
