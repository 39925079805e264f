use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{PanicHookInfo, take_hook};
use std::thread;

/// Route panics through `tracing` before the previous hook runs.
///
/// Panics inside a stock check are caught and the watch loop keeps going, so this
/// record is often the only place the location and backtrace survive.
pub fn install() {
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let record = format_panic_record(panic_info);
            tracing::error!(target: "stockbot::panic", "{record}");
        }));

        previous_hook(panic_info);
    }));
}

fn format_panic_record(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = payload_message(panic_info.payload());
    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());

    let thread_name = thread::current()
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| "<unnamed>".to_string());

    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => format!(
            "PANIC thread={thread_name} location={location} payload={payload}\nBacktrace:\n{backtrace}"
        ),
        _ => format!("PANIC thread={thread_name} location={location} payload={payload}"),
    }
}

/// Best-effort text of a panic payload.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "<non-string panic payload>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(payload_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(format!("bad {}", 42));
        assert_eq!(payload_message(payload.as_ref()), "bad 42");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(payload_message(payload.as_ref()), "<non-string panic payload>");
    }
}
