//! Per-request access logging, one combined-log-spirit line per
//! finished request.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

pub struct AccessLog {
    out: Mutex<Box<dyn Write + Send>>,
}

impl AccessLog {
    pub fn to_stderr() -> Self {
        Self::to_writer(Box::new(std::io::stderr()))
    }

    pub fn to_writer(out: Box<dyn Write + Send>) -> Self {
        AccessLog {
            out: Mutex::new(out),
        }
    }

    /// Log one finished request. Failures to write are swallowed;
    /// logging must never take a request down.
    pub fn log(&self, remote: &str, method: &str, raw_url: &str, status: u16,
               elapsed: Duration)
    {
        let time = Utc::now().format("%d/%b/%Y:%H:%M:%S %z");
        let line = format!(
            "{remote} - - [{time}] \"{method} {raw_url}\" {status} {}ms\n",
            elapsed.as_millis()
        );
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }
}
