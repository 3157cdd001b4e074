//! Run logger
//!
//! Line-oriented output with elapsed seconds and a tag chain, so the
//! interleaved stdout/stderr of remote commands stays attributable:
//!
//! ```text
//! [   1.042] [web base] executed 4a24a6...
//! [   1.310] [web base stdout] hello from the target
//! ```

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Clone)]
pub struct Logger {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    tags: Vec<String>,
    started: Instant,
}

impl Logger {
    /// Logger writing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Logger discarding everything (tests, quiet paths).
    pub fn discard() -> Self {
        Self::with_output(Box::new(io::sink()))
    }

    pub fn with_output(out: Box<dyn Write + Send>) -> Self {
        Logger {
            out: Arc::new(Mutex::new(out)),
            tags: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Derive a logger with `tag` appended to the tag chain. The clock and
    /// output are shared with the parent.
    pub fn tag(&self, tag: &str) -> Logger {
        let mut tags = self.tags.clone();
        tags.push(tag.to_string());
        Logger {
            out: Arc::clone(&self.out),
            tags,
            started: self.started,
        }
    }

    /// Emit one line. Call as `logger.printf(format_args!(...))`.
    pub fn printf(&self, args: fmt::Arguments<'_>) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(
                out,
                "[{:8.3}] [{}] {}",
                self.started.elapsed().as_secs_f64(),
                self.tags.join(" "),
                args
            );
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new()
    }
}
