//! Logged sessions
//!
//! Wraps a session so its stdout and stderr are drained line-by-line into
//! tagged loggers by two listener threads. The listeners are joined when the
//! session closes, so no trailing output is lost.

use std::io::{BufRead, BufReader, Read, Write};
use std::thread::{self, JoinHandle};

use crate::connect::Session;
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;

pub struct LoggedSession {
    inner: Box<dyn Session>,
    logger: Logger,
    listeners: Vec<JoinHandle<()>>,
}

impl LoggedSession {
    pub fn new(logger: Logger, inner: Box<dyn Session>) -> Self {
        LoggedSession {
            inner,
            logger,
            listeners: Vec::new(),
        }
    }

    fn spawn_listener(&mut self, tag: &str, stream: Box<dyn Read + Send>) {
        let logger = self.logger.tag(tag);
        self.listeners.push(thread::spawn(move || {
            let reader = BufReader::new(stream);
            for line in reader.lines() {
                match line {
                    Ok(line) => logger.printf(format_args!("{line}")),
                    Err(err) => {
                        logger.printf(format_args!("failed scanning stream: {err}"));
                        break;
                    }
                }
            }
        }));
    }
}

impl Session for LoggedSession {
    fn start(&mut self, cmd: &str) -> PurserResult<()> {
        self.inner.start(cmd)?;
        let stdout = self.inner.stdout_pipe()?;
        let stderr = self.inner.stderr_pipe()?;
        self.spawn_listener("stdout", stdout);
        self.spawn_listener("stderr", stderr);
        Ok(())
    }

    fn wait(&mut self) -> PurserResult<()> {
        self.inner.wait()
    }

    fn stdin_pipe(&mut self) -> PurserResult<Box<dyn Write + Send>> {
        self.inner.stdin_pipe()
    }

    fn stdout_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        Err(PurserError::remote(
            "logged session has no access to the stdout pipe",
        ))
    }

    fn stderr_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        Err(PurserError::remote(
            "logged session has no access to the stderr pipe",
        ))
    }

    fn close(&mut self) -> PurserResult<()> {
        let closed = self.inner.close();
        for listener in self.listeners.drain(..) {
            let _ = listener.join();
        }
        closed
    }
}
