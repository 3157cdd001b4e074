//! Remote command channels
//!
//! A `Connection` opens `Session`s; a session runs exactly one remote
//! command with piped stdio. The traits mirror a minimal
//! exec-a-command/pipe-stdio abstraction so the engine never knows whether
//! it talks to SSH, a zone wrapper, or a test double.

mod logged;
mod ssh;

pub use logged::LoggedSession;
pub use ssh::SshConnection;

use std::io::{Read, Write};

use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;

pub trait Connection {
    /// Human-readable channel name (usually the address).
    fn name(&self) -> &str;

    fn new_session(&self) -> PurserResult<Box<dyn Session>>;

    /// A session whose stdout/stderr are drained into `logger`.
    fn new_logged_session(&self, logger: &Logger) -> PurserResult<Box<dyn Session>> {
        Ok(Box::new(LoggedSession::new(
            logger.clone(),
            self.new_session()?,
        )))
    }

    /// Release resources held by the channel.
    fn close(&self) -> PurserResult<()> {
        Ok(())
    }
}

pub trait Session {
    /// Start `cmd` without waiting for it. Pipes become available once the
    /// command is running.
    fn start(&mut self, cmd: &str) -> PurserResult<()>;

    /// Wait for the started command; a non-zero exit is an error.
    fn wait(&mut self) -> PurserResult<()>;

    fn run(&mut self, cmd: &str) -> PurserResult<()> {
        self.start(cmd)?;
        self.wait()
    }

    fn stdin_pipe(&mut self) -> PurserResult<Box<dyn Write + Send>>;
    fn stdout_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>>;
    fn stderr_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>>;

    /// Close the session, reaping the command if it is still running.
    fn close(&mut self) -> PurserResult<()>;
}

/// Channel wrapper prefixing every command, e.g. `zlogin <uuid>`.
pub struct WrappedConnection {
    inner: Box<dyn Connection>,
    prefix: String,
    name: String,
}

impl WrappedConnection {
    pub fn new(inner: Box<dyn Connection>, prefix: &str) -> Self {
        let name = format!("{} ({})", inner.name(), prefix);
        WrappedConnection {
            inner,
            prefix: prefix.to_string(),
            name,
        }
    }
}

impl Connection for WrappedConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_session(&self) -> PurserResult<Box<dyn Session>> {
        Ok(Box::new(WrappedSession {
            inner: self.inner.new_session()?,
            prefix: self.prefix.clone(),
        }))
    }

    fn new_logged_session(&self, logger: &Logger) -> PurserResult<Box<dyn Session>> {
        Ok(Box::new(WrappedSession {
            inner: self.inner.new_logged_session(logger)?,
            prefix: self.prefix.clone(),
        }))
    }

    fn close(&self) -> PurserResult<()> {
        self.inner.close()
    }
}

struct WrappedSession {
    inner: Box<dyn Session>,
    prefix: String,
}

impl Session for WrappedSession {
    fn start(&mut self, cmd: &str) -> PurserResult<()> {
        self.inner.start(&format!("{} {}", self.prefix, cmd))
    }

    fn wait(&mut self) -> PurserResult<()> {
        self.inner.wait()
    }

    fn stdin_pipe(&mut self) -> PurserResult<Box<dyn Write + Send>> {
        self.inner.stdin_pipe()
    }

    fn stdout_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        self.inner.stdout_pipe()
    }

    fn stderr_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        self.inner.stderr_pipe()
    }

    fn close(&mut self) -> PurserResult<()> {
        self.inner.close()
    }
}

/// Quote `s` for inclusion in a remote shell command line.
pub fn shell_quote(s: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_-./=:@+%^,".contains(c);
    if !s.is_empty() && s.chars().all(safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Wrap a shell command for execution through `/usr/bin/env bash -c`.
pub fn bash_c(cmd: &str) -> String {
    format!("/usr/bin/env bash -c {}", shell_quote(cmd))
}

/// Run one command to completion on a fresh session.
pub fn run_command(conn: &dyn Connection, cmd: &str) -> PurserResult<()> {
    let mut sess = conn.new_session()?;
    let result = sess.run(cmd);
    let closed = sess.close();
    result.and(closed)
}

/// Run `cmd` and capture its standard output.
pub fn read_command(conn: &dyn Connection, cmd: &str) -> PurserResult<String> {
    let mut sess = conn.new_session()?;
    let result: PurserResult<String> = (|| {
        sess.start(cmd)?;
        let mut stdout = sess.stdout_pipe()?;
        let mut output = String::new();
        stdout
            .read_to_string(&mut output)
            .map_err(|e| PurserError::remote(format!("failed to read command output: {e}")))?;
        sess.wait()?;
        Ok(output)
    })();
    let closed = sess.close();
    match result {
        Ok(output) => closed.map(|()| output),
        Err(err) => {
            let _ = closed;
            Err(err)
        }
    }
}

/// Run `f` against a fresh logged session, closing it afterwards.
pub fn with_logged_session<F>(conn: &dyn Connection, logger: &Logger, f: F) -> PurserResult<()>
where
    F: FnOnce(&mut dyn Session) -> PurserResult<()>,
{
    let mut sess = conn.new_logged_session(logger)?;
    let result = f(&mut *sess);
    let closed = sess.close();
    result.and(closed)
}
