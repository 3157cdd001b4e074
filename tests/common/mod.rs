//! Shared test doubles for engine and document tests
//!
//! `ScriptedConnection` is an in-memory channel: package state reads serve a
//! canned state file, state writes are captured for assertions, and every
//! other command consumes the next scripted outcome.

use std::collections::VecDeque;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use purser::error::{PurserError, PurserResult};
use purser::{Connection, Session};

#[derive(Clone, Copy, PartialEq)]
enum SessionKind {
    Exec,
    ReadState,
    WriteState,
}

#[derive(Clone)]
pub struct ScriptedConnection {
    state: Arc<Mutex<String>>,
    failures: Arc<Mutex<VecDeque<bool>>>,
    exec_cmds: Arc<Mutex<Vec<String>>>,
    exec_bodies: Arc<Mutex<Vec<String>>>,
    write_cmds: Arc<Mutex<Vec<String>>>,
    written_states: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnection {
    /// Connection whose state reads return `state` and whose commands all
    /// succeed.
    pub fn new(state: &str) -> Self {
        Self::with_failures(state, &[])
    }

    /// Like `new`, but the i-th executed (non-state) command fails when
    /// `failures[i]` is true.
    pub fn with_failures(state: &str, failures: &[bool]) -> Self {
        ScriptedConnection {
            state: Arc::new(Mutex::new(state.to_string())),
            failures: Arc::new(Mutex::new(failures.iter().copied().collect())),
            exec_cmds: Arc::new(Mutex::new(Vec::new())),
            exec_bodies: Arc::new(Mutex::new(Vec::new())),
            write_cmds: Arc::new(Mutex::new(Vec::new())),
            written_states: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Commands executed for steps (state reads/writes excluded), in order.
    pub fn exec_cmds(&self) -> Vec<String> {
        self.exec_cmds.lock().unwrap().clone()
    }

    /// Bytes streamed into step commands, in order.
    pub fn exec_bodies(&self) -> Vec<String> {
        self.exec_bodies.lock().unwrap().clone()
    }

    /// Commands used to persist package state, in order.
    pub fn write_cmds(&self) -> Vec<String> {
        self.write_cmds.lock().unwrap().clone()
    }

    /// State file bodies persisted to the target, in order.
    pub fn written_states(&self) -> Vec<String> {
        self.written_states.lock().unwrap().clone()
    }
}

impl Connection for ScriptedConnection {
    fn name(&self) -> &str {
        "scripted"
    }

    fn new_session(&self) -> PurserResult<Box<dyn Session>> {
        Ok(Box::new(ScriptedSession {
            state: Arc::clone(&self.state),
            failures: Arc::clone(&self.failures),
            exec_cmds: Arc::clone(&self.exec_cmds),
            exec_bodies: Arc::clone(&self.exec_bodies),
            write_cmds: Arc::clone(&self.write_cmds),
            written_states: Arc::clone(&self.written_states),
            kind: None,
            fail: false,
            stdin: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

struct ScriptedSession {
    state: Arc<Mutex<String>>,
    failures: Arc<Mutex<VecDeque<bool>>>,
    exec_cmds: Arc<Mutex<Vec<String>>>,
    exec_bodies: Arc<Mutex<Vec<String>>>,
    write_cmds: Arc<Mutex<Vec<String>>>,
    written_states: Arc<Mutex<Vec<String>>>,
    kind: Option<SessionKind>,
    fail: bool,
    stdin: Arc<Mutex<Vec<u8>>>,
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Session for ScriptedSession {
    fn start(&mut self, cmd: &str) -> PurserResult<()> {
        let kind = if cmd.contains("ln -sf") {
            self.write_cmds.lock().unwrap().push(cmd.to_string());
            SessionKind::WriteState
        } else if cmd.contains("if [[ -f") {
            SessionKind::ReadState
        } else {
            self.exec_cmds.lock().unwrap().push(cmd.to_string());
            self.fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
            SessionKind::Exec
        };
        self.kind = Some(kind);
        Ok(())
    }

    fn wait(&mut self) -> PurserResult<()> {
        let body = String::from_utf8(self.stdin.lock().unwrap().clone()).unwrap_or_default();
        match self.kind {
            Some(SessionKind::WriteState) => {
                self.written_states.lock().unwrap().push(body);
                Ok(())
            }
            Some(SessionKind::Exec) => {
                self.exec_bodies.lock().unwrap().push(body);
                if self.fail {
                    Err(PurserError::remote("scripted failure"))
                } else {
                    Ok(())
                }
            }
            Some(SessionKind::ReadState) => Ok(()),
            None => Err(PurserError::remote("session not started")),
        }
    }

    fn stdin_pipe(&mut self) -> PurserResult<Box<dyn Write + Send>> {
        Ok(Box::new(SharedWriter(Arc::clone(&self.stdin))))
    }

    fn stdout_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        let output = match self.kind {
            Some(SessionKind::ReadState) => self.state.lock().unwrap().clone(),
            _ => String::new(),
        };
        Ok(Box::new(Cursor::new(output.into_bytes())))
    }

    fn stderr_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    fn close(&mut self) -> PurserResult<()> {
        Ok(())
    }
}
