//! Packages and the idempotent provisioning engine
//!
//! Each package owns an ordered list of steps and the status tokens of its
//! most recent run, persisted on the target itself. On every run the chain
//! digests are recomputed and compared against the persisted tokens; the
//! first divergence (or must-execute step) decides where execution resumes.

use std::fmt;
use std::io::Write;

use chrono::Utc;

use crate::attrs::Attributes;
use crate::connect::{self, Connection};
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;
use crate::script::Step;

/// Remote directory holding per-package state logs and uploaded scripts.
pub const REMOTE_STATE_DIR: &str = "/var/lib/purser";
/// Remote scratch directory, cleared whenever package state is persisted.
pub const REMOTE_SCRATCH_DIR: &str = "/tmp/purser";

/// Outcome marker of one persisted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `+` executed this run
    Executed,
    /// `.` skipped, previous result still valid
    Cached,
    /// `-` attempted and failed
    Failed,
}

impl Marker {
    fn as_char(self) -> char {
        match self {
            Marker::Executed => '+',
            Marker::Cached => '.',
            Marker::Failed => '-',
        }
    }
}

/// One `<marker><hex-digest>` line of a package's persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusToken {
    pub marker: Marker,
    pub hash: String,
}

impl StatusToken {
    pub fn executed(hash: &str) -> Self {
        StatusToken {
            marker: Marker::Executed,
            hash: hash.to_string(),
        }
    }

    pub fn cached(hash: &str) -> Self {
        StatusToken {
            marker: Marker::Cached,
            hash: hash.to_string(),
        }
    }

    pub fn failed(hash: &str) -> Self {
        StatusToken {
            marker: Marker::Failed,
            hash: hash.to_string(),
        }
    }

    pub fn parse(line: &str) -> PurserResult<StatusToken> {
        let marker = match line.chars().next() {
            Some('+') => Marker::Executed,
            Some('.') => Marker::Cached,
            Some('-') => Marker::Failed,
            _ => {
                return Err(PurserError::remote(format!(
                    "invalid status token read: {line:?}"
                )))
            }
        };
        Ok(StatusToken {
            marker,
            hash: line[1..].to_string(),
        })
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.marker.as_char(), self.hash)
    }
}

/// A named, identified group of steps with persisted execution state.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub id: String,
    /// Attributes private to the package; the resource set is merged over
    /// them at prepare time, never eagerly at parse time.
    pub attributes: Attributes,
    steps: Vec<Box<dyn Step>>,
    state: Vec<StatusToken>,
    is_dirty: bool,
}

impl Package {
    pub(crate) fn new(
        name: &str,
        id: &str,
        attributes: Attributes,
        steps: Vec<Box<dyn Step>>,
    ) -> Self {
        Package {
            name: name.to_string(),
            id: id.to_string(),
            attributes,
            steps,
            state: Vec::new(),
            is_dirty: false,
        }
    }

    /// Status tokens of the most recent run (or the persisted state read
    /// during prepare, when nothing has executed yet).
    pub fn state(&self) -> &[StatusToken] {
        &self.state
    }

    /// Whether any step needs to execute.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Chain digests computed by the last prepare, in step order.
    pub fn step_hashes(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.hash().to_string()).collect()
    }

    /// Read persisted state (when a channel to an existing target is
    /// available) and thread the hash chain through every step. Marks the
    /// package dirty from the first divergence.
    pub fn prepare(
        &mut self,
        conn: Option<&dyn Connection>,
        attrs: &Attributes,
    ) -> PurserResult<()> {
        if let Some(conn) = conn {
            self.state = self.read_remote_state(conn)?;
        }

        let mut merged = attrs.merge(&self.attributes)?;
        let mut hash = String::new();
        for (i, step) in self.steps.iter_mut().enumerate() {
            hash = step.prepare(&mut merged, &hash)?;
            if step.must_execute() || i >= self.state.len() || self.state[i].hash != hash {
                self.is_dirty = true;
            }
        }
        Ok(())
    }

    /// First step index that has to execute: the earliest must-execute step
    /// or the first index whose live hash diverges from the persisted token,
    /// whichever comes first. `None` when every step is still valid.
    fn first_to_exec(&self) -> Option<usize> {
        let mut must: Option<usize> = None;
        for (i, step) in self.steps.iter().enumerate() {
            if must.is_none() && step.must_execute() {
                must = Some(i);
            }
            let cached = i < self.state.len() && self.state[i].hash == step.hash();
            if !cached {
                return Some(must.map_or(i, |m| m.min(i)));
            }
        }
        must
    }

    /// Execute everything from the first invalid step on, tagging the steps
    /// before it as cached. On failure the state list is truncated to the
    /// steps attempted and persisted before the error is returned.
    pub fn provision(&mut self, logger: &Logger, conn: &dyn Connection) -> PurserResult<()> {
        let logger = logger.tag(&self.id);

        let first = match self.first_to_exec() {
            None => {
                logger.printf(format_args!("all steps cached"));
                return Ok(());
            }
            Some(first) => first,
        };

        let mut failure = None;
        let mut state = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let hash = step.hash().to_string();
            if i < first {
                logger.printf(format_args!("step {i} cached"));
                state.push(StatusToken::cached(&hash));
                continue;
            }
            match step.exec(&logger, conn) {
                Ok(()) => {
                    logger.printf(format_args!("executed {hash}"));
                    state.push(StatusToken::executed(&hash));
                }
                Err(err) => {
                    logger.printf(format_args!("failed in {hash}"));
                    state.push(StatusToken::failed(&hash));
                    failure = Some(err);
                    break;
                }
            }
        }
        self.state = state;

        let written = self.write_remote_state(conn);
        match failure {
            None => written,
            Some(err) => {
                if let Err(write_err) = written {
                    logger.printf(format_args!("failed to persist state: {write_err}"));
                }
                Err(err)
            }
        }
    }

    fn remote_log(&self) -> String {
        format!("{REMOTE_STATE_DIR}/{}.log", self.id)
    }

    fn read_remote_state(&self, conn: &dyn Connection) -> PurserResult<Vec<StatusToken>> {
        let log = self.remote_log();
        let cmd = connect::bash_c(&format!(
            "if [[ -f '{log}' ]]; then cat {log}; else mkdir -p {REMOTE_STATE_DIR}; fi"
        ));

        let output = connect::read_command(conn, &cmd)?;
        let mut state = Vec::new();
        for line in output.lines() {
            let token = StatusToken::parse(line)?;
            // failed steps are not valid cache entries
            if token.marker != Marker::Failed {
                state.push(token);
            }
        }
        Ok(state)
    }

    /// Write the full token list to a fresh timestamped file, then repoint
    /// the canonical log symlink. The canonical path is never overwritten in
    /// place, so a crash mid-write leaves the previous state intact.
    fn write_remote_state(&self, conn: &dyn Connection) -> PurserResult<()> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let file = format!("{REMOTE_STATE_DIR}/{}.{stamp}.log", self.id);
        let cmd = connect::bash_c(&format!(
            "rm -rf {REMOTE_SCRATCH_DIR}/*; cat - > {file} && ln -sf {file} {log}",
            log = self.remote_log(),
        ));

        let mut sess = conn.new_session()?;
        let result = (|| {
            sess.start(&cmd)?;
            let mut stdin = sess.stdin_pipe()?;
            let mut body = String::new();
            for token in &self.state {
                body.push_str(&token.to_string());
                body.push('\n');
            }
            stdin
                .write_all(body.as_bytes())
                .map_err(|e| PurserError::remote(format!("failed to send state to target: {e}")))?;
            drop(stdin);
            sess.wait()
        })();
        let closed = sess.close();
        result.and(closed)
    }
}
