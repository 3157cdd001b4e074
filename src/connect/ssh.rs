//! SSH transport
//!
//! Shells out to the system `ssh` binary with piped stdio; authentication is
//! the agent's problem (`BatchMode=yes`, no password prompts). Commands run
//! through `sudo` when the login user is not root.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};

use crate::connect::{Connection, Session};
use crate::error::{PurserError, PurserResult};

pub struct SshConnection {
    addr: String,
    user: String,
}

impl SshConnection {
    /// Open a channel to `user@addr`, probing it with a trivial command so
    /// unreachable hosts fail before any provisioning starts.
    pub fn connect(addr: impl Into<String>, user: impl Into<String>) -> PurserResult<Self> {
        let conn = SshConnection {
            addr: addr.into(),
            user: user.into(),
        };
        let mut sess = conn.new_session()?;
        let probe = sess.run("true");
        let _ = sess.close();
        probe.map_err(|e| {
            PurserError::channel(format!(
                "failed to connect to {}@{}: {e}",
                conn.user, conn.addr
            ))
        })?;
        Ok(conn)
    }
}

impl Connection for SshConnection {
    fn name(&self) -> &str {
        &self.addr
    }

    fn new_session(&self) -> PurserResult<Box<dyn Session>> {
        Ok(Box::new(SshSession {
            addr: self.addr.clone(),
            user: self.user.clone(),
            with_sudo: self.user != "root",
            child: None,
        }))
    }
}

pub struct SshSession {
    addr: String,
    user: String,
    with_sudo: bool,
    child: Option<Child>,
}

impl SshSession {
    fn child_mut(&mut self) -> PurserResult<&mut Child> {
        self.child
            .as_mut()
            .ok_or_else(|| PurserError::remote("session not started"))
    }
}

impl Session for SshSession {
    fn start(&mut self, cmd: &str) -> PurserResult<()> {
        if self.child.is_some() {
            return Err(PurserError::remote("session already started"));
        }
        let cmd = if self.with_sudo {
            format!("sudo {cmd}")
        } else {
            cmd.to_string()
        };
        let child = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-l")
            .arg(&self.user)
            .arg(&self.addr)
            .arg("--")
            .arg(&cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PurserError::channel(format!("failed to spawn ssh: {e}")))?;
        self.child = Some(child);
        Ok(())
    }

    fn wait(&mut self) -> PurserResult<()> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| PurserError::remote("session not started"))?;
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(PurserError::remote(format!("command exited with {status}")))
        }
    }

    fn stdin_pipe(&mut self) -> PurserResult<Box<dyn Write + Send>> {
        let stdin = self
            .child_mut()?
            .stdin
            .take()
            .ok_or_else(|| PurserError::remote("stdin pipe already taken"))?;
        Ok(Box::new(stdin))
    }

    fn stdout_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        let stdout = self
            .child_mut()?
            .stdout
            .take()
            .ok_or_else(|| PurserError::remote("stdout pipe already taken"))?;
        Ok(Box::new(stdout))
    }

    fn stderr_pipe(&mut self) -> PurserResult<Box<dyn Read + Send>> {
        let stderr = self
            .child_mut()?
            .stderr
            .take()
            .ok_or_else(|| PurserError::remote("stderr pipe already taken"))?;
        Ok(Box::new(stderr))
    }

    fn close(&mut self) -> PurserResult<()> {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}
