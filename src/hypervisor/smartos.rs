//! SmartOS driver
//!
//! Talks to the global zone over SSH: `vmadm list` for alias lookup,
//! `imgadm`/`vmadm create` for creation (the blueprint is streamed on
//! stdin), and `zlogin`-wrapped channels into the zones themselves.

use std::io::{Read, Write};
use std::thread;

use crate::connect::{self, Connection, SshConnection, WrappedConnection};
use crate::error::{PurserError, PurserResult};
use crate::hypervisor::Hypervisor;
use crate::logger::Logger;

pub struct SmartOs {
    addr: String,
    user: String,
    conn: SshConnection,
}

impl SmartOs {
    pub fn connect(addr: &str, user: &str) -> PurserResult<Self> {
        let conn = SshConnection::connect(addr, user)?;
        Ok(SmartOs {
            addr: addr.to_string(),
            user: user.to_string(),
            conn,
        })
    }
}

impl Hypervisor for SmartOs {
    fn uuid(&self, alias: &str) -> PurserResult<Option<String>> {
        let listing = connect::read_command(&self.conn, "vmadm list -p")?;
        for line in listing.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() > 4 && fields[4] == alias {
                return Ok(Some(fields[0].to_string()));
            }
        }
        Ok(None)
    }

    fn connect_vres(&self, uuid: &str) -> PurserResult<Box<dyn Connection>> {
        let inner = SshConnection::connect(&self.addr, &self.user)?;
        Ok(Box::new(WrappedConnection::new(
            Box::new(inner),
            &format!("zlogin {uuid}"),
        )))
    }

    fn create(&self, logger: &Logger, blueprint: &str) -> PurserResult<String> {
        let spec: serde_json::Value = serde_json::from_str(blueprint)
            .map_err(|e| PurserError::document(format!("invalid blueprint JSON: {e}")))?;
        let image = spec
            .get("image_uuid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PurserError::document("blueprint is missing image_uuid"))?;

        logger.printf(format_args!("updating the image database"));
        connect::run_command(&self.conn, "imgadm update")?;
        logger.printf(format_args!("importing image {image}"));
        connect::run_command(&self.conn, &format!("imgadm import -q {image}"))?;

        logger.printf(format_args!("creating the virtual resource"));
        let mut sess = self.conn.new_session()?;
        let result = (|| {
            sess.start("vmadm create")?;

            // vmadm reports the created uuid on stderr
            let mut stderr = sess.stderr_pipe()?;
            let collector = thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            });

            let mut stdin = sess.stdin_pipe()?;
            stdin
                .write_all(blueprint.as_bytes())
                .map_err(|e| PurserError::remote(format!("failed to send blueprint: {e}")))?;
            drop(stdin);

            let waited = sess.wait();
            let output = collector.join().unwrap_or_default();
            let output = output.trim();
            waited.map_err(|e| PurserError::remote(format!("{e}: {output}")))?;

            const PREFIX: &str = "Successfully created VM ";
            match output.strip_prefix(PREFIX) {
                Some(uuid) => Ok(uuid.to_string()),
                None => Err(PurserError::remote(format!(
                    "wrong response received: {output}"
                ))),
            }
        })();
        let closed = sess.close();
        let uuid = result?;
        closed?;
        Ok(uuid)
    }
}
