//! Resources and the three-phase provisioning driver
//!
//! A resource is the top-level unit of one document: its attributes, an
//! optional blueprint for virtual resources, and the flattened package list.
//! Provisioning runs Prepare → Generate → Provision; packages are applied
//! sequentially and the resource aborts on the first package failure.

use std::net::ToSocketAddrs;

use crate::attrs::Attributes;
use crate::connect::{self, Connection, SshConnection};
use crate::error::{PurserError, PurserResult};
use crate::hypervisor::{self, Hypervisor};
use crate::logger::Logger;
use crate::package::{Package, REMOTE_SCRATCH_DIR, REMOTE_STATE_DIR};
use crate::render;

pub struct Resource {
    pub id: String,
    pub name: String,
    pub blueprint: Option<String>,
    pub attributes: Attributes,
    pub packages: Vec<Package>,

    pub(crate) default_username: Option<String>,

    conn: Option<Box<dyn Connection>>,
    hypervisor: Option<Box<dyn Hypervisor>>,
    uuid: Option<String>,
    address: String,
    username: String,
    is_virtual: bool,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("blueprint", &self.blueprint)
            .field("attributes", &self.attributes)
            .field("packages", &self.packages)
            .field("default_username", &self.default_username)
            .field("uuid", &self.uuid)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("is_virtual", &self.is_virtual)
            .finish_non_exhaustive()
    }
}

impl Resource {
    pub(crate) fn new(id: &str, name: &str) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("Hostname", id);
        Resource {
            id: id.to_string(),
            name: name.to_string(),
            blueprint: None,
            attributes,
            packages: Vec::new(),
            default_username: None,
            conn: None,
            hypervisor: None,
            uuid: None,
            address: String::new(),
            username: String::new(),
            is_virtual: false,
        }
    }

    /// Inject an existing channel, bypassing SSH and hypervisor resolution.
    /// Used by tests and callers that manage their own transport.
    pub fn with_connection(&mut self, conn: Box<dyn Connection>) {
        self.conn = Some(conn);
    }

    /// Establish (or validate) the channel and prepare every package,
    /// reading persisted state from the target where one exists.
    pub fn prepare(&mut self, logger: &Logger) -> PurserResult<()> {
        let logger = logger.tag(&self.id);
        self.initialize_channel(&logger)?;

        for pkg in &mut self.packages {
            pkg.prepare(self.conn.as_deref(), &self.attributes)?;
        }
        Ok(())
    }

    /// Create the virtual resource if it does not exist yet, then make sure
    /// the remote working directories are in place.
    pub fn generate(&mut self, logger: &Logger) -> PurserResult<()> {
        if self.is_virtual && self.conn.is_none() {
            let uuid = match self.uuid.clone() {
                Some(uuid) => uuid,
                None => {
                    let blueprint = self.blueprint.as_deref().ok_or_else(|| {
                        PurserError::document("virtual resource without a blueprint")
                    })?;
                    let rendered = render::render_str(
                        &format!("{}/blueprint", self.id),
                        blueprint,
                        &self.attributes,
                    )?;
                    let uuid = self.require_hypervisor()?.create(logger, &rendered)?;
                    self.uuid = Some(uuid.clone());
                    uuid
                }
            };
            let conn = self.require_hypervisor()?.connect_vres(&uuid)?;
            self.conn = Some(conn);
        }

        let conn = self.connection()?;
        connect::run_command(
            conn,
            &connect::bash_c(&format!(
                "mkdir -p {REMOTE_SCRATCH_DIR} && mkdir -p {REMOTE_STATE_DIR}"
            )),
        )
    }

    /// Apply every package in document order, aborting on the first failure.
    pub fn provision(&mut self, logger: &Logger) -> PurserResult<()> {
        let logger = logger.tag(&self.id);
        let conn = self
            .conn
            .as_deref()
            .ok_or_else(|| PurserError::channel("no channel to the resource"))?;

        for pkg in &mut self.packages {
            pkg.provision(&logger, conn)?;
        }
        Ok(())
    }

    fn connection(&self) -> PurserResult<&dyn Connection> {
        self.conn
            .as_deref()
            .ok_or_else(|| PurserError::channel("no channel to the resource"))
    }

    fn require_hypervisor(&self) -> PurserResult<&dyn Hypervisor> {
        self.hypervisor
            .as_deref()
            .ok_or_else(|| PurserError::document("virtual resource without a hypervisor"))
    }

    fn initialize_channel(&mut self, logger: &Logger) -> PurserResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let hypervisor_kind = self.attributes.get("Hypervisor").map(str::to_string);
        self.is_virtual = hypervisor_kind.is_some();

        if !self.is_virtual && self.blueprint.is_some() {
            return Err(PurserError::document(
                "hypervisor must be set for a blueprint to be supported",
            ));
        }

        self.resolve_address()?;
        self.username = self
            .attributes
            .get("Username")
            .map(str::to_string)
            .or_else(|| self.default_username.clone())
            .unwrap_or_else(|| "root".to_string());

        match hypervisor_kind {
            Some(kind) => {
                let hv = hypervisor::new(&kind, &self.address, &self.username)?;
                if let Some(uuid) = hv.uuid(&self.id)? {
                    self.conn = Some(hv.connect_vres(&uuid)?);
                    self.uuid = Some(uuid);
                }
                self.hypervisor = Some(hv);
            }
            None => {
                logger.printf(format_args!(
                    "connecting to {}@{}",
                    self.username, self.address
                ));
                self.conn = Some(Box::new(SshConnection::connect(
                    &self.address,
                    &self.username,
                )?));
            }
        }
        Ok(())
    }

    fn resolve_address(&mut self) -> PurserResult<()> {
        if self.is_virtual {
            self.address = self
                .attributes
                .get("Host")
                .ok_or_else(|| {
                    PurserError::document("no Host address specified for the hypervisor")
                })?
                .to_string();
            return Ok(());
        }

        if let Some(addr) = self.attributes.get("Address") {
            self.address = addr.to_string();
            return Ok(());
        }

        for candidate in [&self.name, &self.id] {
            if let Ok(mut resolved) = (candidate.as_str(), 22).to_socket_addrs() {
                if let Some(addr) = resolved.next() {
                    self.address = addr.ip().to_string();
                    return Ok(());
                }
            }
        }
        Err(PurserError::document(
            "host Address attribute not specified",
        ))
    }
}
