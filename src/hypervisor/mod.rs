//! Hypervisor drivers
//!
//! A hypervisor creates virtual resources from blueprint text and hands out
//! channels into them. Drivers are selected by the `Hypervisor` attribute of
//! the resource.

mod smartos;

pub use smartos::SmartOs;

use crate::connect::Connection;
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;

pub trait Hypervisor {
    /// Create the virtual resource described by `blueprint`, returning its
    /// identifier.
    fn create(&self, logger: &Logger, blueprint: &str) -> PurserResult<String>;

    /// Look up an existing virtual resource by alias.
    fn uuid(&self, alias: &str) -> PurserResult<Option<String>>;

    /// Open a channel into the virtual resource.
    fn connect_vres(&self, uuid: &str) -> PurserResult<Box<dyn Connection>>;
}

/// Instantiate the driver named by `kind`, connected to the hypervisor host.
pub fn new(kind: &str, address: &str, username: &str) -> PurserResult<Box<dyn Hypervisor>> {
    match kind {
        "smartos" => Ok(Box::new(SmartOs::connect(address, username)?)),
        other => Err(PurserError::document(format!(
            "hypervisor {other:?} not supported"
        ))),
    }
}
