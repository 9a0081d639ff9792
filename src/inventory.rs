//! What NIM knows about the VIOS partitions it manages.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::exec::RemoteExecutor;
use crate::model::Management;
use crate::parse::lsnim::{parse_attributes, parse_object_names};

/// Inventory lookups used to validate pairs and match discovery output.
pub trait Inventory: Send + Sync {
    /// Names of every VIOS defined to NIM.
    fn known_vios(&self) -> BTreeSet<String>;

    /// Managing CEC serial and partition id of a VIOS, when NIM has them.
    fn management(&self, vios: &str) -> Option<Management>;
}

/// Inventory read from the NIM database on the master with `lsnim`.
pub struct NimInventory<'a> {
    exec: &'a dyn RemoteExecutor,
    master: &'a str,
}

impl<'a> NimInventory<'a> {
    pub fn new(exec: &'a dyn RemoteExecutor, master: &'a str) -> Self {
        Self { exec, master }
    }

    fn lines(&self, command: &str) -> Option<Vec<String>> {
        match self.exec.execute(self.master, command) {
            Ok(out) if out.success => Some(out.stdout),
            Ok(out) => {
                warn!(command, stderr = %out.stderr.join(" "), "NIM query failed");
                None
            }
            Err(e) => {
                warn!(command, "{e}");
                None
            }
        }
    }
}

impl Inventory for NimInventory<'_> {
    fn known_vios(&self) -> BTreeSet<String> {
        self.lines("/usr/sbin/lsnim -t vios")
            .map(|lines| parse_object_names(&lines).into_iter().collect())
            .unwrap_or_default()
    }

    /// `mgmt_profile1 = <hmc> <lpar id> <cec>`, then `serial` of the CEC object.
    fn management(&self, vios: &str) -> Option<Management> {
        let attrs = parse_attributes(&self.lines(&format!("/usr/sbin/lsnim -l {vios}"))?);
        let profile = attrs.get("mgmt_profile1")?;
        let mut fields = profile.split_whitespace();
        let _hmc = fields.next()?;
        let partition_id = fields.next()?.to_string();
        let cec = fields.next()?;

        let cec_attrs = parse_attributes(&self.lines(&format!("/usr/sbin/lsnim -l {cec}"))?);
        let cec_serial = cec_attrs.get("serial")?.clone();
        debug!(vios, cec, %cec_serial, %partition_id, "management identifiers");

        Some(Management {
            cec_serial,
            partition_id,
        })
    }
}
