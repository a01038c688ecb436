//! Network namespace operations (spec §4.4 "Namespace operations").
//! Grounded on the teacher's use of `nix::sched::unshare` (present in
//! its `Cargo.toml` dependency set) generalized to the create/enter/
//! bind-mount sequence `ip netns add` itself performs.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use nix::sched::{setns, unshare, CloneFlags};
use nix::mount::{mount, MsFlags};

use crate::error::{NetlinkError, Result};

const NETNS_RUN_DIR: &str = "/var/run/netns";

fn ns_path(name: &str) -> PathBuf {
    Path::new(NETNS_RUN_DIR).join(name)
}

/// Creates a named namespace: unshares `CLONE_NEWNET` in this process
/// and bind-mounts the resulting `/proc/self/ns/net` onto a persistent
/// path under `/var/run/netns`, the same mechanism `ip netns add` uses
/// so the namespace survives after this process exits.
pub fn create(name: &str) -> Result<()> {
    fs::create_dir_all(NETNS_RUN_DIR).map_err(|e| NetlinkError::Namespace(e.to_string()))?;

    let target = ns_path(name);
    if target.exists() {
        return Err(NetlinkError::AlreadyExists { kind: "namespace" });
    }
    File::create(&target).map_err(|e| NetlinkError::Namespace(e.to_string()))?;

    unshare(CloneFlags::CLONE_NEWNET).map_err(|e| NetlinkError::Namespace(e.to_string()))?;

    mount(
        Some("/proc/self/ns/net"),
        &target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| NetlinkError::Namespace(e.to_string()))?;

    Ok(())
}

/// Enters an existing named namespace in the calling thread.
pub fn enter(name: &str) -> Result<()> {
    let target = ns_path(name);
    let file = File::open(&target).map_err(|_| NetlinkError::Namespace(format!("namespace {name} not found")))?;
    setns(file, CloneFlags::CLONE_NEWNET).map_err(|e| NetlinkError::Namespace(e.to_string()))?;
    Ok(())
}

/// Removes a namespace's bind mount and backing file.
pub fn delete(name: &str) -> Result<()> {
    let target = ns_path(name);
    if !target.exists() {
        return Err(NetlinkError::Namespace(format!("namespace {name} not found")));
    }
    let _ = nix::mount::umount(&target);
    fs::remove_file(&target).map_err(|e| NetlinkError::Namespace(e.to_string()))?;
    Ok(())
}

pub fn list() -> Result<Vec<String>> {
    let entries = match fs::read_dir(NETNS_RUN_DIR) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(NetlinkError::Namespace(e.to_string())),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| NetlinkError::Namespace(e.to_string()))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ns_path_joins_run_dir() {
        assert_eq!(ns_path("blue"), PathBuf::from("/var/run/netns/blue"));
    }

    #[test]
    #[ignore = "requires CAP_SYS_ADMIN to unshare a network namespace"]
    fn create_and_delete_round_trip() {
        create("netlink-test-ns").unwrap();
        delete("netlink-test-ns").unwrap();
    }
}
