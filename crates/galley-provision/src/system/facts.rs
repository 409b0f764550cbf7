use galley_core::{parse_os_release, HostFacts};
use std::path::Path;
use sysinfo::{Disks, System};
use tracing::debug;

const UNKNOWN: &str = "unknown";

/// Measure cores, memory, root filesystem usage and the OS identity
#[must_use]
pub fn measure(os_release: &Path) -> HostFacts {
    let sys = System::new_all();
    let (total_storage, used_storage) = root_filesystem();
    let (distro, version) = distribution(os_release);

    let facts = HostFacts {
        cores: sys.cpus().len(),
        total_memory: sys.total_memory(),
        total_storage,
        used_storage,
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        distro,
        version,
    };
    debug!(?facts, "measured host");
    facts
}

fn root_filesystem() -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map_or((0, 0), |disk| {
            let total = disk.total_space();
            (total, total.saturating_sub(disk.available_space()))
        })
}

fn distribution(os_release: &Path) -> (String, String) {
    let fields = std::fs::read_to_string(os_release)
        .map(|content| parse_os_release(&content))
        .unwrap_or_default();
    let field = |key: &str| {
        fields
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string())
    };
    (field("NAME"), field("VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_from_os_release() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "NAME=\"Ubuntu\"\nVERSION=\"24.04.1 LTS (Noble Numbat)\"\n").unwrap();
        assert_eq!(
            distribution(&path),
            ("Ubuntu".to_string(), "24.04.1 LTS (Noble Numbat)".to_string())
        );
    }

    #[test]
    fn test_missing_os_release_is_unknown() {
        let (distro, version) = distribution(Path::new("/nonexistent/os-release"));
        assert_eq!(distro, "unknown");
        assert_eq!(version, "unknown");
    }

    #[test]
    fn test_measure_reports_this_host() {
        let facts = measure(Path::new("/nonexistent/os-release"));
        assert!(facts.cores > 0);
        assert!(facts.total_memory > 0);
        assert_eq!(facts.os, std::env::consts::OS);
    }
}
