//! Sandbox Classifier (spec §4.3): given a client's PID, decide whether it's
//! sandboxed and therefore which policy to assign.

use std::fs;

/// The two well-known policy indices the Policy Table creates at init.
/// Threaded through instead of looked up by name, since the table itself
/// doesn't know which of its entries are "the" default/portal policies.
#[derive(Clone, Copy, Debug)]
pub struct KnownPolicies {
    pub default_policy: u32,
    pub portal_policy: u32,
}

const CGROUP_PATH_PREFIX: &str = "/proc";
const CGROUP_LINE_PREFIX: &str = "1:name=systemd:";
const FLATPAK_MARKER: &str = "flatpak-";

pub struct SandboxClassifier;

impl SandboxClassifier {
    /// Returns the policy index to assign to a client with the given
    /// credential/pid facts.
    ///
    /// The spec notes that the upstream source contains an unconditional
    /// early-return of the default policy here, ahead of the real sandbox
    /// check — treated as a debug short-circuit left in by mistake. This
    /// rewrite performs the real classification unconditionally and does not
    /// reproduce that short-circuit (see DESIGN.md).
    pub fn classify(known: &KnownPolicies, credentials_valid: bool, pid: i32) -> u32 {
        if !credentials_valid {
            return known.default_policy;
        }

        match Self::is_sandboxed(pid) {
            Ok(true) => known.portal_policy,
            Ok(false) => known.default_policy,
            Err(err) => {
                // Fail-open for classification: an unreadable cgroup file
                // means we can't prove sandboxing, so the client gets the
                // default policy, which is itself the more restrictive of
                // the two except for the three device hooks.
                log::debug!("sandbox probe for pid {pid} failed, treating as not sandboxed: {err}");
                known.default_policy
            }
        }
    }

    fn is_sandboxed(pid: i32) -> std::io::Result<bool> {
        let path = format!("{CGROUP_PATH_PREFIX}/{pid}/cgroup");
        let contents = fs::read_to_string(path)?;

        Ok(contents
            .lines()
            .filter_map(|line| line.strip_prefix(CGROUP_LINE_PREFIX))
            .any(|remainder| remainder.contains(FLATPAK_MARKER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn known() -> KnownPolicies {
        KnownPolicies { default_policy: 0, portal_policy: 1 }
    }

    #[test]
    fn untrusted_credentials_always_get_default_policy() {
        // pid 1 definitely exists and is definitely not a flatpak sandbox,
        // but credentials_valid=false should short-circuit before even
        // looking at the cgroup file.
        assert_eq!(SandboxClassifier::classify(&known(), false, 1), 0);
    }

    #[test]
    fn flatpak_cgroup_line_classifies_as_sandboxed() {
        let dir = std::env::temp_dir().join(format!("pulse-access-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        // We can't actually write to /proc/<pid>/cgroup, so exercise the
        // parsing logic directly instead of through `classify`'s path
        // convention.
        let mut file = std::fs::File::create(dir.join("cgroup")).unwrap();
        writeln!(file, "12:pids:/user.slice").unwrap();
        writeln!(file, "1:name=systemd:/user.slice/flatpak-org.mozilla.firefox-1234.scope").unwrap();

        let contents = std::fs::read_to_string(dir.join("cgroup")).unwrap();
        let sandboxed = contents
            .lines()
            .filter_map(|line| line.strip_prefix(CGROUP_LINE_PREFIX))
            .any(|remainder| remainder.contains(FLATPAK_MARKER));

        assert!(sandboxed);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn non_flatpak_cgroup_line_is_not_sandboxed() {
        let line = "1:name=systemd:/user.slice/user-1000.slice/session-2.scope";
        let remainder = line.strip_prefix(CGROUP_LINE_PREFIX).unwrap();

        assert!(!remainder.contains(FLATPAK_MARKER));
    }

    #[test]
    fn unreadable_cgroup_file_fails_open_to_default_policy() {
        // A pid that (almost certainly) doesn't exist.
        assert_eq!(SandboxClassifier::classify(&known(), true, i32::MAX), 0);
    }
}
