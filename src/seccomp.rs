use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{parse_syscall_list, PodSyscalls};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeccompAction {
    #[serde(rename = "SCMP_ACT_ALLOW")]
    Allow,
    #[serde(rename = "SCMP_ACT_ERRNO")]
    Errno,
    #[serde(rename = "SCMP_ACT_KILL")]
    Kill,
    #[serde(rename = "SCMP_ACT_LOG")]
    Log,
}

impl SeccompAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeccompAction::Allow => "SCMP_ACT_ALLOW",
            SeccompAction::Errno => "SCMP_ACT_ERRNO",
            SeccompAction::Kill => "SCMP_ACT_KILL",
            SeccompAction::Log => "SCMP_ACT_LOG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeccompProfile {
    pub default_action: SeccompAction,
    pub architectures: Vec<String>,
    pub syscalls: Vec<SyscallRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallRule {
    pub names: Vec<String>,
    pub action: SeccompAction,
}

/// Profile plus the names that failed validation; those are excluded from
/// the profile, never silently dropped.
#[derive(Debug, Clone)]
pub struct SeccompOutcome {
    pub profile: SeccompProfile,
    pub invalid: Vec<String>,
}

/// seccomp architecture tokens for an observed machine architecture,
/// covering the 32-bit variants that can run on the same kernel.
fn architectures_for(arch: &str) -> Option<Vec<String>> {
    match arch.to_lowercase().as_str() {
        "x86_64" | "amd64" => Some(vec![
            "SCMP_ARCH_X86_64".to_string(),
            "SCMP_ARCH_X86".to_string(),
            "SCMP_ARCH_X32".to_string(),
        ]),
        "arm64" | "aarch64" => Some(vec![
            "SCMP_ARCH_AARCH64".to_string(),
            "SCMP_ARCH_ARM".to_string(),
        ]),
        _ => None,
    }
}

/// Deny-by-default allow-list profile from observed syscall telemetry.
/// All valid names across all records merge into one sorted, deduplicated
/// allow rule; no syscalls observed means a deny-all profile.
pub fn synthesize_seccomp_profile(records: &[PodSyscalls]) -> SeccompOutcome {
    let mut allowed: BTreeSet<String> = BTreeSet::new();
    let mut invalid: Vec<String> = Vec::new();
    let mut architectures: Option<Vec<String>> = None;

    for record in records {
        let (valid, bad) = parse_syscall_list(&record.syscalls);
        allowed.extend(valid);
        invalid.extend(bad);

        if architectures.is_none() {
            architectures = architectures_for(&record.arch);
            if architectures.is_none() && !record.arch.is_empty() {
                warn!(
                    "unknown architecture {:?} for pod {}, defaulting to x86_64",
                    record.arch, record.pod_name
                );
            }
        }
    }

    if !invalid.is_empty() {
        warn!("ignoring {} unrecognized syscall name(s)", invalid.len());
    }

    let syscalls = if allowed.is_empty() {
        Vec::new()
    } else {
        vec![SyscallRule {
            names: allowed.into_iter().collect(),
            action: SeccompAction::Allow,
        }]
    };

    SeccompOutcome {
        profile: SeccompProfile {
            default_action: SeccompAction::Errno,
            architectures: architectures
                .unwrap_or_else(|| architectures_for("x86_64").unwrap()),
            syscalls,
        },
        invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(syscalls: &str, arch: &str) -> PodSyscalls {
        PodSyscalls {
            pod_name: "api-7f9c".to_string(),
            pod_namespace: "default".to_string(),
            syscalls: syscalls.to_string(),
            arch: arch.to_string(),
            time_stamp: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn names_merge_sorted_and_deduplicated() {
        let outcome = synthesize_seccomp_profile(&[
            record("read,write,read", "x86_64"),
            record("read,openat", "x86_64"),
        ]);
        assert_eq!(outcome.profile.syscalls.len(), 1);
        let rule = &outcome.profile.syscalls[0];
        assert_eq!(rule.names, vec!["openat", "read", "write"]);
        assert_eq!(rule.action, SeccompAction::Allow);
        assert_eq!(outcome.profile.default_action, SeccompAction::Errno);
        assert!(outcome.invalid.is_empty());
    }

    #[test]
    fn invalid_names_are_reported_and_excluded() {
        let outcome = synthesize_seccomp_profile(&[record("open,INVALID_X,close", "x86_64")]);
        assert_eq!(outcome.invalid, vec!["INVALID_X"]);
        assert_eq!(outcome.profile.syscalls[0].names, vec!["close", "open"]);
        assert!(!outcome.profile.syscalls[0]
            .names
            .iter()
            .any(|n| n.eq_ignore_ascii_case("INVALID_X")));
    }

    #[test]
    fn empty_telemetry_yields_deny_all() {
        let outcome = synthesize_seccomp_profile(&[]);
        assert!(outcome.profile.syscalls.is_empty());
        assert_eq!(outcome.profile.default_action, SeccompAction::Errno);
        assert_eq!(
            outcome.profile.architectures,
            vec!["SCMP_ARCH_X86_64", "SCMP_ARCH_X86", "SCMP_ARCH_X32"]
        );
    }

    #[test]
    fn arm64_records_map_to_aarch64() {
        let outcome = synthesize_seccomp_profile(&[record("read", "arm64")]);
        assert_eq!(
            outcome.profile.architectures,
            vec!["SCMP_ARCH_AARCH64", "SCMP_ARCH_ARM"]
        );
    }

    #[test]
    fn unknown_arch_defaults_to_x86_64() {
        let outcome = synthesize_seccomp_profile(&[record("read", "riscv64")]);
        assert_eq!(
            outcome.profile.architectures,
            vec!["SCMP_ARCH_X86_64", "SCMP_ARCH_X86", "SCMP_ARCH_X32"]
        );
    }
}
