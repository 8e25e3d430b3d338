use tracing::{info, warn};

use crate::{
    aggregate_traffic, synthesize_network_policy, synthesize_seccomp_profile, IdentityResolver,
    NetworkPolicy, PeerLookup, PodSyscalls, PodTraffic, SeccompProfile, Workload,
};

/// Everything one synthesis run produced for a workload. Synthesis is
/// best-effort: problems become warnings next to a reviewable document,
/// never a failure.
#[derive(Debug, Clone)]
pub struct PolicyOutput {
    pub network_policy: NetworkPolicy,
    pub seccomp_profile: SeccompProfile,
    /// syscall names that failed validation and were excluded
    pub invalid_syscalls: Vec<String>,
    pub warnings: Vec<String>,
}

/// Runs the whole pipeline for one workload: aggregate traffic, synthesize
/// both documents. Each `advise` call gets a fresh resolver so the ip cache
/// is scoped to that run.
pub struct Advisor<L> {
    lookup: L,
}

impl<L: PeerLookup> Advisor<L> {
    pub fn new(lookup: L) -> Self {
        Advisor { lookup }
    }

    pub async fn advise(
        &self,
        workload: &Workload,
        traffic: &[PodTraffic],
        syscalls: &[PodSyscalls],
    ) -> PolicyOutput {
        let resolver = IdentityResolver::new(&self.lookup);

        let (ingress, egress) = aggregate_traffic(traffic, &resolver).await;
        info!(
            "aggregated {} traffic rows for {} into {} ingress / {} egress rules",
            traffic.len(),
            workload.name,
            ingress.len(),
            egress.len()
        );

        let network_policy =
            synthesize_network_policy(workload, &ingress, &egress, &resolver).await;
        let seccomp = synthesize_seccomp_profile(syscalls);

        let mut warnings = Vec::new();
        if resolver.degraded() {
            let msg = format!(
                "all identity lookups failed for {}; peers were written as ipBlock entries",
                workload.name
            );
            warn!("{}", msg);
            warnings.push(msg);
        }
        if !seccomp.invalid.is_empty() {
            warnings.push(format!(
                "excluded {} unrecognized syscall name(s): {}",
                seccomp.invalid.len(),
                seccomp.invalid.join(", ")
            ));
        }

        PolicyOutput {
            network_policy,
            seccomp_profile: seccomp.profile,
            invalid_syscalls: seccomp.invalid,
            warnings,
        }
    }
}
