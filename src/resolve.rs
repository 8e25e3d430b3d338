use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::future::Cache;
use tracing::{debug, warn};

use crate::PeerLookup;

/// Who the remote side of an observed connection is. Resolution is total:
/// every ip maps to exactly one variant, `External` being the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerIdentity {
    Pod {
        name: String,
        namespace: Option<String>,
    },
    Service {
        name: String,
        namespace: Option<String>,
    },
    External,
}

impl PeerIdentity {
    pub fn is_external(&self) -> bool {
        matches!(self, PeerIdentity::External)
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            PeerIdentity::Pod { namespace, .. } | PeerIdentity::Service { namespace, .. } => {
                namespace.as_deref()
            }
            PeerIdentity::External => None,
        }
    }
}

/// Resolves ips to peer identities through a [`PeerLookup`], memoizing per
/// ip so one synthesis run sees a consistent answer and the backing store
/// is asked at most once per unique ip. Concurrent lookups for the same ip
/// are coalesced by the cache rather than raced.
///
/// Scoped to a single synthesis run; build a fresh one per run.
pub struct IdentityResolver<L> {
    lookup: L,
    identities: Cache<String, PeerIdentity>,
    labels: Cache<String, Option<BTreeMap<String, String>>>,
    lookups_ok: AtomicU64,
    lookups_failed: AtomicU64,
}

impl<L: PeerLookup> IdentityResolver<L> {
    pub fn new(lookup: L) -> Self {
        IdentityResolver {
            lookup,
            identities: Cache::new(10_000),
            labels: Cache::new(10_000),
            lookups_ok: AtomicU64::new(0),
            lookups_failed: AtomicU64::new(0),
        }
    }

    /// Resolve an observed ip. Service resolution takes precedence over pod
    /// resolution: a virtual service ip can also match an endpoint ip, and
    /// the service is the identity the policy should name.
    pub async fn resolve(&self, ip: Option<&str>) -> PeerIdentity {
        let Some(ip) = ip.filter(|ip| !ip.is_empty()) else {
            return PeerIdentity::External;
        };
        self.identities
            .get_with(ip.to_string(), self.resolve_uncached(ip))
            .await
    }

    async fn resolve_uncached(&self, ip: &str) -> PeerIdentity {
        match self.lookup.svc_by_ip(ip).await {
            Ok(Some(svc)) => {
                self.lookups_ok.fetch_add(1, Ordering::Relaxed);
                if let Some(name) = svc.svc_name.filter(|n| !n.is_empty()) {
                    debug!("resolved {} to service {}", ip, name);
                    return PeerIdentity::Service {
                        name,
                        namespace: svc.svc_namespace,
                    };
                }
            }
            Ok(None) => {
                self.lookups_ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.lookups_failed.fetch_add(1, Ordering::Relaxed);
                warn!("service lookup failed for {}: {}", ip, e);
            }
        }

        match self.lookup.pod_by_ip(ip).await {
            Ok(Some(pod)) if !pod.pod_name.is_empty() => {
                self.lookups_ok.fetch_add(1, Ordering::Relaxed);
                debug!("resolved {} to pod {}", ip, pod.pod_name);
                PeerIdentity::Pod {
                    name: pod.pod_name,
                    namespace: pod.pod_namespace,
                }
            }
            Ok(_) => {
                self.lookups_ok.fetch_add(1, Ordering::Relaxed);
                PeerIdentity::External
            }
            Err(e) => {
                self.lookups_failed.fetch_add(1, Ordering::Relaxed);
                warn!("pod lookup failed for {}: {}", ip, e);
                PeerIdentity::External
            }
        }
    }

    /// Selector labels for a named peer, memoized per name. `None` when the
    /// lookup misses or fails; callers fall back to `{app: <name>}`.
    pub async fn labels_for(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.labels
            .get_with(name.to_string(), async {
                match self.lookup.workload_labels(name).await {
                    Ok(labels) => {
                        self.lookups_ok.fetch_add(1, Ordering::Relaxed);
                        labels.filter(|l| !l.is_empty())
                    }
                    Err(e) => {
                        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
                        warn!("label lookup failed for {}: {}", name, e);
                        None
                    }
                }
            })
            .await
    }

    /// True when every lookup this run attempted failed at the transport
    /// level, i.e. the resulting document degraded every peer to External.
    pub fn degraded(&self) -> bool {
        self.lookups_failed.load(Ordering::Relaxed) > 0
            && self.lookups_ok.load(Ordering::Relaxed) == 0
    }
}
