use std::collections::{BTreeMap, BTreeSet, HashMap};

use futures::future::join_all;
use tracing::debug;

use crate::{IdentityResolver, PeerIdentity, PeerLookup, PodTraffic};

/// Bucket key for grouping traffic by peer. Named peers collapse into one
/// bucket per identity; external peers stay distinct per ip.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeerKey {
    Service { namespace: String, name: String },
    Pod { namespace: String, name: String },
    Ip { addr: String },
}

impl PeerKey {
    fn new(identity: &PeerIdentity, ip: &str) -> PeerKey {
        match identity {
            PeerIdentity::Service { name, namespace } => PeerKey::Service {
                namespace: namespace.clone().unwrap_or_else(|| "default".to_string()),
                name: name.clone(),
            },
            PeerIdentity::Pod { name, namespace } => PeerKey::Pod {
                namespace: namespace.clone().unwrap_or_else(|| "default".to_string()),
                name: name.clone(),
            },
            PeerIdentity::External => PeerKey::Ip {
                addr: ip.to_string(),
            },
        }
    }
}

/// One rule candidate: a resolved peer and every (protocol, port) pair
/// observed towards or from it.
#[derive(Debug, Clone)]
pub struct AggregatedRule {
    pub peer_ip: String,
    pub identity: PeerIdentity,
    pub ports: BTreeSet<(String, String)>,
}

/// Destination port of a flow. Ephemeral and unset ports ("0" or missing)
/// default to 80 so they never leak into a port list.
fn rule_port(port: Option<&str>) -> String {
    match port {
        Some(p) if !p.is_empty() && p != "0" => p.to_string(),
        _ => "80".to_string(),
    }
}

/// Group a workload's traffic rows into at most one rule per peer per
/// direction. Each distinct remote ip is resolved exactly once, up front.
pub async fn aggregate_traffic<L: PeerLookup>(
    records: &[PodTraffic],
    resolver: &IdentityResolver<L>,
) -> (Vec<AggregatedRule>, Vec<AggregatedRule>) {
    let unique_ips: BTreeSet<&str> = records
        .iter()
        .filter_map(|t| t.traffic_in_out_ip.as_deref())
        .filter(|ip| !ip.is_empty())
        .collect();

    // fan out, one resolution per distinct ip; the resolver coalesces
    // concurrent duplicates
    let resolutions = join_all(unique_ips.iter().map(|&ip| async move {
        (ip.to_string(), resolver.resolve(Some(ip)).await)
    }))
    .await;
    let identities: HashMap<String, PeerIdentity> = resolutions.into_iter().collect();
    debug!("resolved {} unique peer ips", identities.len());

    let mut ingress: BTreeMap<PeerKey, AggregatedRule> = BTreeMap::new();
    let mut egress: BTreeMap<PeerKey, AggregatedRule> = BTreeMap::new();

    for traffic in records {
        let Some(remote_ip) = traffic.traffic_in_out_ip.as_deref().filter(|ip| !ip.is_empty())
        else {
            continue;
        };
        let identity = identities
            .get(remote_ip)
            .cloned()
            .unwrap_or(PeerIdentity::External);

        let protocol = traffic
            .ip_protocol
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("TCP")
            .to_uppercase();

        // ingress allows traffic from the peer to the workload's own port;
        // egress allows traffic to the peer's port
        let (bucket, port) = match traffic.traffic_type.as_deref().map(str::to_lowercase) {
            Some(t) if t == "ingress" => (&mut ingress, rule_port(traffic.pod_port.as_deref())),
            Some(t) if t == "egress" => (
                &mut egress,
                rule_port(traffic.traffic_in_out_port.as_deref()),
            ),
            // no direction, no rule to derive
            _ => continue,
        };

        bucket
            .entry(PeerKey::new(&identity, remote_ip))
            .or_insert_with(|| AggregatedRule {
                peer_ip: remote_ip.to_string(),
                identity: identity.clone(),
                ports: BTreeSet::new(),
            })
            .ports
            .insert((protocol, port));
    }

    (
        ingress.into_values().collect(),
        egress.into_values().collect(),
    )
}
