use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AggregatedRule, IdentityResolver, PeerIdentity, PeerLookup, Workload};

pub const NETWORK_POLICY_API_VERSION: &str = "networking.k8s.io/v1";
pub const NETWORK_POLICY_KIND: &str = "NetworkPolicy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPolicy {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: NetworkPolicySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    pub pod_selector: LabelSelector,
    pub policy_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<PolicyRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new(match_labels: BTreeMap<String, String>) -> Self {
        LabelSelector { match_labels }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub peers: Vec<PolicyPeer>,
    pub ports: Vec<PolicyPort>,
}

/// A `from`/`to` entry. Named peers are selected by labels, optionally
/// scoped to another namespace; everything else is an ip block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyPeer {
    IpBlock {
        #[serde(rename = "ipBlock")]
        ip_block: IpBlock,
    },
    Selector {
        #[serde(rename = "podSelector")]
        pod_selector: LabelSelector,
        #[serde(rename = "namespaceSelector", skip_serializing_if = "Option::is_none")]
        namespace_selector: Option<LabelSelector>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpBlock {
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPort {
    pub protocol: String,
    pub port: PortValue,
}

/// Numeric when the observed port parses, the raw string otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Name(String),
}

impl PortValue {
    pub fn parse(port: &str) -> PortValue {
        match port.parse::<u16>() {
            Ok(n) => PortValue::Number(n),
            Err(_) => PortValue::Name(port.to_string()),
        }
    }
}

impl std::fmt::Display for PortValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortValue::Number(n) => write!(f, "{}", n),
            PortValue::Name(s) => write!(f, "{}", s),
        }
    }
}

async fn policy_peer<L: PeerLookup>(
    rule: &AggregatedRule,
    workload_namespace: &str,
    resolver: &IdentityResolver<L>,
) -> PolicyPeer {
    let (name, namespace) = match &rule.identity {
        PeerIdentity::External => {
            return PolicyPeer::IpBlock {
                ip_block: IpBlock {
                    cidr: format!("{}/32", rule.peer_ip),
                    except: Vec::new(),
                },
            };
        }
        PeerIdentity::Service { name, namespace } | PeerIdentity::Pod { name, namespace } => {
            (name, namespace.as_deref())
        }
    };

    let labels = resolver
        .labels_for(name)
        .await
        .unwrap_or_else(|| BTreeMap::from([("app".to_string(), name.clone())]));

    // a peer in another namespace needs a namespace selector next to the
    // pod selector; same-namespace peers stay namespace-scoped
    let namespace_selector = namespace
        .filter(|ns| *ns != workload_namespace)
        .map(|ns| {
            LabelSelector::new(BTreeMap::from([(
                "kubernetes.io/metadata.name".to_string(),
                ns.to_string(),
            )]))
        });

    PolicyPeer::Selector {
        pod_selector: LabelSelector::new(labels),
        namespace_selector,
    }
}

fn policy_rule(peer: PolicyPeer, rule: &AggregatedRule) -> PolicyRule {
    PolicyRule {
        peers: vec![peer],
        ports: rule
            .ports
            .iter()
            .map(|(protocol, port)| PolicyPort {
                protocol: protocol.to_uppercase(),
                port: PortValue::parse(port),
            })
            .collect(),
    }
}

/// Build the NetworkPolicy document for a workload from its aggregated
/// rules. `policyTypes` is derived from which rule lists are non-empty.
pub async fn synthesize_network_policy<L: PeerLookup>(
    workload: &Workload,
    ingress: &[AggregatedRule],
    egress: &[AggregatedRule],
    resolver: &IdentityResolver<L>,
) -> NetworkPolicy {
    let namespace = if workload.namespace.is_empty() {
        "default"
    } else {
        workload.namespace.as_str()
    };

    let mut ingress_rules = Vec::with_capacity(ingress.len());
    for rule in ingress {
        let peer = policy_peer(rule, namespace, resolver).await;
        ingress_rules.push(policy_rule(peer, rule));
    }
    let mut egress_rules = Vec::with_capacity(egress.len());
    for rule in egress {
        let peer = policy_peer(rule, namespace, resolver).await;
        egress_rules.push(policy_rule(peer, rule));
    }

    let mut policy_types = Vec::new();
    if !ingress_rules.is_empty() {
        policy_types.push("Ingress".to_string());
    }
    if !egress_rules.is_empty() {
        policy_types.push("Egress".to_string());
    }

    NetworkPolicy {
        api_version: NETWORK_POLICY_API_VERSION.to_string(),
        kind: NETWORK_POLICY_KIND.to_string(),
        metadata: Metadata {
            name: format!("{}-policy", workload.resource_name()),
            namespace: namespace.to_string(),
        },
        spec: NetworkPolicySpec {
            pod_selector: LabelSelector::new(workload.selector_labels()),
            policy_types,
            ingress: ingress_rules,
            egress: egress_rules,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregate_traffic, PodTraffic, SnapshotLookup, SvcDetail};
    use chrono::Utc;

    fn egress_record(remote: &str, port: &str) -> PodTraffic {
        PodTraffic {
            uuid: uuid::Uuid::new_v4().to_string(),
            pod_name: Some("api".to_string()),
            pod_namespace: Some("default".to_string()),
            pod_ip: Some("10.1.0.4".to_string()),
            pod_port: Some("0".to_string()),
            ip_protocol: Some("TCP".to_string()),
            traffic_type: Some("EGRESS".to_string()),
            traffic_in_out_ip: Some(remote.to_string()),
            traffic_in_out_port: Some(port.to_string()),
            decision: Some("ALLOW".to_string()),
            time_stamp: Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn cross_namespace_service_peer_gets_a_namespace_selector() {
        let mut snapshot = SnapshotLookup::new();
        snapshot.insert_svc(SvcDetail {
            svc_ip: "10.0.0.5".to_string(),
            svc_name: Some("payments".to_string()),
            svc_namespace: Some("billing".to_string()),
            service_spec: None,
            time_stamp: Utc::now().naive_utc(),
        });
        let resolver = IdentityResolver::new(snapshot);
        let workload = Workload::new("api", "default");

        let (ingress, egress) =
            aggregate_traffic(&[egress_record("10.0.0.5", "443")], &resolver).await;
        let policy = synthesize_network_policy(&workload, &ingress, &egress, &resolver).await;

        assert_eq!(policy.metadata.name, "api-policy");
        assert_eq!(policy.metadata.namespace, "default");
        assert_eq!(policy.spec.policy_types, vec!["Egress"]);
        assert!(policy.spec.ingress.is_empty());
        assert_eq!(policy.spec.egress.len(), 1);

        let rule = &policy.spec.egress[0];
        assert_eq!(
            rule.ports,
            vec![PolicyPort {
                protocol: "TCP".to_string(),
                port: PortValue::Number(443),
            }]
        );
        match &rule.peers[0] {
            PolicyPeer::Selector {
                pod_selector,
                namespace_selector,
            } => {
                assert_eq!(
                    pod_selector.match_labels,
                    BTreeMap::from([("app".to_string(), "payments".to_string())])
                );
                assert_eq!(
                    namespace_selector.as_ref().unwrap().match_labels,
                    BTreeMap::from([(
                        "kubernetes.io/metadata.name".to_string(),
                        "billing".to_string()
                    )])
                );
            }
            other => panic!("expected a selector peer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn same_namespace_peer_has_no_namespace_selector() {
        let mut snapshot = SnapshotLookup::new();
        snapshot.insert_svc(SvcDetail {
            svc_ip: "10.0.0.6".to_string(),
            svc_name: Some("cart".to_string()),
            svc_namespace: Some("default".to_string()),
            service_spec: None,
            time_stamp: Utc::now().naive_utc(),
        });
        snapshot.insert_labels(
            "cart",
            BTreeMap::from([("app.kubernetes.io/name".to_string(), "cart".to_string())]),
        );
        let resolver = IdentityResolver::new(snapshot);
        let workload = Workload::new("api", "default");

        let (ingress, egress) =
            aggregate_traffic(&[egress_record("10.0.0.6", "8080")], &resolver).await;
        let policy = synthesize_network_policy(&workload, &ingress, &egress, &resolver).await;

        match &policy.spec.egress[0].peers[0] {
            PolicyPeer::Selector {
                pod_selector,
                namespace_selector,
            } => {
                assert!(namespace_selector.is_none());
                assert_eq!(
                    pod_selector.match_labels,
                    BTreeMap::from([(
                        "app.kubernetes.io/name".to_string(),
                        "cart".to_string()
                    )])
                );
            }
            other => panic!("expected a selector peer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn external_peer_becomes_an_ip_block() {
        let resolver = IdentityResolver::new(SnapshotLookup::new());
        let workload = Workload::new("api", "default");

        let (ingress, egress) =
            aggregate_traffic(&[egress_record("203.0.113.9", "443")], &resolver).await;
        let policy = synthesize_network_policy(&workload, &ingress, &egress, &resolver).await;

        match &policy.spec.egress[0].peers[0] {
            PolicyPeer::IpBlock { ip_block } => {
                assert_eq!(ip_block.cidr, "203.0.113.9/32");
                assert!(ip_block.except.is_empty());
            }
            other => panic!("expected an ipBlock peer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_input_yields_an_empty_policy() {
        let resolver = IdentityResolver::new(SnapshotLookup::new());
        let workload = Workload::new("api", "");
        let policy = synthesize_network_policy(&workload, &[], &[], &resolver).await;
        assert!(policy.spec.policy_types.is_empty());
        assert!(policy.spec.ingress.is_empty());
        assert!(policy.spec.egress.is_empty());
        assert_eq!(policy.metadata.namespace, "default");
    }

    #[tokio::test]
    async fn unparsable_ports_degrade_to_strings() {
        let resolver = IdentityResolver::new(SnapshotLookup::new());
        let workload = Workload::new("api", "default");
        let (ingress, egress) =
            aggregate_traffic(&[egress_record("203.0.113.9", "https")], &resolver).await;
        let policy = synthesize_network_policy(&workload, &ingress, &egress, &resolver).await;
        assert_eq!(
            policy.spec.egress[0].ports[0].port,
            PortValue::Name("https".to_string())
        );
    }
}
