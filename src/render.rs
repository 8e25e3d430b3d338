//! Canonical text forms of the synthesized documents. YAML is written by
//! hand so that repeated rendering of an unmodified document is
//! byte-identical, with maps emitted in the document's own order.

use crate::{Error, NetworkPolicy, PolicyPeer, PolicyRule, Result, SeccompProfile};

fn push_rules(yaml: &mut Vec<String>, rules: &[PolicyRule], direction: &str) {
    for rule in rules {
        yaml.push(format!("  - {}:", direction));
        for peer in &rule.peers {
            yaml.push("    -".to_string());
            match peer {
                PolicyPeer::IpBlock { ip_block } => {
                    yaml.push("      ipBlock:".to_string());
                    yaml.push(format!("        cidr: {}", ip_block.cidr));
                    if !ip_block.except.is_empty() {
                        yaml.push("        except:".to_string());
                        for e in &ip_block.except {
                            yaml.push(format!("        - {}", e));
                        }
                    }
                }
                PolicyPeer::Selector {
                    pod_selector,
                    namespace_selector,
                } => {
                    yaml.push("      podSelector:".to_string());
                    yaml.push("        matchLabels:".to_string());
                    for (key, value) in &pod_selector.match_labels {
                        yaml.push(format!("          {}: {}", key, value));
                    }
                    if let Some(ns) = namespace_selector {
                        yaml.push("      namespaceSelector:".to_string());
                        yaml.push("        matchLabels:".to_string());
                        for (key, value) in &ns.match_labels {
                            yaml.push(format!("          {}: {}", key, value));
                        }
                    }
                }
            }
        }
        if !rule.ports.is_empty() {
            yaml.push("    ports:".to_string());
            for port in &rule.ports {
                yaml.push(format!("    - protocol: {}", port.protocol));
                yaml.push(format!("      port: {}", port.port));
            }
        }
    }
}

pub fn policy_to_yaml(policy: &NetworkPolicy) -> String {
    let mut yaml = Vec::new();

    yaml.push(format!("apiVersion: {}", policy.api_version));
    yaml.push(format!("kind: {}", policy.kind));
    yaml.push("metadata:".to_string());
    yaml.push(format!("  name: {}", policy.metadata.name));
    yaml.push(format!("  namespace: {}", policy.metadata.namespace));
    yaml.push("spec:".to_string());
    yaml.push("  podSelector:".to_string());
    yaml.push("    matchLabels:".to_string());
    for (key, value) in &policy.spec.pod_selector.match_labels {
        yaml.push(format!("      {}: {}", key, value));
    }

    if !policy.spec.policy_types.is_empty() {
        yaml.push("  policyTypes:".to_string());
        for policy_type in &policy.spec.policy_types {
            yaml.push(format!("  - {}", policy_type));
        }
    }

    if !policy.spec.ingress.is_empty() {
        yaml.push("  ingress:".to_string());
        push_rules(&mut yaml, &policy.spec.ingress, "from");
    }
    if !policy.spec.egress.is_empty() {
        yaml.push("  egress:".to_string());
        push_rules(&mut yaml, &policy.spec.egress, "to");
    }

    yaml.join("\n")
}

/// SeccompProfile CRD manifest for the profile.
pub fn profile_to_yaml(profile: &SeccompProfile, resource_name: &str, namespace: &str) -> String {
    let mut yaml = Vec::new();

    yaml.push("apiVersion: security.kubernetes.io/v1alpha1".to_string());
    yaml.push("kind: SeccompProfile".to_string());
    yaml.push("metadata:".to_string());
    yaml.push(format!("  name: {}-seccomp", resource_name));
    yaml.push(format!("  namespace: {}", namespace));
    yaml.push("spec:".to_string());
    yaml.push(format!("  defaultAction: {}", profile.default_action.as_str()));

    if !profile.architectures.is_empty() {
        yaml.push("  architectures:".to_string());
        for arch in &profile.architectures {
            yaml.push(format!("  - {}", arch));
        }
    }

    if !profile.syscalls.is_empty() {
        yaml.push("  syscalls:".to_string());
        for rule in &profile.syscalls {
            yaml.push("  - names:".to_string());
            for name in &rule.names {
                yaml.push(format!("    - {}", name));
            }
            yaml.push(format!("    action: {}", rule.action.as_str()));
        }
    }

    yaml.join("\n")
}

pub fn profile_to_json(profile: &SeccompProfile) -> Result<String> {
    serde_json::to_string_pretty(profile).map_err(Error::SerializationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        IpBlock, LabelSelector, Metadata, NetworkPolicySpec, PolicyPort, PortValue, SeccompAction,
        SyscallRule,
    };
    use std::collections::BTreeMap;

    fn sample_policy() -> NetworkPolicy {
        NetworkPolicy {
            api_version: "networking.k8s.io/v1".to_string(),
            kind: "NetworkPolicy".to_string(),
            metadata: Metadata {
                name: "api-policy".to_string(),
                namespace: "default".to_string(),
            },
            spec: NetworkPolicySpec {
                pod_selector: LabelSelector::new(BTreeMap::from([(
                    "app".to_string(),
                    "api".to_string(),
                )])),
                policy_types: vec!["Egress".to_string()],
                ingress: Vec::new(),
                egress: vec![PolicyRule {
                    peers: vec![
                        PolicyPeer::Selector {
                            pod_selector: LabelSelector::new(BTreeMap::from([(
                                "app".to_string(),
                                "payments".to_string(),
                            )])),
                            namespace_selector: Some(LabelSelector::new(BTreeMap::from([(
                                "kubernetes.io/metadata.name".to_string(),
                                "billing".to_string(),
                            )]))),
                        },
                        PolicyPeer::IpBlock {
                            ip_block: IpBlock {
                                cidr: "203.0.113.9/32".to_string(),
                                except: Vec::new(),
                            },
                        },
                    ],
                    ports: vec![PolicyPort {
                        protocol: "TCP".to_string(),
                        port: PortValue::Number(443),
                    }],
                }],
            },
        }
    }

    #[test]
    fn policy_yaml_matches_the_manifest_shape() {
        let expected = "\
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: api-policy
  namespace: default
spec:
  podSelector:
    matchLabels:
      app: api
  policyTypes:
  - Egress
  egress:
  - to:
    -
      podSelector:
        matchLabels:
          app: payments
      namespaceSelector:
        matchLabels:
          kubernetes.io/metadata.name: billing
    -
      ipBlock:
        cidr: 203.0.113.9/32
    ports:
    - protocol: TCP
      port: 443";
        assert_eq!(policy_to_yaml(&sample_policy()), expected);
    }

    #[test]
    fn rendering_is_idempotent() {
        let policy = sample_policy();
        assert_eq!(policy_to_yaml(&policy), policy_to_yaml(&policy));

        let profile = SeccompProfile {
            default_action: SeccompAction::Errno,
            architectures: vec!["SCMP_ARCH_X86_64".to_string()],
            syscalls: vec![SyscallRule {
                names: vec!["openat".to_string(), "read".to_string()],
                action: SeccompAction::Allow,
            }],
        };
        assert_eq!(
            profile_to_yaml(&profile, "api", "default"),
            profile_to_yaml(&profile, "api", "default")
        );
        assert_eq!(
            profile_to_json(&profile).unwrap(),
            profile_to_json(&profile).unwrap()
        );
    }

    #[test]
    fn profile_yaml_matches_the_crd_shape() {
        let profile = SeccompProfile {
            default_action: SeccompAction::Errno,
            architectures: vec!["SCMP_ARCH_X86_64".to_string(), "SCMP_ARCH_X86".to_string()],
            syscalls: vec![SyscallRule {
                names: vec!["openat".to_string(), "read".to_string()],
                action: SeccompAction::Allow,
            }],
        };
        let expected = "\
apiVersion: security.kubernetes.io/v1alpha1
kind: SeccompProfile
metadata:
  name: api-seccomp
  namespace: default
spec:
  defaultAction: SCMP_ACT_ERRNO
  architectures:
  - SCMP_ARCH_X86_64
  - SCMP_ARCH_X86
  syscalls:
  - names:
    - openat
    - read
    action: SCMP_ACT_ALLOW";
        assert_eq!(profile_to_yaml(&profile, "api", "default"), expected);
    }

    #[test]
    fn profile_json_carries_the_scmp_tokens() {
        let profile = SeccompProfile {
            default_action: SeccompAction::Errno,
            architectures: vec!["SCMP_ARCH_X86_64".to_string()],
            syscalls: vec![SyscallRule {
                names: vec!["read".to_string()],
                action: SeccompAction::Allow,
            }],
        };
        let json = profile_to_json(&profile).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["defaultAction"], "SCMP_ACT_ERRNO");
        assert_eq!(value["syscalls"][0]["action"], "SCMP_ACT_ALLOW");
        assert_eq!(value["syscalls"][0]["names"][0], "read");
    }
}
