use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One observed flow sample for a pod, as recorded by the broker.
/// Many rows may describe the same logical flow.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct PodTraffic {
    pub uuid: String,
    pub pod_name: Option<String>,
    pub pod_namespace: Option<String>,
    pub pod_ip: Option<String>,
    pub pod_port: Option<String>,
    pub ip_protocol: Option<String>,
    pub traffic_type: Option<String>,
    pub traffic_in_out_ip: Option<String>,
    pub traffic_in_out_port: Option<String>,
    /// ALLOW or DROP, when the datapath reported a verdict
    #[serde(default)]
    pub decision: Option<String>,
    pub time_stamp: NaiveDateTime,
}

/// Syscalls observed for a pod. `syscalls` is a comma-separated list;
/// each entry is validated independently.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct PodSyscalls {
    pub pod_name: String,
    pub pod_namespace: String,
    pub syscalls: String,
    pub arch: String,
    pub time_stamp: NaiveDateTime,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct PodDetail {
    pub pod_ip: String,
    pub pod_name: String,
    pub pod_namespace: Option<String>,
    pub pod_obj: Option<serde_json::Value>,
    #[serde(default)]
    pub pod_identity: Option<String>,
    #[serde(default)]
    pub workload_selector_labels: Option<BTreeMap<String, String>>,
    pub time_stamp: NaiveDateTime,
}

impl PodDetail {
    /// Labels to select this pod by: the owning workload's selector labels
    /// when the broker recorded them, else the labels on the pod object.
    pub fn labels(&self) -> Option<BTreeMap<String, String>> {
        if let Some(selector) = &self.workload_selector_labels {
            if !selector.is_empty() {
                return Some(selector.clone());
            }
        }
        let labels = self
            .pod_obj
            .as_ref()?
            .pointer("/metadata/labels")?
            .as_object()?;
        let labels: BTreeMap<String, String> = labels
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect();
        if labels.is_empty() {
            None
        } else {
            Some(labels)
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct SvcDetail {
    pub svc_ip: String,
    pub svc_name: Option<String>,
    pub svc_namespace: Option<String>,
    pub service_spec: Option<serde_json::Value>,
    pub time_stamp: NaiveDateTime,
}

/// The workload a synthesis run targets.
#[derive(Debug, Default, Clone)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    /// Stable identity derived from workload labels, preferred over the
    /// pod name when naming generated resources
    pub identity: Option<String>,
    /// Selector labels for the workload itself
    pub labels: Option<BTreeMap<String, String>>,
}

impl Workload {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Workload {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn from_detail(detail: &PodDetail) -> Self {
        Workload {
            name: detail.pod_name.clone(),
            namespace: detail
                .pod_namespace
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            identity: detail.pod_identity.clone(),
            labels: detail.labels(),
        }
    }

    pub fn resource_name(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.name)
    }

    /// Labels the generated policy selects the workload by
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        match &self.labels {
            Some(labels) if !labels.is_empty() => labels.clone(),
            _ => BTreeMap::from([("app".to_string(), self.name.clone())]),
        }
    }
}
