use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::{Pod, Service};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::{Error, PodDetail, PodSyscalls, PodTraffic, Result, SvcDetail};

pub use async_trait::async_trait;

/// Identity lookup contract. `Ok(None)` is a miss; `Err` is a transport
/// failure. Both fold into `External` during resolution, but failures are
/// counted so a total lookup outage can be surfaced to the caller.
#[async_trait]
pub trait PeerLookup: Send + Sync {
    async fn svc_by_ip(&self, ip: &str) -> Result<Option<SvcDetail>>;
    async fn pod_by_ip(&self, ip: &str) -> Result<Option<PodDetail>>;
    async fn workload_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>>;
}

#[async_trait]
impl<T: PeerLookup> PeerLookup for &T {
    async fn svc_by_ip(&self, ip: &str) -> Result<Option<SvcDetail>> {
        (**self).svc_by_ip(ip).await
    }

    async fn pod_by_ip(&self, ip: &str) -> Result<Option<PodDetail>> {
        (**self).pod_by_ip(ip).await
    }

    async fn workload_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        (**self).workload_labels(name).await
    }
}

/// Lookup over the broker REST api, one call per unique ip.
pub struct BrokerLookup {
    client: reqwest::Client,
    api_endpoint: String,
}

impl BrokerLookup {
    pub fn new(api_endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        BrokerLookup {
            client,
            api_endpoint: api_endpoint.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}/{}", self.api_endpoint, path);
        debug!("GET {}", url);
        let res = self.client.get(&url).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(Error::ApiError(format!(
                "GET {} returned {}",
                url,
                res.status()
            )));
        }
        Ok(Some(res.json::<T>().await?))
    }

    /// All traffic rows recorded for a pod. Missing data is an empty list.
    pub async fn traffic_by_pod(&self, name: &str) -> Result<Vec<PodTraffic>> {
        let rows = self.get_json(&format!("pod/traffic/{}", name)).await?;
        Ok(rows.unwrap_or_default())
    }

    /// All syscall rows recorded for a pod. Missing data is an empty list.
    pub async fn syscalls_by_pod(&self, name: &str) -> Result<Vec<PodSyscalls>> {
        let rows = self.get_json(&format!("pod/syscalls/{}", name)).await?;
        Ok(rows.unwrap_or_default())
    }

    pub async fn pod_by_name(&self, name: &str) -> Result<Option<PodDetail>> {
        self.get_json(&format!("pod/name/{}", name)).await
    }
}

#[async_trait]
impl PeerLookup for BrokerLookup {
    async fn svc_by_ip(&self, ip: &str) -> Result<Option<SvcDetail>> {
        self.get_json(&format!("svc/ip/{}", ip)).await
    }

    async fn pod_by_ip(&self, ip: &str) -> Result<Option<PodDetail>> {
        self.get_json(&format!("pod/ip/{}", ip)).await
    }

    async fn workload_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let detail = self.pod_by_name(name).await?;
        Ok(detail.and_then(|d| d.labels()))
    }
}

/// Lookup over a local snapshot of known pods and services. No I/O, fully
/// deterministic; preferred when the workload set is already at hand.
#[derive(Debug, Default)]
pub struct SnapshotLookup {
    svcs_by_ip: HashMap<String, SvcDetail>,
    pods_by_ip: HashMap<String, PodDetail>,
    labels_by_name: HashMap<String, BTreeMap<String, String>>,
}

impl SnapshotLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_svc(&mut self, svc: SvcDetail) {
        if let Some(name) = &svc.svc_name {
            if let Some(selector) = svc
                .service_spec
                .as_ref()
                .and_then(|s| s.pointer("/spec/selector"))
                .and_then(|s| s.as_object())
            {
                let selector: BTreeMap<String, String> = selector
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect();
                if !selector.is_empty() {
                    self.labels_by_name.insert(name.clone(), selector);
                }
            }
        }
        self.svcs_by_ip.insert(svc.svc_ip.clone(), svc);
    }

    pub fn insert_pod(&mut self, pod: PodDetail) {
        if let Some(labels) = pod.labels() {
            self.labels_by_name.insert(pod.pod_name.clone(), labels);
        }
        self.pods_by_ip.insert(pod.pod_ip.clone(), pod);
    }

    pub fn insert_labels(&mut self, name: impl Into<String>, labels: BTreeMap<String, String>) {
        self.labels_by_name.insert(name.into(), labels);
    }

    /// Record a live pod object. Pods without an assigned ip are skipped.
    pub fn record_pod(&mut self, pod: &Pod) {
        let Some(pod_ip) = pod.status.as_ref().and_then(|s| s.pod_ip.clone()) else {
            return;
        };
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.insert_pod(PodDetail {
            pod_ip,
            pod_name: name,
            pod_namespace: pod.metadata.namespace.clone(),
            pod_obj: serde_json::to_value(pod).ok(),
            pod_identity: None,
            workload_selector_labels: pod.metadata.labels.clone(),
            time_stamp: Utc::now().naive_utc(),
        });
    }

    /// Record a live service object. Headless services (no cluster ip) are
    /// skipped; their endpoints show up as pod ips instead.
    pub fn record_service(&mut self, svc: &Service) {
        let Some(svc_ip) = svc
            .spec
            .as_ref()
            .and_then(|s| s.cluster_ip.clone())
            .filter(|ip| !ip.is_empty() && ip != "None")
        else {
            return;
        };
        self.insert_svc(SvcDetail {
            svc_ip,
            svc_name: svc.metadata.name.clone(),
            svc_namespace: svc.metadata.namespace.clone(),
            service_spec: Some(json!(svc)),
            time_stamp: Utc::now().naive_utc(),
        });
    }
}

#[async_trait]
impl PeerLookup for SnapshotLookup {
    async fn svc_by_ip(&self, ip: &str) -> Result<Option<SvcDetail>> {
        Ok(self.svcs_by_ip.get(ip).cloned())
    }

    async fn pod_by_ip(&self, ip: &str) -> Result<Option<PodDetail>> {
        Ok(self.pods_by_ip.get(ip).cloned())
    }

    async fn workload_labels(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        Ok(self.labels_by_name.get(name).cloned())
    }
}
