use std::env;

use advisor::{
    init_logging, policy_to_yaml, profile_to_json, profile_to_yaml, Advisor, BrokerLookup, Error,
    PeerLookup, Workload,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let Some(pod_name) = env::args().nth(1) else {
        eprintln!("usage: guardian-advisor <pod-name>");
        std::process::exit(2);
    };
    let api_endpoint =
        env::var("API_ENDPOINT").unwrap_or_else(|_| "http://localhost:9090".to_string());

    let broker = BrokerLookup::new(&api_endpoint);
    let traffic = broker.traffic_by_pod(&pod_name).await?;
    let syscalls = broker.syscalls_by_pod(&pod_name).await?;
    info!(
        "fetched {} traffic rows and {} syscall rows for {}",
        traffic.len(),
        syscalls.len(),
        pod_name
    );

    let workload = match workload_identity(&broker, &pod_name, &traffic).await {
        Some(w) => w,
        None => {
            let namespace = traffic
                .iter()
                .find_map(|t| t.pod_namespace.clone())
                .or_else(|| syscalls.first().map(|s| s.pod_namespace.clone()))
                .unwrap_or_else(|| "default".to_string());
            Workload::new(pod_name.clone(), namespace)
        }
    };

    let advisor = Advisor::new(broker);
    let output = advisor.advise(&workload, &traffic, &syscalls).await;
    for warning in &output.warnings {
        warn!("{}", warning);
    }

    let policy_yaml = policy_to_yaml(&output.network_policy);
    let profile_yaml = profile_to_yaml(
        &output.seccomp_profile,
        workload.resource_name(),
        &workload.namespace,
    );

    println!("{}", policy_yaml);
    println!("---");
    println!("{}", profile_yaml);

    if let Ok(output_dir) = env::var("OUTPUT_DIR") {
        tokio::fs::create_dir_all(&output_dir).await?;
        let policy_file = format!(
            "{}/{}-{}-networkpolicy.yaml",
            output_dir, workload.namespace, pod_name
        );
        tokio::fs::write(&policy_file, policy_yaml).await?;
        let profile_file = format!("{}/{}-seccomp.json", output_dir, pod_name);
        tokio::fs::write(&profile_file, profile_to_json(&output.seccomp_profile)?).await?;
        info!("wrote {} and {}", policy_file, profile_file);
    }

    Ok(())
}

/// Workload identity from the broker's pod records: pod detail by ip when
/// traffic rows carry one, then the by-name record.
async fn workload_identity(
    broker: &BrokerLookup,
    pod_name: &str,
    traffic: &[advisor::PodTraffic],
) -> Option<Workload> {
    let detail = if let Some(pod_ip) = traffic.iter().find_map(|t| t.pod_ip.clone()) {
        broker.pod_by_ip(&pod_ip).await.ok().flatten()
    } else {
        None
    };
    let detail = match detail {
        Some(d) => Some(d),
        None => broker.pod_by_name(pod_name).await.ok().flatten(),
    };
    detail.as_ref().map(Workload::from_detail)
}
