//! Pods command - list pods with their declared ports.

use anyhow::Result;
use podfwd_core::forward::tcp_candidates;
use podfwd_core::{Config, KubernetesDiscovery};
use serde_json::json;

use super::truncate;

pub async fn run(config: &Config, namespace: &str, json: bool) -> Result<()> {
    let discovery = KubernetesDiscovery::from_config(config);
    let pods = discovery.fetch_pod_summaries(namespace).await?;

    if json {
        let rows: Vec<_> = pods
            .iter()
            .map(|pod| {
                json!({
                    "namespace": pod.path.namespace,
                    "name": pod.path.name,
                    "phase": pod.phase,
                    "ports": pod.ports,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if pods.is_empty() {
        println!("No pods found in namespace {}.", namespace);
        return Ok(());
    }

    // Table header
    println!("{:<40} {:<10} PORTS", "NAME", "STATUS");
    println!("{}", "-".repeat(80));

    for pod in &pods {
        let ports = tcp_candidates(&pod.ports)
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "{:<40} {:<10} {}",
            truncate(&pod.path.name, 40),
            pod.phase,
            if ports.is_empty() { "-" } else { ports.as_str() }
        );
    }

    println!("\nTotal: {} pods", pods.len());
    Ok(())
}
