//! Text rendering of a status snapshot

use crate::models::StatusSnapshot;
use std::fmt;

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.workloads.is_empty() {
            return writeln!(f, "No deployments found");
        }

        for (i, workload) in self.workloads.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(
                f,
                "Deployment {}/{} (#{})",
                workload.namespace,
                workload.name,
                i + 1
            )?;
            writeln!(f, "Status: {}", workload.status)?;
            writeln!(f, "Replicas: {}", workload.replicas)?;

            if workload.pods.is_empty() {
                writeln!(f, "  No pods found")?;
                continue;
            }

            for (pod_name, pod) in &workload.pods {
                writeln!(f, "  Pod: {} ({})", pod_name, pod.phase)?;
                writeln!(f, "    Total CPU: {:.3} cores", pod.total_cpu_cores)?;
                writeln!(f, "    Total Memory: {:.3} MB", pod.total_memory_mb)?;

                if pod.containers.is_empty() {
                    writeln!(f, "    No containers found")?;
                    continue;
                }

                for (container_name, usage) in &pod.containers {
                    writeln!(f, "    Container: {}", container_name)?;
                    writeln!(f, "      CPU: {:.3} cores", usage.cpu_cores)?;
                    writeln!(f, "      Memory: {:.3} MB", usage.memory_mb)?;
                    if let Some(reason) = &usage.unavailable {
                        writeln!(f, "      Metrics unavailable: {}", reason)?;
                    }
                }
            }
        }
        Ok(())
    }
}
