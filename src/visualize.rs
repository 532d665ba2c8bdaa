//! Versioned graph snapshots for diagnosing lowering and execution.

use crate::error::Result;
use crate::graph::Graph;
use crate::job::Job;
use crate::{err, error::StatusCode};
use log::debug;
use std::fs;
use std::path::PathBuf;

fn version_path(job: &Job, version: i32) -> PathBuf {
    PathBuf::from(format!(
        "job_{}_graph_version_{}.dot",
        job.debug_job_id, version
    ))
}

/// Writes `job_<id>_graph_version_<n>.dot` after a pass. When the rendering
/// is byte-identical to the previous version, no new version is created.
pub fn notify_graph_changed(job: &mut Job, g: &Graph) -> Result<()> {
    let mut rendered: Vec<u8> = Vec::new();
    g.print_to_dot(&mut rendered, None)?;

    if job.next_graph_version > 0 {
        let previous = version_path(job, job.next_graph_version - 1);
        if let Ok(prior) = fs::read(&previous) {
            if prior == rendered {
                return Ok(());
            }
        }
    }
    let path = version_path(job, job.next_graph_version);
    debug!("recording graph version {:?}", path);
    fs::write(&path, &rendered)
        .map_err(|e| err!(StatusCode::IoError, "failed to write {:?}: {}", path, e))?;
    job.next_graph_version += 1;
    Ok(())
}
