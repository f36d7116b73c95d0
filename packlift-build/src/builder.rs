//! Drive an ordered group of buildpacks and merge their results.

use crate::error::BuildError;
use crate::executor::{BuildContext, BuildResult};
use crate::store::BuildpackStore;
use packlift_env::BuildEnv;
use packlift_types::buildpack::BuildpackGroup;
use packlift_types::metadata::BuildMetadata;
use packlift_types::plan::BuildPlan;
use packlift_types::process::Process;
use tracing::info;

/// One group build: the buildpacks detection selected, the dependency plan
/// it produced, and the store the descriptors load from.
pub struct Builder<'a> {
    pub group: &'a BuildpackGroup,
    pub plan: BuildPlan,
    pub store: &'a BuildpackStore,
}

impl Builder<'_> {
    /// Run every buildpack of the group in order, threading the cumulative
    /// environment and the outstanding plan through each. Any buildpack
    /// failure aborts the group; partial results are discarded.
    pub fn build(
        self,
        ctx: &mut BuildContext<'_>,
        env: &mut BuildEnv,
    ) -> Result<BuildMetadata, BuildError> {
        let mut merged = BuildMetadata {
            buildpacks: self.group.group.clone(),
            ..BuildMetadata::default()
        };
        let mut plan = self.plan;

        for bp in &self.group.group {
            if ctx.cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            let descriptor = self.store.lookup(&bp.id, &bp.version)?;
            info!(buildpack = %descriptor.identity(), "running buildpack");

            let bp_plan = plan.find(&bp.id);
            let result = descriptor.build(bp_plan, ctx, env)?;

            plan = plan.filter(&result.met);
            merge(&mut merged, result);
        }

        Ok(merged)
    }
}

fn merge(merged: &mut BuildMetadata, result: BuildResult) {
    merged.bom.extend(result.bom);
    merged.labels.extend(result.labels);
    for name in result.met {
        if !merged.met.contains(&name) {
            merged.met.push(name);
        }
    }
    merge_processes(&mut merged.processes, result.processes);
    merged.slices.extend(result.slices);
}

/// Processes are keyed by type: a later buildpack's process replaces an
/// earlier one of the same type in place, new types append.
fn merge_processes(processes: &mut Vec<Process>, incoming: Vec<Process>) {
    for process in incoming {
        match processes.iter_mut().find(|p| p.r#type == process.r#type) {
            Some(slot) => *slot = process,
            None => processes.push(process),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(r#type: &str, command: &str) -> Process {
        Process {
            r#type: r#type.to_string(),
            command: command.to_string(),
            ..Process::default()
        }
    }

    #[test]
    fn later_process_of_same_type_wins_in_place() {
        let mut processes = vec![process("web", "first"), process("worker", "tasks")];
        merge_processes(
            &mut processes,
            vec![process("web", "second"), process("debug", "shell")],
        );

        let summary: Vec<(&str, &str)> = processes
            .iter()
            .map(|p| (p.r#type.as_str(), p.command.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("web", "second"), ("worker", "tasks"), ("debug", "shell")]
        );
    }
}
