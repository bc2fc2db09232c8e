//! Sequential pipeline execution
//!
//! `NotStarted → <one Running phase per step> → Completed`, with `Failed` reachable
//! from every non-terminal state. Targets for all steps are resolved before the
//! first task is sent, so a missing capability fails the run without contacting
//! any agent.

use super::pipeline::PipelineDefinition;
use super::run::{FailureCause, PipelineFailure, PipelineRun, StepRecord};
use super::{discover_peers, DiscoveryReport, PipelineError, PipelineOutput};
use crate::agent::client::AgentClient;
use crate::agent::registry::AgentRegistry;
use crate::config::OrchestratorConfig;
use crate::error::{AgentError, AgentResult};
use crate::observability::pipeline_span;
use crate::protocol::{now_timestamp, AgentCard, Parameters, TaskOutcome};
use crate::transport::{HttpTransport, PeerTransport};
use std::future::Future;
use tracing::{error, info, Instrument};

/// Drives pipeline runs against the peers known to its registry
pub struct Orchestrator<T: PeerTransport = HttpTransport> {
    client: AgentClient<T>,
    definition: PipelineDefinition,
}

impl Orchestrator<HttpTransport> {
    /// Orchestrator talking HTTP with the identity from `config`
    pub fn from_config(
        config: &OrchestratorConfig,
        definition: PipelineDefinition,
    ) -> AgentResult<Self> {
        let registry = AgentRegistry::with_self(config.orchestrator.to_card())?;
        let client = AgentClient::new(
            registry,
            HttpTransport::new()?,
            config.network.request_timeout(),
        )?;
        Ok(Self::new(client, definition))
    }
}

impl<T: PeerTransport> Orchestrator<T> {
    pub fn new(client: AgentClient<T>, definition: PipelineDefinition) -> Self {
        Self { client, definition }
    }

    pub fn client(&self) -> &AgentClient<T> {
        &self.client
    }

    pub fn registry(&self) -> &AgentRegistry {
        self.client.registry()
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Discover `endpoints` concurrently, storing every peer that answers
    pub async fn discover(&self, endpoints: &[String]) -> DiscoveryReport {
        discover_peers(&self.client, endpoints).await
    }

    /// Pick one agent per step; the smallest agent id wins among several
    fn resolve_targets(&self) -> Result<Vec<AgentCard>, (usize, AgentError)> {
        self.definition
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| {
                self.registry()
                    .find_by_capability(&step.capability)
                    .into_iter()
                    .next()
                    .ok_or_else(|| (index, AgentError::missing_capability(&step.capability)))
            })
            .collect()
    }

    /// Run the pipeline to a terminal state
    pub async fn execute(&self, seed: Parameters) -> PipelineRun {
        self.execute_until(seed, std::future::pending::<()>()).await
    }

    /// Run the pipeline to completion or the result mapping of the last step
    pub async fn run(&self, seed: Parameters) -> Result<PipelineOutput, PipelineError> {
        self.execute(seed).await.into_output()
    }

    /// Run the pipeline until it terminates or `cancel` resolves
    ///
    /// On cancellation the in-flight task call is dropped and the run ends `Failed`
    /// with cause `Cancelled`. Registry entries are never written by a run.
    pub async fn execute_until(
        &self,
        seed: Parameters,
        cancel: impl Future<Output = ()>,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(self.definition.name(), seed);
        let span = pipeline_span!(
            run_id = %run.run_id,
            pipeline = %run.pipeline,
            steps = self.definition.len()
        );

        async move {
            info!("Pipeline run started");
            tokio::pin!(cancel);

            let targets = match self.resolve_targets() {
                Ok(targets) => targets,
                Err((index, e)) => {
                    let step = &self.definition.steps()[index];
                    error!(phase = %step.phase, error = %e, "Pipeline cannot start");
                    run.fail(PipelineFailure {
                        step: index,
                        phase: step.phase.clone(),
                        capability: step.capability.clone(),
                        agent_id: None,
                        cause: FailureCause::from_agent_error(&e),
                    });
                    return run;
                }
            };

            let mut previous = run.seed.clone();
            for (index, (step, target)) in self.definition.steps().iter().zip(&targets).enumerate()
            {
                run.begin_step(index, &step.phase);
                info!(
                    phase = %step.phase,
                    capability = %step.capability,
                    agent_id = %target.agent_id,
                    "Pipeline step started"
                );

                let parameters = step.transform.apply(&previous);
                let outcome = tokio::select! {
                    biased;
                    _ = &mut cancel => Err(FailureCause::Cancelled),
                    sent = self.client.send_task_to_peer(target, &step.task_type, parameters) => {
                        match sent {
                            Ok(response) => match response.outcome() {
                                TaskOutcome::Success(result) => {
                                    Ok((response.task_id.clone(), result.clone()))
                                }
                                TaskOutcome::Error(message) => {
                                    Err(FailureCause::Reported(message.to_string()))
                                }
                                TaskOutcome::InProgress => Err(FailureCause::NotFinal),
                            },
                            Err(e) => Err(FailureCause::from_agent_error(&e)),
                        }
                    }
                };

                match outcome {
                    Ok((task_id, result)) => {
                        run.record_step(StepRecord {
                            phase: step.phase.clone(),
                            capability: step.capability.clone(),
                            agent_id: target.agent_id.clone(),
                            endpoint: target.endpoint.clone(),
                            task_id,
                            result: result.clone(),
                            completed_at: now_timestamp(),
                        });
                        previous = result;
                    }
                    Err(cause) => {
                        error!(
                            phase = %step.phase,
                            agent_id = %target.agent_id,
                            cause = %cause,
                            "Pipeline step failed"
                        );
                        run.fail(PipelineFailure {
                            step: index,
                            phase: step.phase.clone(),
                            capability: step.capability.clone(),
                            agent_id: Some(target.agent_id.clone()),
                            cause,
                        });
                        return run;
                    }
                }
            }

            run.complete();
            info!(agents_used = ?run.agents_used(), "Pipeline run completed");
            run
        }
        .instrument(span)
        .await
    }
}
