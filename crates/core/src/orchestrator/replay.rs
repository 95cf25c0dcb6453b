//! Replay: derive the next action from a job's history.
//!
//! [`decide`] is a pure function of the job input, its history and the retry
//! policy. The runner calls it after every persisted event, so a restarted
//! process picks up exactly where the history ends and never re-runs a step
//! whose completion was recorded.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use super::config::RetryConfig;
use super::types::Decision;
use crate::activity::{ActivityInput, ActivityOutput, PipelineStep, ProcessingMetadata};
use crate::history::{HistoryEntry, HistoryEvent, JobInput, JobResult};

/// What the history says about one step.
#[derive(Debug, Default)]
struct StepProgress {
    last_scheduled: Option<u32>,
    last_failure: Option<Failure>,
    completed: Option<(ActivityOutput, DateTime<Utc>)>,
}

#[derive(Debug)]
struct Failure {
    attempt: u32,
    error: String,
    retryable: bool,
}

fn fault(message: impl std::fmt::Display) -> Decision {
    Decision::Fail(format!("orchestration fault: {}", message))
}

/// Decide the next action for a job.
pub fn decide(input: &JobInput, history: &[HistoryEntry], retry: &RetryConfig) -> Decision {
    let mut steps: HashMap<PipelineStep, StepProgress> = HashMap::new();
    let mut termination: Option<String> = None;

    for entry in history {
        match &entry.event {
            HistoryEvent::OrchestratorCompleted { .. }
            | HistoryEvent::OrchestratorFailed { .. }
            | HistoryEvent::OrchestratorTerminated { .. } => return Decision::Finished,
            HistoryEvent::TerminationRequested { reason } => {
                termination.get_or_insert_with(|| reason.clone());
            }
            HistoryEvent::ActivityScheduled { step, attempt } => {
                steps.entry(*step).or_default().last_scheduled = Some(*attempt);
            }
            HistoryEvent::ActivityFailed {
                step,
                attempt,
                error,
                retryable,
            } => {
                steps.entry(*step).or_default().last_failure = Some(Failure {
                    attempt: *attempt,
                    error: error.clone(),
                    retryable: *retryable,
                });
            }
            HistoryEvent::ActivityCompleted { step, output } => {
                if output.step() != *step {
                    return fault(format!(
                        "{} completion carries {} output",
                        step,
                        output.step()
                    ));
                }
                steps.entry(*step).or_default().completed =
                    Some((output.clone(), entry.recorded_at));
            }
            HistoryEvent::OrchestratorStarted { .. } | HistoryEvent::EventRaised { .. } => {}
        }
    }

    if let Some(reason) = termination {
        return Decision::Terminate(reason);
    }

    for step in PipelineStep::ALL {
        let (attempt, backoff) = match steps.get(&step) {
            None => (1, Duration::ZERO),
            Some(progress) if progress.completed.is_some() => continue,
            Some(progress) => match (progress.last_scheduled, progress.last_failure.as_ref()) {
                (None, _) => (1, Duration::ZERO),
                (Some(scheduled), Some(failure)) if failure.attempt >= scheduled => {
                    if !failure.retryable {
                        return Decision::Fail(format!("{} failed: {}", step, failure.error));
                    }
                    if failure.attempt >= retry.max_attempts {
                        return Decision::Fail(format!(
                            "{} failed after {} attempts: {}",
                            step, failure.attempt, failure.error
                        ));
                    }
                    (failure.attempt + 1, retry.delay_for(failure.attempt))
                }
                // Scheduled but never finished: the process stopped mid-activity.
                (Some(scheduled), _) => (scheduled, Duration::ZERO),
            },
        };

        return match build_input(step, input, &steps) {
            Ok(activity_input) => Decision::Schedule {
                step,
                attempt,
                input: activity_input,
                backoff,
            },
            Err(message) => fault(message),
        };
    }

    match build_result(input, &steps) {
        Ok(result) => Decision::Complete(result),
        Err(message) => fault(message),
    }
}

fn completed(
    steps: &HashMap<PipelineStep, StepProgress>,
    step: PipelineStep,
) -> Result<(&ActivityOutput, DateTime<Utc>), String> {
    steps
        .get(&step)
        .and_then(|p| p.completed.as_ref())
        .map(|(output, at)| (output, *at))
        .ok_or_else(|| format!("missing {} output", step))
}

fn build_input(
    step: PipelineStep,
    input: &JobInput,
    steps: &HashMap<PipelineStep, StepProgress>,
) -> Result<ActivityInput, String> {
    let category = input.category.clone();
    let process_date = input.process_date;

    match step {
        PipelineStep::Fetch => Ok(ActivityInput::Fetch { category }),
        PipelineStep::StoreRaw => {
            let ActivityOutput::Fetch(feed) = completed(steps, PipelineStep::Fetch)?.0 else {
                return Err("fetch output has wrong shape".to_string());
            };
            Ok(ActivityInput::StoreRaw {
                category,
                process_date,
                feed: feed.clone(),
            })
        }
        PipelineStep::ParseAndStore => {
            let ActivityOutput::StoreRaw(raw) = completed(steps, PipelineStep::StoreRaw)?.0 else {
                return Err("store_raw output has wrong shape".to_string());
            };
            Ok(ActivityInput::ParseAndStore {
                category,
                process_date,
                raw_key: raw.key.clone(),
            })
        }
        PipelineStep::StoreMetadata => {
            let ActivityOutput::Fetch(feed) = completed(steps, PipelineStep::Fetch)?.0 else {
                return Err("fetch output has wrong shape".to_string());
            };
            let ActivityOutput::StoreRaw(raw) = completed(steps, PipelineStep::StoreRaw)?.0 else {
                return Err("store_raw output has wrong shape".to_string());
            };
            let (parsed, parsed_at) = completed(steps, PipelineStep::ParseAndStore)?;
            let ActivityOutput::ParseAndStore(parsed) = parsed else {
                return Err("parse_and_store output has wrong shape".to_string());
            };

            Ok(ActivityInput::StoreMetadata {
                metadata: ProcessingMetadata {
                    category,
                    process_date,
                    total_entries: parsed.total_entries,
                    parsed_articles: parsed.parsed_articles,
                    skipped_entries: parsed.skipped_entries,
                    successful_writes: parsed.successful_writes,
                    failed_writes: parsed.failed_writes,
                    raw_key: raw.key.clone(),
                    source_url: feed.source_url.clone(),
                    // Taken from history so every retry writes the same bytes.
                    processed_at: parsed_at,
                },
            })
        }
    }
}

fn build_result(
    input: &JobInput,
    steps: &HashMap<PipelineStep, StepProgress>,
) -> Result<JobResult, String> {
    let ActivityOutput::StoreRaw(raw) = completed(steps, PipelineStep::StoreRaw)?.0 else {
        return Err("store_raw output has wrong shape".to_string());
    };
    let ActivityOutput::ParseAndStore(parsed) = completed(steps, PipelineStep::ParseAndStore)?.0
    else {
        return Err("parse_and_store output has wrong shape".to_string());
    };
    let ActivityOutput::StoreMetadata(metadata) =
        completed(steps, PipelineStep::StoreMetadata)?.0
    else {
        return Err("store_metadata output has wrong shape".to_string());
    };

    Ok(JobResult {
        category: input.category.clone(),
        process_date: input.process_date,
        raw_key: raw.key.clone(),
        metadata_key: metadata.key.clone(),
        total_entries: parsed.total_entries,
        parsed_articles: parsed.parsed_articles,
        skipped_entries: parsed.skipped_entries,
        successful_writes: parsed.successful_writes,
        failed_writes: parsed.failed_writes,
        failed_identifiers: parsed.failed_identifiers(),
    })
}
