//! Asynchronous flow: submit a job, poll it, then fetch its result
//!
//! Wire format of the zk query service:
//!
//! ```text
//! POST {root}/v1/zkquery               {sqlText, sourceNetwork, commitmentScheme, blockHash, timeout}
//!                                       -> {queryId}
//! GET  {root}/v1/zkquery/{id}/status   -> {status}
//! GET  {root}/v1/zkquery/{id}/results  -> opaque prover response
//! ```
//!
//! The service names commitment schemes `HYPER_KZG` and `DYNAMIC_DORY`. A
//! `queryId` is spliced into the status and result paths, so only single
//! path segments of unreserved URL characters are accepted.

use super::{Flow, PollingPolicy, VerifiedQuery};
use crate::commitment::CommitmentSource;
use crate::config::join_url;
use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::{dispatch, HttpRequest, HttpResponse};
use crate::types::{
    AccessToken, BlockHash, CommitmentScheme, JobStatus, ProverJob, ProverResponse, SxtNetwork,
    TableRef,
};
use serde::{Deserialize, Serialize};

/// Where and how to run the job
pub(super) struct JobTarget<'a> {
    pub(super) zk_query_url: &'a str,
    pub(super) source_network: SxtNetwork,
    pub(super) block_hash: Option<BlockHash>,
    pub(super) job_timeout: Option<i64>,
    pub(super) polling: &'a PollingPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuerySubmitRequest<'a> {
    sql_text: &'a str,
    source_network: SxtNetwork,
    #[serde(serialize_with = "serialize_job_scheme")]
    commitment_scheme: CommitmentScheme,
    block_hash: BlockHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<i64>,
}

fn serialize_job_scheme<S: serde::Serializer>(
    scheme: &CommitmentScheme,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(scheme.job_wire_name())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuerySubmitResponse {
    query_id: String,
}

#[derive(Debug, Deserialize)]
struct QueryStatusResponse {
    status: JobStatus,
}

pub(super) async fn run(
    flow: &Flow<'_>,
    requested: &[TableRef],
    target: &JobTarget<'_>,
) -> Result<VerifiedQuery> {
    let token = flow.authenticate().await?;

    flow.enter(WorkflowStep::ResolvingAttestation);
    let tables = flow.tables(requested)?;
    let resolved = flow
        .resolve(
            &CommitmentSource::Attested {
                block_hash: target.block_hash,
            },
            &tables,
        )
        .await?;
    let attested = resolved
        .attested
        .clone()
        .ok_or(SdkError::AttestationUnavailable { block: None })?;

    let planned = flow.plan(&resolved.commitments)?;

    flow.enter(WorkflowStep::Submitting);
    let submission = QuerySubmitRequest {
        sql_text: flow.sql,
        source_network: target.source_network,
        commitment_scheme: flow.config.commitment_scheme,
        block_hash: attested.block_hash,
        timeout: target.job_timeout,
    };
    let mut job = submit(flow, &token, target.zk_query_url, &submission).await?;
    log::info!("submitted proof job {}", job.query_id);

    flow.enter(WorkflowStep::Polling);
    let status_url = join_url(
        target.zk_query_url,
        &format!("/v1/zkquery/{}/status", job.query_id),
    );
    let status_url = status_url.as_str();
    let token_ref = &token;
    let status = target
        .polling
        .run(&mut job, flow.cancel, move || {
            fetch_status(flow, token_ref, status_url)
        })
        .await?;

    match status {
        JobStatus::Done => {}
        JobStatus::Failed => {
            return Err(SdkError::ProofJobFailed {
                query_id: job.query_id,
            })
        }
        JobStatus::Canceled => {
            return Err(SdkError::ProofJobCanceled {
                query_id: job.query_id,
            })
        }
        other => {
            return Err(SdkError::MalformedResponse {
                step: WorkflowStep::Polling,
                message: format!("polling ended on non-terminal status {other}"),
            })
        }
    }

    flow.enter(WorkflowStep::FetchingResult);
    let results_url = join_url(
        target.zk_query_url,
        &format!("/v1/zkquery/{}/results", job.query_id),
    );
    let response = get(flow, &token, &results_url, WorkflowStep::FetchingResult).await?;

    let result = flow.verify(&ProverResponse(response.body), &planned)?;
    Ok(VerifiedQuery {
        result,
        commitments: planned.commitments,
        attested: Some(attested),
        query_id: Some(job.query_id),
    })
}

async fn submit(
    flow: &Flow<'_>,
    token: &AccessToken,
    root: &str,
    submission: &QuerySubmitRequest<'_>,
) -> Result<ProverJob> {
    let step = WorkflowStep::Submitting;
    let body = serde_json::to_value(submission).map_err(|e| SdkError::MalformedResponse {
        step,
        message: format!("could not encode submission: {e}"),
    })?;
    let request = HttpRequest::post(join_url(root, "/v1/zkquery"), body).bearer(token);
    let response = dispatch(
        flow.transport,
        request,
        flow.config.request_timeout,
        flow.cancel,
    )
    .await
    .map_err(|e| SdkError::transport(step, e))?;

    if !response.is_success() {
        return Err(SdkError::SubmissionRejected {
            status: response.status,
            reason: response.reason,
        });
    }

    let parsed: QuerySubmitResponse =
        serde_json::from_value(response.body).map_err(|e| SdkError::MalformedResponse {
            step,
            message: format!("expected {{\"queryId\": string}}: {e}"),
        })?;
    if !is_path_segment(&parsed.query_id) {
        return Err(SdkError::InvalidQueryId(parsed.query_id));
    }
    Ok(ProverJob::submitted(parsed.query_id))
}

/// Whether `id` can be placed in a URL path without changing the route
fn is_path_segment(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

async fn fetch_status(flow: &Flow<'_>, token: &AccessToken, url: &str) -> Result<JobStatus> {
    let response = get(flow, token, url, WorkflowStep::Polling).await?;
    let parsed: QueryStatusResponse =
        serde_json::from_value(response.body).map_err(|e| SdkError::MalformedResponse {
            step: WorkflowStep::Polling,
            message: format!("expected {{\"status\": string}}: {e}"),
        })?;
    Ok(parsed.status)
}

async fn get(
    flow: &Flow<'_>,
    token: &AccessToken,
    url: &str,
    step: WorkflowStep,
) -> Result<HttpResponse> {
    let request = HttpRequest::get(url).bearer(token);
    let response = dispatch(
        flow.transport,
        request,
        flow.config.request_timeout,
        flow.cancel,
    )
    .await
    .map_err(|e| SdkError::transport(step, e))?;

    if !response.is_success() {
        return Err(SdkError::Transport {
            step,
            status: Some(response.status),
            message: format!("GET {url}: {} {}", response.status, response.reason),
        });
    }
    Ok(response)
}
