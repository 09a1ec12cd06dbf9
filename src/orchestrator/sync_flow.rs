//! Synchronous flow: the prover answers the request with the proof

use super::{Flow, VerifiedQuery};
use crate::commitment::CommitmentSource;
use crate::error::{Result, SdkError, WorkflowStep};
use crate::transport::{dispatch, HttpRequest};
use crate::types::{ProverResponse, TableRef};

pub(super) async fn run(
    flow: &Flow<'_>,
    requested: &[TableRef],
    prover_url: &str,
) -> Result<VerifiedQuery> {
    let token = flow.authenticate().await?;

    flow.enter(WorkflowStep::ResolvingCommitment);
    let tables = flow.tables(requested)?;
    let resolved = flow.resolve(&CommitmentSource::Direct, &tables).await?;

    let planned = flow.plan(&resolved.commitments)?;

    flow.enter(WorkflowStep::Submitting);
    let request = HttpRequest::post(prover_url, planned.request.0.clone()).bearer(&token);
    let response = dispatch(
        flow.transport,
        request,
        flow.config.request_timeout,
        flow.cancel,
    )
    .await
    .map_err(|e| SdkError::transport(WorkflowStep::Submitting, e))?;

    if !response.is_success() {
        return Err(SdkError::ProverRejected {
            status: response.status,
            reason: response.reason,
        });
    }

    let result = flow.verify(&ProverResponse(response.body), &planned)?;
    Ok(VerifiedQuery {
        result,
        commitments: planned.commitments,
        attested: None,
        query_id: None,
    })
}
