//! AWS `CloudFormation` resource backend.
//!
//! Stacks are checked with `DescribeStacks` and deleted with `DeleteStack`.

use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::StackStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::error::{BackendError, Result};
use crate::planner::StackRef;

use super::resource::ResourceBackend;

/// Error code `CloudFormation` uses for a missing stack.
const VALIDATION_ERROR_CODE: &str = "ValidationError";

/// `CloudFormation`-backed stack deletion.
#[derive(Debug, Clone)]
pub struct CloudFormationBackend {
    /// `CloudFormation` client.
    client: Client,
    /// Deletions requested through this backend, by stack name.
    requested: Arc<Mutex<HashMap<String, DeleteTracking>>>,
}

/// Progress of a deletion this backend requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DeleteTracking {
    /// `DELETE_IN_PROGRESS` was observed after the request.
    in_progress_seen: bool,
}

/// What a `DescribeStacks` call says about a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StackPresence {
    /// The stack exists in some live or non-delete state.
    Present,
    /// A deletion is running.
    Deleting,
    /// The stack is gone.
    Absent,
    /// The last deletion failed.
    DeleteFailed(String),
}

/// What `exists` reports for a classified stack.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    /// Plain existence answer.
    Exists(bool),
    /// `DELETE_FAILED` that cannot be attributed to our own request yet.
    StaleFailure(String),
    /// Our own deletion ended in `DELETE_FAILED`.
    Failed(String),
}

impl CloudFormationBackend {
    /// Creates a backend from the ambient AWS configuration.
    pub async fn new(region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_client(Client::new(&config))
    }

    /// Creates a backend with an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            requested: Arc::default(),
        }
    }

    /// Resolves a classified stack against this backend's own requests.
    fn verdict(&self, stack: &StackRef, presence: StackPresence) -> Verdict {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        resolve(presence, requested.get_mut(stack.as_str()))
    }
}

#[async_trait]
impl ResourceBackend for CloudFormationBackend {
    async fn exists(&self, stack: &StackRef) -> Result<bool> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(stack.as_str())
            .send()
            .await;

        let presence = match result {
            Ok(output) => {
                let described = output.stacks().first();
                classify_status(
                    described.and_then(|s| s.stack_status()),
                    described.and_then(|s| s.stack_status_reason()),
                )
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if is_missing_stack(service_err.code(), service_err.message()) {
                    StackPresence::Absent
                } else {
                    return Err(BackendError::unavailable(
                        stack.as_str(),
                        DisplayErrorContext(&service_err).to_string(),
                    )
                    .into());
                }
            }
        };

        debug!("Stack {stack} presence: {presence:?}");

        match self.verdict(stack, presence) {
            Verdict::Exists(exists) => Ok(exists),
            Verdict::StaleFailure(reason) => {
                warn!("Stack {stack} is in DELETE_FAILED from an earlier attempt: {reason}");
                Ok(true)
            }
            Verdict::Failed(reason) => Err(BackendError::DeletionFailed {
                stack: stack.to_string(),
                reason,
            }
            .into()),
        }
    }

    async fn delete(&self, stack: &StackRef) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(stack.as_str())
            .send()
            .await
            .map_err(|e| {
                BackendError::deletion_rejected(
                    stack.as_str(),
                    DisplayErrorContext(&e.into_service_error()).to_string(),
                )
            })?;

        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stack.to_string(), DeleteTracking::default());
        info!("Deletion requested for stack {stack}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cloudformation"
    }
}

/// Recognises the error `DescribeStacks` returns for an unknown stack.
fn is_missing_stack(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some(VALIDATION_ERROR_CODE) && message.is_some_and(|m| m.contains("does not exist"))
}

/// Maps a described stack status to presence.
fn classify_status(status: Option<&StackStatus>, reason: Option<&str>) -> StackPresence {
    match status {
        None | Some(StackStatus::DeleteComplete) => StackPresence::Absent,
        Some(StackStatus::DeleteInProgress) => StackPresence::Deleting,
        Some(StackStatus::DeleteFailed) => StackPresence::DeleteFailed(
            reason.unwrap_or("no status reason reported").to_string(),
        ),
        Some(_) => StackPresence::Present,
    }
}

/// Decides whether a `DELETE_FAILED` belongs to our own request.
///
/// Right after `DeleteStack`, `DescribeStacks` can still show the status of an
/// earlier failed attempt. A failure only counts once this request has been
/// seen in `DELETE_IN_PROGRESS`.
fn resolve(presence: StackPresence, tracking: Option<&mut DeleteTracking>) -> Verdict {
    match (presence, tracking) {
        (StackPresence::Present, _) => Verdict::Exists(true),
        (StackPresence::Absent, _) => Verdict::Exists(false),
        (StackPresence::Deleting, tracking) => {
            if let Some(tracking) = tracking {
                tracking.in_progress_seen = true;
            }
            Verdict::Exists(true)
        }
        (StackPresence::DeleteFailed(reason), Some(tracking)) if tracking.in_progress_seen => {
            Verdict::Failed(reason)
        }
        (StackPresence::DeleteFailed(reason), _) => Verdict::StaleFailure(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_cloudformation::config::{BehaviorVersion, Region};

    fn offline_backend() -> CloudFormationBackend {
        let config = aws_sdk_cloudformation::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-2"))
            .build();
        CloudFormationBackend::with_client(Client::from_conf(config))
    }

    fn failed(reason: &str) -> StackPresence {
        StackPresence::DeleteFailed(String::from(reason))
    }

    #[tokio::test]
    async fn test_verdict_follows_requested_deletion() {
        let backend = offline_backend();
        let stack = StackRef::new("prod-api").unwrap();
        assert_eq!(backend.name(), "cloudformation");

        // Leftover failure before any request: retried, not reported.
        assert_eq!(
            backend.verdict(&stack, failed("bucket not empty")),
            Verdict::StaleFailure(String::from("bucket not empty"))
        );

        backend
            .requested
            .lock()
            .unwrap()
            .insert(String::from("prod-api"), DeleteTracking::default());

        // Describe still shows the old status right after DeleteStack.
        assert_eq!(
            backend.verdict(&stack, failed("bucket not empty")),
            Verdict::StaleFailure(String::from("bucket not empty"))
        );

        assert_eq!(
            backend.verdict(&stack, StackPresence::Deleting),
            Verdict::Exists(true)
        );
        assert_eq!(
            backend.clone().verdict(&stack, failed("bucket not empty")),
            Verdict::Failed(String::from("bucket not empty"))
        );
    }

    #[test]
    fn test_resolve_without_request() {
        assert_eq!(resolve(StackPresence::Present, None), Verdict::Exists(true));
        assert_eq!(resolve(StackPresence::Deleting, None), Verdict::Exists(true));
        assert_eq!(resolve(StackPresence::Absent, None), Verdict::Exists(false));
        assert_eq!(
            resolve(failed("access denied"), None),
            Verdict::StaleFailure(String::from("access denied"))
        );
    }

    #[test]
    fn test_resolve_failure_only_after_in_progress() {
        let mut tracking = DeleteTracking::default();

        assert_eq!(
            resolve(failed("old failure"), Some(&mut tracking)),
            Verdict::StaleFailure(String::from("old failure"))
        );
        assert!(!tracking.in_progress_seen);

        assert_eq!(
            resolve(StackPresence::Deleting, Some(&mut tracking)),
            Verdict::Exists(true)
        );
        assert!(tracking.in_progress_seen);

        assert_eq!(
            resolve(failed("new failure"), Some(&mut tracking)),
            Verdict::Failed(String::from("new failure"))
        );
        assert_eq!(
            resolve(StackPresence::Absent, Some(&mut tracking)),
            Verdict::Exists(false)
        );
    }

    #[test]
    fn test_missing_stack_detection() {
        assert!(is_missing_stack(
            Some("ValidationError"),
            Some("Stack with id prod-api does not exist")
        ));
        assert!(!is_missing_stack(
            Some("ValidationError"),
            Some("1 validation error detected")
        ));
        assert!(!is_missing_stack(Some("Throttling"), Some("Rate exceeded")));
        assert!(!is_missing_stack(None, None));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(Some(&StackStatus::DeleteComplete), None),
            StackPresence::Absent
        );
        assert_eq!(classify_status(None, None), StackPresence::Absent);
        assert_eq!(
            classify_status(Some(&StackStatus::DeleteInProgress), None),
            StackPresence::Deleting
        );
        assert_eq!(
            classify_status(Some(&StackStatus::UpdateRollbackComplete), None),
            StackPresence::Present
        );
        assert_eq!(
            classify_status(
                Some(&StackStatus::DeleteFailed),
                Some("The bucket you tried to delete is not empty")
            ),
            StackPresence::DeleteFailed(String::from(
                "The bucket you tried to delete is not empty"
            ))
        );
    }
}
