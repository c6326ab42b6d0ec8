//! Submission of rendered documents to a provisioning service
//!
//! The submitter hands the document over as an opaque body and reports the
//! initiation acknowledgment. Stack creation is not idempotent, so nothing
//! here retries, polls or inspects drift.

use crate::error::TemplateError;
use crate::kind::Capability;
use crate::model::Document;
use crate::render::Format;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Submission errors
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The provisioning service rejected the request; code and message are
    /// exactly what the service returned.
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// A `CreateStack` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub capabilities: Vec<Capability>,
    /// Capabilities the document needs, recorded for diagnostics only
    #[serde(default)]
    pub required_capabilities: BTreeSet<Capability>,
}

impl CreateStackRequest {
    pub fn new(
        stack_name: impl Into<String>,
        document: &Document,
        format: Format,
        capabilities: Vec<Capability>,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            stack_name: stack_name.into(),
            template_body: document.to_string(format)?,
            capabilities,
            required_capabilities: document.required_capabilities(),
        })
    }

    /// Required capabilities the caller has not acknowledged
    pub fn missing_capabilities(&self) -> Vec<Capability> {
        self.required_capabilities
            .iter()
            .copied()
            .filter(|req| !self.capabilities.iter().any(|c| c.covers(*req)))
            .collect()
    }
}

/// Initiation acknowledgment (not completion)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackReceipt {
    pub stack_name: String,
    pub stack_id: Option<String>,
}

/// Provisioning service abstraction
#[async_trait]
pub trait StackSubmitter: Send + Sync {
    /// Returns the service name (e.g., "cloudformation")
    fn name(&self) -> &str;

    /// Issue exactly one create-stack call
    async fn create_stack(&self, request: &CreateStackRequest)
    -> Result<StackReceipt, SubmitError>;
}

/// Submit a request once, surfacing any rejection unchanged
pub async fn submit(
    submitter: &dyn StackSubmitter,
    request: &CreateStackRequest,
) -> Result<StackReceipt, SubmitError> {
    let missing = request.missing_capabilities();
    if !missing.is_empty() {
        tracing::warn!(
            stack = %request.stack_name,
            missing = ?missing,
            "Document declares identity resources without capability acknowledgment"
        );
    }

    tracing::info!(
        stack = %request.stack_name,
        service = submitter.name(),
        bytes = request.template_body.len(),
        "Submitting stack"
    );
    let receipt = submitter.create_stack(request).await?;
    tracing::info!(
        stack = %receipt.stack_name,
        stack_id = receipt.stack_id.as_deref().unwrap_or("-"),
        "Stack creation initiated"
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TemplateBuilder;
    use crate::kind::ResourceKind;
    use crate::value::Properties;
    use std::sync::Mutex;

    /// Behaves like the remote engine for capability checks
    struct FakeEngine {
        calls: Mutex<Vec<CreateStackRequest>>,
    }

    impl FakeEngine {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StackSubmitter for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn create_stack(
            &self,
            request: &CreateStackRequest,
        ) -> Result<StackReceipt, SubmitError> {
            self.calls.lock().unwrap().push(request.clone());
            if request.template_body.contains("AWS::IAM::Role")
                && !request.capabilities.contains(&Capability::Iam)
            {
                return Err(SubmitError::Rejected {
                    code: "InsufficientCapabilitiesException".into(),
                    message: "Requires capabilities : [CAPABILITY_IAM]".into(),
                });
            }
            Ok(StackReceipt {
                stack_name: request.stack_name.clone(),
                stack_id: Some(format!("arn:fake:stack/{}", request.stack_name)),
            })
        }
    }

    fn role_document() -> Document {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_resource(ResourceKind::IamRole, "ReplicationRole", Properties::new())
            .unwrap();
        builder.render().unwrap()
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced_verbatim() {
        let engine = FakeEngine::new();
        let request =
            CreateStackRequest::new("s3-secure-bucket-stack", &role_document(), Format::Json, vec![])
                .unwrap();
        assert_eq!(request.missing_capabilities(), vec![Capability::Iam]);

        let err = submit(&engine, &request).await.unwrap_err();
        match &err {
            SubmitError::Rejected { code, message } => {
                assert_eq!(code, "InsufficientCapabilitiesException");
                assert_eq!(message, "Requires capabilities : [CAPABILITY_IAM]");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "InsufficientCapabilitiesException: Requires capabilities : [CAPABILITY_IAM]"
        );
        // exactly one call, no retry
        assert_eq!(engine.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_acknowledged_capability_is_forwarded() {
        let engine = FakeEngine::new();
        let request = CreateStackRequest::new(
            "s3-secure-bucket-stack",
            &role_document(),
            Format::Json,
            vec![Capability::Iam],
        )
        .unwrap();
        assert!(request.missing_capabilities().is_empty());

        let receipt = submit(&engine, &request).await.unwrap();
        assert_eq!(receipt.stack_name, "s3-secure-bucket-stack");
        assert_eq!(
            engine.calls.lock().unwrap()[0].capabilities,
            vec![Capability::Iam]
        );
    }

    #[test]
    fn test_request_body_matches_render() {
        let doc = role_document();
        let request = CreateStackRequest::new("PolyStack", &doc, Format::Yaml, vec![]).unwrap();
        assert_eq!(request.template_body, doc.to_yaml().unwrap());
    }
}
