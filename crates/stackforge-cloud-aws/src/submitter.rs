//! CloudFormation `CreateStack` submitter

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::config::Region;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::Capability as AwsCapability;
use stackforge_template::{Capability, CreateStackRequest, StackReceipt, StackSubmitter, SubmitError};

/// Submits documents through the CloudFormation API
pub struct CloudFormationSubmitter {
    client: Client,
}

impl CloudFormationSubmitter {
    /// Build a client from the default credential and region chain
    ///
    /// `region` overrides whatever the environment resolves. SDK retries are
    /// disabled: `CreateStack` is not idempotent and is sent exactly once.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        tracing::debug!(region = ?config.region(), "Loaded AWS config");
        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackSubmitter for CloudFormationSubmitter {
    fn name(&self) -> &str {
        "cloudformation"
    }

    async fn create_stack(
        &self,
        request: &CreateStackRequest,
    ) -> Result<StackReceipt, SubmitError> {
        let capabilities = request
            .capabilities
            .iter()
            .copied()
            .map(to_aws_capability)
            .collect::<Vec<_>>();

        let output = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .set_capabilities((!capabilities.is_empty()).then_some(capabilities))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(StackReceipt {
            stack_name: request.stack_name.clone(),
            stack_id: output.stack_id().map(String::from),
        })
    }
}

fn to_aws_capability(capability: Capability) -> AwsCapability {
    AwsCapability::from(capability.as_str())
}

/// Service rejections keep the service's code and message untouched
fn map_sdk_error<E, R>(err: SdkError<E, R>) -> SubmitError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let Some(service) = err.as_service_error()
        && let Some(code) = service.code()
    {
        return SubmitError::Rejected {
            code: code.to_string(),
            message: service.message().unwrap_or_default().to_string(),
        };
    }
    SubmitError::Transport(DisplayErrorContext(&err).to_string())
}
