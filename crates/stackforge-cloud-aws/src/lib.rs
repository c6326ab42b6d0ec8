//! AWS provisioning backend for stackforge
//!
//! Implements [`StackSubmitter`](stackforge_template::StackSubmitter) on top
//! of the CloudFormation API. Credentials and region come from the standard
//! AWS provider chain (environment, profile, instance metadata).
//!
//! ```ignore
//! use stackforge_cloud_aws::CloudFormationSubmitter;
//! use stackforge_template::{submit, CreateStackRequest, Format};
//!
//! let submitter = CloudFormationSubmitter::from_env(Some("ca-central-1".into())).await;
//! let request = CreateStackRequest::new("PolyStack", &document, Format::Json, vec![])?;
//! let receipt = submit(&submitter, &request).await?;
//! ```

pub mod submitter;

pub use submitter::CloudFormationSubmitter;
