//! Feature block composition

use crate::compute::ComputeFleet;
use crate::error::{BlueprintError, Result};
use crate::flow_logs::FlowLogSettings;
use crate::monitoring::AlarmSettings;
use crate::network::NetworkLayout;
use crate::policy::BucketPolicies;
use crate::storage::StorageLayout;
use stackforge_template::{Document, TemplateBuilder};
use tracing::info;

pub const DEFAULT_DESCRIPTION: &str = "CloudFormation template generated by stackforge";

/// A set of feature blocks rendered into one document
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    pub description: Option<String>,
    pub network: Option<NetworkLayout>,
    pub compute: Option<ComputeFleet>,
    pub monitoring: Option<AlarmSettings>,
    pub storage: Option<StorageLayout>,
    pub flow_logs: Option<FlowLogSettings>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.network.is_none()
            && self.compute.is_none()
            && self.monitoring.is_none()
            && self.storage.is_none()
            && self.flow_logs.is_none()
    }

    /// Names of the enabled blocks, in declaration order
    pub fn features(&self) -> Vec<&'static str> {
        let mut features = Vec::new();
        if self.network.is_some() {
            features.push("network");
        }
        if self.storage.is_some() {
            features.push("storage");
        }
        if self.compute.is_some() {
            features.push("compute");
        }
        if self.monitoring.is_some() {
            features.push("monitoring");
        }
        if self.flow_logs.is_some() {
            features.push("flow-logs");
        }
        features
    }

    /// Declare every block on a fresh builder and render it
    pub fn build(&self) -> Result<Document> {
        if self.is_empty() {
            return Err(BlueprintError::Empty);
        }
        if self.network.is_none() {
            if self.compute.is_some() {
                return Err(BlueprintError::MissingFeature {
                    feature: "compute",
                    requires: "network",
                });
            }
            if self.flow_logs.is_some() {
                return Err(BlueprintError::MissingFeature {
                    feature: "flow-logs",
                    requires: "network",
                });
            }
        }

        let mut builder = TemplateBuilder::new().with_description(
            self.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION),
        );
        let mut policies = BucketPolicies::new();

        let network = match &self.network {
            Some(layout) => Some(layout.declare(&mut builder)?),
            None => None,
        };
        let storage = match &self.storage {
            Some(layout) => Some(layout.declare(&mut builder, &mut policies)?),
            None => None,
        };
        let instances = match (&self.compute, &network) {
            (Some(fleet), Some(network)) => fleet.declare(&mut builder, network)?,
            _ => Vec::new(),
        };
        if let Some(alarms) = &self.monitoring {
            alarms.declare(&mut builder, &instances)?;
        }
        if let (Some(settings), Some(network)) = (&self.flow_logs, &network) {
            settings.declare(&mut builder, network, storage.as_ref(), &mut policies)?;
        }
        policies.declare(&mut builder)?;

        let document = builder.render()?;
        info!(
            features = ?self.features(),
            resources = document.resources().len(),
            "Built blueprint"
        );
        Ok(document)
    }
}
