//! VPC flow logs delivered to a bucket

use crate::blocks::{Statement, name_tag};
use crate::error::{BlueprintError, Result};
use crate::network::Network;
use crate::policy::BucketPolicies;
use crate::storage::{PRIMARY_POLICY_ID, Storage, owner_full_control};
use stackforge_template::{
    ParameterType, Properties, ResourceHandle, ResourceKind, TemplateBuilder, Value,
};

const DELIVERY_PRINCIPAL: &str = "delivery.logs.amazonaws.com";

/// Where flow log records land
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowLogDestination {
    /// The bucket declared by the storage block
    #[default]
    PrimaryBucket,
    /// A bucket outside this stack, exposed as the `S3BucketName` parameter
    ExistingBucket(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLogSettings {
    pub destination: FlowLogDestination,
    pub traffic_type: String,
    pub max_aggregation_interval: u32,
}

impl Default for FlowLogSettings {
    fn default() -> Self {
        Self {
            destination: FlowLogDestination::PrimaryBucket,
            traffic_type: "REJECT".to_string(),
            max_aggregation_interval: 600,
        }
    }
}

impl FlowLogSettings {
    pub fn declare(
        &self,
        builder: &mut TemplateBuilder,
        network: &Network,
        storage: Option<&Storage>,
        policies: &mut BucketPolicies,
    ) -> Result<ResourceHandle> {
        if !matches!(self.traffic_type.as_str(), "ACCEPT" | "REJECT" | "ALL") {
            return Err(BlueprintError::InvalidLayout(format!(
                "unknown flow log traffic type: {}",
                self.traffic_type
            )));
        }
        if ![60, 600].contains(&self.max_aggregation_interval) {
            return Err(BlueprintError::InvalidLayout(format!(
                "max aggregation interval must be 60 or 600, got {}",
                self.max_aggregation_interval
            )));
        }

        let (policy_id, bucket, arn) = match &self.destination {
            FlowLogDestination::PrimaryBucket => {
                let storage = storage.ok_or(BlueprintError::MissingFeature {
                    feature: "flow-logs",
                    requires: "storage",
                })?;
                (
                    PRIMARY_POLICY_ID,
                    Value::from(&storage.bucket),
                    storage.bucket_arn(),
                )
            }
            FlowLogDestination::ExistingBucket(name) => {
                let parameter = builder.declare_parameter(
                    "S3BucketName",
                    ParameterType::String,
                    Some(name.as_str().into()),
                    "Name of the S3 bucket for VPC Flow Logs",
                )?;
                (
                    "FlowLogBucketPolicy",
                    Value::from(&parameter),
                    Value::sub("arn:${AWS::Partition}:s3:::${S3BucketName}"),
                )
            }
        };

        let flow_log = builder.declare_resource(
            ResourceKind::FlowLog,
            "VPCFlowLog",
            Properties::new()
                .with("LogDestination", arn.clone())
                .with("LogDestinationType", "s3")
                .with("ResourceId", &network.vpc)
                .with("ResourceType", "VPC")
                .with("TrafficType", self.traffic_type.as_str())
                .with("MaxAggregationInterval", self.max_aggregation_interval)
                .with("Tags", name_tag(Value::sub("${EnvironmentName}-flow-logs"))),
        )?;

        policies.grant(
            policy_id,
            bucket,
            [
                Statement::allow(["s3:PutObject"])
                    .sid("AWSLogDeliveryWrite")
                    .service(DELIVERY_PRINCIPAL)
                    .resource(Value::join("", [arn.clone(), Value::from("/AWSLogs/*")]))
                    .condition(owner_full_control()),
                Statement::allow(["s3:GetBucketAcl"])
                    .sid("AWSLogDeliveryAclCheck")
                    .service(DELIVERY_PRINCIPAL)
                    .resource(arn),
            ],
            &flow_log,
        );
        builder.declare_output("VPCFlowLogId", "ID of the VPC Flow Log", &flow_log)?;
        Ok(flow_log)
    }
}
