//! stackforge blueprints
//!
//! Reusable feature blocks declared over a single
//! [`TemplateBuilder`](stackforge_template::TemplateBuilder):
//!
//! - network: VPC, subnets, NAT gateways and routing per availability zone
//! - compute: instance fleet in the network's subnets
//! - monitoring: metric alarms notifying an e-mail topic
//! - storage: encrypted bucket, replication and audit trail
//! - flow logs: VPC traffic records delivered to a bucket

pub mod blocks;
pub mod blueprint;
pub mod compute;
pub mod error;
pub mod flow_logs;
pub mod monitoring;
pub mod network;
pub mod policy;
pub mod storage;

// Re-exports
pub use blocks::{
    BlockDevice, Encryption, IngressRule, IpProtocol, PublicAccessBlock, Statement, Versioning,
};
pub use blueprint::{Blueprint, DEFAULT_DESCRIPTION};
pub use compute::{ComputeFleet, Placement};
pub use error::{BlueprintError, Result};
pub use flow_logs::{FlowLogDestination, FlowLogSettings};
pub use monitoring::{AlarmSettings, Monitoring};
pub use network::{Network, NetworkLayout, SecurityGroupSettings, Zone, ZoneLayout};
pub use policy::BucketPolicies;
pub use storage::{ReplicaSettings, Storage, StorageLayout, TrailSettings};
