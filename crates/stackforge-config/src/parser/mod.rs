//! KDL スタックファイルのパーサー
//!
//! ```kdl
//! stack "poly-stack" {
//!     region "ca-central-1"
//!     capabilities "CAPABILITY_IAM"
//! }
//! network {
//!     vpc-cidr "10.0.0.0/16"
//!     zone public="10.0.0.0/24" private="10.0.128.0/24"
//! }
//! storage {
//!     encryption "kms" key="arn:aws:kms:..."
//!     replica bucket="secure-bucket-back"
//! }
//! ```

use crate::error::{ConfigError, Result};
use crate::model::StackDefinition;
use kdl::{KdlDocument, KdlNode, KdlValue};
use stackforge_blueprint::{
    AlarmSettings, BlockDevice, ComputeFleet, Encryption, FlowLogDestination, FlowLogSettings,
    IngressRule, IpProtocol, NetworkLayout, PublicAccessBlock, ReplicaSettings,
    SecurityGroupSettings, StorageLayout, TrailSettings, Versioning, ZoneLayout,
};
use std::fs;
use std::path::Path;
use tracing::debug;

/// スタックファイルをパース（スタック名の既定値は親ディレクトリ名）
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<StackDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("stackforge")
        .to_string();
    parse_stack_string(&content, name)
}

/// スタックファイルの内容をパース
pub fn parse_stack_string(content: &str, default_name: String) -> Result<StackDefinition> {
    let doc: KdlDocument = content.parse()?;
    let mut stack = StackDefinition {
        name: default_name,
        ..Default::default()
    };

    for node in doc.nodes() {
        let section = node.name().value();
        match section {
            "stack" => parse_stack(node, &mut stack)?,
            "network" => {
                once(section, stack.blueprint.network.is_some())?;
                stack.blueprint.network = Some(parse_network(node)?);
            }
            "compute" => {
                once(section, stack.blueprint.compute.is_some())?;
                stack.blueprint.compute = Some(parse_compute(node)?);
            }
            "monitoring" => {
                once(section, stack.blueprint.monitoring.is_some())?;
                stack.blueprint.monitoring = Some(parse_monitoring(node)?);
            }
            "storage" => {
                once(section, stack.blueprint.storage.is_some())?;
                stack.blueprint.storage = Some(parse_storage(node)?);
            }
            "flow-logs" => {
                once(section, stack.blueprint.flow_logs.is_some())?;
                stack.blueprint.flow_logs = Some(parse_flow_logs(node)?);
            }
            other => return Err(unknown(other)),
        }
    }

    debug!(stack = %stack.name, features = ?stack.blueprint.features(), "Parsed stack file");
    Ok(stack)
}

fn parse_stack(node: &KdlNode, stack: &mut StackDefinition) -> Result<()> {
    stack.name = string_arg(node, "stack")?;
    for child in children(node) {
        let path = format!("stack.{}", child.name().value());
        match child.name().value() {
            "region" => stack.region = Some(string_arg(child, &path)?),
            "description" => stack.blueprint.description = Some(string_arg(child, &path)?),
            "capabilities" => {
                stack.capabilities = strings(child)
                    .map(|s| s.parse().map_err(|e: String| invalid(&path, e)))
                    .collect::<Result<_>>()?;
            }
            "format" => {
                stack.format = string_arg(child, &path)?
                    .parse()
                    .map_err(|e: String| invalid(&path, e))?;
            }
            _ => return Err(unknown(&path)),
        }
    }
    Ok(())
}

fn parse_network(node: &KdlNode) -> Result<NetworkLayout> {
    let mut layout = NetworkLayout::default();
    let mut zones = Vec::new();
    for child in children(node) {
        let path = format!("network.{}", child.name().value());
        match child.name().value() {
            "environment" => layout.environment_name = string_arg(child, &path)?,
            "vpc-cidr" => layout.vpc_cidr = string_arg(child, &path)?,
            "zone" => zones.push(ZoneLayout::new(
                string_prop(child, "public", &path)?,
                string_prop(child, "private", &path)?,
            )),
            "security-group" => layout.security_group = Some(parse_security_group(child)?),
            _ => return Err(unknown(&path)),
        }
    }
    if !zones.is_empty() {
        layout.zones = zones;
    }
    Ok(layout)
}

fn parse_security_group(node: &KdlNode) -> Result<SecurityGroupSettings> {
    let mut settings = SecurityGroupSettings {
        group_name: prop(node, "name").and_then(KdlValue::as_string).map(String::from),
        ..Default::default()
    };
    let mut ingress = Vec::new();
    for child in children(node) {
        let path = format!("network.security-group.{}", child.name().value());
        match child.name().value() {
            "description" => settings.description = string_arg(child, &path)?,
            "ingress" => {
                let protocol: IpProtocol = string_arg(child, &path)?
                    .parse()
                    .map_err(|e: String| invalid(&path, e))?;
                let from_port = integer_at(child, 1, &path)?;
                let to_port = match arg(child, 2) {
                    Some(_) => integer_at(child, 2, &path)?,
                    None => from_port,
                };
                let cidr = prop(child, "cidr")
                    .and_then(KdlValue::as_string)
                    .unwrap_or("0.0.0.0/0");
                ingress.push(IngressRule::new(protocol, from_port, to_port, cidr));
            }
            _ => return Err(unknown(&path)),
        }
    }
    if !ingress.is_empty() {
        settings.ingress = ingress;
    }
    Ok(settings)
}

fn parse_compute(node: &KdlNode) -> Result<ComputeFleet> {
    let mut image = None;
    let mut key_pair = None;
    let mut fleet = ComputeFleet::new("", "");
    for child in children(node) {
        let path = format!("compute.{}", child.name().value());
        match child.name().value() {
            "image" => image = Some(string_arg(child, &path)?),
            "key-pair" => key_pair = Some(string_arg(child, &path)?),
            "instance-type" => fleet.instance_type = string_arg(child, &path)?,
            "instance-profile" => fleet.instance_profile = Some(string_arg(child, &path)?),
            "placement" => {
                fleet.placement = string_arg(child, &path)?
                    .parse()
                    .map_err(|e: String| invalid(&path, e))?;
            }
            "root-volume" => fleet.block_device = parse_block_device(child, &path)?,
            _ => return Err(unknown(&path)),
        }
    }
    fleet.image_id = image.ok_or_else(|| invalid("compute.image", "value required"))?;
    fleet.key_name = key_pair.ok_or_else(|| invalid("compute.key-pair", "value required"))?;
    Ok(fleet)
}

fn parse_block_device(node: &KdlNode, path: &str) -> Result<BlockDevice> {
    let mut device = BlockDevice::default();
    if let Some(name) = prop(node, "device").and_then(KdlValue::as_string) {
        device.device_name = name.to_string();
    }
    if let Some(size) = prop(node, "size") {
        device.volume_size = integer(size, &format!("{}.size", path))?;
    }
    if let Some(delete) = prop(node, "delete-on-termination") {
        device.delete_on_termination = delete
            .as_bool()
            .ok_or_else(|| invalid(path, "delete-on-termination must be #true or #false"))?;
    }
    Ok(device)
}

fn parse_monitoring(node: &KdlNode) -> Result<AlarmSettings> {
    let mut settings = AlarmSettings::default();
    for child in children(node) {
        let path = format!("monitoring.{}", child.name().value());
        match child.name().value() {
            "email" => settings.emails.extend(strings(child).map(String::from)),
            "metric" => settings.metric_name = string_arg(child, &path)?,
            "namespace" => settings.namespace = string_arg(child, &path)?,
            "statistic" => settings.statistic = string_arg(child, &path)?,
            "period" => settings.period = integer_at(child, 0, &path)?,
            "evaluation-periods" => settings.evaluation_periods = integer_at(child, 0, &path)?,
            "threshold" => {
                settings.threshold = arg(child, 0)
                    .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
                    .ok_or_else(|| invalid(&path, "number required"))?;
            }
            "comparison" => settings.comparison_operator = string_arg(child, &path)?,
            "description" => settings.description = string_arg(child, &path)?,
            _ => return Err(unknown(&path)),
        }
    }
    if settings.emails.is_empty() {
        return Err(invalid("monitoring.email", "at least one endpoint required"));
    }
    Ok(settings)
}

fn parse_storage(node: &KdlNode) -> Result<StorageLayout> {
    let mut encryption = None;
    let mut layout = StorageLayout::new(Encryption::Aes256);
    for child in children(node) {
        let path = format!("storage.{}", child.name().value());
        match child.name().value() {
            "bucket" => layout.bucket_name = Some(string_arg(child, &path)?),
            "encryption" => {
                encryption = Some(match string_arg(child, &path)?.to_ascii_lowercase().as_str() {
                    "kms" | "aws:kms" => Encryption::Kms {
                        key_id: string_prop(child, "key", &path)?,
                    },
                    "aes256" => Encryption::Aes256,
                    other => {
                        return Err(invalid(&path, format!("unknown algorithm: {}", other)));
                    }
                });
            }
            "versioning" => {
                layout.versioning = if bool_arg(child, &path)? {
                    Versioning::Enabled
                } else {
                    Versioning::Suspended
                };
            }
            "public-access-block" => {
                let flag = |key: &str| -> Result<bool> {
                    match prop(child, key) {
                        Some(v) => v
                            .as_bool()
                            .ok_or_else(|| invalid(&path, format!("{} must be #true or #false", key))),
                        None => Ok(true),
                    }
                };
                layout.public_access = PublicAccessBlock {
                    block_public_acls: flag("block-public-acls")?,
                    block_public_policy: flag("block-public-policy")?,
                    ignore_public_acls: flag("ignore-public-acls")?,
                    restrict_public_buckets: flag("restrict-public-buckets")?,
                };
            }
            "replica" => {
                layout.replica = Some(ReplicaSettings {
                    bucket_name: prop(child, "bucket")
                        .and_then(KdlValue::as_string)
                        .map(String::from),
                });
            }
            "audit-trail" => {
                let mut trail = TrailSettings::default();
                if let Some(name) = prop(child, "name").and_then(KdlValue::as_string) {
                    trail.trail_name = name.to_string();
                }
                layout.audit_trail = Some(trail);
            }
            _ => return Err(unknown(&path)),
        }
    }
    layout.encryption = encryption.ok_or_else(|| invalid("storage.encryption", "value required"))?;
    Ok(layout)
}

fn parse_flow_logs(node: &KdlNode) -> Result<FlowLogSettings> {
    let mut settings = FlowLogSettings::default();
    for child in children(node) {
        let path = format!("flow-logs.{}", child.name().value());
        match child.name().value() {
            "bucket" => {
                settings.destination = FlowLogDestination::ExistingBucket(string_arg(child, &path)?)
            }
            "traffic" => settings.traffic_type = string_arg(child, &path)?.to_ascii_uppercase(),
            "aggregation-interval" => {
                settings.max_aggregation_interval = integer_at(child, 0, &path)?
            }
            _ => return Err(unknown(&path)),
        }
    }
    Ok(settings)
}

// ヘルパー

fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

fn arg(node: &KdlNode, index: usize) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .nth(index)
        .map(|e| e.value())
}

fn prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_some_and(|n| n.value() == key))
        .map(|e| e.value())
}

fn strings(node: &KdlNode) -> impl Iterator<Item = &str> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
}

fn string_arg(node: &KdlNode, path: &str) -> Result<String> {
    arg(node, 0)
        .and_then(KdlValue::as_string)
        .map(String::from)
        .ok_or_else(|| invalid(path, "string value required"))
}

fn string_prop(node: &KdlNode, key: &str, path: &str) -> Result<String> {
    prop(node, key)
        .and_then(KdlValue::as_string)
        .map(String::from)
        .ok_or_else(|| invalid(path, format!("property {}=\"...\" required", key)))
}

fn bool_arg(node: &KdlNode, path: &str) -> Result<bool> {
    arg(node, 0)
        .and_then(KdlValue::as_bool)
        .ok_or_else(|| invalid(path, "#true or #false required"))
}

fn integer_at<T: TryFrom<i128>>(node: &KdlNode, index: usize, path: &str) -> Result<T> {
    let value = arg(node, index).ok_or_else(|| invalid(path, "integer required"))?;
    integer(value, path)
}

fn integer<T: TryFrom<i128>>(value: &KdlValue, path: &str) -> Result<T> {
    value
        .as_integer()
        .and_then(|i| T::try_from(i).ok())
        .ok_or_else(|| invalid(path, "integer out of range"))
}

fn once(section: &str, seen: bool) -> Result<()> {
    if seen {
        return Err(invalid(section, "declared more than once"));
    }
    Ok(())
}

fn invalid(path: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidConfig(format!("{}: {}", path, reason))
}

fn unknown(path: &str) -> ConfigError {
    invalid(path, "unknown node")
}
