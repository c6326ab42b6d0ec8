//! Typed nested property blocks
//!
//! Each block converts into the [`Value`] shape the provisioning engine
//! expects for the corresponding property.

use stackforge_template::{Properties, Value};
use std::fmt;
use std::str::FromStr;

/// `Tags` list holding a single `Name` tag
pub fn name_tag(value: impl Into<Value>) -> Value {
    Value::list([Properties::new().with("Key", "Name").with("Value", value)])
}

/// IP protocol of a security group rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    Tcp,
    Udp,
    Icmp,
    All,
}

impl IpProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpProtocol::Tcp => "tcp",
            IpProtocol::Udp => "udp",
            IpProtocol::Icmp => "icmp",
            IpProtocol::All => "-1",
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(IpProtocol::Tcp),
            "udp" => Ok(IpProtocol::Udp),
            "icmp" => Ok(IpProtocol::Icmp),
            "-1" | "all" => Ok(IpProtocol::All),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// One allow-list entry: (protocol, port range, source)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: IpProtocol,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: String,
}

impl IngressRule {
    pub fn new(protocol: IpProtocol, from_port: i32, to_port: i32, cidr: impl Into<String>) -> Self {
        Self {
            protocol,
            from_port,
            to_port,
            cidr: cidr.into(),
        }
    }

    /// Single TCP port open to any source
    pub fn tcp(port: i32) -> Self {
        Self::new(IpProtocol::Tcp, port, port, "0.0.0.0/0")
    }

    /// Single UDP port open to any source
    pub fn udp(port: i32) -> Self {
        Self::new(IpProtocol::Udp, port, port, "0.0.0.0/0")
    }
}

impl From<&IngressRule> for Value {
    fn from(rule: &IngressRule) -> Self {
        Properties::new()
            .with("IpProtocol", rule.protocol.as_str())
            .with("FromPort", rule.from_port)
            .with("ToPort", rule.to_port)
            .with("CidrIp", rule.cidr.as_str())
            .into()
    }
}

/// SSH, HTTP, HTTPS, DNS, MSSQL, PostgreSQL, MySQL, RDP, OSSEC and Elasticsearch
pub fn standard_ingress() -> Vec<IngressRule> {
    vec![
        IngressRule::tcp(22),
        IngressRule::tcp(80),
        IngressRule::tcp(443),
        IngressRule::tcp(53),
        IngressRule::udp(53),
        IngressRule::tcp(1433),
        IngressRule::tcp(5432),
        IngressRule::tcp(3306),
        IngressRule::tcp(3389),
        IngressRule::tcp(1514),
        IngressRule::new(IpProtocol::Tcp, 9200, 9300, "0.0.0.0/0"),
    ]
}

/// EBS root volume of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub device_name: String,
    pub volume_size: u32,
    pub delete_on_termination: bool,
}

impl Default for BlockDevice {
    fn default() -> Self {
        Self {
            device_name: "/dev/sda1".to_string(),
            volume_size: 80,
            delete_on_termination: false,
        }
    }
}

impl From<&BlockDevice> for Value {
    fn from(device: &BlockDevice) -> Self {
        Properties::new()
            .with("DeviceName", device.device_name.as_str())
            .with(
                "Ebs",
                Properties::new()
                    .with("DeleteOnTermination", device.delete_on_termination)
                    .with("VolumeSize", device.volume_size),
            )
            .into()
    }
}

/// Server-side encryption default of a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encryption {
    Kms { key_id: String },
    Aes256,
}

impl Encryption {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Encryption::Kms { .. } => "aws:kms",
            Encryption::Aes256 => "AES256",
        }
    }

    pub fn kms_key_id(&self) -> Option<&str> {
        match self {
            Encryption::Kms { key_id } => Some(key_id),
            Encryption::Aes256 => None,
        }
    }
}

impl From<&Encryption> for Value {
    fn from(encryption: &Encryption) -> Self {
        let default = Properties::new()
            .with("SSEAlgorithm", encryption.algorithm())
            .with_opt("KMSMasterKeyID", encryption.kms_key_id());
        Properties::new()
            .with(
                "ServerSideEncryptionConfiguration",
                Value::list([Properties::new().with("ServerSideEncryptionByDefault", default)]),
            )
            .into()
    }
}

/// Bucket versioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Versioning {
    #[default]
    Enabled,
    Suspended,
}

impl Versioning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Versioning::Enabled => "Enabled",
            Versioning::Suspended => "Suspended",
        }
    }
}

impl From<Versioning> for Value {
    fn from(versioning: Versioning) -> Self {
        Properties::new().with("Status", versioning.as_str()).into()
    }
}

/// Public access block flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl Default for PublicAccessBlock {
    fn default() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

impl From<PublicAccessBlock> for Value {
    fn from(block: PublicAccessBlock) -> Self {
        Properties::new()
            .with("BlockPublicAcls", block.block_public_acls)
            .with("BlockPublicPolicy", block.block_public_policy)
            .with("IgnorePublicAcls", block.ignore_public_acls)
            .with("RestrictPublicBuckets", block.restrict_public_buckets)
            .into()
    }
}

/// IAM policy statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sid: Option<String>,
    pub service_principal: Option<String>,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub condition: Option<Value>,
}

impl Statement {
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sid: None,
            service_principal: None,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
            condition: None,
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service_principal = Some(service.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<Value>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<Value>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Single-element lists collapse to the element, as the engine accepts both
fn one_or_many(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::List(values)
    }
}

impl From<&Statement> for Value {
    fn from(statement: &Statement) -> Self {
        let actions = statement
            .actions
            .iter()
            .map(|a| Value::from(a.as_str()))
            .collect();
        let mut props = Properties::new()
            .with_opt("Sid", statement.sid.as_deref())
            .with("Effect", "Allow")
            .with("Action", one_or_many(actions))
            .with_opt(
                "Principal",
                statement
                    .service_principal
                    .as_deref()
                    .map(|s| Properties::new().with("Service", s)),
            )
            .with_opt("Condition", statement.condition.clone());
        if !statement.resources.is_empty() {
            props.insert("Resource", one_or_many(statement.resources.clone()));
        }
        props.into()
    }
}

/// `{"Version": "2012-10-17", "Statement": [...]}`
pub fn policy_document(statements: &[Statement]) -> Value {
    Properties::new()
        .with("Version", "2012-10-17")
        .with(
            "Statement",
            Value::List(statements.iter().map(Value::from).collect()),
        )
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_ingress_is_explicit() {
        let rules = standard_ingress();
        assert_eq!(rules.len(), 11);
        assert!(rules.contains(&IngressRule::udp(53)));
        let es = rules.last().unwrap();
        assert_eq!((es.from_port, es.to_port), (9200, 9300));
    }

    #[test]
    fn test_ingress_rule_value() {
        let value = Value::from(&IngressRule::tcp(22));
        assert_eq!(value.get("IpProtocol"), Some(&Value::from("tcp")));
        assert_eq!(value.get("FromPort"), Some(&Value::Integer(22)));
        assert_eq!(value.get("CidrIp"), Some(&Value::from("0.0.0.0/0")));
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("TCP".parse::<IpProtocol>(), Ok(IpProtocol::Tcp));
        assert_eq!("all".parse::<IpProtocol>(), Ok(IpProtocol::All));
        assert!("sctp".parse::<IpProtocol>().is_err());
    }

    #[test]
    fn test_encryption_value() {
        let kms = Value::from(&Encryption::Kms {
            key_id: "arn:aws:kms:ca-central-1:000000000000:key/test".into(),
        });
        let rules = kms
            .get("ServerSideEncryptionConfiguration")
            .and_then(Value::as_list)
            .unwrap();
        let default = rules[0].get("ServerSideEncryptionByDefault").unwrap();
        assert_eq!(default.get("SSEAlgorithm"), Some(&Value::from("aws:kms")));
        assert!(default.get("KMSMasterKeyID").is_some());

        let aes = Value::from(&Encryption::Aes256);
        let json = serde_json::to_string(&aes).unwrap();
        assert!(json.contains("AES256"));
        assert!(!json.contains("KMSMasterKeyID"));
    }

    #[test]
    fn test_statement_single_action_collapses() {
        let value = Value::from(
            &Statement::allow(["s3:PutObject"])
                .sid("Write")
                .service("cloudtrail.amazonaws.com")
                .resource("arn:aws:s3:::bucket/*"),
        );
        assert_eq!(value.get("Action"), Some(&Value::from("s3:PutObject")));
        assert_eq!(value.get("Resource"), Some(&Value::from("arn:aws:s3:::bucket/*")));
        assert_eq!(
            value.get("Principal").and_then(|p| p.get("Service")),
            Some(&Value::from("cloudtrail.amazonaws.com"))
        );

        let many = Value::from(&Statement::allow(["s3:GetBucketAcl", "s3:ListBucket"]));
        assert_eq!(many.get("Action").and_then(Value::as_list).map(<[Value]>::len), Some(2));
        assert!(many.get("Resource").is_none());
    }
}
