//! Resource kinds understood by the provisioning engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability acknowledgments accepted by `CreateStack`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
    #[serde(rename = "CAPABILITY_AUTO_EXPAND")]
    AutoExpand,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }

    /// Whether acknowledging `self` also covers `required`
    pub fn covers(&self, required: Capability) -> bool {
        *self == required || (*self == Capability::NamedIam && required == Capability::Iam)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CAPABILITY_IAM" | "iam" => Ok(Capability::Iam),
            "CAPABILITY_NAMED_IAM" | "named-iam" => Ok(Capability::NamedIam),
            "CAPABILITY_AUTO_EXPAND" | "auto-expand" => Ok(Capability::AutoExpand),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Resource type of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Vpc,
    Subnet,
    RouteTable,
    Route,
    SubnetRouteTableAssociation,
    InternetGateway,
    VpcGatewayAttachment,
    NatGateway,
    Eip,
    SecurityGroup,
    FlowLog,
    Instance,
    Bucket,
    BucketPolicy,
    IamRole,
    IamInstanceProfile,
    Topic,
    Alarm,
    Trail,
    /// Any other type, given verbatim (e.g. `AWS::Logs::LogGroup`)
    Custom(String),
}

impl ResourceKind {
    pub fn type_name(&self) -> &str {
        match self {
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::NatGateway => "AWS::EC2::NatGateway",
            ResourceKind::Eip => "AWS::EC2::EIP",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::FlowLog => "AWS::EC2::FlowLog",
            ResourceKind::Instance => "AWS::EC2::Instance",
            ResourceKind::Bucket => "AWS::S3::Bucket",
            ResourceKind::BucketPolicy => "AWS::S3::BucketPolicy",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::IamInstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::Topic => "AWS::SNS::Topic",
            ResourceKind::Alarm => "AWS::CloudWatch::Alarm",
            ResourceKind::Trail => "AWS::CloudTrail::Trail",
            ResourceKind::Custom(name) => name,
        }
    }

    /// Whether declaring this kind grants or assumes permissions
    pub fn is_identity(&self) -> bool {
        match self {
            ResourceKind::IamRole | ResourceKind::IamInstanceProfile => true,
            ResourceKind::Custom(name) => name.starts_with("AWS::IAM::"),
            _ => false,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ResourceKind::Vpc.type_name(), "AWS::EC2::VPC");
        assert_eq!(ResourceKind::Trail.to_string(), "AWS::CloudTrail::Trail");
        assert_eq!(
            ResourceKind::Custom("AWS::Logs::LogGroup".into()).type_name(),
            "AWS::Logs::LogGroup"
        );
    }

    #[test]
    fn test_identity_kinds() {
        assert!(ResourceKind::IamRole.is_identity());
        assert!(ResourceKind::Custom("AWS::IAM::Policy".into()).is_identity());
        assert!(!ResourceKind::Bucket.is_identity());
    }

    #[test]
    fn test_capability_parse_and_cover() {
        assert_eq!("CAPABILITY_IAM".parse::<Capability>(), Ok(Capability::Iam));
        assert_eq!("named-iam".parse::<Capability>(), Ok(Capability::NamedIam));
        assert!("bogus".parse::<Capability>().is_err());
        assert!(Capability::NamedIam.covers(Capability::Iam));
        assert!(!Capability::Iam.covers(Capability::NamedIam));
    }
}
