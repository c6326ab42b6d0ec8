//! Network topology block
//!
//! Fixed topology per availability zone: one public subnet carrying a NAT
//! gateway, one private subnet, and one private route table whose default
//! route targets the NAT gateway of the same zone. All public subnets share a
//! single public route table routed through the internet gateway.

use crate::blocks::{IngressRule, name_tag, standard_ingress};
use crate::error::{BlueprintError, Result};
use stackforge_template::{
    ParameterHandle, ParameterType, Properties, ResourceHandle, ResourceKind, TemplateBuilder,
    Value,
};
use std::net::Ipv4Addr;
use tracing::debug;

const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// CIDR pair of one availability zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLayout {
    pub public_cidr: String,
    pub private_cidr: String,
}

impl ZoneLayout {
    pub fn new(public_cidr: impl Into<String>, private_cidr: impl Into<String>) -> Self {
        Self {
            public_cidr: public_cidr.into(),
            private_cidr: private_cidr.into(),
        }
    }
}

/// Security group declared alongside the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupSettings {
    pub group_name: Option<String>,
    pub description: String,
    pub ingress: Vec<IngressRule>,
}

impl Default for SecurityGroupSettings {
    fn default() -> Self {
        Self {
            group_name: None,
            description: "Security group allows SSH, HTTP, HTTPS, MSSQL, DNS, PostgreSQL, MySQL, RDP, OSSEC and ElasticSearch".to_string(),
            ingress: standard_ingress(),
        }
    }
}

/// VPC layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLayout {
    pub environment_name: String,
    pub vpc_cidr: String,
    pub zones: Vec<ZoneLayout>,
    pub security_group: Option<SecurityGroupSettings>,
}

impl Default for NetworkLayout {
    fn default() -> Self {
        Self {
            environment_name: "PolyEnvironment".to_string(),
            vpc_cidr: "10.0.0.0/16".to_string(),
            zones: vec![
                ZoneLayout::new("10.0.0.0/24", "10.0.128.0/24"),
                ZoneLayout::new("10.0.16.0/24", "10.0.144.0/24"),
            ],
            security_group: Some(SecurityGroupSettings::default()),
        }
    }
}

/// Handles of one declared availability zone
#[derive(Debug, Clone)]
pub struct Zone {
    /// 1-based zone number used in logical ids
    pub number: usize,
    pub availability_zone: Value,
    pub public_subnet: ResourceHandle,
    pub private_subnet: ResourceHandle,
    pub nat_gateway: ResourceHandle,
    pub private_route_table: ResourceHandle,
}

/// Handles of the declared network
#[derive(Debug, Clone)]
pub struct Network {
    pub environment_name: ParameterHandle,
    pub vpc: ResourceHandle,
    pub internet_gateway: ResourceHandle,
    pub gateway_attachment: ResourceHandle,
    pub public_route_table: ResourceHandle,
    pub zones: Vec<Zone>,
    pub security_group: Option<ResourceHandle>,
}

impl NetworkLayout {
    /// Check CIDR syntax and that every subnet lies inside the VPC
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(BlueprintError::InvalidLayout(
                "network requires at least one zone".to_string(),
            ));
        }
        let vpc = Cidr::parse(&self.vpc_cidr)?;
        let mut subnets: Vec<(&String, Cidr)> = Vec::new();
        for zone in &self.zones {
            for cidr in [&zone.public_cidr, &zone.private_cidr] {
                let subnet = Cidr::parse(cidr)?;
                if !vpc.contains(&subnet) {
                    return Err(BlueprintError::InvalidLayout(format!(
                        "subnet {} is outside VPC {}",
                        cidr, self.vpc_cidr
                    )));
                }
                if let Some((other, _)) = subnets.iter().find(|(_, s)| s.overlaps(&subnet)) {
                    return Err(BlueprintError::InvalidLayout(format!(
                        "subnet {} overlaps {}",
                        cidr, other
                    )));
                }
                subnets.push((cidr, subnet));
            }
        }
        Ok(())
    }

    /// Declare parameters, resources and outputs of the network
    pub fn declare(&self, builder: &mut TemplateBuilder) -> Result<Network> {
        self.validate()?;

        let environment_name = builder.declare_parameter(
            "EnvironmentName",
            ParameterType::String,
            Some(self.environment_name.as_str().into()),
            "Environment is prefixed to resource names",
        )?;
        let vpc_cidr = builder.declare_parameter(
            "VpcCIDR",
            ParameterType::String,
            Some(self.vpc_cidr.as_str().into()),
            "CIDR block of the VPC",
        )?;
        let mut zone_cidrs = Vec::with_capacity(self.zones.len());
        for (i, zone) in self.zones.iter().enumerate() {
            let n = i + 1;
            let public = builder.declare_parameter(
                format!("PublicSubnet{}CIDR", n),
                ParameterType::String,
                Some(zone.public_cidr.as_str().into()),
                format!("Public subnet in availability zone {}", n),
            )?;
            let private = builder.declare_parameter(
                format!("PrivateSubnet{}CIDR", n),
                ParameterType::String,
                Some(zone.private_cidr.as_str().into()),
                format!("Private subnet in availability zone {}", n),
            )?;
            zone_cidrs.push((public, private));
        }

        let vpc = builder.declare_resource(
            ResourceKind::Vpc,
            "VPC",
            Properties::new()
                .with("CidrBlock", &vpc_cidr)
                .with("EnableDnsSupport", true)
                .with("EnableDnsHostnames", true)
                .with("Tags", name_tag(&environment_name)),
        )?;
        let internet_gateway = builder.declare_resource(
            ResourceKind::InternetGateway,
            "InternetGateway",
            Properties::new().with("Tags", name_tag(&environment_name)),
        )?;
        let gateway_attachment = builder.declare_resource(
            ResourceKind::VpcGatewayAttachment,
            "InternetGatewayAttachment",
            Properties::new()
                .with("VpcId", &vpc)
                .with("InternetGatewayId", &internet_gateway),
        )?;

        let mut subnets = Vec::with_capacity(self.zones.len());
        for (i, (public_cidr, private_cidr)) in zone_cidrs.iter().enumerate() {
            let n = i + 1;
            let az = Value::select(i as u32, Value::get_azs(""));
            let public = declare_subnet(builder, &vpc, "Public", n, &az, public_cidr, true)?;
            let private = declare_subnet(builder, &vpc, "Private", n, &az, private_cidr, false)?;
            subnets.push((az, public, private));
        }

        let public_route_table = builder.declare_resource(
            ResourceKind::RouteTable,
            "PublicRouteTable",
            Properties::new()
                .with("VpcId", &vpc)
                .with("Tags", name_tag(Value::sub("${EnvironmentName} Public Routes"))),
        )?;

        let mut nat_gateways = Vec::with_capacity(subnets.len());
        for (i, (_, public, _)) in subnets.iter().enumerate() {
            let n = i + 1;
            let eip = builder.declare_resource(
                ResourceKind::Eip,
                format!("NatGateway{}EIP", n),
                Properties::new().with("Domain", "vpc"),
            )?;
            builder.depends_on(&eip, &gateway_attachment)?;
            let nat = builder.declare_resource(
                ResourceKind::NatGateway,
                format!("NatGateway{}", n),
                Properties::new()
                    .with("AllocationId", eip.attribute("AllocationId"))
                    .with("SubnetId", public),
            )?;
            nat_gateways.push(nat);
        }

        let default_public_route = builder.declare_resource(
            ResourceKind::Route,
            "DefaultPublicRoute",
            Properties::new()
                .with("RouteTableId", &public_route_table)
                .with("DestinationCidrBlock", DEFAULT_ROUTE)
                .with("GatewayId", &internet_gateway),
        )?;
        builder.depends_on(&default_public_route, &gateway_attachment)?;

        for (i, (_, public, _)) in subnets.iter().enumerate() {
            builder.declare_resource(
                ResourceKind::SubnetRouteTableAssociation,
                format!("PublicSubnet{}RouteTableAssociation", i + 1),
                Properties::new()
                    .with("RouteTableId", &public_route_table)
                    .with("SubnetId", public),
            )?;
        }

        let mut zones = Vec::with_capacity(subnets.len());
        for (i, ((az, public, private), nat)) in subnets.into_iter().zip(nat_gateways).enumerate() {
            let n = i + 1;
            let route_table = builder.declare_resource(
                ResourceKind::RouteTable,
                format!("PrivateRouteTable{}", n),
                Properties::new().with("VpcId", &vpc).with(
                    "Tags",
                    name_tag(Value::sub(format!(
                        "${{EnvironmentName}} Private Routes (AZ{})",
                        n
                    ))),
                ),
            )?;
            builder.declare_resource(
                ResourceKind::Route,
                format!("DefaultPrivateRoute{}", n),
                Properties::new()
                    .with("RouteTableId", &route_table)
                    .with("DestinationCidrBlock", DEFAULT_ROUTE)
                    .with("NatGatewayId", &nat),
            )?;
            builder.declare_resource(
                ResourceKind::SubnetRouteTableAssociation,
                format!("PrivateSubnet{}RouteTableAssociation", n),
                Properties::new()
                    .with("RouteTableId", &route_table)
                    .with("SubnetId", &private),
            )?;
            debug!(zone = n, "Declared zone routing");
            zones.push(Zone {
                number: n,
                availability_zone: az,
                public_subnet: public,
                private_subnet: private,
                nat_gateway: nat,
                private_route_table: route_table,
            });
        }

        let security_group = match &self.security_group {
            Some(settings) => Some(builder.declare_resource(
                ResourceKind::SecurityGroup,
                "IngressSecurityGroup",
                Properties::new()
                    .with("GroupDescription", settings.description.as_str())
                    .with_opt("GroupName", settings.group_name.as_deref())
                    .with("VpcId", &vpc)
                    .with(
                        "SecurityGroupIngress",
                        Value::List(settings.ingress.iter().map(Value::from).collect()),
                    ),
            )?),
            None => None,
        };

        builder.declare_output("VPC", "A reference to the created VPC", &vpc)?;
        builder.declare_output(
            "PublicSubnets",
            "A list of the public subnets",
            Value::join(",", zones.iter().map(|z| &z.public_subnet)),
        )?;
        builder.declare_output(
            "PrivateSubnets",
            "A list of the private subnets",
            Value::join(",", zones.iter().map(|z| &z.private_subnet)),
        )?;
        let public = zones.iter().map(|z| ("public", z.number, &z.public_subnet));
        let private = zones.iter().map(|z| ("private", z.number, &z.private_subnet));
        for (tier, n, subnet) in public.chain(private) {
            builder.declare_output(
                subnet.logical_id(),
                format!("A reference to the {} subnet in Availability Zone {}", tier, n),
                subnet,
            )?;
        }

        Ok(Network {
            environment_name,
            vpc,
            internet_gateway,
            gateway_attachment,
            public_route_table,
            zones,
            security_group,
        })
    }
}

fn declare_subnet(
    builder: &mut TemplateBuilder,
    vpc: &ResourceHandle,
    tier: &str,
    n: usize,
    az: &Value,
    cidr: &ParameterHandle,
    public: bool,
) -> Result<ResourceHandle> {
    Ok(builder.declare_resource(
        ResourceKind::Subnet,
        format!("{}Subnet{}", tier, n),
        Properties::new()
            .with("VpcId", vpc)
            .with("AvailabilityZone", az.clone())
            .with("CidrBlock", cidr)
            .with("MapPublicIpOnLaunch", public)
            .with(
                "Tags",
                name_tag(Value::sub(format!(
                    "${{EnvironmentName}} {} Subnet (AZ{})",
                    tier, n
                ))),
            ),
    )?)
}

/// IPv4 CIDR block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cidr {
    network: u32,
    prefix: u8,
}

impl Cidr {
    fn parse(s: &str) -> Result<Self> {
        let invalid = || BlueprintError::InvalidCidr(s.to_string());
        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        if prefix > 32 {
            return Err(invalid());
        }
        let network = u32::from(addr) & Self::mask(prefix);
        if network != u32::from(addr) {
            return Err(invalid());
        }
        Ok(Self { network, prefix })
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        }
    }

    fn contains(&self, other: &Cidr) -> bool {
        other.prefix >= self.prefix && other.network & Self::mask(self.prefix) == self.network
    }

    fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }
}
