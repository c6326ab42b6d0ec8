//! Instance fleet placed into the network's subnets

use crate::blocks::BlockDevice;
use crate::error::{BlueprintError, Result};
use crate::network::Network;
use stackforge_template::{Properties, ResourceHandle, ResourceKind, TemplateBuilder, Value};
use tracing::debug;

/// Which subnets receive an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    All,
    Public,
    Private,
}

impl Placement {
    fn public(&self) -> bool {
        matches!(self, Placement::All | Placement::Public)
    }

    fn private(&self) -> bool {
        matches!(self, Placement::All | Placement::Private)
    }
}

impl std::str::FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Placement::All),
            "public" => Ok(Placement::Public),
            "private" => Ok(Placement::Private),
            other => Err(format!("unknown placement: {}", other)),
        }
    }
}

/// Instance settings shared by the whole fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeFleet {
    pub image_id: String,
    pub key_name: String,
    pub instance_type: String,
    pub instance_profile: Option<String>,
    pub block_device: BlockDevice,
    pub placement: Placement,
}

impl ComputeFleet {
    pub fn new(image_id: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            key_name: key_name.into(),
            instance_type: "t2.micro".to_string(),
            instance_profile: None,
            block_device: BlockDevice::default(),
            placement: Placement::All,
        }
    }

    /// Declare one instance per selected subnet, public ones first
    pub fn declare(
        &self,
        builder: &mut TemplateBuilder,
        network: &Network,
    ) -> Result<Vec<ResourceHandle>> {
        if self.image_id.is_empty() || self.key_name.is_empty() {
            return Err(BlueprintError::InvalidLayout(
                "compute requires an image id and a key pair".to_string(),
            ));
        }

        let mut slots = Vec::new();
        if self.placement.public() {
            for zone in &network.zones {
                slots.push(("Public", zone, &zone.public_subnet));
            }
        }
        if self.placement.private() {
            for zone in &network.zones {
                slots.push(("Private", zone, &zone.private_subnet));
            }
        }

        let mut instances = Vec::with_capacity(slots.len());
        for (tier, zone, subnet) in slots {
            let mut properties = Properties::new()
                .with("ImageId", self.image_id.as_str())
                .with("InstanceType", self.instance_type.as_str())
                .with("KeyName", self.key_name.as_str())
                .with("AvailabilityZone", zone.availability_zone.clone())
                .with("SubnetId", subnet)
                .with_opt("IamInstanceProfile", self.instance_profile.as_deref())
                .with(
                    "BlockDeviceMappings",
                    Value::list([Value::from(&self.block_device)]),
                );
            if let Some(sg) = &network.security_group {
                properties.insert("SecurityGroupIds", Value::list([sg]));
            }

            let id = format!("EC2{}Instance{}", tier, zone.number);
            let instance = builder.declare_resource(ResourceKind::Instance, &id, properties)?;
            builder.declare_output(
                format!("{}Id", id),
                "ID of the EC2 instance",
                &instance,
            )?;
            debug!(instance = %id, "Declared instance");
            instances.push(instance);
        }
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkLayout;

    fn fleet() -> ComputeFleet {
        ComputeFleet::new("ami-0eb9fdcf0d07bd5ef", "deploy-pair")
    }

    #[test]
    fn test_one_instance_per_subnet() {
        let mut builder = TemplateBuilder::new();
        let network = NetworkLayout::default().declare(&mut builder).unwrap();
        let instances = fleet().declare(&mut builder, &network).unwrap();
        let ids: Vec<&str> = instances.iter().map(|h| h.logical_id()).collect();
        assert_eq!(
            ids,
            vec![
                "EC2PublicInstance1",
                "EC2PublicInstance2",
                "EC2PrivateInstance1",
                "EC2PrivateInstance2"
            ]
        );

        let doc = builder.render().unwrap();
        let instance = doc.resource("EC2PrivateInstance2").unwrap();
        assert_eq!(
            instance.property("SubnetId").and_then(Value::ref_target),
            Some("PrivateSubnet2")
        );
        // zone matches the subnet's zone instead of a fixed name
        assert_eq!(
            instance.property("AvailabilityZone"),
            doc.resource("PrivateSubnet2").unwrap().property("AvailabilityZone")
        );
        let sg = instance.property("SecurityGroupIds").and_then(Value::as_list).unwrap();
        assert_eq!(sg[0].ref_target(), Some("IngressSecurityGroup"));
        assert!(instance.property("IamInstanceProfile").is_none());
        assert!(doc.output("EC2PrivateInstance2Id").is_some());
    }

    #[test]
    fn test_block_device_mapping() {
        let mut builder = TemplateBuilder::new();
        let network = NetworkLayout::default().declare(&mut builder).unwrap();
        let mut compute = fleet();
        compute.placement = Placement::Public;
        compute.instance_profile = Some("iam-instances".into());
        compute.declare(&mut builder, &network).unwrap();

        let doc = builder.render().unwrap();
        assert!(doc.resource("EC2PrivateInstance1").is_none());
        let json = serde_json::to_value(doc.resource("EC2PublicInstance1").unwrap()).unwrap();
        let mapping = &json["Properties"]["BlockDeviceMappings"][0];
        assert_eq!(mapping["DeviceName"], "/dev/sda1");
        assert_eq!(mapping["Ebs"]["VolumeSize"], 80);
        assert_eq!(mapping["Ebs"]["DeleteOnTermination"], false);
        assert_eq!(json["Properties"]["IamInstanceProfile"], "iam-instances");
    }

    #[test]
    fn test_missing_image_is_rejected() {
        let mut builder = TemplateBuilder::new();
        let network = NetworkLayout::default().declare(&mut builder).unwrap();
        let compute = ComputeFleet::new("", "deploy-pair");
        assert!(matches!(
            compute.declare(&mut builder, &network),
            Err(BlueprintError::InvalidLayout(_))
        ));
    }
}
