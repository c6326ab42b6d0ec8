//! Resource graph builder
//!
//! Declarations happen in dependency order: parameters, then resources, then
//! outputs. Every declaration returns a handle that later declarations embed
//! as a reference, so an undeclared reference cannot be expressed. Handles
//! carry the identity of the builder that issued them; mixing handles across
//! builders is rejected.

use crate::error::{Result, TemplateError};
use crate::graph::DependencyGraph;
use crate::kind::ResourceKind;
use crate::model::{Document, Output, Parameter, ParameterType, Resource};
use crate::value::{
    BuilderId, ParameterHandle, Properties, Reference, ResourceHandle, Value,
    sub_variables,
};
use std::collections::HashSet;
use tracing::{debug, info};

const MAX_LOGICAL_ID_LEN: usize = 255;

/// Mutable template under construction
#[derive(Debug)]
pub struct TemplateBuilder {
    id: BuilderId,
    description: Option<String>,
    parameters: Vec<Parameter>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
    identifiers: HashSet<String>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            id: BuilderId::next(),
            description: None,
            parameters: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
            identifiers: HashSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether a parameter or resource with this identifier exists
    pub fn is_declared(&self, logical_id: &str) -> bool {
        self.identifiers.contains(logical_id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Register a parameter
    pub fn declare_parameter(
        &mut self,
        name: impl Into<String>,
        param_type: ParameterType,
        default: Option<Value>,
        description: impl Into<String>,
    ) -> Result<ParameterHandle> {
        let name = name.into();
        self.check_new_identifier(&name)?;

        if let Some(value) = &default
            && !matches!(
                (param_type, value),
                (ParameterType::String, Value::String(_))
                    | (ParameterType::Number, Value::Integer(_) | Value::Float(_))
            )
        {
            return Err(TemplateError::UnsupportedValue {
                location: format!("Parameters.{}.Default", name),
                reason: format!("default must be a {} literal", param_type),
            });
        }

        let description = description.into();
        debug!(parameter = %name, %param_type, "Declared parameter");
        self.identifiers.insert(name.clone());
        self.parameters.push(Parameter {
            name: name.clone(),
            param_type,
            default,
            description: (!description.is_empty()).then_some(description),
        });

        Ok(ParameterHandle(self.reference(name)))
    }

    /// Register a resource
    ///
    /// On error the builder is left untouched.
    pub fn declare_resource(
        &mut self,
        kind: ResourceKind,
        logical_id: impl Into<String>,
        properties: Properties,
    ) -> Result<ResourceHandle> {
        let logical_id = logical_id.into();
        self.check_new_identifier(&logical_id)?;
        for value in properties.values() {
            self.check_owned(value)?;
        }

        debug!(resource = %logical_id, kind = %kind, "Declared resource");
        self.identifiers.insert(logical_id.clone());
        self.resources.push(Resource {
            logical_id: logical_id.clone(),
            kind,
            depends_on: Vec::new(),
            properties,
        });

        Ok(ResourceHandle(self.reference(logical_id)))
    }

    /// Attach or replace a property on an already declared resource
    pub fn set_property(
        &mut self,
        handle: &ResourceHandle,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        self.check_owned(&value)?;
        let resource = self.resource_mut(handle)?;
        let name = name.into();
        debug!(resource = %resource.logical_id, property = %name, "Set property");
        resource.properties.insert(name, value);
        Ok(())
    }

    /// Add an explicit `DependsOn` edge
    pub fn depends_on(&mut self, handle: &ResourceHandle, on: &ResourceHandle) -> Result<()> {
        self.check_handle(&on.0)?;
        let target = on.logical_id().to_string();
        let resource = self.resource_mut(handle)?;
        if !resource.depends_on.contains(&target) {
            resource.depends_on.push(target);
        }
        Ok(())
    }

    /// Register a document-level output
    pub fn declare_output(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let name = name.into();
        if !is_valid_logical_id(&name) {
            return Err(TemplateError::InvalidLogicalId(name));
        }
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(TemplateError::DuplicateOutput(name));
        }
        let value = value.into();
        self.check_owned(&value)?;

        let description = description.into();
        debug!(output = %name, "Declared output");
        self.outputs.push(Output {
            name,
            description: (!description.is_empty()).then_some(description),
            value,
        });
        Ok(())
    }

    /// Freeze the declarations into a document
    ///
    /// Validates substitution templates and literal shapes, then orders the
    /// resources so that every referenced resource precedes its referrers.
    pub fn render(self) -> Result<Document> {
        for resource in &self.resources {
            for (key, value) in resource.properties.iter() {
                let location = format!("Resources.{}.Properties.{}", resource.logical_id, key);
                self.validate_value(value, &location)?;
            }
        }
        for output in &self.outputs {
            self.validate_value(&output.value, &format!("Outputs.{}.Value", output.name))?;
        }
        for parameter in &self.parameters {
            if let Some(default) = &parameter.default {
                self.validate_value(default, &format!("Parameters.{}.Default", parameter.name))?;
            }
        }

        let order = DependencyGraph::new(&self.resources).topological_order()?;
        let mut slots: Vec<Option<Resource>> = self.resources.into_iter().map(Some).collect();
        let resources: Vec<Resource> = order.into_iter().filter_map(|i| slots[i].take()).collect();

        info!(
            parameters = self.parameters.len(),
            resources = resources.len(),
            outputs = self.outputs.len(),
            "Template rendered"
        );

        Ok(Document {
            description: self.description,
            parameters: self.parameters,
            resources,
            outputs: self.outputs,
        })
    }

    fn reference(&self, logical_id: String) -> Reference {
        Reference {
            builder: self.id,
            logical_id,
        }
    }

    fn check_new_identifier(&self, logical_id: &str) -> Result<()> {
        if !is_valid_logical_id(logical_id) {
            return Err(TemplateError::InvalidLogicalId(logical_id.to_string()));
        }
        if self.identifiers.contains(logical_id) {
            return Err(TemplateError::DuplicateIdentifier(logical_id.to_string()));
        }
        Ok(())
    }

    fn check_handle(&self, reference: &Reference) -> Result<()> {
        if reference.builder != self.id || !self.identifiers.contains(&reference.logical_id) {
            return Err(TemplateError::ForeignReference(reference.logical_id.clone()));
        }
        Ok(())
    }

    fn check_owned(&self, value: &Value) -> Result<()> {
        let mut result = Ok(());
        value.visit_references(&mut |r| {
            if result.is_ok() {
                result = self.check_handle(r);
            }
        });
        result
    }

    fn resource_mut(&mut self, handle: &ResourceHandle) -> Result<&mut Resource> {
        self.check_handle(&handle.0)?;
        self.resources
            .iter_mut()
            .find(|r| r.logical_id == handle.logical_id())
            .ok_or_else(|| TemplateError::ForeignReference(handle.logical_id().to_string()))
    }

    fn validate_value(&self, value: &Value, location: &str) -> Result<()> {
        let mut result = Ok(());
        value.walk(&mut |v| {
            if result.is_err() {
                return;
            }
            match v {
                Value::Float(n) if !n.is_finite() => {
                    result = Err(TemplateError::UnsupportedValue {
                        location: location.to_string(),
                        reason: format!("non-finite number {}", n),
                    });
                }
                Value::Sub(template) => {
                    if let Some(name) = sub_variables(template)
                        .into_iter()
                        .find(|name| !name.starts_with("AWS::") && !self.identifiers.contains(*name))
                    {
                        result = Err(TemplateError::UndeclaredReference {
                            reference: name.to_string(),
                            location: location.to_string(),
                        });
                    }
                }
                _ => {}
            }
        });
        result
    }
}

fn is_valid_logical_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_LOGICAL_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Format;

    fn vpc(builder: &mut TemplateBuilder) -> ResourceHandle {
        builder
            .declare_resource(
                ResourceKind::Vpc,
                "VPC",
                Properties::new().with("CidrBlock", "10.0.0.0/16"),
            )
            .unwrap()
    }

    #[test]
    fn test_duplicate_resource_keeps_prior_declaration() {
        let mut builder = TemplateBuilder::new();
        vpc(&mut builder);

        let err = builder
            .declare_resource(
                ResourceKind::Vpc,
                "VPC",
                Properties::new().with("CidrBlock", "192.168.0.0/16"),
            )
            .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateIdentifier(ref id) if id == "VPC"));
        assert_eq!(builder.resource_count(), 1);

        let doc = builder.render().unwrap();
        assert_eq!(
            doc.resource("VPC").unwrap().property("CidrBlock"),
            Some(&Value::from("10.0.0.0/16"))
        );
    }

    #[test]
    fn test_parameter_and_resource_share_namespace() {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_parameter("VpcCIDR", ParameterType::String, Some("10.0.0.0/16".into()), "")
            .unwrap();
        let err = builder
            .declare_resource(ResourceKind::Vpc, "VpcCIDR", Properties::new())
            .unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateIdentifier(_)));
    }

    #[test]
    fn test_parameter_default_must_match_type() {
        let mut builder = TemplateBuilder::new();
        let err = builder
            .declare_parameter("Size", ParameterType::Number, Some("large".into()), "")
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedValue { .. }));
        assert!(!builder.is_declared("Size"));
    }

    #[test]
    fn test_invalid_logical_id() {
        let mut builder = TemplateBuilder::new();
        let too_long = "A".repeat(256);
        for bad in ["", "Public-Subnet", "with space", too_long.as_str()] {
            let err = builder
                .declare_resource(ResourceKind::Subnet, bad, Properties::new())
                .unwrap_err();
            assert!(matches!(err, TemplateError::InvalidLogicalId(_)));
        }
    }

    #[test]
    fn test_output_with_foreign_handle_fails_before_render() {
        let mut other = TemplateBuilder::new();
        let foreign = vpc(&mut other);

        let mut builder = TemplateBuilder::new();
        vpc(&mut builder);
        let err = builder
            .declare_output("VPC", "A reference to the created VPC", &foreign)
            .unwrap_err();
        assert!(matches!(err, TemplateError::ForeignReference(ref id) if id == "VPC"));

        // nothing was recorded, rendering still succeeds
        let doc = builder.render().unwrap();
        assert!(doc.outputs().is_empty());
    }

    #[test]
    fn test_resource_with_foreign_handle_is_rejected() {
        let mut other = TemplateBuilder::new();
        let foreign = vpc(&mut other);

        let mut builder = TemplateBuilder::new();
        let err = builder
            .declare_resource(
                ResourceKind::Subnet,
                "PublicSubnet1",
                Properties::new().with("VpcId", &foreign),
            )
            .unwrap_err();
        assert!(matches!(err, TemplateError::ForeignReference(_)));
        assert!(!builder.is_declared("PublicSubnet1"));
    }

    #[test]
    fn test_duplicate_output() {
        let mut builder = TemplateBuilder::new();
        let vpc = vpc(&mut builder);
        builder.declare_output("VPC", "", &vpc).unwrap();
        let err = builder.declare_output("VPC", "", &vpc).unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateOutput(_)));
    }

    #[test]
    fn test_sub_with_undeclared_variable_fails_render() {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_resource(
                ResourceKind::RouteTable,
                "PublicRouteTable",
                Properties::new().with("Name", Value::sub("${EnvironmentName} Public Routes")),
            )
            .unwrap();
        let err = builder.render().unwrap_err();
        match err {
            TemplateError::UndeclaredReference {
                reference,
                location,
            } => {
                assert_eq!(reference, "EnvironmentName");
                assert_eq!(location, "Resources.PublicRouteTable.Properties.Name");
            }
            other => panic!("Expected UndeclaredReference, got {:?}", other),
        }
    }

    #[test]
    fn test_sub_with_declared_and_pseudo_variables() {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_parameter("EnvironmentName", ParameterType::String, None, "")
            .unwrap();
        builder
            .declare_resource(
                ResourceKind::RouteTable,
                "PublicRouteTable",
                Properties::new().with(
                    "Name",
                    Value::sub("${EnvironmentName}-${AWS::Region}-${!Literal}"),
                ),
            )
            .unwrap();
        assert!(builder.render().is_ok());
    }

    #[test]
    fn test_non_finite_float_fails_render() {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_resource(
                ResourceKind::Alarm,
                "Alarm",
                Properties::new().with("Threshold", f64::NAN),
            )
            .unwrap();
        assert!(matches!(
            builder.render().unwrap_err(),
            TemplateError::UnsupportedValue { .. }
        ));
    }

    #[test]
    fn test_set_property_back_edge_reorders_resources() {
        let mut builder = TemplateBuilder::new();
        let bucket = builder
            .declare_resource(ResourceKind::Bucket, "S3Bucket", Properties::new())
            .unwrap();
        let role = builder
            .declare_resource(ResourceKind::IamRole, "ReplicationRole", Properties::new())
            .unwrap();
        builder
            .set_property(
                &bucket,
                "ReplicationConfiguration",
                Properties::new().with("Role", role.attribute("Arn")),
            )
            .unwrap();

        let doc = builder.render().unwrap();
        assert!(doc.resource_index("ReplicationRole") < doc.resource_index("S3Bucket"));
    }

    #[test]
    fn test_cycle_through_set_property() {
        let mut builder = TemplateBuilder::new();
        let a = builder
            .declare_resource(ResourceKind::Bucket, "A", Properties::new())
            .unwrap();
        let b = builder
            .declare_resource(ResourceKind::Bucket, "B", Properties::new().with("Peer", &a))
            .unwrap();
        builder.set_property(&a, "Peer", &b).unwrap();

        match builder.render().unwrap_err() {
            TemplateError::CyclicReference(ids) => {
                assert!(ids.contains(&"A".to_string()) && ids.contains(&"B".to_string()));
            }
            other => panic!("Expected CyclicReference, got {:?}", other),
        }
    }

    #[test]
    fn test_sub_target_precedes_referrer() {
        let mut builder = TemplateBuilder::new();
        builder
            .declare_resource(
                ResourceKind::BucketPolicy,
                "Policy",
                Properties::new().with("Resource", Value::sub("${Bucket.Arn}/*")),
            )
            .unwrap();
        builder
            .declare_resource(ResourceKind::Bucket, "Bucket", Properties::new())
            .unwrap();

        let doc = builder.render().unwrap();
        assert_eq!(doc.resource_index("Bucket"), Some(0));
        assert_eq!(doc.resource_index("Policy"), Some(1));
    }

    #[test]
    fn test_cycle_through_sub() {
        let mut builder = TemplateBuilder::new();
        let a = builder
            .declare_resource(
                ResourceKind::Bucket,
                "A",
                Properties::new().with("Peer", Value::sub("${B}")),
            )
            .unwrap();
        builder
            .declare_resource(ResourceKind::Bucket, "B", Properties::new().with("Peer", &a))
            .unwrap();

        assert!(matches!(
            builder.render().unwrap_err(),
            TemplateError::CyclicReference(_)
        ));
    }

    #[test]
    fn test_depends_on_is_rendered() {
        let mut builder = TemplateBuilder::new();
        let attachment = builder
            .declare_resource(
                ResourceKind::VpcGatewayAttachment,
                "InternetGatewayAttachment",
                Properties::new(),
            )
            .unwrap();
        let eip = builder
            .declare_resource(
                ResourceKind::Eip,
                "NatGateway1EIP",
                Properties::new().with("Domain", "vpc"),
            )
            .unwrap();
        builder.depends_on(&eip, &attachment).unwrap();
        builder.depends_on(&eip, &attachment).unwrap();

        let doc = builder.render().unwrap();
        assert_eq!(
            doc.resource("NatGateway1EIP").unwrap().depends_on,
            vec!["InternetGatewayAttachment".to_string()]
        );
    }

    #[test]
    fn test_referenced_resources_precede_referrers() {
        let mut builder = TemplateBuilder::new();
        let vpc = vpc(&mut builder);
        let igw = builder
            .declare_resource(ResourceKind::InternetGateway, "InternetGateway", Properties::new())
            .unwrap();
        builder
            .declare_resource(
                ResourceKind::VpcGatewayAttachment,
                "InternetGatewayAttachment",
                Properties::new()
                    .with("VpcId", &vpc)
                    .with("InternetGatewayId", &igw),
            )
            .unwrap();

        let doc = builder.render().unwrap();
        for (i, resource) in doc.resources().iter().enumerate() {
            for dep in resource.dependencies() {
                if let Some(j) = doc.resource_index(dep) {
                    assert!(j < i, "{} must precede {}", dep, resource.logical_id);
                }
            }
        }
    }

    #[test]
    fn test_independent_builders() {
        let mut first = TemplateBuilder::new().with_description("first");
        let mut second = TemplateBuilder::new().with_description("second");
        vpc(&mut first);
        vpc(&mut second);
        let a = first.render().unwrap().to_string(Format::Json).unwrap();
        let b = second.render().unwrap().to_string(Format::Json).unwrap();
        assert_ne!(a, b);
    }
}
