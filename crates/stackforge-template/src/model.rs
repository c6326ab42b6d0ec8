//! Rendered document model

use crate::kind::{Capability, ResourceKind};
use crate::value::{Properties, Value, sub_variables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Template format version emitted at the top of every document
pub const FORMAT_VERSION: &str = "2010-09-09";

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Number,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::String => write!(f, "String"),
            ParameterType::Number => write!(f, "Number"),
        }
    }
}

/// Stack parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    #[serde(skip)]
    pub name: String,

    #[serde(rename = "Type")]
    pub param_type: ParameterType,

    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(skip)]
    pub logical_id: String,

    #[serde(rename = "Type")]
    pub kind: ResourceKind,

    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(rename = "Properties", skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Resource {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Logical ids of all resources and parameters this resource points at
    ///
    /// Includes the names a `Fn::Sub` template substitutes; pseudo parameters
    /// are left out.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = self.depends_on.iter().map(String::as_str).collect();
        for value in self.properties.values() {
            value.visit_references(&mut |r| {
                ids.insert(r.logical_id());
            });
            value.walk(&mut |v| {
                if let Value::Sub(template) = v {
                    ids.extend(
                        sub_variables(template)
                            .into_iter()
                            .filter(|name| !name.starts_with("AWS::")),
                    );
                }
            });
        }
        ids
    }
}

/// Document-level export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    #[serde(skip)]
    pub name: String,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Value")]
    pub value: Value,
}

/// A frozen template: parameters, resources and outputs in emission order
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub(crate) description: Option<String>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) resources: Vec<Resource>,
    pub(crate) outputs: Vec<Output>,
}

impl Document {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Position of a resource in emission order
    pub fn resource_index(&self, logical_id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.logical_id == logical_id)
    }

    pub fn resources_of<'a>(&'a self, kind: &'a ResourceKind) -> impl Iterator<Item = &'a Resource> {
        self.resources.iter().filter(move |r| &r.kind == kind)
    }

    /// Capabilities the provisioning engine will demand for this document
    pub fn required_capabilities(&self) -> BTreeSet<Capability> {
        let mut caps = BTreeSet::new();
        for resource in self.resources.iter().filter(|r| r.kind.is_identity()) {
            let named = ["RoleName", "InstanceProfileName", "UserName", "GroupName"]
                .iter()
                .any(|key| resource.properties.contains_key(key));
            caps.insert(if named {
                Capability::NamedIam
            } else {
                Capability::Iam
            });
        }
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, kind: ResourceKind, properties: Properties) -> Resource {
        Resource {
            logical_id: id.to_string(),
            kind,
            depends_on: Vec::new(),
            properties,
        }
    }

    #[test]
    fn test_required_capabilities() {
        let doc = Document {
            description: None,
            parameters: Vec::new(),
            resources: vec![
                resource("Bucket", ResourceKind::Bucket, Properties::new()),
                resource("Role", ResourceKind::IamRole, Properties::new()),
            ],
            outputs: Vec::new(),
        };
        assert_eq!(
            doc.required_capabilities().into_iter().collect::<Vec<_>>(),
            vec![Capability::Iam]
        );

        let named = Document {
            resources: vec![resource(
                "Role",
                ResourceKind::IamRole,
                Properties::new().with("RoleName", "replication"),
            )],
            ..doc.clone()
        };
        assert!(named.required_capabilities().contains(&Capability::NamedIam));
    }

    #[test]
    fn test_lookup() {
        let doc = Document {
            description: Some("lookup".into()),
            parameters: Vec::new(),
            resources: vec![
                resource("A", ResourceKind::Vpc, Properties::new()),
                resource("B", ResourceKind::Subnet, Properties::new()),
            ],
            outputs: Vec::new(),
        };
        assert_eq!(doc.resource_index("B"), Some(1));
        assert!(doc.resource("C").is_none());
        assert_eq!(doc.resources_of(&ResourceKind::Subnet).count(), 1);
    }
}
