//! Document serialization
//!
//! Sections are emitted in a fixed order and property maps are key-sorted, so
//! identical declarations always produce byte-identical output.

use crate::error::Result;
use crate::model::{Document, FORMAT_VERSION};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Output text format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
        }
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(format!("unknown format: {}", other)),
        }
    }
}

/// Named entries of one top-level section, in document order
struct Section<'a, T>(&'a [T], fn(&T) -> &str);

impl<T: Serialize> Serialize for Section<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for item in self.0 {
            map.serialize_entry((self.1)(item), item)?;
        }
        map.end()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", FORMAT_VERSION)?;
        if let Some(description) = &self.description {
            map.serialize_entry("Description", description)?;
        }
        if !self.parameters.is_empty() {
            map.serialize_entry("Parameters", &Section(&self.parameters, |p| p.name.as_str()))?;
        }
        if !self.resources.is_empty() {
            map.serialize_entry(
                "Resources",
                &Section(&self.resources, |r| r.logical_id.as_str()),
            )?;
        }
        if !self.outputs.is_empty() {
            map.serialize_entry("Outputs", &Section(&self.outputs, |o| o.name.as_str()))?;
        }
        map.end()
    }
}

impl Document {
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_string(&self, format: Format) -> Result<String> {
        match format {
            Format::Json => self.to_json(),
            Format::Yaml => self.to_yaml(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TemplateBuilder;
    use crate::kind::ResourceKind;
    use crate::model::ParameterType;
    use crate::value::{Properties, Value};

    fn sample() -> Document {
        let mut builder = TemplateBuilder::new().with_description("S3 bucket");
        let env = builder
            .declare_parameter(
                "EnvironmentName",
                ParameterType::String,
                Some("PolyEnvironment".into()),
                "Environment is prefixed to resource names",
            )
            .unwrap();
        let vpc = builder
            .declare_resource(
                ResourceKind::Vpc,
                "VPC",
                Properties::new()
                    .with("CidrBlock", "10.0.0.0/16")
                    .with("EnableDnsSupport", true)
                    .with(
                        "Tags",
                        Value::list([Properties::new().with("Key", "Name").with("Value", &env)]),
                    ),
            )
            .unwrap();
        builder
            .declare_output("VPC", "A reference to the created VPC", &vpc)
            .unwrap();
        builder.render().unwrap()
    }

    #[test]
    fn test_json_layout() {
        let json = sample().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(parsed["Description"], "S3 bucket");
        assert_eq!(parsed["Parameters"]["EnvironmentName"]["Type"], "String");
        assert_eq!(parsed["Parameters"]["EnvironmentName"]["Default"], "PolyEnvironment");
        assert_eq!(parsed["Resources"]["VPC"]["Type"], "AWS::EC2::VPC");
        assert_eq!(
            parsed["Resources"]["VPC"]["Properties"]["Tags"][0]["Value"]["Ref"],
            "EnvironmentName"
        );
        assert_eq!(parsed["Outputs"]["VPC"]["Value"]["Ref"], "VPC");
        assert!(parsed["Resources"]["VPC"].get("DependsOn").is_none());

        // sections appear in fixed order
        let params = json.find("\"Parameters\"").unwrap();
        let resources = json.find("\"Resources\"").unwrap();
        let outputs = json.find("\"Outputs\"").unwrap();
        assert!(params < resources && resources < outputs);
    }

    #[test]
    fn test_render_is_deterministic() {
        let first = sample();
        let second = sample();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        assert_eq!(first.to_yaml().unwrap(), second.to_yaml().unwrap());
        assert_eq!(first.to_json().unwrap(), first.to_json().unwrap());
    }

    #[test]
    fn test_yaml_layout() {
        let yaml = sample().to_yaml().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["Resources"]["VPC"]["Type"].as_str(), Some("AWS::EC2::VPC"));
        assert_eq!(parsed["Outputs"]["VPC"]["Value"]["Ref"].as_str(), Some("VPC"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let doc = TemplateBuilder::new().render().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(parsed.get("Parameters").is_none());
        assert!(parsed.get("Resources").is_none());
        assert!(parsed.get("Description").is_none());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!("YML".parse::<Format>(), Ok(Format::Yaml));
        assert!("toml".parse::<Format>().is_err());
    }
}
