//! Property values and reference expressions
//!
//! A [`Value`] is either a literal, a composite of values, or an intrinsic
//! expression that the provisioning engine resolves at deploy time. References
//! are always carried by handle identity, never by bare names.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of the builder that minted a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BuilderId(u64);

impl BuilderId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pointer to a declared parameter or resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub(crate) builder: BuilderId,
    pub(crate) logical_id: String,
}

impl Reference {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

/// Handle returned by `declare_parameter`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterHandle(pub(crate) Reference);

impl ParameterHandle {
    pub fn name(&self) -> &str {
        &self.0.logical_id
    }

    /// `Ref` to this parameter
    pub fn reference(&self) -> Value {
        Value::Ref(self.0.clone())
    }
}

/// Handle returned by `declare_resource`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub(crate) Reference);

impl ResourceHandle {
    pub fn logical_id(&self) -> &str {
        &self.0.logical_id
    }

    /// `Ref` to this resource
    pub fn reference(&self) -> Value {
        Value::Ref(self.0.clone())
    }

    /// `Fn::GetAtt` on one of this resource's runtime attributes
    pub fn attribute(&self, name: impl Into<String>) -> Value {
        Value::GetAtt(self.0.clone(), name.into())
    }
}

/// Pseudo parameters supplied by the provisioning engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    AccountId,
    NoValue,
    Partition,
    Region,
    StackId,
    StackName,
    UrlSuffix,
}

impl Pseudo {
    pub fn name(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::NoValue => "AWS::NoValue",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::Region => "AWS::Region",
            Pseudo::StackId => "AWS::StackId",
            Pseudo::StackName => "AWS::StackName",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
        }
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Ref(Reference),
    GetAtt(Reference, String),
    Pseudo(Pseudo),
    Join { delimiter: String, values: Vec<Value> },
    Sub(String),
    Select { index: u32, list: Box<Value> },
    GetAzs(String),
}

impl Value {
    /// `Fn::Join` of several values with a delimiter
    pub fn join<I, V>(delimiter: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Join {
            delimiter: delimiter.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `Fn::Sub` substitution template, e.g. `"${EnvironmentName} Public Routes"`
    pub fn sub(template: impl Into<String>) -> Self {
        Value::Sub(template.into())
    }

    /// `Fn::Select` of one element of a list expression
    pub fn select(index: u32, list: impl Into<Value>) -> Self {
        Value::Select {
            index,
            list: Box::new(list.into()),
        }
    }

    /// `Fn::GetAZs` for a region; an empty string means the stack's region
    pub fn get_azs(region: impl Into<String>) -> Self {
        Value::GetAzs(region.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(values.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Logical id targeted when this value is a plain `Ref`
    pub fn ref_target(&self) -> Option<&str> {
        match self {
            Value::Ref(r) => Some(&r.logical_id),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Visit every handle reference embedded in this value
    pub fn visit_references<'a>(&'a self, f: &mut impl FnMut(&'a Reference)) {
        match self {
            Value::Ref(r) | Value::GetAtt(r, _) => f(r),
            Value::List(items) => items.iter().for_each(|v| v.visit_references(f)),
            Value::Map(map) => map.values().for_each(|v| v.visit_references(f)),
            Value::Join { values, .. } => values.iter().for_each(|v| v.visit_references(f)),
            Value::Select { list, .. } => list.visit_references(f),
            Value::String(_)
            | Value::Integer(_)
            | Value::Float(_)
            | Value::Bool(_)
            | Value::Pseudo(_)
            | Value::Sub(_)
            | Value::GetAzs(_) => {}
        }
    }

    /// Visit every nested value, depth first
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Value)) {
        f(self);
        match self {
            Value::List(items) => items.iter().for_each(|v| v.walk(f)),
            Value::Map(map) => map.values().for_each(|v| v.walk(f)),
            Value::Join { values, .. } => values.iter().for_each(|v| v.walk(f)),
            Value::Select { list, .. } => list.walk(f),
            _ => {}
        }
    }
}

/// Variable names referenced by a `Fn::Sub` template
///
/// `${Name}` and `${Name.Attribute}` yield `Name`; `${!Literal}` is an escape
/// and yields nothing.
pub fn sub_variables(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let inner = after[..end].trim();
        if !inner.starts_with('!') && !inner.is_empty() {
            let name = inner.split('.').next().unwrap_or(inner);
            names.push(name);
        }
        rest = &after[end + 1..];
    }
    names
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Pseudo> for Value {
    fn from(p: Pseudo) -> Self {
        Value::Pseudo(p)
    }
}

impl From<&ResourceHandle> for Value {
    fn from(handle: &ResourceHandle) -> Self {
        handle.reference()
    }
}

impl From<&ParameterHandle> for Value {
    fn from(handle: &ParameterHandle) -> Self {
        handle.reference()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// Single-key map such as `{"Ref": "VPC"}`
struct Intrinsic<'a, T: Serialize>(&'static str, &'a T);

impl<T: Serialize> Serialize for Intrinsic<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Ref(r) => Intrinsic("Ref", &r.logical_id.as_str()).serialize(serializer),
            Value::GetAtt(r, attr) => {
                Intrinsic("Fn::GetAtt", &(r.logical_id.as_str(), attr.as_str())).serialize(serializer)
            }
            Value::Pseudo(p) => Intrinsic("Ref", &p.name()).serialize(serializer),
            Value::Join { delimiter, values } => {
                Intrinsic("Fn::Join", &(delimiter.as_str(), values)).serialize(serializer)
            }
            Value::Sub(template) => Intrinsic("Fn::Sub", &template.as_str()).serialize(serializer),
            Value::Select { index, list } => {
                Intrinsic("Fn::Select", &(index, list.as_ref())).serialize(serializer)
            }
            Value::GetAzs(region) => Intrinsic("Fn::GetAZs", &region.as_str()).serialize(serializer),
        }
    }
}

/// Sorted property map of a resource or nested block
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set the key only when a value is present
    pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::Map(props.0)
    }
}
