//! Bucket policy collection
//!
//! Several blocks grant service principals access to the same bucket. Their
//! statements are gathered here and emitted as one policy resource per bucket,
//! after every block has declared its resources.

use crate::blocks::{Statement, policy_document};
use crate::error::Result;
use stackforge_template::{Properties, ResourceHandle, ResourceKind, TemplateBuilder, Value};
use tracing::debug;

#[derive(Debug, Clone)]
struct PolicyEntry {
    logical_id: String,
    bucket: Value,
    statements: Vec<Statement>,
    dependents: Vec<ResourceHandle>,
}

/// Pending bucket policies keyed by logical id
#[derive(Debug, Clone, Default)]
pub struct BucketPolicies {
    entries: Vec<PolicyEntry>,
}

impl BucketPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add statements to the policy `logical_id` on `bucket`
    ///
    /// `dependent` only works once the policy exists, so it receives a
    /// `DependsOn` edge to the policy.
    pub fn grant(
        &mut self,
        logical_id: &str,
        bucket: impl Into<Value>,
        statements: impl IntoIterator<Item = Statement>,
        dependent: &ResourceHandle,
    ) {
        let index = match self.entries.iter().position(|e| e.logical_id == logical_id) {
            Some(index) => index,
            None => {
                self.entries.push(PolicyEntry {
                    logical_id: logical_id.to_string(),
                    bucket: bucket.into(),
                    statements: Vec::new(),
                    dependents: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        entry.statements.extend(statements);
        if !entry.dependents.contains(dependent) {
            entry.dependents.push(dependent.clone());
        }
    }

    /// Declare one policy resource per bucket
    pub fn declare(self, builder: &mut TemplateBuilder) -> Result<Vec<ResourceHandle>> {
        let mut policies = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let policy = builder.declare_resource(
                ResourceKind::BucketPolicy,
                &entry.logical_id,
                Properties::new()
                    .with("Bucket", entry.bucket)
                    .with("PolicyDocument", policy_document(&entry.statements)),
            )?;
            for dependent in &entry.dependents {
                builder.depends_on(dependent, &policy)?;
            }
            debug!(
                policy = %entry.logical_id,
                statements = entry.statements.len(),
                "Declared bucket policy"
            );
            policies.push(policy);
        }
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_for_one_bucket_are_merged() {
        let mut builder = TemplateBuilder::new();
        let bucket = builder
            .declare_resource(ResourceKind::Bucket, "S3Bucket", Properties::new())
            .unwrap();
        let trail = builder
            .declare_resource(ResourceKind::Trail, "CloudTrail", Properties::new())
            .unwrap();
        let flow_log = builder
            .declare_resource(ResourceKind::FlowLog, "VPCFlowLog", Properties::new())
            .unwrap();

        let mut policies = BucketPolicies::new();
        policies.grant(
            "S3BucketPolicy",
            &bucket,
            [Statement::allow(["s3:GetBucketAcl"]).sid("TrailAcl")],
            &trail,
        );
        policies.grant(
            "S3BucketPolicy",
            &bucket,
            [Statement::allow(["s3:PutObject"]).sid("LogWrite")],
            &flow_log,
        );
        assert_eq!(policies.declare(&mut builder).unwrap().len(), 1);

        let doc = builder.render().unwrap();
        assert_eq!(doc.resources_of(&ResourceKind::BucketPolicy).count(), 1);
        let policy = doc.resource("S3BucketPolicy").unwrap();
        let statements = policy
            .property("PolicyDocument")
            .and_then(|d| d.get("Statement"))
            .and_then(Value::as_list)
            .unwrap();
        assert_eq!(statements.len(), 2);

        // the policy is emitted ahead of the resources that wait on it
        let policy_at = doc.resource_index("S3BucketPolicy").unwrap();
        assert!(policy_at < doc.resource_index("CloudTrail").unwrap());
        assert!(policy_at < doc.resource_index("VPCFlowLog").unwrap());
        assert_eq!(
            doc.resource("VPCFlowLog").unwrap().depends_on,
            vec!["S3BucketPolicy".to_string()]
        );
    }
}
