//! Secure bucket with optional cross-bucket replication and audit trail

use crate::blocks::{Encryption, PublicAccessBlock, Statement, Versioning, policy_document};
use crate::error::{BlueprintError, Result};
use crate::policy::BucketPolicies;
use stackforge_template::{Properties, ResourceHandle, ResourceKind, TemplateBuilder, Value};
use tracing::debug;

pub const PRIMARY_POLICY_ID: &str = "S3BucketPolicy";

const TRAIL_PRINCIPAL: &str = "cloudtrail.amazonaws.com";

/// Replica bucket receiving every object of the primary bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSettings {
    pub bucket_name: Option<String>,
}

/// Multi-region trail logging object-level events of the primary bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailSettings {
    pub trail_name: String,
}

impl Default for TrailSettings {
    fn default() -> Self {
        Self {
            trail_name: "S3ActivityTrail".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub bucket_name: Option<String>,
    pub encryption: Encryption,
    pub versioning: Versioning,
    pub public_access: PublicAccessBlock,
    pub replica: Option<ReplicaSettings>,
    pub audit_trail: Option<TrailSettings>,
}

/// Declared storage resources
#[derive(Debug, Clone)]
pub struct Storage {
    pub bucket: ResourceHandle,
    pub replica: Option<ResourceHandle>,
    pub replication_role: Option<ResourceHandle>,
    pub trail: Option<ResourceHandle>,
}

impl Storage {
    pub fn bucket_arn(&self) -> Value {
        self.bucket.attribute("Arn")
    }
}

impl StorageLayout {
    pub fn new(encryption: Encryption) -> Self {
        Self {
            bucket_name: None,
            encryption,
            versioning: Versioning::Enabled,
            public_access: PublicAccessBlock::default(),
            replica: None,
            audit_trail: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Encryption::Kms { key_id } = &self.encryption
            && key_id.is_empty()
        {
            return Err(BlueprintError::InvalidLayout(
                "KMS encryption requires a key id".to_string(),
            ));
        }
        for name in [&self.bucket_name]
            .into_iter()
            .chain(self.replica.as_ref().map(|r| &r.bucket_name))
            .flatten()
        {
            if !is_valid_bucket_name(name) {
                return Err(BlueprintError::InvalidLayout(format!(
                    "invalid bucket name: {}",
                    name
                )));
            }
        }
        if self.replica.is_some() && self.versioning != Versioning::Enabled {
            return Err(BlueprintError::InvalidLayout(
                "replication requires versioning to be enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn bucket_properties(&self, name: Option<&str>) -> Properties {
        Properties::new()
            .with_opt("BucketName", name)
            .with("AccessControl", "Private")
            .with("PublicAccessBlockConfiguration", self.public_access)
            .with("BucketEncryption", &self.encryption)
            .with("VersioningConfiguration", self.versioning)
    }

    /// Declare the buckets, the replication role and the trail
    ///
    /// Trail statements are queued on `policies`; the policy resource itself
    /// is declared by the caller once every block has contributed.
    pub fn declare(
        &self,
        builder: &mut TemplateBuilder,
        policies: &mut BucketPolicies,
    ) -> Result<Storage> {
        self.validate()?;

        let bucket = builder.declare_resource(
            ResourceKind::Bucket,
            "S3Bucket",
            self.bucket_properties(self.bucket_name.as_deref()),
        )?;
        builder.declare_output("S3Bucket", "Source bucket", &bucket)?;

        let mut storage = Storage {
            bucket,
            replica: None,
            replication_role: None,
            trail: None,
        };

        if let Some(replica) = &self.replica {
            self.declare_replication(builder, &mut storage, replica)?;
        }
        if let Some(trail) = &self.audit_trail {
            self.declare_trail(builder, &mut storage, trail, policies)?;
        }
        Ok(storage)
    }

    fn declare_replication(
        &self,
        builder: &mut TemplateBuilder,
        storage: &mut Storage,
        settings: &ReplicaSettings,
    ) -> Result<()> {
        let replica = builder.declare_resource(
            ResourceKind::Bucket,
            "ReplicaBucket",
            self.bucket_properties(settings.bucket_name.as_deref()),
        )?;
        let replica_arn = replica.attribute("Arn");

        // The bucket's replication rule points at the role, so the role may
        // only name the source bucket literally.
        let (source_arn, source_objects) = match &self.bucket_name {
            Some(name) => (
                Value::sub(format!("arn:${{AWS::Partition}}:s3:::{}", name)),
                Value::sub(format!("arn:${{AWS::Partition}}:s3:::{}/*", name)),
            ),
            None => (Value::from("*"), Value::from("*")),
        };

        let mut statements = vec![
            Statement::allow(["s3:GetReplicationConfiguration", "s3:ListBucket"])
                .resource(source_arn),
            Statement::allow([
                "s3:GetObjectVersionForReplication",
                "s3:GetObjectVersionAcl",
                "s3:GetObjectVersionTagging",
            ])
            .resource(source_objects),
            Statement::allow(["s3:ReplicateObject", "s3:ReplicateDelete", "s3:ReplicateTags"])
                .resource(Value::join("", [replica_arn.clone(), Value::from("/*")])),
        ];
        if let Some(key_id) = self.encryption.kms_key_id() {
            statements.push(Statement::allow(["kms:Decrypt", "kms:Encrypt"]).resource(key_id));
        }

        let role = builder.declare_resource(
            ResourceKind::IamRole,
            "ReplicationRole",
            Properties::new()
                .with(
                    "AssumeRolePolicyDocument",
                    policy_document(&[Statement::allow(["sts:AssumeRole"]).service("s3.amazonaws.com")]),
                )
                .with(
                    "Policies",
                    Value::list([Properties::new()
                        .with("PolicyName", "ReplicationPolicy")
                        .with("PolicyDocument", policy_document(&statements))]),
                ),
        )?;

        let mut destination = Properties::new().with("Bucket", replica_arn);
        let mut rule = Properties::new()
            .with("Id", "ReplicateToBackupBucket")
            .with("Status", "Enabled")
            .with("Prefix", "");
        if let Some(key_id) = self.encryption.kms_key_id() {
            destination.insert(
                "EncryptionConfiguration",
                Properties::new().with("ReplicaKmsKeyID", key_id),
            );
            rule.insert(
                "SourceSelectionCriteria",
                Properties::new().with(
                    "SseKmsEncryptedObjects",
                    Properties::new().with("Status", "Enabled"),
                ),
            );
        }
        rule.insert("Destination", destination);

        builder.set_property(
            &storage.bucket,
            "ReplicationConfiguration",
            Properties::new()
                .with("Role", role.attribute("Arn"))
                .with("Rules", Value::list([rule])),
        )?;
        builder.declare_output("S3BucketReplica", "Replica bucket", &replica)?;
        debug!(replica = %replica.logical_id(), "Declared replication");

        storage.replica = Some(replica);
        storage.replication_role = Some(role);
        Ok(())
    }

    fn declare_trail(
        &self,
        builder: &mut TemplateBuilder,
        storage: &mut Storage,
        settings: &TrailSettings,
        policies: &mut BucketPolicies,
    ) -> Result<()> {
        let arn = storage.bucket_arn();
        let trail = builder.declare_resource(
            ResourceKind::Trail,
            "CloudTrail",
            Properties::new()
                .with("TrailName", settings.trail_name.as_str())
                .with("S3BucketName", &storage.bucket)
                .with("IsLogging", true)
                .with("IsMultiRegionTrail", true)
                .with("IncludeGlobalServiceEvents", true)
                .with(
                    "EventSelectors",
                    Value::list([Properties::new()
                        .with("ReadWriteType", "All")
                        .with("IncludeManagementEvents", true)
                        .with(
                            "DataResources",
                            Value::list([Properties::new()
                                .with("Type", "AWS::S3::Object")
                                .with(
                                    "Values",
                                    Value::list([Value::join(
                                        "",
                                        [arn.clone(), Value::from("/")],
                                    )]),
                                )]),
                        )]),
                ),
        )?;

        policies.grant(
            PRIMARY_POLICY_ID,
            &storage.bucket,
            [
                Statement::allow(["s3:GetBucketAcl", "s3:ListBucket"])
                    .sid("AWSCloudTrailAclCheck20150319")
                    .service(TRAIL_PRINCIPAL)
                    .resource(arn.clone()),
                Statement::allow(["s3:PutObject"])
                    .sid("AWSCloudTrailWrite20150319")
                    .service(TRAIL_PRINCIPAL)
                    .resource(Value::join("", [arn, Value::from("/AWSLogs/*")]))
                    .condition(owner_full_control()),
            ],
            &trail,
        );
        builder.declare_output(
            "CloudTrailName",
            "CloudTrail Name for S3 Activity Logging",
            &trail,
        )?;
        storage.trail = Some(trail);
        Ok(())
    }
}

/// `StringEquals s3:x-amz-acl = bucket-owner-full-control`
pub(crate) fn owner_full_control() -> Value {
    Properties::new()
        .with(
            "StringEquals",
            Properties::new().with("s3:x-amz-acl", "bucket-owner-full-control"),
        )
        .into()
}

fn is_valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}
