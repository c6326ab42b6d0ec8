//! Metric alarms with e-mail notification

use crate::error::{BlueprintError, Result};
use stackforge_template::{Properties, ResourceHandle, ResourceKind, TemplateBuilder, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSettings {
    pub emails: Vec<String>,
    pub metric_name: String,
    pub namespace: String,
    pub statistic: String,
    pub period: u32,
    pub evaluation_periods: u32,
    pub threshold: f64,
    pub comparison_operator: String,
    pub description: String,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            emails: Vec::new(),
            metric_name: "NetworkPacketsIn".to_string(),
            namespace: "AWS/EC2".to_string(),
            statistic: "Average".to_string(),
            period: 60,
            evaluation_periods: 1,
            threshold: 1000.0,
            comparison_operator: "GreaterThanOrEqualToThreshold".to_string(),
            description: "Alarm for average ingress packets exceeding 1000 pkts/sec".to_string(),
        }
    }
}

/// Declared monitoring resources
#[derive(Debug, Clone)]
pub struct Monitoring {
    pub topic: ResourceHandle,
    pub alarms: Vec<ResourceHandle>,
}

impl AlarmSettings {
    /// Declare the notification topic and one alarm per instance
    ///
    /// Without instances a single alarm without dimensions watches the
    /// metric across the account.
    pub fn declare(
        &self,
        builder: &mut TemplateBuilder,
        instances: &[ResourceHandle],
    ) -> Result<Monitoring> {
        if self.emails.is_empty() {
            return Err(BlueprintError::InvalidLayout(
                "monitoring requires at least one e-mail endpoint".to_string(),
            ));
        }

        let subscriptions = self
            .emails
            .iter()
            .map(|email| Properties::new().with("Protocol", "email").with("Endpoint", email));
        let topic = builder.declare_resource(
            ResourceKind::Topic,
            "AlarmSNSTopic",
            Properties::new()
                .with("DisplayName", "CloudWatch Alarm Notifications")
                .with("Subscription", Value::list(subscriptions)),
        )?;

        let mut alarms = Vec::new();
        if instances.is_empty() {
            alarms.push(self.declare_alarm(builder, &topic, "IngressPacketsAlarm", None)?);
        } else {
            for instance in instances {
                let id = format!("{}IngressPacketsAlarm", instance.logical_id());
                alarms.push(self.declare_alarm(builder, &topic, &id, Some(instance))?);
            }
        }

        builder.declare_output(
            "AlarmTopicArn",
            "Topic receiving alarm notifications",
            &topic,
        )?;
        Ok(Monitoring { topic, alarms })
    }

    fn declare_alarm(
        &self,
        builder: &mut TemplateBuilder,
        topic: &ResourceHandle,
        id: &str,
        instance: Option<&ResourceHandle>,
    ) -> Result<ResourceHandle> {
        let dimensions = instance.map(|i| {
            Value::list([Properties::new().with("Name", "InstanceId").with("Value", i)])
        });
        let alarm = builder.declare_resource(
            ResourceKind::Alarm,
            id,
            Properties::new()
                .with("AlarmDescription", self.description.as_str())
                .with("MetricName", self.metric_name.as_str())
                .with("Namespace", self.namespace.as_str())
                .with("Statistic", self.statistic.as_str())
                .with("Period", self.period)
                .with("EvaluationPeriods", self.evaluation_periods)
                .with("Threshold", threshold_value(self.threshold))
                .with("ComparisonOperator", self.comparison_operator.as_str())
                .with_opt("Dimensions", dimensions)
                .with("AlarmActions", Value::list([topic]))
                .with("OKActions", Value::list([topic])),
        )?;
        debug!(alarm = %id, "Declared alarm");
        Ok(alarm)
    }
}

/// Whole thresholds render as integers (`1000`, not `1000.0`)
fn threshold_value(threshold: f64) -> Value {
    if threshold.fract() == 0.0 && threshold.abs() < i64::MAX as f64 {
        Value::Integer(threshold as i64)
    } else {
        Value::Float(threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AlarmSettings {
        AlarmSettings {
            emails: vec!["ops@example.com".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_alarm_per_instance() {
        let mut builder = TemplateBuilder::new();
        let a = builder
            .declare_resource(ResourceKind::Instance, "EC2PublicInstance1", Properties::new())
            .unwrap();
        let b = builder
            .declare_resource(ResourceKind::Instance, "EC2PublicInstance2", Properties::new())
            .unwrap();
        let monitoring = settings().declare(&mut builder, &[a, b]).unwrap();
        assert_eq!(monitoring.alarms.len(), 2);

        let doc = builder.render().unwrap();
        let json = serde_json::to_value(
            doc.resource("EC2PublicInstance2IngressPacketsAlarm").unwrap(),
        )
        .unwrap();
        let props = &json["Properties"];
        assert_eq!(props["Dimensions"][0]["Name"], "InstanceId");
        assert_eq!(props["Dimensions"][0]["Value"]["Ref"], "EC2PublicInstance2");
        assert_eq!(props["AlarmActions"][0]["Ref"], "AlarmSNSTopic");
        assert_eq!(props["OKActions"][0]["Ref"], "AlarmSNSTopic");
        assert!(props["Threshold"].is_i64());
        assert_eq!(props["Threshold"], 1000);
        assert_eq!(props["Period"], 60);
    }

    #[test]
    fn test_fractional_threshold_stays_float() {
        assert_eq!(threshold_value(1000.0), Value::Integer(1000));
        assert_eq!(threshold_value(0.5), Value::Float(0.5));
        assert!(matches!(threshold_value(f64::INFINITY), Value::Float(_)));
    }

    #[test]
    fn test_fleet_wide_alarm_without_instances() {
        let mut builder = TemplateBuilder::new();
        settings().declare(&mut builder, &[]).unwrap();
        let doc = builder.render().unwrap();
        let alarm = doc.resource("IngressPacketsAlarm").unwrap();
        assert!(alarm.property("Dimensions").is_none());

        let json = serde_json::to_value(doc.resource("AlarmSNSTopic").unwrap()).unwrap();
        assert_eq!(json["Properties"]["Subscription"][0]["Protocol"], "email");
        assert_eq!(json["Properties"]["Subscription"][0]["Endpoint"], "ops@example.com");
    }

    #[test]
    fn test_email_is_required() {
        let mut builder = TemplateBuilder::new();
        let result = AlarmSettings::default().declare(&mut builder, &[]);
        assert!(matches!(result, Err(BlueprintError::InvalidLayout(_))));
        assert_eq!(builder.resource_count(), 0);
    }
}
