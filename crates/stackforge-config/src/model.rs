use stackforge_blueprint::Blueprint;
use stackforge_template::{Capability, Format};

/// パース済みのスタック定義
#[derive(Debug, Clone, Default)]
pub struct StackDefinition {
    /// プロビジョニングサービスに渡すスタック名
    pub name: String,
    pub region: Option<String>,
    /// 送信時に承認するケイパビリティ
    pub capabilities: Vec<Capability>,
    /// テンプレート本文のフォーマット
    pub format: Format,
    pub blueprint: Blueprint,
}

impl StackDefinition {
    pub fn description(&self) -> Option<&str> {
        self.blueprint.description.as_deref()
    }
}
