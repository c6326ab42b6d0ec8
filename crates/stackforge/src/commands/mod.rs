pub mod deploy;
pub mod render;
pub mod validate;

use anyhow::Context;
use colored::Colorize;
use stackforge_config::StackDefinition;
use std::path::Path;

/// スタックファイルを解決してパース
///
/// ステータスは stderr に出力する（stdout はレンダリング結果専用）
pub fn load_stack(config: Option<&Path>) -> anyhow::Result<StackDefinition> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => stackforge_config::find_stack_file()?,
    };
    eprintln!("Stack file: {}", path.display().to_string().cyan());
    stackforge_config::parse_stack_file(&path)
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// CloudFormation のスタック名: 英字で始まり、英数字とハイフンのみ
pub fn is_valid_stack_name(name: &str) -> bool {
    name.len() <= 128
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
