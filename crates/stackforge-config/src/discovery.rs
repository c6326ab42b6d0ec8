//! スタックファイルの探索

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "STACKFORGE_CONFIG_PATH";

const CANDIDATES: [&str; 4] = ["stack.local.kdl", ".stack.local.kdl", "stack.kdl", ".stack.kdl"];

/// グローバル設定ディレクトリ（`~/.config/stackforge`）
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackforge"))
}

/// プロジェクトのスタック定義ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 `STACKFORGE_CONFIG_PATH`（直接パス指定）
/// 2. カレントディレクトリ: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. `./.stackforge/` ディレクトリ内: 同様の順序
/// 4. `~/.config/stackforge/stack.kdl`（グローバル設定）
pub fn find_stack_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            debug!(path = %path.display(), "Stack file from environment");
            return Ok(path);
        }
    }

    // 2. カレントディレクトリ
    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_in(&current_dir) {
        return Ok(path);
    }

    // 3. ./.stackforge/
    let project_dir = current_dir.join(".stackforge");
    if project_dir.is_dir()
        && let Some(path) = find_in(&project_dir)
    {
        return Ok(path);
    }

    // 4. グローバル設定
    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("stack.kdl");
        if global.exists() {
            debug!(path = %global.display(), "Using global stack file");
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}
