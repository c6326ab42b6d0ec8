//! スタック定義ファイル
//!
//! プロジェクトの `stack.kdl` を探し、[`StackDefinition`]（スタックのメタデータと
//! レンダリングするブループリント）に変換する。

pub mod discovery;
pub mod error;
pub mod model;
pub mod parser;

pub use discovery::{CONFIG_PATH_ENV, find_stack_file, get_config_dir};
pub use error::{ConfigError, Result};
pub use model::StackDefinition;
pub use parser::{parse_stack_file, parse_stack_string};
