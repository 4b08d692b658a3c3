//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TIANSHU__*` 覆盖（双下划线表示嵌套，如 `TIANSHU__STORAGE__BACKEND=sqlite`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub generation: GenerationSection,
    pub storage: StorageSection,
}

/// [app] 段：应用名、数据目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("novels")
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// deepseek / openai / template
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmModelSection,
    #[serde(default)]
    pub openai: LlmModelSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmModelSection::default(),
            openai: LlmModelSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmModelSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单章生成超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    180
}

/// [generation] 段
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_target_chapters")]
    pub target_chapters: u32,
    #[serde(default = "default_word_count_target")]
    pub word_count_target: u32,
    /// 传给下一章的上一章末尾字符数
    #[serde(default = "default_continuity_chars")]
    pub continuity_chars: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// CLI batch 未指定数量时的默认值
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            target_chapters: default_target_chapters(),
            word_count_target: default_word_count_target(),
            continuity_chars: default_continuity_chars(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_target_chapters() -> u32 {
    300
}

fn default_word_count_target() -> u32 {
    crate::story::DEFAULT_WORD_COUNT_TARGET
}

fn default_continuity_chars() -> usize {
    500
}

fn default_max_length() -> usize {
    3000
}

fn default_batch_size() -> u32 {
    5
}

/// [storage] 段：后端与路径
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// json / sqlite / memory
    #[serde(default = "default_backend")]
    pub backend: String,
    /// json 为目录，sqlite 为数据库文件；未设置时落在 app.data_dir 下
    pub path: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

fn default_backend() -> String {
    "json".to_string()
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeouts.request)
    }

    /// 存储路径：显式配置优先，否则 json 用 data_dir，sqlite 用 data_dir/tianshu.db
    pub fn storage_path(&self) -> PathBuf {
        match &self.storage.path {
            Some(path) => path.clone(),
            None if self.storage.backend.eq_ignore_ascii_case("sqlite") => {
                self.app.data_dir.join("tianshu.db")
            }
            None => self.app.data_dir.clone(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TIANSHU__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TIANSHU__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TIANSHU")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_any_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.generation.target_chapters, 300);
        assert_eq!(cfg.generation.continuity_chars, 500);
        assert_eq!(cfg.storage.backend, "json");
        assert_eq!(cfg.storage_path(), PathBuf::from("novels"));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(180));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[generation]\ntarget_chapters = 120\n\n[storage]\nbackend = \"sqlite\"\n\n[llm.timeouts]\nrequest = 30"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.generation.target_chapters, 120);
        assert_eq!(cfg.generation.word_count_target, 3000);
        assert_eq!(cfg.storage.backend, "sqlite");
        assert_eq!(cfg.llm.timeouts.request, 30);
        assert!(cfg.storage_path().ends_with("tianshu.db"));
    }
}
