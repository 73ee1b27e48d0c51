use std::path::PathBuf;

use facesort_onnx::DEFAULT_MATCH_THRESHOLD;

/// CLI settings, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for two faces to count as the same person.
    pub match_threshold: f32,
    /// Optional TOML file overriding the default naming layout.
    pub layout: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `FACESORT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACESORT_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_model_dir());

        Self {
            model_dir,
            match_threshold: env_f32("FACESORT_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            layout: std::env::var_os("FACESORT_LAYOUT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facesort/models")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_f32_falls_back_on_garbage() {
        std::env::set_var("FACESORT_TEST_THRESHOLD_GARBAGE", "not-a-number");
        assert_eq!(env_f32("FACESORT_TEST_THRESHOLD_GARBAGE", 0.4), 0.4);
        std::env::set_var("FACESORT_TEST_THRESHOLD_OK", "0.55");
        assert_eq!(env_f32("FACESORT_TEST_THRESHOLD_OK", 0.4), 0.55);
        assert_eq!(env_f32("FACESORT_TEST_THRESHOLD_UNSET", 0.4), 0.4);
    }

    #[test]
    fn test_default_model_dir_ends_with_models() {
        assert!(default_model_dir().ends_with("facesort/models"));
    }
}
