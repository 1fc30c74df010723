//! 错误类型
//!
//! 可恢复的情况（缺帧、低置信度、越界）不会走到这里，
//! 只有配置、输入格式、IO 和持久化格式错误才会被上报。

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoseError>;

#[derive(Debug, Error)]
pub enum PoseError {
    /// 内参未填写或非法，深度比例非法，帧窗口非法
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 单人关键点数组长度不是 3*K
    #[error(
        "malformed keypoints in frame {frame}, person {person}: got {len} values, expected {expected}"
    )]
    MalformedInput {
        frame: i64,
        person: usize,
        len: usize,
        expected: usize,
    },

    /// 轨迹中帧号必须严格递增
    #[error("frame {next} appended after frame {previous}")]
    OutOfOrder { previous: i64, next: i64 },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 持久化文件格式错误
    #[error("schema error in {}: {message}", .path.display())]
    Schema { path: PathBuf, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[cfg(feature = "opencv")]
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}

impl PoseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn schema(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 致命错误会终止当前阶段
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedInput { .. } | Self::OutOfOrder { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_file() {
        let err = PoseError::schema("/tmp/3d.json", "frame 4: missing `keypoints_3d`");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/3d.json"));
        assert!(msg.contains("frame 4"));
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_input_is_recoverable() {
        let err = PoseError::MalformedInput {
            frame: 2,
            person: 1,
            len: 10,
            expected: 405,
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("expected 405"));
    }
}
