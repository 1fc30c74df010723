use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PoseError, Result};

/// 关键点置信度阈值，低于该值的关键点输出为未定义
pub const CONFIDENCE_THRESHOLD: f64 = 0.1;
/// 米 -> 厘米
pub const DISTANCE_SCALE: f64 = 100.0;
/// 默认分析的帧窗口（闭区间）
pub const FRAME_START: i64 = 30;
pub const FRAME_END: i64 = 170;
/// OpenPose BODY_135 模型的关键点数量
pub const BODY_135_KEYPOINTS: usize = 135;
/// 是否使用多线程
pub const MULTIPLE_THREAD: bool = true;

/// 二维关键点文件与深度帧的对应方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correspondence {
    /// 按排序后的位置一一对应，丢帧时会错位
    Positional,
    /// 按文件名中的帧号与深度索引中的帧号连接
    #[default]
    ByFrameId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub confidence_threshold: f64,
    /// 每个人的关键点数量 K，缺省时从第一个人推断
    pub keypoints_per_person: Option<usize>,
    pub distance_scale: f64,
    pub frame_start: i64,
    pub frame_end: i64,
    /// 肢体分析使用的人的序号
    pub person: usize,
    pub correspondence: Correspondence,
    /// 反投影前是否先去畸变
    pub undistort: bool,
    pub multiple_thread: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            keypoints_per_person: Some(BODY_135_KEYPOINTS),
            distance_scale: DISTANCE_SCALE,
            frame_start: FRAME_START,
            frame_end: FRAME_END,
            person: 0,
            correspondence: Correspondence::default(),
            undistort: false,
            multiple_thread: MULTIPLE_THREAD,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PoseError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| PoseError::Configuration(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PoseError::Configuration(format!(
                "confidence threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.keypoints_per_person == Some(0) {
            return Err(PoseError::Configuration(
                "keypoints_per_person must be positive".into(),
            ));
        }
        if !(self.distance_scale.is_finite() && self.distance_scale > 0.0) {
            return Err(PoseError::Configuration(format!(
                "distance scale {} must be positive",
                self.distance_scale
            )));
        }
        if self.frame_start > self.frame_end {
            return Err(PoseError::Configuration(format!(
                "frame window [{}, {}] is empty",
                self.frame_start, self.frame_end
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"frame_start": 0, "correspondence": "positional"}"#).unwrap();
        assert_eq!(config.frame_start, 0);
        assert_eq!(config.frame_end, FRAME_END);
        assert_eq!(config.correspondence, Correspondence::Positional);
        assert_eq!(config.keypoints_per_person, Some(BODY_135_KEYPOINTS));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_window() {
        let config = PipelineConfig {
            frame_start: 10,
            frame_end: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PoseError::Configuration(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"distance_scale": 1000.0, "person": 1}"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.distance_scale, 1000.0);
        assert_eq!(config.person, 1);

        std::fs::write(&path, r#"{"distance_scale": -1.0}"#).unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }
}
