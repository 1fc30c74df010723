//! 轨迹文件
//!
//! ```json
//! [ { "frame": 0, "keypoints_3d": [ [x, y, z], [null, null, null], ... ] }, ... ]
//! ```
//! 同一帧中所有人的关键点按顺序拼接，读取时按每人 K 个重新切分。

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Trajectory;
use crate::error::{PoseError, Result};
use crate::types::{Frame, FrameId, Keypoint3D, Person3D};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: FrameId,
    pub keypoints_3d: Vec<Keypoint3D>,
}

impl From<&Frame> for FrameRecord {
    fn from(frame: &Frame) -> Self {
        Self {
            frame: frame.index,
            keypoints_3d: frame.flat_keypoints().copied().collect(),
        }
    }
}

impl FrameRecord {
    /// `keypoints_per_person` 为 None 时整帧视为一个人
    fn into_frame(self, keypoints_per_person: Option<usize>) -> std::result::Result<Frame, String> {
        let people = match keypoints_per_person {
            _ if self.keypoints_3d.is_empty() => Vec::new(),
            None => vec![Person3D::new(self.keypoints_3d)],
            Some(k) => {
                if k == 0 || self.keypoints_3d.len() % k != 0 {
                    return Err(format!(
                        "frame {}: {} keypoints is not a multiple of {k}",
                        self.frame,
                        self.keypoints_3d.len()
                    ));
                }
                self.keypoints_3d
                    .chunks_exact(k)
                    .map(|c| Person3D::new(c.to_vec()))
                    .collect()
            }
        };
        Ok(Frame::new(self.frame, people))
    }
}

pub fn save(trajectory: &Trajectory, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PoseError::io(parent, e))?;
    }
    let records: Vec<FrameRecord> = trajectory.frames().iter().map(FrameRecord::from).collect();
    let file = File::create(path).map_err(|e| PoseError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &records).map_err(|e| PoseError::io(path, e.into()))?;
    writer.flush().map_err(|e| PoseError::io(path, e))?;
    log::info!("saved {} frames to {:?}", records.len(), path);
    Ok(())
}

pub fn load(path: &Path, keypoints_per_person: Option<usize>) -> Result<Trajectory> {
    let file = File::open(path).map_err(|e| PoseError::io(path, e))?;
    let values: Vec<serde_json::Value> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| {
            if e.is_io() {
                PoseError::io(path, e.into())
            } else {
                PoseError::schema(path, e.to_string())
            }
        })?;

    let mut frames = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        let frame_hint = value
            .get("frame")
            .and_then(serde_json::Value::as_i64)
            .map_or_else(|| format!("record {i}"), |f| format!("frame {f}"));
        let record: FrameRecord = serde_json::from_value(value)
            .map_err(|e| PoseError::schema(path, format!("{frame_hint}: {e}")))?;
        let frame = record
            .into_frame(keypoints_per_person)
            .map_err(|message| PoseError::schema(path, message))?;
        frames.push(frame);
    }
    let trajectory =
        Trajectory::from_frames(frames).map_err(|e| PoseError::schema(path, e.to_string()))?;
    log::info!("loaded {} frames from {:?}", trajectory.len(), path);
    Ok(trajectory)
}
