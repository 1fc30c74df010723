//! 肢体序列输出
//!
//! JSON：每帧一条，`limbs` 只包含该帧存在的肢体。
//! CSV：插值后的稠密序列，一行一个 (帧, 肢体)，供外部绘图使用。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::{LimbKinematics, LimbSample};
use crate::error::{PoseError, Result};
use crate::types::FrameId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimbFrameRecord {
    pub frame: FrameId,
    #[serde(serialize_with = "ordered_map")]
    pub limbs: Vec<(String, LimbSample)>,
}

/// 保持拓扑顺序输出 JSON 对象
fn ordered_map<S: Serializer>(
    limbs: &[(String, LimbSample)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(limbs.len()))?;
    for (name, sample) in limbs {
        map.serialize_entry(name, sample)?;
    }
    map.end()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimbCsvRow<'a> {
    pub frame: FrameId,
    pub limb: &'a str,
    pub dx: Option<f64>,
    pub dy: Option<f64>,
    pub dz: Option<f64>,
    pub euclidean: Option<f64>,
}

impl LimbKinematics {
    pub fn frame_records(&self) -> Vec<LimbFrameRecord> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, frame)| LimbFrameRecord {
                frame: *frame,
                limbs: self
                    .series
                    .iter()
                    .filter_map(|s| s.samples[i].map(|sample| (s.name.clone(), sample)))
                    .collect(),
            })
            .collect()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PoseError::io(parent, e))?;
        }
        let records = self.frame_records();
        let file = File::create(path).map_err(|e| PoseError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &records)
            .map_err(|e| PoseError::io(path, e.into()))?;
        writer.flush().map_err(|e| PoseError::io(path, e))?;
        log::info!("saved limb distances to {:?}", path);
        Ok(())
    }

    pub fn save_interpolated_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PoseError::io(parent, e))?;
        }
        let limbs = self.interpolated();
        let mut writer = csv::Writer::from_path(path)?;
        for limb in &limbs {
            for (i, frame) in self.frames.iter().enumerate() {
                writer.serialize(LimbCsvRow {
                    frame: *frame,
                    limb: &limb.name,
                    dx: limb.dx[i],
                    dy: limb.dy[i],
                    dz: limb.dz[i],
                    euclidean: limb.euclidean[i],
                })?;
            }
        }
        writer.flush().map_err(|e| PoseError::io(path, e))?;
        log::info!("saved {} interpolated limb series to {:?}", limbs.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::LimbSeries;
    use crate::skeleton::LimbEdge;

    fn sample(v: f64) -> LimbSample {
        LimbSample {
            dx: v,
            dy: 0.0,
            dz: 0.0,
            euclidean: v,
        }
    }

    fn kinematics() -> LimbKinematics {
        LimbKinematics {
            frames: vec![30, 31, 32],
            series: vec![
                LimbSeries {
                    edge: LimbEdge::new(6, 8),
                    name: "6_8".into(),
                    samples: vec![Some(sample(2.0)), None, Some(sample(4.0))],
                },
                LimbSeries {
                    edge: LimbEdge::new(5, 7),
                    name: "5_7".into(),
                    samples: vec![None, None, None],
                },
            ],
        }
    }

    #[test]
    fn json_keeps_every_frame_and_limb_order() {
        let records = kinematics().frame_records();
        assert_eq!(records.len(), 3);
        assert!(records[1].limbs.is_empty());
        let json = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(
            json,
            r#"{"frame":30,"limbs":{"6_8":{"dx":2.0,"dy":0.0,"dz":0.0,"euclidean":2.0}}}"#
        );
    }

    #[test]
    fn csv_rows_are_interpolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limbs.csv");
        kinematics().save_interpolated_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "frame,limb,dx,dy,dz,euclidean");
        assert_eq!(lines[2], "31,6_8,3.0,0.0,0.0,3.0");
        // 全部缺失的肢体保持为空
        assert_eq!(lines[4], "30,5_7,,,,");
        assert_eq!(lines.len(), 1 + 2 * 3);
    }

    #[test]
    fn json_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("limb_distances.json");
        kinematics().save_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[2]["limbs"]["6_8"]["euclidean"], 4.0);
        assert_eq!(value[1]["limbs"], serde_json::json!({}));
    }
}
