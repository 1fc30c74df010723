use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::DepthProviderTrait;
use crate::deprojector::DepthMap;
use crate::error::{PoseError, Result};
use crate::types::FrameId;

/// `data.csv` 中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthIndexRecord {
    pub frame: FrameId,
    /// 设备时间戳（毫秒），仅记录
    pub timestamp: f64,
    pub filename: String,
}

/// 原始深度帧目录
///
/// ```text
/// depth/
///   data.csv          frame,timestamp,filename
///   data/000000.raw   height*width 个小端 u16
/// ```
#[derive(Debug, Default)]
pub struct RawDepthDataset {
    pub root: PathBuf,
    pub width: usize,
    pub height: usize,
    pub records: Vec<DepthIndexRecord>,
    by_frame: HashMap<FrameId, usize>,
}

impl RawDepthDataset {
    const INDEX_FILE: &'static str = "data.csv";
    const DATA_DIR: &'static str = "data";

    pub fn read_index(path: &Path) -> Result<Vec<DepthIndexRecord>> {
        let csv_path = path.join(Self::INDEX_FILE);
        let mut reader = csv::Reader::from_path(&csv_path).map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => PoseError::io(&csv_path, io),
            other => PoseError::schema(&csv_path, format!("{other:?}")),
        })?;
        reader
            .deserialize::<DepthIndexRecord>()
            .map(|record| {
                record.map_err(|e| PoseError::schema(&csv_path, e.to_string()))
            })
            .collect()
    }

    pub fn new(path: &Path, width: usize, height: usize) -> Result<Self> {
        let records = Self::read_index(path)?;
        let mut by_frame = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if by_frame.insert(record.frame, i).is_some() {
                return Err(PoseError::schema(
                    path.join(Self::INDEX_FILE),
                    format!("duplicate frame {}", record.frame),
                ));
            }
        }
        log::info!("depth dataset {:?}: {} frames", path, records.len());
        Ok(Self {
            root: path.to_path_buf(),
            width,
            height,
            records,
            by_frame,
        })
    }

    pub fn frame_path(&self, record: &DepthIndexRecord) -> PathBuf {
        self.root.join(Self::DATA_DIR).join(&record.filename)
    }

    pub fn read_raw(path: &Path, width: usize, height: usize) -> Result<DepthMap> {
        let bytes = std::fs::read(path).map_err(|e| PoseError::io(path, e))?;
        if bytes.len() != width * height * 2 {
            return Err(PoseError::schema(
                path,
                format!(
                    "{} bytes, expected {}x{} u16 values",
                    bytes.len(),
                    height,
                    width
                ),
            ));
        }
        let values = bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect::<Vec<_>>();
        DepthMap::from_shape_vec((height, width), values)
            .map_err(|e| PoseError::schema(path, e.to_string()))
    }

    /// 写出一个数据集目录，供离线转换和测试使用
    pub fn write(path: &Path, frames: &[(DepthIndexRecord, DepthMap)]) -> Result<()> {
        let data_dir = path.join(Self::DATA_DIR);
        std::fs::create_dir_all(&data_dir).map_err(|e| PoseError::io(&data_dir, e))?;
        let csv_path = path.join(Self::INDEX_FILE);
        let mut writer = csv::Writer::from_path(&csv_path)?;
        for (record, depth) in frames {
            writer.serialize(record)?;
            let bytes = depth
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect::<Vec<u8>>();
            let frame_path = data_dir.join(&record.filename);
            std::fs::write(&frame_path, bytes).map_err(|e| PoseError::io(&frame_path, e))?;
        }
        writer.flush().map_err(|e| PoseError::io(&csv_path, e))?;
        Ok(())
    }
}

impl DepthProviderTrait for RawDepthDataset {
    fn frame_ids(&self) -> Vec<FrameId> {
        self.records.iter().map(|r| r.frame).collect()
    }

    fn depth_frame(&self, id: FrameId) -> Result<Option<DepthMap>> {
        let Some(&i) = self.by_frame.get(&id) else {
            return Ok(None);
        };
        let path = self.frame_path(&self.records[i]);
        if !path.exists() {
            log::warn!("depth frame {id} missing at {:?}", path);
            return Ok(None);
        }
        Self::read_raw(&path, self.width, self.height).map(Some)
    }
}
