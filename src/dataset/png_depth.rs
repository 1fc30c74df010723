use std::collections::HashMap;
use std::path::{Path, PathBuf};

use opencv::core::{Mat, MatTraitConst, MatTraitConstManual, CV_16UC1};
use opencv::imgcodecs;

use super::{DepthIndexRecord, DepthProviderTrait, RawDepthDataset};
use crate::deprojector::DepthMap;
use crate::error::{PoseError, Result};
use crate::types::FrameId;

/// 16 位 PNG 深度帧目录，索引格式与 [RawDepthDataset] 相同
#[derive(Debug, Default)]
pub struct PngDepthDataset {
    pub root: PathBuf,
    pub width: usize,
    pub height: usize,
    pub records: Vec<DepthIndexRecord>,
    by_frame: HashMap<FrameId, usize>,
}

impl PngDepthDataset {
    pub fn new(path: &Path, width: usize, height: usize) -> Result<Self> {
        let records = RawDepthDataset::read_index(path)?;
        let mut by_frame = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if by_frame.insert(record.frame, i).is_some() {
                return Err(PoseError::schema(
                    path.join("data.csv"),
                    format!("duplicate frame {}", record.frame),
                ));
            }
        }
        log::info!("png depth dataset {:?}: {} frames", path, records.len());
        Ok(Self {
            root: path.to_path_buf(),
            width,
            height,
            records,
            by_frame,
        })
    }

    fn read_png(&self, path: &Path) -> Result<Option<DepthMap>> {
        let path_str = path.to_string_lossy();
        let img: Mat = imgcodecs::imread(&path_str, imgcodecs::IMREAD_ANYDEPTH)?;
        if img.empty() {
            return Ok(None);
        }
        if img.typ() != CV_16UC1 {
            return Err(PoseError::schema(path, "depth image is not 16-bit single channel"));
        }
        let rows = img.rows() as usize;
        let cols = img.cols() as usize;
        if (rows, cols) != (self.height, self.width) {
            return Err(PoseError::schema(
                path,
                format!("{cols}x{rows} image, expected {}x{}", self.width, self.height),
            ));
        }
        let data = img.data_typed::<u16>()?.to_vec();
        DepthMap::from_shape_vec((rows, cols), data)
            .map(Some)
            .map_err(|e| PoseError::schema(path, e.to_string()))
    }
}

impl DepthProviderTrait for PngDepthDataset {
    fn frame_ids(&self) -> Vec<FrameId> {
        self.records.iter().map(|r| r.frame).collect()
    }

    fn depth_frame(&self, id: FrameId) -> Result<Option<DepthMap>> {
        let Some(&i) = self.by_frame.get(&id) else {
            return Ok(None);
        };
        let path = self.root.join("data").join(&self.records[i].filename);
        if !path.exists() {
            log::warn!("depth frame {id} missing at {:?}", path);
            return Ok(None);
        }
        let depth = self.read_png(&path)?;
        if depth.is_none() {
            log::warn!("depth frame {id} unreadable at {:?}", path);
        }
        Ok(depth)
    }
}
