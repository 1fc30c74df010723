//! 数据集处理
//!
//! 深度流由深度相机 SDK 导出（对齐到彩色流），二维关键点由外部姿态估计器导出。
//! 这里只读取它们的输出。
mod openpose;
#[cfg(feature = "opencv")]
mod png_depth;
mod raw_depth;
mod sync;

pub use openpose::{frame_id_from_name, OpenPoseDirectory};
#[cfg(feature = "opencv")]
pub use png_depth::PngDepthDataset;
pub use raw_depth::{DepthIndexRecord, RawDepthDataset};
pub use sync::{pair_frames, FramePair};

use crate::deprojector::DepthMap;
use crate::error::Result;
use crate::types::FrameId;

pub type DefaultDepthDataset = raw_depth::RawDepthDataset;

/// 深度帧提供者
pub trait DepthProviderTrait {
    /// 深度流中的帧号，按流的顺序
    fn frame_ids(&self) -> Vec<FrameId>;

    /// 读取一帧深度；`None` 表示该帧缺失，调用方跳过
    fn depth_frame(&self, id: FrameId) -> Result<Option<DepthMap>>;
}
