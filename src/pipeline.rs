//! 两个阶段：二维关键点 + 深度 -> 三维轨迹；三维轨迹 -> 肢体序列

use std::path::Path;

use crate::camera::CameraTrait;
use crate::config::{Correspondence, PipelineConfig};
use crate::dataset::{pair_frames, DepthProviderTrait, OpenPoseDirectory};
use crate::deprojector::{FrameInput, KeypointDeprojector};
use crate::error::Result;
use crate::kinematics::{LimbKinematics, LimbKinematicsEngine};
use crate::skeleton::Skeleton;
use crate::trajectory::{self, Trajectory, TrajectoryStore};
use crate::types::FrameId;

/// 每批并行处理的帧数，限制同时驻留内存的深度图数量
const BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub paired: usize,
    pub skipped: usize,
    pub frames: usize,
    /// 实际使用的每人关键点数，读回轨迹文件时需要
    pub keypoint_count: Option<usize>,
}

/// 读取关键点和深度，逐批反投影并按帧号追加到轨迹
pub fn convert<Camera, Provider>(
    keypoints: &OpenPoseDirectory,
    depth: &Provider,
    deprojector: &KeypointDeprojector<Camera>,
    config: &PipelineConfig,
) -> Result<(Trajectory, ConvertSummary)>
where
    Camera: CameraTrait + Sync,
    Provider: DepthProviderTrait,
{
    let pairs = pair_frames(&keypoints.files, &depth.frame_ids(), config.correspondence);
    let mut summary = ConvertSummary {
        paired: pairs.len(),
        ..Default::default()
    };
    let mut store = TrajectoryStore::with_capacity(pairs.len());
    // Positional 模式下只为实际输出的帧编号
    let mut next_index: FrameId = 0;

    for batch in pairs.chunks(BATCH_SIZE) {
        let mut inputs = Vec::with_capacity(batch.len());
        for pair in batch {
            let Some(depth_map) = depth.depth_frame(pair.depth_id)? else {
                log::warn!("frame {}: missing depth, skipped", pair.frame_id);
                summary.skipped += 1;
                continue;
            };
            let people = OpenPoseDirectory::read_people(&pair.keypoints)?;
            let index = match config.correspondence {
                Correspondence::Positional => {
                    next_index += 1;
                    next_index - 1
                }
                Correspondence::ByFrameId => pair.frame_id,
            };
            inputs.push(FrameInput {
                index,
                depth: depth_map,
                people,
            });
        }
        for frame in deprojector.reconstruct_sequence(&inputs, config.multiple_thread) {
            if let Err(e) = store.append(frame) {
                log::warn!("{e}, frame dropped");
                summary.skipped += 1;
            }
        }
        log::info!("processed {} / {} frames", store.len(), summary.paired);
    }

    let trajectory = store.finalize()?;
    summary.frames = trajectory.len();
    summary.keypoint_count = deprojector.keypoint_count();
    log::info!(
        "converted {} frames ({} skipped)",
        summary.frames,
        summary.skipped
    );
    Ok((trajectory, summary))
}

/// 读取轨迹文件，计算窗口内的肢体序列
pub fn limbs(trajectory_path: &Path, skeleton: Skeleton, config: &PipelineConfig) -> Result<LimbKinematics> {
    let trajectory = trajectory::load(trajectory_path, config.keypoints_per_person)?;
    let engine = LimbKinematicsEngine::new(skeleton)
        .with_scale(config.distance_scale)
        .with_person(config.person);
    Ok(engine.compute_series(&trajectory, config.frame_start, config.frame_end))
}
