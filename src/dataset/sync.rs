//! 关键点文件与深度帧的对应

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::Correspondence;
use crate::types::FrameId;

/// 一对待处理的关键点文件和深度帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePair {
    /// ByFrameId 时为共享帧号；Positional 时为序号，实际输出帧号在跳帧后重新编号
    pub frame_id: FrameId,
    pub keypoints: PathBuf,
    pub depth_id: FrameId,
}

/// 按对应方式配对。
///
/// - `Positional`: 第 n 个关键点文件对应第 n 个深度帧，多余的一侧被丢弃。
/// - `ByFrameId`: 按帧号连接，任一侧缺失的帧号视为缺帧。
pub fn pair_frames(
    keypoint_files: &[(FrameId, PathBuf)],
    depth_ids: &[FrameId],
    mode: Correspondence,
) -> Vec<FramePair> {
    match mode {
        Correspondence::Positional => {
            if keypoint_files.len() != depth_ids.len() {
                log::warn!(
                    "{} keypoint files vs {} depth frames, positional pairing may be misaligned",
                    keypoint_files.len(),
                    depth_ids.len()
                );
            }
            keypoint_files
                .iter()
                .zip(depth_ids)
                .enumerate()
                .map(|(n, ((_, path), depth_id))| FramePair {
                    frame_id: n as FrameId,
                    keypoints: path.clone(),
                    depth_id: *depth_id,
                })
                .collect()
        }
        Correspondence::ByFrameId => {
            let depth: HashSet<FrameId> = depth_ids.iter().copied().collect();
            let mut pairs = Vec::with_capacity(keypoint_files.len());
            let mut matched = HashSet::with_capacity(keypoint_files.len());
            for (id, path) in keypoint_files {
                if depth.contains(id) {
                    matched.insert(*id);
                    pairs.push(FramePair {
                        frame_id: *id,
                        keypoints: path.clone(),
                        depth_id: *id,
                    });
                } else {
                    log::warn!("frame {id}: keypoints without depth, skipped");
                }
            }
            let unmatched_depth = depth.difference(&matched).count();
            if unmatched_depth > 0 {
                log::warn!("{unmatched_depth} depth frames without keypoints, skipped");
            }
            pairs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(ids: &[FrameId]) -> Vec<(FrameId, PathBuf)> {
        ids.iter()
            .map(|id| (*id, PathBuf::from(format!("{id}_keypoints.json"))))
            .collect()
    }

    #[test]
    fn positional_zips_in_order() {
        let pairs = pair_frames(&files(&[3, 4, 9]), &[100, 101], Correspondence::Positional);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].frame_id, 0);
        assert_eq!(pairs[0].depth_id, 100);
        assert_eq!(pairs[1].keypoints, PathBuf::from("4_keypoints.json"));
        assert_eq!(pairs[1].depth_id, 101);
    }

    #[test]
    fn by_frame_id_skips_unmatched() {
        let pairs = pair_frames(&files(&[0, 1, 2, 5]), &[0, 2, 3, 5], Correspondence::ByFrameId);
        let ids: Vec<FrameId> = pairs.iter().map(|p| p.frame_id).collect();
        assert_eq!(ids, vec![0, 2, 5]);
        assert!(pairs.iter().all(|p| p.frame_id == p.depth_id));
    }
}
