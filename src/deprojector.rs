//! 关键点反投影
//!
//! 一帧内多人的二维关键点 + 对齐后的深度图 -> 三维关键点。
//! 每个关键点独立处理，没有跨帧、跨人的状态。

use std::sync::OnceLock;

use ndarray::Array2;
use rayon::prelude::*;

use crate::camera::{CameraTrait, PinholeCamera};
use crate::config::CONFIDENCE_THRESHOLD;
use crate::error::{PoseError, Result};
use crate::types::{Frame, FrameId, Keypoint2D, Keypoint3D, Person3D};

/// 对齐到彩色流的深度图，`height x width`，原始深度单位
pub type DepthMap = Array2<u16>;

/// 一帧的输入：帧号、深度图、每个人的扁平关键点数组 `[u0, v0, c0, u1, v1, c1, ...]`
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub index: FrameId,
    pub depth: DepthMap,
    pub people: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct KeypointDeprojector<Camera>
where
    Camera: CameraTrait,
{
    camera: Camera,
    /// 米 / 原始深度单位
    depth_scale: f64,
    confidence_threshold: f64,
    /// 每人关键点数 K；None 时由第一个格式正确的人确定，此后固定
    keypoint_count: Option<usize>,
    inferred_count: OnceLock<usize>,
}

impl KeypointDeprojector<PinholeCamera> {
    pub fn from_pinhole(camera: PinholeCamera) -> Result<Self> {
        let depth_scale = camera.depth_scale();
        Self::new(camera, depth_scale)
    }
}

impl<Camera> KeypointDeprojector<Camera>
where
    Camera: CameraTrait,
{
    pub fn new(camera: Camera, depth_scale: f64) -> Result<Self> {
        let (width, height) = camera.image_size();
        if width == 0 || height == 0 {
            return Err(PoseError::Configuration(
                "camera intrinsics are not populated".into(),
            ));
        }
        if !(depth_scale.is_finite() && depth_scale > 0.0) {
            return Err(PoseError::Configuration(format!(
                "depth scale {depth_scale} must be positive"
            )));
        }
        Ok(Self {
            camera,
            depth_scale,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            keypoint_count: None,
            inferred_count: OnceLock::new(),
        })
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_keypoint_count(mut self, keypoint_count: Option<usize>) -> Self {
        self.keypoint_count = keypoint_count;
        self.inferred_count = OnceLock::new();
        self
    }

    /// 显式给定或已推断出的 K
    pub fn keypoint_count(&self) -> Option<usize> {
        self.keypoint_count
            .or_else(|| self.inferred_count.get().copied())
    }

    /// 尚未确定 K 时，用这个人的长度确定它
    fn resolve_keypoint_count(&self, keypoints: &[f64]) -> Option<usize> {
        self.keypoint_count().or_else(|| {
            if keypoints.is_empty() || keypoints.len() % 3 != 0 {
                return None;
            }
            Some(*self.inferred_count.get_or_init(|| keypoints.len() / 3))
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// 单个关键点：置信度 -> 边界 -> 深度为零，任一不满足即为未定义
    pub fn deproject_keypoint(&self, keypoint: &Keypoint2D, depth: &DepthMap) -> Keypoint3D {
        if !(keypoint.confidence >= self.confidence_threshold) {
            return Keypoint3D::Absent;
        }
        if !self.camera.in_image(keypoint.u, keypoint.v) {
            return Keypoint3D::Absent;
        }
        // 深度图按行存储 [v, u]
        let raw = match depth.get((keypoint.v as usize, keypoint.u as usize)) {
            Some(raw) => *raw,
            None => {
                log::trace!(
                    "({}, {}) outside depth map {:?}",
                    keypoint.u,
                    keypoint.v,
                    depth.dim()
                );
                return Keypoint3D::Absent;
            }
        };
        let z = raw as f64 * self.depth_scale;
        if z == 0.0 {
            return Keypoint3D::Absent;
        }
        Keypoint3D::Present(
            self.camera
                .deproject(keypoint.u as f64, keypoint.v as f64, z),
        )
    }

    /// 单人：长度必须是 3*K，不做截断
    pub fn reconstruct_person(
        &self,
        frame_index: FrameId,
        person: usize,
        keypoints: &[f64],
        depth: &DepthMap,
    ) -> Result<Person3D> {
        let expected = match self.resolve_keypoint_count(keypoints) {
            Some(k) => 3 * k,
            None => 3 * (keypoints.len() / 3).max(1),
        };
        if keypoints.len() != expected {
            return Err(PoseError::MalformedInput {
                frame: frame_index,
                person,
                len: keypoints.len(),
                expected,
            });
        }
        let points = keypoints
            .chunks_exact(3)
            .map(|triple| {
                if triple.iter().all(|x| x.is_finite()) {
                    self.deproject_keypoint(&Keypoint2D::from_triple(triple), depth)
                } else {
                    Keypoint3D::Absent
                }
            })
            .collect();
        Ok(Person3D::new(points))
    }

    /// 一帧：格式错误的人被丢弃并记录，其余人照常处理
    pub fn reconstruct_frame(
        &self,
        frame_index: FrameId,
        depth: &DepthMap,
        people_2d: &[Vec<f64>],
    ) -> Frame {
        let people = people_2d
            .iter()
            .enumerate()
            .filter_map(|(person, keypoints)| {
                match self.reconstruct_person(frame_index, person, keypoints, depth) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        log::warn!("{e}, person skipped");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        log::debug!(
            "frame {frame_index}: {} people, {} keypoints defined",
            people.len(),
            people.iter().map(Person3D::present_count).sum::<usize>()
        );
        Frame::new(frame_index, people)
    }

    pub fn reconstruct(&self, input: &FrameInput) -> Frame {
        self.reconstruct_frame(input.index, &input.depth, &input.people)
    }
}

impl<Camera> KeypointDeprojector<Camera>
where
    Camera: CameraTrait + Sync,
{
    /// 多帧并行处理，输出顺序与输入一致
    pub fn reconstruct_sequence(&self, inputs: &[FrameInput], multiple_thread: bool) -> Vec<Frame> {
        // 并行之前按帧顺序确定 K
        if self.keypoint_count().is_none() {
            let first = inputs
                .iter()
                .flat_map(|input| input.people.iter())
                .find_map(|keypoints| self.resolve_keypoint_count(keypoints));
            if let Some(k) = first {
                log::info!("keypoints per person inferred as {k}");
            }
        }
        if multiple_thread {
            inputs.par_iter().map(|input| self.reconstruct(input)).collect()
        } else {
            inputs.iter().map(|input| self.reconstruct(input)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeParameters;

    const K: usize = 4;

    fn deprojector() -> KeypointDeprojector<PinholeCamera> {
        let camera =
            PinholeCamera::new(PinholeParameters::new(600.0, 600.0, 320.0, 240.0, 640, 480))
                .unwrap();
        KeypointDeprojector::from_pinhole(camera)
            .unwrap()
            .with_keypoint_count(Some(K))
    }

    fn depth_filled(raw: u16) -> DepthMap {
        DepthMap::from_elem((480, 640), raw)
    }

    fn person(points: &[(f64, f64, f64)]) -> Vec<f64> {
        let mut flat: Vec<f64> = points.iter().flat_map(|&(u, v, c)| [u, v, c]).collect();
        flat.resize(3 * K, 0.0);
        flat
    }

    #[test]
    fn principal_point_at_one_meter() {
        let d = deprojector();
        let frame = d.reconstruct_frame(0, &depth_filled(1000), &[person(&[(320.0, 240.0, 0.9)])]);
        assert_eq!(frame.people.len(), 1);
        let p = frame.people[0].point(0).unwrap();
        assert!(p.x.abs() < 1e-12 && p.y.abs() < 1e-12);
        assert!((p.z - 1.0).abs() < 1e-12);
        // 其余关键点置信度为 0
        assert_eq!(frame.people[0].present_count(), 1);
        assert_eq!(frame.people[0].len(), K);
    }

    #[test]
    fn low_confidence_is_absent() {
        let d = deprojector();
        let frame = d.reconstruct_frame(0, &depth_filled(1000), &[person(&[(320.0, 240.0, 0.05)])]);
        assert_eq!(frame.people[0].keypoints[0], Keypoint3D::Absent);
    }

    #[test]
    fn confidence_gate_over_grid() {
        let d = deprojector();
        let depth = depth_filled(1500);
        for step in 0..100 {
            let confidence = step as f64 * 0.001;
            for &(u, v) in &[(0.0, 0.0), (320.0, 240.0), (639.0, 479.0)] {
                let kp = Keypoint2D::from_triple(&[u, v, confidence]);
                assert_eq!(d.deproject_keypoint(&kp, &depth), Keypoint3D::Absent);
            }
        }
        let kp = Keypoint2D::from_triple(&[10.0, 10.0, 0.1]);
        assert!(d.deproject_keypoint(&kp, &depth).is_present());
    }

    #[test]
    fn out_of_bounds_is_absent() {
        let d = deprojector();
        let depth = depth_filled(1000);
        for &(u, v) in &[
            (-1.0, 10.0),
            (10.0, -1.0),
            (640.0, 10.0),
            (10.0, 480.0),
            (1000.0, 1000.0),
            (-5000.0, 240.0),
        ] {
            for &confidence in &[0.1, 0.5, 1.0] {
                let kp = Keypoint2D::from_triple(&[u, v, confidence]);
                assert_eq!(d.deproject_keypoint(&kp, &depth), Keypoint3D::Absent);
            }
        }
    }

    #[test]
    fn zero_depth_is_absent() {
        let d = deprojector();
        let depth = depth_filled(0);
        for u in (0..640).step_by(37) {
            for v in (0..480).step_by(41) {
                let kp = Keypoint2D {
                    u,
                    v,
                    confidence: 1.0,
                };
                assert_eq!(d.deproject_keypoint(&kp, &depth), Keypoint3D::Absent);
            }
        }
    }

    #[test]
    fn reads_depth_row_major() {
        let d = deprojector();
        let mut depth = depth_filled(0);
        depth[[100, 400]] = 2000;
        let kp = Keypoint2D {
            u: 400,
            v: 100,
            confidence: 1.0,
        };
        let p = *d.deproject_keypoint(&kp, &depth).point().unwrap();
        assert!((p.z - 2.0).abs() < 1e-12);
        assert!((p.x - (400.0 - 320.0) * 2.0 / 600.0).abs() < 1e-12);
        assert!((p.y - (100.0 - 240.0) * 2.0 / 600.0).abs() < 1e-12);
        let swapped = Keypoint2D {
            u: 100,
            v: 400,
            confidence: 1.0,
        };
        assert_eq!(d.deproject_keypoint(&swapped, &depth), Keypoint3D::Absent);
    }

    #[test]
    fn malformed_person_is_dropped() {
        let d = deprojector();
        let depth = depth_filled(1000);
        let good = person(&[(320.0, 240.0, 0.9)]);
        let short = vec![320.0, 240.0, 0.9];
        let frame = d.reconstruct_frame(3, &depth, &[short.clone(), good]);
        assert_eq!(frame.index, 3);
        assert_eq!(frame.people.len(), 1);
        assert!(frame.people[0].point(0).is_some());

        let err = d.reconstruct_person(3, 0, &short, &depth).unwrap_err();
        assert!(matches!(
            err,
            PoseError::MalformedInput {
                frame: 3,
                person: 0,
                len: 3,
                expected: 12
            }
        ));
    }

    #[test]
    fn inferred_keypoint_count_requires_triples() {
        let d = deprojector().with_keypoint_count(None);
        let depth = depth_filled(1000);
        assert_eq!(
            d.reconstruct_person(0, 0, &[1.0, 2.0, 0.5, 3.0, 4.0, 0.5], &depth)
                .unwrap()
                .len(),
            2
        );
        assert!(d.reconstruct_person(0, 0, &[1.0, 2.0], &depth).is_err());
        assert_eq!(d.keypoint_count(), Some(2));
    }

    #[test]
    fn inferred_keypoint_count_is_fixed_by_first_person() {
        let d = deprojector().with_keypoint_count(None);
        let depth = depth_filled(1000);
        let two = vec![320.0, 240.0, 0.9, 330.0, 240.0, 0.9];
        let three = vec![320.0, 240.0, 0.9, 330.0, 240.0, 0.9, 340.0, 240.0, 0.9];
        let frame = d.reconstruct_frame(0, &depth, &[two.clone(), three.clone()]);
        assert_eq!(frame.people.len(), 1);
        assert_eq!(frame.people[0].len(), 2);
        assert!(matches!(
            d.reconstruct_person(1, 0, &three, &depth),
            Err(PoseError::MalformedInput {
                len: 9,
                expected: 6,
                ..
            })
        ));
    }

    #[test]
    fn sequence_infers_keypoint_count_from_first_frame() {
        let d = deprojector().with_keypoint_count(None);
        let three = vec![320.0, 240.0, 0.9, 330.0, 240.0, 0.9, 340.0, 240.0, 0.9];
        let two = vec![320.0, 240.0, 0.9, 330.0, 240.0, 0.9];
        let inputs: Vec<FrameInput> = (0..8)
            .map(|i| FrameInput {
                index: i,
                depth: depth_filled(1000),
                people: if i == 0 {
                    vec![vec![], three.clone()]
                } else {
                    vec![two.clone(), three.clone()]
                },
            })
            .collect();
        let frames = d.reconstruct_sequence(&inputs, true);
        assert_eq!(d.keypoint_count(), Some(3));
        for frame in &frames {
            assert_eq!(frame.people.len(), 1);
            assert_eq!(frame.people[0].len(), 3);
        }
    }

    #[test]
    fn non_finite_values_are_absent() {
        let d = deprojector();
        let depth = depth_filled(1000);
        let p = d
            .reconstruct_person(0, 0, &person(&[(f64::NAN, 240.0, 0.9)]), &depth)
            .unwrap();
        assert_eq!(p.keypoints[0], Keypoint3D::Absent);
    }

    #[test]
    fn sequence_keeps_order() {
        let d = deprojector();
        let inputs: Vec<FrameInput> = (0..16)
            .map(|i| FrameInput {
                index: i,
                depth: depth_filled(500 + i as u16),
                people: vec![person(&[(320.0, 240.0, 0.9)])],
            })
            .collect();
        let parallel = d.reconstruct_sequence(&inputs, true);
        let serial = d.reconstruct_sequence(&inputs, false);
        assert_eq!(parallel, serial);
        for (i, frame) in parallel.iter().enumerate() {
            assert_eq!(frame.index, i as i64);
            let z = frame.people[0].point(0).unwrap().z;
            assert!((z - (500 + i) as f64 * 0.001).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_bad_depth_scale() {
        let camera =
            PinholeCamera::new(PinholeParameters::new(600.0, 600.0, 320.0, 240.0, 640, 480))
                .unwrap();
        assert!(matches!(
            KeypointDeprojector::new(camera, 0.0),
            Err(PoseError::Configuration(_))
        ));
    }
}
