//! 三维关键点轨迹
//!
//! [TrajectoryStore] 只允许按帧号递增追加，`finalize` 之后得到只读的 [Trajectory]。

mod file;
pub use file::{load, save, FrameRecord};

use crate::error::{PoseError, Result};
use crate::types::{Frame, FrameId};

/// 构建中的轨迹，单一写者
#[derive(Debug, Default)]
pub struct TrajectoryStore {
    frames: Vec<Frame>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// 帧号不大于上一帧时拒绝，已有内容不变
    pub fn append(&mut self, frame: Frame) -> Result<()> {
        if let Some(last) = self.frames.last() {
            if frame.index <= last.index {
                return Err(PoseError::OutOfOrder {
                    previous: last.index,
                    next: frame.index,
                });
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last_index(&self) -> Option<FrameId> {
        self.frames.last().map(|f| f.index)
    }

    pub fn finalize(self) -> Result<Trajectory> {
        Trajectory::from_frames(self.frames)
    }
}

/// 冻结后的轨迹，帧号严格递增
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    frames: Vec<Frame>,
}

impl Trajectory {
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self> {
        if let Some(w) = frames.windows(2).find(|w| w[1].index <= w[0].index) {
            return Err(PoseError::OutOfOrder {
                previous: w[0].index,
                next: w[1].index,
            });
        }
        Ok(Self { frames })
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: FrameId) -> Option<&Frame> {
        self.frames
            .binary_search_by_key(&index, |f| f.index)
            .ok()
            .map(|i| &self.frames[i])
    }

    /// `[start, end]` 闭区间内的帧
    pub fn window(&self, start: FrameId, end: FrameId) -> &[Frame] {
        let lo = self.frames.partition_point(|f| f.index < start);
        let hi = self.frames.partition_point(|f| f.index <= end);
        if lo >= hi {
            return &[];
        }
        &self.frames[lo..hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Keypoint3D, Person3D};

    fn frame(index: FrameId) -> Frame {
        Frame::new(index, vec![Person3D::new(vec![Keypoint3D::new(0.0, 0.0, index as f64)])])
    }

    #[test]
    fn append_then_finalize() {
        let mut store = TrajectoryStore::new();
        for i in [0, 1, 3, 7] {
            store.append(frame(i)).unwrap();
        }
        assert_eq!(store.last_index(), Some(7));
        let trajectory = store.finalize().unwrap();
        assert_eq!(trajectory.len(), 4);
        assert_eq!(trajectory.frame(3).unwrap().index, 3);
        assert!(trajectory.frame(2).is_none());
    }

    #[test]
    fn out_of_order_append_is_rejected() {
        let mut store = TrajectoryStore::new();
        store.append(frame(5)).unwrap();
        assert!(matches!(
            store.append(frame(5)),
            Err(PoseError::OutOfOrder {
                previous: 5,
                next: 5
            })
        ));
        assert!(store.append(frame(4)).is_err());
        store.append(frame(6)).unwrap();
        // 被拒绝的帧不影响已有的有效前缀
        let trajectory = store.finalize().unwrap();
        let indices: Vec<FrameId> = trajectory.frames().iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![5, 6]);
    }

    #[test]
    fn from_frames_validates_order() {
        assert!(Trajectory::from_frames(vec![frame(2), frame(1)]).is_err());
        assert!(Trajectory::from_frames(vec![]).unwrap().is_empty());
    }

    #[test]
    fn window_is_inclusive() {
        let trajectory = Trajectory::from_frames((0..10).map(frame).collect()).unwrap();
        let window = trajectory.window(3, 6);
        assert_eq!(window.first().unwrap().index, 3);
        assert_eq!(window.last().unwrap().index, 6);
        assert_eq!(window.len(), 4);
        assert!(trajectory.window(20, 30).is_empty());
        assert!(trajectory.window(6, 3).is_empty());
        assert_eq!(trajectory.window(-5, 0).len(), 1);
    }
}
