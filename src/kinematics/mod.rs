//! 肢体运动学
//!
//! 轨迹 + 骨架拓扑 -> 每个肢体在帧窗口内的 dx, dy, dz 和欧氏距离序列，
//! 缺失帧按肢体、按轴线性插值。

mod interpolate;
mod output;

pub use interpolate::{interpolate, interpolate_over};
pub use output::{LimbCsvRow, LimbFrameRecord};

use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::DISTANCE_SCALE;
use crate::skeleton::{LimbEdge, Skeleton};
use crate::trajectory::Trajectory;
use crate::types::{Frame, FrameId};

/// 一帧中一个肢体的各轴差值和长度，单位由 scale 决定（默认厘米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimbSample {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub euclidean: f64,
}

impl LimbSample {
    pub fn between(a: &Point3<f64>, b: &Point3<f64>, scale: f64) -> Self {
        let d = b - a;
        let diff = d.abs() * scale;
        Self {
            dx: diff.x,
            dy: diff.y,
            dz: diff.z,
            euclidean: d.norm() * scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Dx,
    Dy,
    Dz,
    Euclidean,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Dx, Axis::Dy, Axis::Dz, Axis::Euclidean];

    #[inline]
    pub fn of(&self, sample: &LimbSample) -> f64 {
        match self {
            Axis::Dx => sample.dx,
            Axis::Dy => sample.dy,
            Axis::Dz => sample.dz,
            Axis::Euclidean => sample.euclidean,
        }
    }
}

/// 一个肢体在窗口内每一帧的样本，缺失为 None
#[derive(Debug, Clone, PartialEq)]
pub struct LimbSeries {
    pub edge: LimbEdge,
    pub name: String,
    pub samples: Vec<Option<LimbSample>>,
}

impl LimbSeries {
    pub fn axis(&self, axis: Axis) -> Vec<Option<f64>> {
        self.samples
            .iter()
            .map(|s| s.as_ref().map(|s| axis.of(s)))
            .collect()
    }

    pub fn known_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }

    /// 按帧号插值每个轴
    pub fn interpolated(&self, frames: &[FrameId]) -> InterpolatedLimb {
        let xs: Vec<f64> = frames.iter().map(|&f| f as f64).collect();
        let [dx, dy, dz, euclidean] = Axis::ALL.map(|axis| interpolate_over(&xs, &self.axis(axis)));
        InterpolatedLimb {
            name: self.name.clone(),
            dx,
            dy,
            dz,
            euclidean,
        }
    }
}

/// 插值后的肢体序列。已知样本少于 2 个的轴保持原样，可能仍含 None。
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedLimb {
    pub name: String,
    pub dx: Vec<Option<f64>>,
    pub dy: Vec<Option<f64>>,
    pub dz: Vec<Option<f64>>,
    pub euclidean: Vec<Option<f64>>,
}

/// 窗口内所有肢体的序列
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LimbKinematics {
    /// 窗口内实际存在的帧号
    pub frames: Vec<FrameId>,
    /// 每个不同的肢体名一条，按拓扑中首次出现的顺序
    pub series: Vec<LimbSeries>,
}

impl LimbKinematics {
    pub fn get(&self, name: &str) -> Option<&LimbSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn interpolated(&self) -> Vec<InterpolatedLimb> {
        self.series
            .par_iter()
            .map(|s| s.interpolated(&self.frames))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LimbKinematicsEngine {
    skeleton: Skeleton,
    /// 米 -> 目标单位
    scale: f64,
    /// 每帧分析第几个人
    person: usize,
}

impl Default for LimbKinematicsEngine {
    fn default() -> Self {
        Self::new(Skeleton::body_135())
    }
}

impl LimbKinematicsEngine {
    pub fn new(skeleton: Skeleton) -> Self {
        Self {
            skeleton,
            scale: DISTANCE_SCALE,
            person: 0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_person(mut self, person: usize) -> Self {
        self.person = person;
        self
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// 一帧中每个肢体的样本，顺序与 `edges` 一致。
    /// 索引越界或端点未定义的肢体在该帧缺失。
    fn sample_frame(&self, frame: &Frame, edges: &[LimbEdge]) -> Vec<Option<LimbSample>> {
        let Some(person) = frame.people.get(self.person) else {
            return vec![None; edges.len()];
        };
        edges
            .iter()
            .map(|edge| {
                if !edge.fits(person.len()) {
                    return None;
                }
                let a = person.point(edge.a)?;
                let b = person.point(edge.b)?;
                Some(LimbSample::between(a, b, self.scale))
            })
            .collect()
    }

    /// `[frame_start, frame_end]` 内的帧逐帧采样；窗口外的帧完全不参与
    pub fn compute_series(
        &self,
        trajectory: &Trajectory,
        frame_start: FrameId,
        frame_end: FrameId,
    ) -> LimbKinematics {
        let window = trajectory.window(frame_start, frame_end);

        // 重复的肢体只算一次
        let edges = self.skeleton.unique_edges();

        let rows: Vec<Vec<Option<LimbSample>>> = window
            .par_iter()
            .map(|frame| self.sample_frame(frame, &edges))
            .collect();

        let series = edges
            .iter()
            .enumerate()
            .map(|(i, edge)| LimbSeries {
                edge: *edge,
                name: edge.name(),
                samples: rows.iter().map(|row| row[i]).collect(),
            })
            .collect::<Vec<_>>();

        log::info!(
            "limbs: {} frames in [{frame_start}, {frame_end}], {} limbs, {} samples",
            window.len(),
            series.len(),
            series.iter().map(LimbSeries::known_count).sum::<usize>()
        );
        LimbKinematics {
            frames: window.iter().map(|f| f.index).collect(),
            series,
        }
    }
}

/// 使用第一个人计算肢体序列
pub fn compute_series(
    trajectory: &Trajectory,
    skeleton: &Skeleton,
    frame_start: FrameId,
    frame_end: FrameId,
    scale: f64,
) -> LimbKinematics {
    LimbKinematicsEngine::new(skeleton.clone())
        .with_scale(scale)
        .compute_series(trajectory, frame_start, frame_end)
}
