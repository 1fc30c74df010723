//! 骨架拓扑
//!
//! OpenPose BODY_135 的肢体连接表：身体、左手、右手。
//! 只读，进程内共享。

use std::fmt::Display;

/// 两个关键点索引组成的肢体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimbEdge {
    pub a: usize,
    pub b: usize,
}

impl LimbEdge {
    pub const fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }

    /// `"<a>_<b>"`
    pub fn name(&self) -> String {
        format!("{}_{}", self.a, self.b)
    }

    /// 两个端点都在 `[0, keypoint_count)` 内
    #[inline]
    pub fn fits(&self, keypoint_count: usize) -> bool {
        self.a < keypoint_count && self.b < keypoint_count
    }
}

impl Display for LimbEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.a, self.b)
    }
}

const fn e(a: usize, b: usize) -> LimbEdge {
    LimbEdge::new(a, b)
}

/// 肩、肘、腕，以及腕到指尖
#[rustfmt::skip]
pub const BODY_135_LIMBS: &[LimbEdge] = &[
    e(5, 7), e(5, 11), e(5, 17), e(6, 8), e(6, 12), e(6, 17), e(7, 9), e(8, 10),
    e(10, 48), e(10, 52), e(10, 56), e(10, 60), e(10, 64),
    e(9, 28), e(9, 32), e(9, 36), e(9, 40), e(9, 44),
];

/// 左手 25..=44
#[rustfmt::skip]
pub const BODY_135_LEFT_HAND: &[LimbEdge] = &[
    e(25, 26), e(26, 27), e(27, 28),
    e(29, 30), e(30, 31), e(31, 32),
    e(33, 34), e(34, 35), e(35, 36),
    e(37, 38), e(38, 39), e(39, 40),
    e(41, 42), e(42, 43), e(43, 44),
    // 腕到指根
    e(9, 25), e(9, 29), e(9, 33), e(9, 41), e(9, 37),
];

/// 右手 45..=64
#[rustfmt::skip]
pub const BODY_135_RIGHT_HAND: &[LimbEdge] = &[
    e(45, 46), e(46, 47), e(47, 48),
    e(49, 50), e(50, 51), e(51, 52),
    e(53, 54), e(54, 55), e(55, 56),
    e(57, 58), e(58, 59), e(59, 60),
    e(61, 62), e(62, 63), e(63, 64),
    // 腕到指根
    e(10, 45), e(10, 49), e(10, 53), e(10, 61), e(10, 57),
];

/// 有序的肢体表，允许重复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    edges: Vec<LimbEdge>,
}

impl Skeleton {
    pub fn new(edges: Vec<LimbEdge>) -> Self {
        Self { edges }
    }

    /// 身体 + 左手 + 右手
    pub fn body_135() -> Self {
        Self::new(
            BODY_135_LIMBS
                .iter()
                .chain(BODY_135_LEFT_HAND)
                .chain(BODY_135_RIGHT_HAND)
                .copied()
                .collect(),
        )
    }

    #[inline]
    pub fn edges(&self) -> &[LimbEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 去重后的肢体，保持首次出现的顺序
    pub fn unique_edges(&self) -> Vec<LimbEdge> {
        let mut edges: Vec<LimbEdge> = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edges.contains(edge) {
                edges.push(*edge);
            }
        }
        edges
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::body_135()
    }
}
