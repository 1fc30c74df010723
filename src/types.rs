use nalgebra::Point3;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// 帧号。深度流的序号或关键点文件名中的数字。
pub type FrameId = i64;

/// 二维关键点 (u, v, confidence)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint2D {
    pub u: i64,
    pub v: i64,
    pub confidence: f64,
}

impl Keypoint2D {
    /// 像素坐标向零截断
    #[inline]
    pub fn from_triple(triple: &[f64]) -> Self {
        Self {
            u: triple[0] as i64,
            v: triple[1] as i64,
            confidence: triple[2],
        }
    }
}

/// 相机坐标系下的三维关键点，单位米。
///
/// 无法得到可靠位置时为 [Keypoint3D::Absent]，
/// 序列化为 `[null, null, null]`，不会出现部分为空的点。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Keypoint3D {
    Present(Point3<f64>),
    #[default]
    Absent,
}

impl Keypoint3D {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::Present(Point3::new(x, y, z))
    }

    #[inline]
    pub fn point(&self) -> Option<&Point3<f64>> {
        match self {
            Self::Present(p) => Some(p),
            Self::Absent => None,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

impl From<Option<Point3<f64>>> for Keypoint3D {
    fn from(p: Option<Point3<f64>>) -> Self {
        p.map_or(Self::Absent, Self::Present)
    }
}

impl Serialize for Keypoint3D {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let triple: [Option<f64>; 3] = match self {
            Self::Present(p) => [Some(p.x), Some(p.y), Some(p.z)],
            Self::Absent => [None; 3],
        };
        triple.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Keypoint3D {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `null` 与 `[null, null, null]` 都视为未定义
        match Option::<[Option<f64>; 3]>::deserialize(deserializer)? {
            None | Some([None, None, None]) => Ok(Self::Absent),
            Some([Some(x), Some(y), Some(z)]) => Ok(Self::new(x, y, z)),
            Some(partial) => Err(de::Error::custom(format!(
                "partially undefined keypoint {partial:?}"
            ))),
        }
    }
}

/// 一个人的全部三维关键点，长度恒为 K
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Person3D {
    pub keypoints: Vec<Keypoint3D>,
}

impl Person3D {
    pub fn new(keypoints: Vec<Keypoint3D>) -> Self {
        Self { keypoints }
    }

    /// 全部未定义的人
    pub fn absent(keypoint_count: usize) -> Self {
        Self {
            keypoints: vec![Keypoint3D::Absent; keypoint_count],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// 索引越界或未定义时为 None
    #[inline]
    pub fn point(&self, index: usize) -> Option<&Point3<f64>> {
        self.keypoints.get(index).and_then(Keypoint3D::point)
    }

    pub fn present_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_present()).count()
    }
}

/// 一帧的三维重建结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub index: FrameId,
    pub people: Vec<Person3D>,
}

impl Frame {
    pub fn new(index: FrameId, people: Vec<Person3D>) -> Self {
        Self { index, people }
    }

    /// 所有人的关键点按顺序拼接，对应持久化格式中的 `keypoints_3d`
    pub fn flat_keypoints(&self) -> impl Iterator<Item = &Keypoint3D> {
        self.people.iter().flat_map(|p| p.keypoints.iter())
    }
}
