//! 相机模型
//!
//! 像素 + 深度 -> 相机坐标系三维点，以及反方向的投影。

mod pinhole_camera;
pub use pinhole_camera::{DistortionModel, PinholeCamera, PinholeParameters};

use std::path::Path;

use nalgebra::{Point2, Point3};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraType {
    /// - 最简单的相机模型，假设光线沿直线传播，不考虑镜头畸变。
    /// - 只包含内参（焦距、主点）。深度相机对齐后的彩色流通常使用该模型。
    Pinhole,
    /// - Pinhole 模型的扩展，考虑镜头的径向和切向畸变 (Brown-Conrady)。
    PinholeFull,
}

/// 相机的trait
pub trait CameraTrait {
    /// 像素坐标 -> 归一化平面上的点 (z = 1)
    fn lift_projective(&self, p: &Point2<f64>) -> Point3<f64>;

    /// 相机坐标系三维点 -> 像素坐标
    fn project(&self, p: &Point3<f64>) -> Point2<f64>;

    fn get_camera_type(&self) -> CameraType;

    /// 图像尺寸 (width, height)
    fn image_size(&self) -> (u32, u32);

    /// 反投影。`z` 必须已经是米，这里不做深度单位换算。
    #[inline]
    fn deproject(&self, u: f64, v: f64, z: f64) -> Point3<f64> {
        let ray = self.lift_projective(&Point2::new(u, v));
        Point3::new(ray.x * z, ray.y * z, z)
    }

    /// 判断像素是否在 `[0, width) x [0, height)` 内
    #[inline]
    fn in_image(&self, u: i64, v: i64) -> bool {
        let (width, height) = self.image_size();
        u >= 0 && v >= 0 && u < width as i64 && v < height as i64
    }
}

/// 相机参数的trait
pub trait CameraParametersTrait: Sized {
    const CAMERA_TYPE: &'static str;

    fn read_from_json(path: &Path) -> Result<Self>;
    fn write_to_json(&self, path: &Path) -> Result<()>;

    #[cfg(feature = "opencv")]
    fn read_from_yaml(path: &str) -> Result<Self>;
    #[cfg(feature = "opencv")]
    fn write_to_yaml(&self, path: &str) -> Result<()>;
}
