use std::path::Path;

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use super::{CameraParametersTrait, CameraTrait, CameraType};
use crate::error::{PoseError, Result};

/// 去畸变迭代次数
const UNDISTORT_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    #[default]
    None,
    BrownConrady,
}

/// 深度相机对齐后彩色流的内参
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinholeParameters {
    #[serde(default)]
    pub camera_name: String,
    // size
    #[serde(alias = "image_width")]
    pub width: u32,
    #[serde(alias = "image_height")]
    pub height: u32,
    // intrinsic
    pub fx: f64,
    pub fy: f64,
    #[serde(alias = "cx")]
    pub ppx: f64,
    #[serde(alias = "cy")]
    pub ppy: f64,
    // distortion
    #[serde(default)]
    pub model: DistortionModel,
    #[serde(default)]
    pub k1: f64,
    #[serde(default)]
    pub k2: f64,
    #[serde(default)]
    pub p1: f64,
    #[serde(default)]
    pub p2: f64,
    #[serde(default)]
    pub k3: f64,
    /// 每个原始深度单位对应的米数
    #[serde(default = "default_depth_scale")]
    pub depth_scale: f64,
}

fn default_depth_scale() -> f64 {
    0.001
}

impl PinholeParameters {
    pub fn new(fx: f64, fy: f64, ppx: f64, ppy: f64, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            ppx,
            ppy,
            depth_scale: default_depth_scale(),
            ..Default::default()
        }
    }

    /// 内参必须填写完整才能使用
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PoseError::Configuration(format!(
                "image size {}x{} is not populated",
                self.width, self.height
            )));
        }
        if !(self.fx > 0.0 && self.fy > 0.0) {
            return Err(PoseError::Configuration(format!(
                "focal length ({}, {}) must be positive",
                self.fx, self.fy
            )));
        }
        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return Err(PoseError::Configuration(format!(
                "depth scale {} must be positive",
                self.depth_scale
            )));
        }
        Ok(())
    }
}

impl CameraParametersTrait for PinholeParameters {
    const CAMERA_TYPE: &'static str = "PINHOLE";

    fn read_from_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PoseError::io(path, e))?;
        let parameters: Self = serde_json::from_str(&content)
            .map_err(|e| PoseError::Configuration(format!("{}: {e}", path.display())))?;
        parameters.validate()?;
        Ok(parameters)
    }

    fn write_to_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| PoseError::io(path, e))
    }

    #[cfg(feature = "opencv")]
    fn read_from_yaml(path: &str) -> Result<Self> {
        use opencv::core::{FileNodeTraitConst, FileStorageTraitConst};

        let fs = opencv::core::FileStorage::new(
            path,
            opencv::core::FileStorage_Mode::READ as i32,
            "utf-8",
        )?;
        if !fs.is_opened()? {
            return Err(PoseError::Configuration(format!("cannot open {path}")));
        }
        let model_type = fs.get("model_type")?.to_string()?;
        if model_type != Self::CAMERA_TYPE {
            return Err(PoseError::Configuration(format!(
                "model type {model_type} is not pinhole"
            )));
        }
        let camera_name = fs.get("camera_name")?.to_string()?;
        let width = fs.get("image_width")?.to_i32()? as u32;
        let height = fs.get("image_height")?.to_i32()? as u32;
        // distortion，缺失的节点按 0 处理
        let distortion_parameters = fs.get("distortion_parameters")?;
        let k1 = yaml_f64_or(&distortion_parameters.get("k1")?, 0.0)?;
        let k2 = yaml_f64_or(&distortion_parameters.get("k2")?, 0.0)?;
        let p1 = yaml_f64_or(&distortion_parameters.get("p1")?, 0.0)?;
        let p2 = yaml_f64_or(&distortion_parameters.get("p2")?, 0.0)?;
        let k3 = yaml_f64_or(&distortion_parameters.get("k3")?, 0.0)?;
        // intrinsic
        let projection_parameters = fs.get("projection_parameters")?;
        let fx = projection_parameters.get("fx")?.to_f64()?;
        let fy = projection_parameters.get("fy")?.to_f64()?;
        let ppx = projection_parameters.get("cx")?.to_f64()?;
        let ppy = projection_parameters.get("cy")?.to_f64()?;
        let depth_scale = yaml_f64_or(&fs.get("depth_scale")?, default_depth_scale())?;

        let model_node = fs.get("distortion_model")?;
        let model = if model_node.empty()? {
            if [k1, k2, p1, p2, k3].iter().any(|k| *k != 0.0) {
                DistortionModel::BrownConrady
            } else {
                DistortionModel::None
            }
        } else {
            let name = model_node.to_string()?;
            serde_json::from_value(serde_json::Value::String(name.clone())).map_err(|_| {
                PoseError::Configuration(format!("unknown distortion model {name}"))
            })?
        };
        let parameters = Self {
            camera_name,
            width,
            height,
            fx,
            fy,
            ppx,
            ppy,
            model,
            k1,
            k2,
            p1,
            p2,
            k3,
            depth_scale,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    #[cfg(feature = "opencv")]
    fn write_to_yaml(&self, path: &str) -> Result<()> {
        use opencv::core::FileStorageTrait;

        let model = match self.model {
            DistortionModel::None => "none",
            DistortionModel::BrownConrady => "brown_conrady",
        };
        let mut fs = opencv::core::FileStorage::new(
            path,
            opencv::core::FileStorage_Mode::WRITE as i32,
            "utf-8",
        )?;
        fs.write_str("model_type", Self::CAMERA_TYPE)?;
        fs.write_str("camera_name", &self.camera_name)?;
        fs.write_i32("image_width", self.width as i32)?;
        fs.write_i32("image_height", self.height as i32)?;
        fs.write_f64("depth_scale", self.depth_scale)?;
        fs.write_str("distortion_model", model)?;
        fs.start_write_struct("distortion_parameters", opencv::core::FileNode_MAP, "")?;
        fs.write_f64("k1", self.k1)?;
        fs.write_f64("k2", self.k2)?;
        fs.write_f64("p1", self.p1)?;
        fs.write_f64("p2", self.p2)?;
        fs.write_f64("k3", self.k3)?;
        fs.end_write_struct()?;
        fs.start_write_struct("projection_parameters", opencv::core::FileNode_MAP, "")?;
        fs.write_f64("fx", self.fx)?;
        fs.write_f64("fy", self.fy)?;
        fs.write_f64("cx", self.ppx)?;
        fs.write_f64("cy", self.ppy)?;
        fs.end_write_struct()?;
        fs.release()?;
        Ok(())
    }
}

/// FileStorage 对缺失的节点返回空节点而不是错误
#[cfg(feature = "opencv")]
fn yaml_f64_or(node: &opencv::core::FileNode, default: f64) -> Result<f64> {
    use opencv::core::FileNodeTraitConst;

    if node.empty()? {
        Ok(default)
    } else {
        Ok(node.to_f64()?)
    }
}

#[derive(Debug, Clone)]
pub struct PinholeCamera {
    pub parameters: PinholeParameters,
    pub has_distortion: bool,
    pub inv_k11: f64,
    pub inv_k13: f64,
    pub inv_k22: f64,
    pub inv_k23: f64,
}

impl PinholeCamera {
    pub fn new(parameters: PinholeParameters) -> Result<Self> {
        parameters.validate()?;
        let has_distortion = parameters.model == DistortionModel::BrownConrady
            && [
                parameters.k1,
                parameters.k2,
                parameters.p1,
                parameters.p2,
                parameters.k3,
            ]
            .iter()
            .any(|k| *k != 0.0);
        Ok(Self {
            inv_k11: 1.0 / parameters.fx,
            inv_k13: -parameters.ppx / parameters.fx,
            inv_k22: 1.0 / parameters.fy,
            inv_k23: -parameters.ppy / parameters.fy,
            has_distortion,
            parameters,
        })
    }

    pub fn from_json(camera_file: &Path) -> Result<Self> {
        Self::new(PinholeParameters::read_from_json(camera_file)?)
    }

    /// 忽略畸变系数，按理想针孔模型反投影
    pub fn without_distortion(mut self) -> Self {
        self.has_distortion = false;
        self
    }

    #[inline]
    pub fn depth_scale(&self) -> f64 {
        self.parameters.depth_scale
    }

    /// 原始深度单位 -> 米
    #[inline]
    pub fn raw_to_meters(&self, raw: u16) -> f64 {
        raw as f64 * self.parameters.depth_scale
    }

    /// 归一化平面上的畸变量 (径向系数, 切向 dx, 切向 dy)
    #[inline]
    fn distortion(&self, x: f64, y: f64) -> (f64, f64, f64) {
        let PinholeParameters {
            k1, k2, k3, p1, p2, ..
        } = self.parameters;
        let r2 = x * x + y * y;
        let radial = 1.0 + ((k3 * r2 + k2) * r2 + k1) * r2;
        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (radial, dx, dy)
    }
}

impl CameraTrait for PinholeCamera {
    fn lift_projective(&self, p: &Point2<f64>) -> Point3<f64> {
        let x_d = self.inv_k11 * p.x + self.inv_k13;
        let y_d = self.inv_k22 * p.y + self.inv_k23;
        if !self.has_distortion {
            return Point3::new(x_d, y_d, 1.0);
        }
        // 不动点迭代去畸变
        let (mut x, mut y) = (x_d, y_d);
        for _ in 0..UNDISTORT_ITERATIONS {
            let (radial, dx, dy) = self.distortion(x, y);
            x = (x_d - dx) / radial;
            y = (y_d - dy) / radial;
        }
        Point3::new(x, y, 1.0)
    }

    fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let mut x = p.x / p.z;
        let mut y = p.y / p.z;
        if self.has_distortion {
            let (radial, dx, dy) = self.distortion(x, y);
            x = x * radial + dx;
            y = y * radial + dy;
        }
        Point2::new(
            self.parameters.fx * x + self.parameters.ppx,
            self.parameters.fy * y + self.parameters.ppy,
        )
    }

    fn get_camera_type(&self) -> CameraType {
        if self.has_distortion {
            CameraType::PinholeFull
        } else {
            CameraType::Pinhole
        }
    }

    fn image_size(&self) -> (u32, u32) {
        (self.parameters.width, self.parameters.height)
    }
}
