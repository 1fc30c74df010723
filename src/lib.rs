//! 深度相机 + 二维关键点 -> 三维人体姿态轨迹 -> 肢体距离序列
//!
//! nalgebra
//! https://docs.rs/nalgebra/latest/nalgebra/
//!
//! ndarray
//! https://docs.rs/ndarray/latest/ndarray/all.html
//!
//! opencv (feature = "opencv")
//! https://docs.rs/opencv/latest/opencv/all.html

pub mod camera;
pub mod config;
pub mod dataset;
pub mod deprojector;
pub mod error;
pub mod kinematics;
pub mod pipeline;
pub mod skeleton;
pub mod trajectory;
pub mod types;

pub use error::{PoseError, Result};
