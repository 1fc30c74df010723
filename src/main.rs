use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use depthpose::camera::PinholeCamera;
use depthpose::config::PipelineConfig;
use depthpose::dataset::{DefaultDepthDataset, DepthProviderTrait, OpenPoseDirectory};
use depthpose::deprojector::KeypointDeprojector;
use depthpose::skeleton::Skeleton;
use depthpose::{pipeline, trajectory};

#[derive(Debug, Parser)]
#[command(version, about = "Depth-camera 3D pose reconstruction and limb kinematics")]
struct Cli {
    /// 流水线配置 (JSON)，缺省使用内置默认值
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 二维关键点 + 深度帧 -> 三维轨迹
    Convert {
        /// OpenPose json 目录
        keypoints: PathBuf,
        /// 深度帧目录 (data.csv + data/)
        depth: PathBuf,
        /// 内参文件 (JSON；.yaml/.yml 需要 opencv feature)
        intrinsics: PathBuf,
        /// 输出 3d.json
        output: PathBuf,
        /// 深度帧为 16 位 PNG（需要 opencv feature）
        #[arg(long)]
        png: bool,
    },
    /// 三维轨迹 -> 肢体距离序列
    Limbs {
        input: PathBuf,
        /// 输出 limb_distances.json
        output: PathBuf,
        /// 插值后的序列 (CSV)
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        start: Option<i64>,
        #[arg(long)]
        end: Option<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_nanos()
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Convert {
            keypoints,
            depth,
            intrinsics,
            output,
            png,
        } => {
            let mut camera = load_camera(&intrinsics)
                .with_context(|| format!("loading intrinsics {}", intrinsics.display()))?;
            if !config.undistort {
                camera = camera.without_distortion();
            }
            log::info!(
                "camera intrinsics: fx={} fy={} ppx={} ppy={} depth_scale={}",
                camera.parameters.fx,
                camera.parameters.fy,
                camera.parameters.ppx,
                camera.parameters.ppy,
                camera.depth_scale()
            );
            let (width, height) = (
                camera.parameters.width as usize,
                camera.parameters.height as usize,
            );
            let deprojector = KeypointDeprojector::from_pinhole(camera)?
                .with_confidence_threshold(config.confidence_threshold)
                .with_keypoint_count(config.keypoints_per_person);
            let keypoints = OpenPoseDirectory::new(&keypoints)?;
            if png {
                #[cfg(feature = "opencv")]
                {
                    let depth = depthpose::dataset::PngDepthDataset::new(&depth, width, height)?;
                    convert_with(&keypoints, &depth, &deprojector, &config, &output)?;
                }
                #[cfg(not(feature = "opencv"))]
                anyhow::bail!("--png needs a build with the opencv feature");
            } else {
                let depth = DefaultDepthDataset::new(&depth, width, height)?;
                convert_with(&keypoints, &depth, &deprojector, &config, &output)?;
            }
        }
        Commands::Limbs {
            input,
            output,
            csv,
            start,
            end,
        } => {
            config.frame_start = start.unwrap_or(config.frame_start);
            config.frame_end = end.unwrap_or(config.frame_end);
            config.validate()?;
            let kinematics = pipeline::limbs(&input, Skeleton::body_135(), &config)
                .with_context(|| format!("computing limbs from {}", input.display()))?;
            kinematics.save_json(&output)?;
            if let Some(csv) = csv {
                kinematics.save_interpolated_csv(&csv)?;
            }
        }
    }
    Ok(())
}

/// `.yaml`/`.yml` 按 FileStorage 格式读取，其余按 JSON
fn load_camera(path: &Path) -> anyhow::Result<PinholeCamera> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        #[cfg(feature = "opencv")]
        {
            use depthpose::camera::{CameraParametersTrait, PinholeParameters};

            let path_str = path.to_str().context("intrinsics path is not utf-8")?;
            return Ok(PinholeCamera::new(PinholeParameters::read_from_yaml(path_str)?)?);
        }
        #[cfg(not(feature = "opencv"))]
        anyhow::bail!("YAML intrinsics need a build with the opencv feature");
    }
    Ok(PinholeCamera::from_json(path)?)
}

fn convert_with<Provider: DepthProviderTrait>(
    keypoints: &OpenPoseDirectory,
    depth: &Provider,
    deprojector: &KeypointDeprojector<PinholeCamera>,
    config: &PipelineConfig,
    output: &Path,
) -> anyhow::Result<()> {
    let (trajectory, summary) = pipeline::convert(keypoints, depth, deprojector, config)?;
    trajectory::save(&trajectory, output)?;
    if config.keypoints_per_person.is_none() {
        log::info!(
            "load {} with keypoints_per_person = {:?}",
            output.display(),
            summary.keypoint_count
        );
    }
    Ok(())
}
