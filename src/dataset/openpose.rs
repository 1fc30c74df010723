use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PoseError, Result};
use crate::types::FrameId;

#[derive(Debug, Default, Deserialize)]
struct OpenPoseRecord {
    #[serde(default)]
    people: Vec<OpenPosePerson>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenPosePerson {
    #[serde(default)]
    pose_keypoints_2d: Vec<f64>,
}

/// 文件名中最后一段数字是 OpenPose 的帧计数，
/// 例如 `20250606_132745_000000000012_keypoints.json` -> 12
pub fn frame_id_from_name(name: &str) -> Option<FrameId> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .last()?
        .parse()
        .ok()
}

/// 文件排序键：全部数字拼接后按数值比较，不受位数限制
fn digit_sort_key(name: &str) -> (usize, String) {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    let trimmed = digits.trim_start_matches('0').to_string();
    (trimmed.len(), trimmed)
}

/// OpenPose `--write_json` 输出目录，每帧一个文件
#[derive(Debug, Default)]
pub struct OpenPoseDirectory {
    /// (帧号, 文件路径)，按帧号排序
    pub files: Vec<(FrameId, PathBuf)>,
}

impl OpenPoseDirectory {
    pub fn new(path: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(path).map_err(|e| PoseError::io(path, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PoseError::io(path, e))?;
            let file_path = entry.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = frame_id_from_name(&name) else {
                log::warn!("{:?}: no frame number in file name, skipped", file_path);
                continue;
            };
            files.push((id, name, file_path));
        }
        files.sort_by_cached_key(|(_, name, _)| digit_sort_key(name));
        let files: Vec<(FrameId, PathBuf)> =
            files.into_iter().map(|(id, _, path)| (id, path)).collect();
        log::info!("keypoint directory {:?}: {} files", path, files.len());
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 读取一帧，返回每个人的扁平数组 `[u, v, c, ...]`
    pub fn read_people(path: &Path) -> Result<Vec<Vec<f64>>> {
        let content = std::fs::read_to_string(path).map_err(|e| PoseError::io(path, e))?;
        let record: OpenPoseRecord =
            serde_json::from_str(&content).map_err(|e| PoseError::schema(path, e.to_string()))?;
        Ok(record
            .people
            .into_iter()
            .map(|p| p.pose_keypoints_2d)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_id_from_file_name() {
        assert_eq!(
            frame_id_from_name("color_output_000000000012_keypoints.json"),
            Some(12)
        );
        assert_eq!(frame_id_from_name("7.json"), Some(7));
        assert_eq!(frame_id_from_name("keypoints.json"), None);
        assert_eq!(
            frame_id_from_name("20250606_132745_000000000012_keypoints.json"),
            Some(12)
        );
    }

    #[test]
    fn long_date_stamped_names_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "20250606_132745_000000000012_keypoints.json",
            "20250606_132745_000000000003_keypoints.json",
            "20250606_132745_000000000100_keypoints.json",
            "no_frame_keypoints.json",
        ] {
            std::fs::write(dir.path().join(name), r#"{"people": []}"#).unwrap();
        }
        let directory = OpenPoseDirectory::new(dir.path()).unwrap();
        let ids: Vec<FrameId> = directory.files.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 12, 100]);
    }

    #[test]
    fn sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["f_10_keypoints.json", "f_2_keypoints.json", "f_1_keypoints.json"] {
            std::fs::write(dir.path().join(name), r#"{"people": []}"#).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let directory = OpenPoseDirectory::new(dir.path()).unwrap();
        let ids: Vec<FrameId> = directory.files.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[test]
    fn read_people_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.json");
        std::fs::write(
            &path,
            r#"{"version": 1.3, "people": [
                {"person_id": [-1], "pose_keypoints_2d": [320, 240, 0.9, 10, 20, 0.5]},
                {"person_id": [-1]}
            ]}"#,
        )
        .unwrap();
        let people = OpenPoseDirectory::read_people(&path).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0], vec![320.0, 240.0, 0.9, 10.0, 20.0, 0.5]);
        assert!(people[1].is_empty());

        std::fs::write(&path, "{}").unwrap();
        assert!(OpenPoseDirectory::read_people(&path).unwrap().is_empty());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            OpenPoseDirectory::read_people(&path),
            Err(PoseError::Schema { .. })
        ));
    }
}
