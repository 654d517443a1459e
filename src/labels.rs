// 该文件是 Zhushi （注视） 项目的一部分。
// src/labels.rs - 类别标签表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Zhushi 项目贡献者

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("标签文件为空: {0}")]
  Empty(String),
}

/// 类别标签表：行号即类别 id（从 0 起），启动时一次性加载，
/// 进程生命周期内不可变，只读共享无需同步。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  labels: Box<[String]>,
}

impl LabelTable {
  /// 从按行分隔的标签文件加载；文件不可读或为空视为启动致命错误
  pub fn load(path: &Path) -> Result<Self, LabelError> {
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let table = Self::from_lines(text.lines());
    if table.is_empty() {
      return Err(LabelError::Empty(path.display().to_string()));
    }
    debug!("载入 {} 个类别标签", table.len());
    Ok(table)
  }

  pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
    Self {
      labels: lines.into_iter().map(str::to_owned).collect(),
    }
  }

  /// 类别 id 到标签的映射；越界返回 None
  pub fn get(&self, id: usize) -> Option<&str> {
    self.labels.get(id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn line_index_is_class_id() {
    let table = LabelTable::from_lines(["person", "bicycle", "car"]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0), Some("person"));
    assert_eq!(table.get(2), Some("car"));
    assert_eq!(table.get(3), None);
  }

  #[test]
  fn loading_same_asset_twice_is_deterministic() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "person\nbicycle\ncar\ndog").unwrap();

    let first = LabelTable::load(file.path()).unwrap();
    let second = LabelTable::load(file.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get(3), Some("dog"));
  }

  #[test]
  fn empty_asset_is_fatal() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(matches!(
      LabelTable::load(file.path()),
      Err(LabelError::Empty(_))
    ));
  }

  #[test]
  fn unreadable_asset_is_fatal() {
    assert!(matches!(
      LabelTable::load(Path::new("/nonexistent/labels.txt")),
      Err(LabelError::Io(_))
    ));
  }
}
