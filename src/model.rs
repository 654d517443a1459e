// 该文件是 Zhushi （注视） 项目的一部分。
// src/model.rs - 推理引擎边界与模型资产
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

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, info};

use crate::frame::InputTensor;

mod stub;
pub use self::stub::{ScriptedDetection, ScriptedEngine};

/// 引擎单帧可回填的最大检测数（在模型转换时固定）
pub const MAX_DETECTIONS: usize = 10;

/// 推理引擎的四个固定形状输出缓冲。
///
/// 以平铺定长数组加显式逻辑长度（count）表达，镜像与引擎的零拷贝约定；
/// 每次调用整体覆写。引擎约定 scores 按降序预排序，解码阶段依赖该约定。
#[derive(Debug, Clone)]
pub struct RawDetections {
  /// 边界框 [top, left, bottom, right]，归一化 0..1
  pub boxes: [[f32; 4]; MAX_DETECTIONS],
  /// 类别标签索引（引擎以浮点槽位回填）
  pub labels: [f32; MAX_DETECTIONS],
  /// 置信度得分，降序
  pub scores: [f32; MAX_DETECTIONS],
  /// 本帧有效检测数量
  pub count: f32,
}

impl Default for RawDetections {
  fn default() -> Self {
    Self {
      boxes: [[0.0; 4]; MAX_DETECTIONS],
      labels: [0.0; MAX_DETECTIONS],
      scores: [0.0; MAX_DETECTIONS],
      count: 0.0,
    }
  }
}

impl RawDetections {
  /// 逻辑长度，截断到缓冲容量以内
  pub fn detection_count(&self) -> usize {
    (self.count.max(0.0) as usize).min(MAX_DETECTIONS)
  }
}

/// 推理引擎边界：同步执行检测图，单发单帧，无批处理、无流式、无取消。
///
/// 引擎与其输出缓冲不可并发调用，`&mut self` 在类型层面表达
/// “任一时刻至多一次调用在途”，由流水线编排者串行化。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&mut self, input: &InputTensor, output: &mut RawDetections)
  -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelAssetError {
  #[error("模型加载错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型文件为空: {0}")]
  Empty(String),
}

/// 打包的预编译检测图：启动时一次性只读映射，进程生命周期内不可变共享。
pub struct ModelAsset {
  map: Mmap,
}

impl ModelAsset {
  pub fn load(path: &Path) -> Result<Self, ModelAssetError> {
    info!("加载模型文件: {}", path.display());
    let file = File::open(path)?;
    // SAFETY: 映射为只读，模型资产在进程生命周期内不会被截断或改写
    let map = unsafe { Mmap::map(&file)? };
    if map.is_empty() {
      return Err(ModelAssetError::Empty(path.display().to_string()));
    }
    debug!(
      "模型文件大小: {:.2} MB",
      map.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(Self { map })
  }

  pub fn bytes(&self) -> &[u8] {
    &self.map
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }
}
