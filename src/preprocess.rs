// 该文件是 Zhushi （注视） 项目的一部分。
// src/preprocess.rs - 模型输入预处理（缩放、旋转补偿、归一化）
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

use image::RgbImage;
use image::imageops::{self, FilterType};
use thiserror::Error;

use crate::frame::{InputTensor, TENSOR_HEIGHT, TENSOR_WIDTH};

// 本模型已量化，归一化常量不是 127.5 而是直通
pub const NORMALIZE_MEAN: f32 = 0.0;
pub const NORMALIZE_STD: f32 = 1.0;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("不支持的旋转角度: {0}（仅支持 90 的整数倍）")]
  UnsupportedRotation(u32),
}

/// 预处理器：任意尺寸 RGB 缓冲 + 旋转角 → 固定分辨率的输入张量。
///
/// 步骤次序固定：
/// 1. 双线性缩放到 300×300（不保持纵横比，形变为既定取舍）；
/// 2. 按旋转角做四分之一圈旋转，使张量始终正立；
/// 3. 逐通道 (v - mean) / std 归一化。量化模型下 mean=0、std=1 为直通，
///    该步骤仍保留，换两个常量即可复用于非量化模型。
#[derive(Debug, Clone)]
pub struct Preprocessor {
  mean: f32,
  std: f32,
}

impl Default for Preprocessor {
  fn default() -> Self {
    Self::new()
  }
}

impl Preprocessor {
  pub fn new() -> Self {
    Self {
      mean: NORMALIZE_MEAN,
      std: NORMALIZE_STD,
    }
  }

  /// 非量化模型的归一化常量
  pub fn with_normalization(mean: f32, std: f32) -> Self {
    Self { mean, std }
  }

  pub fn process(
    &self,
    rgb: &RgbImage,
    rotation_degrees: u32,
  ) -> Result<InputTensor, PreprocessError> {
    let resized = imageops::resize(rgb, TENSOR_WIDTH, TENSOR_HEIGHT, FilterType::Triangle);

    // rotation_degrees 是把图像转为正立所需的顺时针角度，
    // 等价于 Rot90Op(-rotation/90) 的离散四分之一圈约定
    let upright = match rotation_degrees % 360 {
      0 => resized,
      90 => imageops::rotate90(&resized),
      180 => imageops::rotate180(&resized),
      270 => imageops::rotate270(&resized),
      other => return Err(PreprocessError::UnsupportedRotation(other)),
    };

    let mut data = upright.into_raw();
    if self.mean != 0.0 || self.std != 1.0 {
      for value in &mut data {
        *value = ((*value as f32 - self.mean) / self.std).clamp(0.0, 255.0) as u8;
      }
    }

    Ok(InputTensor::from(data))
  }
}
