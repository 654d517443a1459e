// 该文件是 Zhushi （注视） 项目的一部分。
// src/convert.rs - YUV420 到 RGB 的颜色空间转换
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

use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::frame::{ChromaLayout, RawFrame};

#[derive(Error, Debug)]
pub enum ConvertError {
  #[error("帧缺少像素数据")]
  MissingPixelData,
  #[error("像素数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 将 YUV420 帧转换为同尺寸的稠密 RGB 缓冲（BT.601）。
///
/// 不在此处做旋转校正：旋转补偿放在预处理阶段，使转换器与显示方向无关。
/// 像素数据缺失或长度不符时返回错误，调用方跳过该帧而非中止。
pub fn yuv420_to_rgb(frame: &RawFrame) -> Result<RgbImage, ConvertError> {
  let data = frame.data();
  if data.is_empty() {
    return Err(ConvertError::MissingPixelData);
  }

  let expected = RawFrame::expected_len(frame.width(), frame.height(), frame.layout());
  if data.len() != expected {
    return Err(ConvertError::LengthMismatch {
      expected,
      actual: data.len(),
    });
  }

  let w = frame.width() as usize;
  let h = frame.height() as usize;
  let y_plane = w * h;
  let chroma_w = w.div_ceil(2);
  let chroma_plane = chroma_w * h.div_ceil(2);

  let mut rgb = RgbImage::new(frame.width(), frame.height());
  for j in 0..h {
    for i in 0..w {
      let y = data[j * w + i] as f32;
      let (u, v) = match frame.layout() {
        ChromaLayout::Planar => {
          let idx = (j / 2) * chroma_w + (i / 2);
          (data[y_plane + idx], data[y_plane + chroma_plane + idx])
        }
        ChromaLayout::SemiPlanar => {
          let idx = y_plane + (j / 2) * chroma_w * 2 + (i / 2) * 2;
          (data[idx], data[idx + 1])
        }
      };
      let u = u as f32 - 128.0;
      let v = v as f32 - 128.0;

      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.put_pixel(i as u32, j as u32, Rgb([r, g, b]));
    }
  }

  Ok(rgb)
}
