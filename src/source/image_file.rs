// 该文件是 Zhushi （注视） 项目的一部分。
// src/source/image_file.rs - 静态图片帧源
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::frame::{ChromaLayout, RawFrame};
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileSourceError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 静态图片帧源：读取并解码一张图片，打包为 I420 后单次送入流水线。
pub struct ImageFileSource {
  frame: Option<RawFrame>,
}

impl FromUrlWithScheme for ImageFileSource {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileSource {
  type Error = ImageFileSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileSourceError::SchemaMismatch);
    }

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    let (width, height) = image.dimensions();
    let data = rgb_to_i420(&image);

    Ok(ImageFileSource {
      frame: Some(RawFrame::new(data, width, height, 0, ChromaLayout::Planar)),
    })
  }
}

impl Iterator for ImageFileSource {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

/// BT.601 正变换，与颜色转换阶段的逆变换配套；
/// 色度按 2×2 块取左上像素采样
fn rgb_to_i420(rgb: &RgbImage) -> Vec<u8> {
  let (width, height) = rgb.dimensions();
  let w = width as usize;
  let h = height as usize;
  let chroma_w = w.div_ceil(2);
  let chroma_h = h.div_ceil(2);

  let mut data = Vec::with_capacity(w * h + 2 * chroma_w * chroma_h);
  for y in 0..height {
    for x in 0..width {
      let [r, g, b] = rgb.get_pixel(x, y).0;
      let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
      data.push(luma.clamp(0.0, 255.0) as u8);
    }
  }
  for plane in 0..2 {
    for cy in 0..chroma_h {
      for cx in 0..chroma_w {
        let [r, g, b] = rgb.get_pixel((cx * 2) as u32, (cy * 2) as u32).0;
        let value = if plane == 0 {
          -0.169 * r as f32 - 0.331 * g as f32 + 0.500 * b as f32 + 128.0
        } else {
          0.500 * r as f32 - 0.419 * g as f32 - 0.081 * b as f32 + 128.0
        };
        data.push(value.clamp(0.0, 255.0) as u8);
      }
    }
  }
  data
}
