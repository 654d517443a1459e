// 该文件是 Zhushi （注视） 项目的一部分。
// src/source/stub.rs - 合成测试帧源
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

use thiserror::Error;
use url::Url;

use crate::frame::{ChromaLayout, RawFrame};
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum StubSourceError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数无效: {0}")]
  InvalidParam(String),
}

/// 合成帧源：生成带左上角方位标记的渐变 YUV420 测试帧，
/// 无需摄像头即可驱动整条流水线。
///
/// URL 形式: `stub://?frames=30&width=640&height=480&rotation=90`
#[derive(Debug, Clone)]
pub struct StubSource {
  width: u32,
  height: u32,
  rotation_degrees: u32,
  index: usize,
  remaining: usize,
}

impl FromUrlWithScheme for StubSource {
  const SCHEME: &'static str = "stub";
}

impl FromUrl for StubSource {
  type Error = StubSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StubSourceError::SchemeMismatch);
    }

    let mut source = StubSource::new(640, 480, 10);
    for (key, value) in url.query_pairs() {
      let parsed: u32 = value
        .parse()
        .map_err(|_| StubSourceError::InvalidParam(format!("{}={}", key, value)))?;
      match key.as_ref() {
        "width" => source.width = parsed,
        "height" => source.height = parsed,
        "frames" => source.remaining = parsed as usize,
        "rotation" => source.rotation_degrees = parsed,
        other => {
          return Err(StubSourceError::InvalidParam(other.to_string()));
        }
      }
    }
    Ok(source)
  }
}

impl StubSource {
  pub fn new(width: u32, height: u32, frames: usize) -> Self {
    Self {
      width,
      height,
      rotation_degrees: 0,
      index: 0,
      remaining: frames,
    }
  }

  pub fn with_rotation(mut self, rotation_degrees: u32) -> Self {
    self.rotation_degrees = rotation_degrees;
    self
  }

  /// 逐帧平移的亮度渐变，左上角 1/8 区域为高亮方位标记，色度中性
  fn synth_frame(&self) -> RawFrame {
    let w = self.width as usize;
    let h = self.height as usize;
    let chroma = w.div_ceil(2) * h.div_ceil(2);

    let mut data = Vec::with_capacity(w * h + 2 * chroma);
    for y in 0..h {
      for x in 0..w {
        let luma = if x < w / 8 && y < h / 8 {
          235
        } else {
          ((x + y + self.index * 8) % 200) as u8
        };
        data.push(luma);
      }
    }
    data.extend(std::iter::repeat_n(128u8, 2 * chroma));

    RawFrame::new(
      data,
      self.width,
      self.height,
      self.rotation_degrees,
      ChromaLayout::Planar,
    )
  }
}

impl Iterator for StubSource {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    let frame = self.synth_frame();
    self.index += 1;
    Some(frame)
  }
}
