// 该文件是 Zhushi （注视） 项目的一部分。
// src/frame.rs - 帧与输入张量定义
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

use std::fmt;

const RGB_CHANNELS: usize = 3;

/// 模型输入张量的固定分辨率
pub const TENSOR_WIDTH: u32 = 300;
pub const TENSOR_HEIGHT: u32 = 300;

/// 帧释放回调，由帧源提供，帧被丢弃时恰好调用一次
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

/// YUV420 色度平面布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
  /// 平面布局：Y 平面之后是 U、V 两个独立的半分辨率平面（I420）
  Planar,
  /// 半平面布局：Y 平面之后是 UV 交错的半分辨率平面（NV12）
  SemiPlanar,
}

/// 相机帧：不透明的 YUV420 像素缓冲 + 尺寸 + 传感器旋转角。
///
/// 帧由帧源临时所有，流水线在单次分析期间借用；`Drop` 守卫保证释放回调
/// 在所有退出路径（含提前返回与出错路径）上恰好执行一次。
pub struct RawFrame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
  rotation_degrees: u32,
  layout: ChromaLayout,
  release: Option<ReleaseHook>,
}

impl RawFrame {
  pub fn new(
    data: Vec<u8>,
    width: u32,
    height: u32,
    rotation_degrees: u32,
    layout: ChromaLayout,
  ) -> Self {
    Self {
      data: data.into_boxed_slice(),
      width,
      height,
      rotation_degrees,
      layout,
      release: None,
    }
  }

  /// 挂接帧源的释放回调
  pub fn with_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
    self.release = Some(Box::new(hook));
    self
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  /// 传感器旋转角（0/90/180/270），在预处理阶段补偿
  pub fn rotation_degrees(&self) -> u32 {
    self.rotation_degrees
  }

  pub fn layout(&self) -> ChromaLayout {
    self.layout
  }

  /// 像素数据；帧源异常时可能为空或长度不符，由颜色转换阶段校验
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// 给定尺寸与布局下 YUV420 缓冲的期望字节数
  pub fn expected_len(width: u32, height: u32, _layout: ChromaLayout) -> usize {
    let y = width as usize * height as usize;
    let chroma = (width as usize).div_ceil(2) * (height as usize).div_ceil(2);
    y + 2 * chroma
  }
}

impl Drop for RawFrame {
  fn drop(&mut self) {
    if let Some(hook) = self.release.take() {
      hook();
    }
  }
}

impl fmt::Debug for RawFrame {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RawFrame")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("rotation_degrees", &self.rotation_degrees)
      .field("layout", &self.layout)
      .field("bytes", &self.data.len())
      .finish()
  }
}

/// 模型输入张量：固定 300×300×3 的 NHWC 字节缓冲。
/// 每帧恰好一个活动实例，每次调用整体覆写，不跨帧累积。
#[derive(Debug, Clone)]
pub struct InputTensor {
  data: Box<[u8]>,
}

impl From<Vec<u8>> for InputTensor {
  fn from(data: Vec<u8>) -> Self {
    let expected = RGB_CHANNELS * TENSOR_WIDTH as usize * TENSOR_HEIGHT as usize;
    if data.len() != expected {
      panic!("数据长度不匹配: 期望长度 {}, 实际长度 {}", expected, data.len());
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }
}

impl Default for InputTensor {
  fn default() -> Self {
    let size = RGB_CHANNELS * TENSOR_WIDTH as usize * TENSOR_HEIGHT as usize;
    Self {
      data: vec![0u8; size].into_boxed_slice(),
    }
  }
}

impl InputTensor {
  pub fn width(&self) -> usize {
    TENSOR_WIDTH as usize
  }

  pub fn height(&self) -> usize {
    TENSOR_HEIGHT as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn release_hook_runs_exactly_once_on_drop() {
    let counter = Arc::new(AtomicUsize::new(0));
    let hook_counter = counter.clone();
    let frame = RawFrame::new(vec![0u8; 6], 2, 2, 0, ChromaLayout::Planar)
      .with_release(move || {
        hook_counter.fetch_add(1, Ordering::SeqCst);
      });

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    drop(frame);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn frame_without_hook_drops_cleanly() {
    let frame = RawFrame::new(Vec::new(), 0, 0, 0, ChromaLayout::SemiPlanar);
    drop(frame);
  }

  #[test]
  fn expected_len_matches_yuv420_subsampling() {
    assert_eq!(RawFrame::expected_len(4, 4, ChromaLayout::Planar), 24);
    assert_eq!(RawFrame::expected_len(4, 4, ChromaLayout::SemiPlanar), 24);
    // 奇数尺寸向上取整到半分辨率平面
    assert_eq!(RawFrame::expected_len(5, 3, ChromaLayout::Planar), 15 + 2 * 6);
  }

  #[test]
  #[should_panic(expected = "数据长度不匹配")]
  fn tensor_rejects_wrong_length() {
    let _ = InputTensor::from(vec![0u8; 10]);
  }

  #[test]
  fn tensor_default_is_fixed_shape() {
    let tensor = InputTensor::default();
    assert_eq!(tensor.as_nhwc().len(), 300 * 300 * 3);
    assert_eq!(tensor.width(), 300);
    assert_eq!(tensor.height(), 300);
    assert_eq!(tensor.channels(), 3);
  }
}
