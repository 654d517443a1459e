// 该文件是 Zhushi （注视） 项目的一部分。
// src/source/v4l2.rs - V4L2 摄像头帧源
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

use std::pin::Pin;

use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::frame::{ChromaLayout, RawFrame};
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum V4l2CameraSourceError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无法打开设备 {0}: {1}")]
  DeviceOpen(String, std::io::Error),
  #[error("设备不支持 NV12 输出: 协商结果 {0}")]
  UnsupportedFormat(String),
  #[error("V4L2 I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// V4L2 摄像头帧源，以 NV12（半平面 YUV420）交付帧。
///
/// v4l 库的 Stream 需要引用 Device，这里用 Pin<Box> 固定 Device 的
/// 内存地址，从而可以安全地创建引用它的 Stream。
pub struct V4l2CameraSource {
  /// V4L2 设备（使用 Pin<Box> 固定内存位置）
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4l2CameraSource {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2CameraSource {
  type Error = V4l2CameraSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(V4l2CameraSourceError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

impl V4l2CameraSource {
  pub fn open(device_path: &str) -> Result<Self, V4l2CameraSourceError> {
    let device = Box::pin(
      Device::with_path(device_path)
        .map_err(|e| V4l2CameraSourceError::DeviceOpen(device_path.to_string(), e))?,
    );

    let mut format = device.format()?;
    format.width = 640;
    format.height = 480;
    format.fourcc = FourCC::new(b"NV12");
    let format = device.set_format(&format)?;
    if &format.fourcc.repr != b"NV12" {
      return Err(V4l2CameraSourceError::UnsupportedFormat(
        format.fourcc.to_string(),
      ));
    }

    info!(
      "V4L2 设备已打开: {} ({}x{})",
      device_path, format.width, format.height
    );

    let mut source = Self {
      device,
      stream: None,
      width: format.width,
      height: format.height,
    };

    // SAFETY: device 被 Pin<Box> 固定，不会移动，引用始终有效；
    // stream 存放在同一结构体中，Drop 顺序为 stream（Option::take）先于 device
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, 4)?
    };

    source.stream = Some(stream);
    Ok(source)
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}

impl Drop for V4l2CameraSource {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
  }
}

impl Iterator for V4l2CameraSource {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let stream = self.stream.as_mut()?;

    match stream.next() {
      Ok((buffer, _meta)) => Some(RawFrame::new(
        buffer.to_vec(),
        self.width,
        self.height,
        // V4L2 不携带传感器旋转元数据，按正立交付
        0,
        ChromaLayout::SemiPlanar,
      )),
      Err(e) => {
        error!("无法捕获帧: {}", e);
        None
      }
    }
  }
}
