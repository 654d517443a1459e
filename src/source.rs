// 该文件是 Zhushi （注视） 项目的一部分。
// src/source.rs - 帧源与仅保留最新帧的背压通道
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

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use thiserror::Error;
use tracing::debug;

use crate::FromUrl;
use crate::frame::RawFrame;

mod image_file;
pub use self::image_file::{ImageFileSource, ImageFileSourceError};

mod stub;
pub use self::stub::{StubSource, StubSourceError};

#[cfg(feature = "v4l2_camera")]
mod v4l2;
#[cfg(feature = "v4l2_camera")]
pub use self::v4l2::{V4l2CameraSource, V4l2CameraSourceError};

#[derive(Error, Debug)]
pub enum SourceError {
  #[error("图片输入错误: {0}")]
  ImageFile(#[from] ImageFileSourceError),
  #[error("合成输入错误: {0}")]
  Stub(#[from] StubSourceError),
  #[cfg(feature = "v4l2_camera")]
  #[error("V4L2 输入错误: {0}")]
  V4l2(#[from] V4l2CameraSourceError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum SourceWrapper {
  ImageFile(ImageFileSource),
  Stub(StubSource),
  #[cfg(feature = "v4l2_camera")]
  V4l2(V4l2CameraSource),
}

impl FromUrl for SourceWrapper {
  type Error = SourceError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      ImageFileSource::SCHEME => Ok(SourceWrapper::ImageFile(ImageFileSource::from_url(url)?)),
      StubSource::SCHEME => Ok(SourceWrapper::Stub(StubSource::from_url(url)?)),
      #[cfg(feature = "v4l2_camera")]
      V4l2CameraSource::SCHEME => Ok(SourceWrapper::V4l2(V4l2CameraSource::from_url(url)?)),
      other => Err(SourceError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for SourceWrapper {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      SourceWrapper::ImageFile(source) => source.next(),
      SourceWrapper::Stub(source) => source.next(),
      #[cfg(feature = "v4l2_camera")]
      SourceWrapper::V4l2(source) => source.next(),
    }
  }
}

/// 仅保留最新帧的背压通道（keep-only-latest）。
///
/// 分析在途时到达的过期帧在接收端被丢弃（经各自的 Drop 守卫正常释放），
/// 下游任一时刻至多处理一帧，积压深度实际为 1，时延有界。
pub fn latest_channel() -> (LatestSender, LatestReceiver) {
  let (tx, rx) = mpsc::channel();
  (LatestSender { tx }, LatestReceiver { rx, dropped: 0 })
}

pub struct LatestSender {
  tx: Sender<RawFrame>,
}

impl LatestSender {
  /// 投递一帧；接收端已关闭时返回 false，帧经由 Drop 守卫正常释放
  pub fn send(&self, frame: RawFrame) -> bool {
    self.tx.send(frame).is_ok()
  }
}

pub struct LatestReceiver {
  rx: Receiver<RawFrame>,
  dropped: u64,
}

impl LatestReceiver {
  /// 因背压被丢弃的帧累计数
  pub fn dropped(&self) -> u64 {
    self.dropped
  }
}

impl Iterator for LatestReceiver {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    // 阻塞等到一帧，随后清空积压只留最新；被顶掉的旧帧就地释放
    let mut frame = self.rx.recv().ok()?;
    let mut drained = 0u64;
    loop {
      match self.rx.try_recv() {
        Ok(newer) => {
          drained += 1;
          frame = newer;
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
      }
    }
    if drained > 0 {
      self.dropped += drained;
      debug!("背压丢弃 {} 个过期帧（累计 {}）", drained, self.dropped);
    }
    Some(frame)
  }
}

/// 把帧源挂到独立生产线程上，经仅保留最新帧的通道交付
pub fn spawn_latest(source: impl Iterator<Item = RawFrame> + Send + 'static) -> LatestReceiver {
  let (tx, rx) = latest_channel();
  thread::spawn(move || {
    for frame in source {
      if !tx.send(frame) {
        debug!("接收端已关闭，帧源线程退出");
        break;
      }
    }
  });
  rx
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ChromaLayout;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counted_frame(tag: u8, released: &Arc<AtomicUsize>) -> RawFrame {
    let released = released.clone();
    RawFrame::new(vec![tag; 6], 2, 2, 0, ChromaLayout::Planar).with_release(move || {
      released.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn receiver_keeps_only_latest_and_releases_stale_frames() {
    let (tx, mut rx) = latest_channel();
    let released = Arc::new(AtomicUsize::new(0));

    assert!(tx.send(counted_frame(1, &released)));
    assert!(tx.send(counted_frame(2, &released)));
    assert!(tx.send(counted_frame(3, &released)));

    let frame = rx.next().unwrap();
    assert_eq!(frame.data()[0], 3);
    assert_eq!(rx.dropped(), 2);
    // 被顶掉的两帧已经释放
    assert_eq!(released.load(Ordering::SeqCst), 2);

    drop(frame);
    assert_eq!(released.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn receiver_ends_when_sender_disconnects() {
    let (tx, mut rx) = latest_channel();
    drop(tx);
    // 一帧都未交付也是合法的生命周期
    assert!(rx.next().is_none());
  }

  #[test]
  fn sender_reports_closed_receiver_and_releases_frame() {
    let (tx, rx) = latest_channel();
    drop(rx);
    let released = Arc::new(AtomicUsize::new(0));
    assert!(!tx.send(counted_frame(1, &released)));
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn spawn_latest_forwards_all_when_consumer_keeps_up() {
    let source = StubSource::new(4, 4, 3);
    let rx = spawn_latest(source);
    let frames: Vec<_> = rx.collect();
    // 消费端不落后时最多只有少量帧被顶掉，至少能收到最后一帧
    assert!(!frames.is_empty());
    assert!(frames.len() <= 3);
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      SourceWrapper::from_url(&url),
      Err(SourceError::SchemeMismatch(_))
    ));
  }
}
