// 该文件是 Zhushi （注视） 项目的一部分。
// src/pipeline.rs - 单帧分析流水线与连续任务循环
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

use std::{thread, time::Duration};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::convert::{self, ConvertError};
use crate::decode::{Decoder, Detection};
use crate::frame::RawFrame;
use crate::model::{InferenceEngine, RawDetections};
use crate::overlay::{OverlayRenderer, OverlaySurface};
use crate::preprocess::{PreprocessError, Preprocessor};

#[derive(Error, Debug)]
pub enum AnalyzeError<E: std::error::Error + Send + Sync + 'static> {
  #[error("颜色转换错误: {0}")]
  Convert(#[from] ConvertError),
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("推理错误: {0}")]
  Engine(E),
}

/// 单帧分析流水线：颜色转换 → 预处理 → 推理 → 解码。
///
/// 同步执行，调用返回即得到结果列表；`&mut self` 串行化对引擎及其
/// 输出缓冲的访问，输出缓冲跨帧复用、每次调用整体覆写。
pub struct Analyzer<E: InferenceEngine> {
  preprocessor: Preprocessor,
  engine: E,
  decoder: Decoder,
  raw: RawDetections,
}

impl<E: InferenceEngine> Analyzer<E> {
  pub fn new(preprocessor: Preprocessor, engine: E, decoder: Decoder) -> Self {
    Self {
      preprocessor,
      engine,
      decoder,
      raw: RawDetections::default(),
    }
  }

  /// 分析一帧相机帧。帧的释放由其 Drop 守卫负责，出错路径不例外。
  pub fn analyze(&mut self, frame: &RawFrame) -> Result<Vec<Detection>, AnalyzeError<E::Error>> {
    let rgb = convert::yuv420_to_rgb(frame)?;
    self.analyze_rgb(&rgb, frame.rotation_degrees())
  }

  /// 分析已解码的 RGB 缓冲（演示输出路径复用预览图时走这里）
  pub fn analyze_rgb(
    &mut self,
    rgb: &RgbImage,
    rotation_degrees: u32,
  ) -> Result<Vec<Detection>, AnalyzeError<E::Error>> {
    let tensor = self.preprocessor.process(rgb, rotation_degrees)?;
    self
      .engine
      .infer(&tensor, &mut self.raw)
      .map_err(AnalyzeError::Engine)?;
    Ok(self.decoder.decode(&self.raw))
  }
}

/// 连续任务：从帧源逐帧取帧、分析并把结果绘制到覆盖表面，直到帧源
/// 耗尽、达到指定帧数或收到中断信号。
///
/// 单帧失败只丢弃该帧并继续，不中止任务。
#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interrupt: bool,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      interrupt: true,
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 不注册 Ctrl-C 处理器（ctrlc 全进程只能注册一次，测试环境使用）
  pub fn without_interrupt_handler(mut self) -> Self {
    self.interrupt = false;
    self
  }

  pub fn run_task<E: InferenceEngine>(
    self,
    input: impl Iterator<Item = RawFrame>,
    analyzer: &mut Analyzer<E>,
    renderer: &OverlayRenderer,
    surface: &OverlaySurface,
  ) -> anyhow::Result<()> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if self.interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })
      .expect("Error setting Ctrl-C handler");
    }

    let mut frame_index = 0usize;
    let mut failed = 0usize;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index = (frame_index + 1) % usize::MAX;
      debug!("处理第 {} 帧图像", frame_index);
      match analyzer.analyze(&frame) {
        Ok(detections) => {
          let elapsed_a = now.elapsed();
          renderer.draw(surface, &detections);
          let elapsed_b = now.elapsed();
          debug!(
            "分析完成，检出 {} 条结果，耗时: {:.2?} / {:.2?}",
            detections.len(),
            elapsed_a,
            elapsed_b
          );
        }
        Err(e) => {
          // 单帧失败丢弃该帧，任务继续
          failed += 1;
          debug!("第 {} 帧分析失败，丢弃: {}", frame_index, e);
        }
      }
      now = std::time::Instant::now();
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧（失败 {} 帧），退出", frame_index, failed);
    Ok(())
  }
}
