// 该文件是 Zhushi （注视） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use image::imageops::{self, FilterType};
use tracing::{debug, info, warn};

use zhushi::{
  FromUrl, convert,
  decode::Decoder,
  labels::LabelTable,
  model::{InferenceEngine, ModelAsset, ScriptedEngine},
  overlay::{OverlayRenderer, OverlaySurface},
  pipeline::{Analyzer, ContinuousTask},
  preprocess::Preprocessor,
  source::{self, LatestReceiver, SourceWrapper},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("标签表路径: {}", args.labels.display());
  info!("输入来源: {}", args.input);
  info!("结果视图: {}x{}", args.view_width, args.view_height);

  // 模型与标签表缺失或为空属于启动期致命错误
  let model = ModelAsset::load(&args.model).context("模型资源加载失败")?;
  let labels = Arc::new(LabelTable::load(&args.labels).context("标签表加载失败")?);
  info!(
    "模型已映射（{} 字节），标签表共 {} 项；当前构建使用脚本化推理后端",
    model.len(),
    labels.len()
  );

  let engine = ScriptedEngine::demo();
  let decoder = Decoder::new(labels, args.view_width, args.view_height);
  let mut analyzer = Analyzer::new(Preprocessor::new(), engine, decoder);
  let renderer = OverlayRenderer::new();
  let surface = OverlaySurface::new(args.view_width, args.view_height);

  let frame_source = SourceWrapper::from_url(&args.input)?;
  // 帧源走独立生产线程，经仅保留最新帧的通道交付
  let frames = source::spawn_latest(frame_source);

  match args.output {
    Some(dir) => demo_output(
      frames,
      &mut analyzer,
      &renderer,
      &surface,
      &dir,
      (args.view_width, args.view_height),
      args.frame_number,
    ),
    None => ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(frames, &mut analyzer, &renderer, &surface),
  }
}

/// 演示输出：预览图缩放到结果视图尺寸，叠加已提交的覆盖层后逐帧存为 PNG
fn demo_output<E: InferenceEngine>(
  frames: LatestReceiver,
  analyzer: &mut Analyzer<E>,
  renderer: &OverlayRenderer,
  surface: &OverlaySurface,
  dir: &Path,
  view: (u32, u32),
  frame_number: Option<usize>,
) -> Result<()> {
  fs::create_dir_all(dir)
    .with_context(|| format!("无法创建输出目录: {}", dir.display()))?;
  info!("演示输出目录: {}", dir.display());

  let mut frame_index = 0usize;
  for frame in frames {
    frame_index += 1;
    let preview = match convert::yuv420_to_rgb(&frame) {
      Ok(preview) => preview,
      Err(e) => {
        debug!("第 {} 帧颜色转换失败，丢弃: {}", frame_index, e);
        continue;
      }
    };
    let detections = match analyzer.analyze_rgb(&preview, frame.rotation_degrees()) {
      Ok(detections) => detections,
      Err(e) => {
        debug!("第 {} 帧分析失败，丢弃: {}", frame_index, e);
        continue;
      }
    };
    renderer.draw(surface, &detections);

    let resized = imageops::resize(&preview, view.0, view.1, FilterType::Triangle);
    let composite = surface.composite_over(&resized);
    let path = dir.join(format!("frame_{frame_index:05}.png"));
    composite
      .save(&path)
      .with_context(|| format!("无法写出 {}", path.display()))?;
    info!("第 {} 帧: {} 条检测 → {}", frame_index, detections.len(), path.display());

    if frame_number.map(|n| frame_index >= n).unwrap_or(false) {
      info!("达到指定帧数 {}, 退出演示循环", frame_index);
      break;
    }
  }

  if frame_index == 0 {
    warn!("帧源未交付任何帧");
  }
  info!("演示输出完成，共 {} 帧", frame_index);
  Ok(())
}
