// 该文件是 Zhushi （注视） 项目的一部分。
// tests/pipeline.rs - 端到端流水线集成测试
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

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use zhushi::FromUrl;
use zhushi::decode::Decoder;
use zhushi::frame::{ChromaLayout, RawFrame};
use zhushi::labels::LabelTable;
use zhushi::model::ScriptedEngine;
use zhushi::overlay::{OverlayRenderer, OverlaySurface};
use zhushi::pipeline::{Analyzer, ContinuousTask};
use zhushi::preprocess::Preprocessor;
use zhushi::source::{self, SourceWrapper};

fn coco_labels() -> Arc<LabelTable> {
  Arc::new(LabelTable::load(Path::new("assets/coco_dataset.txt")).unwrap())
}

fn grey_frame(released: &Arc<AtomicUsize>) -> RawFrame {
  let len = RawFrame::expected_len(16, 16, ChromaLayout::Planar);
  let released = released.clone();
  RawFrame::new(vec![128u8; len], 16, 16, 0, ChromaLayout::Planar).with_release(move || {
    released.fetch_add(1, Ordering::SeqCst);
  })
}

/// stub:// 帧源 → 背压通道 → 分析 → 覆盖层绘制的完整链路
#[test]
fn stub_source_drives_pipeline_to_committed_overlay() {
  let url = url::Url::parse("stub://?frames=6&width=320&height=240").unwrap();
  let frame_source = SourceWrapper::from_url(&url).unwrap();
  let frames = source::spawn_latest(frame_source);

  let decoder = Decoder::new(coco_labels(), 640, 480);
  let mut analyzer = Analyzer::new(Preprocessor::new(), ScriptedEngine::demo(), decoder);
  let renderer = OverlayRenderer::new();
  let surface = OverlaySurface::new(640, 480);

  ContinuousTask::default()
    .without_interrupt_handler()
    .run_task(frames, &mut analyzer, &renderer, &surface)
    .unwrap();

  // 演示脚本有两条过阈值检测，覆盖层不应全透明
  let snapshot = surface.snapshot();
  assert!(snapshot.pixels().any(|p| p.0[3] != 0));
}

/// 背压挤掉与转换失败两种结局下，每帧的释放回调都恰好执行一次
/// （成功结局的释放由其他用例覆盖）
#[test]
fn every_frame_is_released_exactly_once_regardless_of_outcome() {
  let released = Arc::new(AtomicUsize::new(0));

  let (tx, frames) = source::latest_channel();
  // 三帧先于消费端积压：前两帧被背压顶掉，只有最后一帧交付
  assert!(tx.send(grey_frame(&released)));
  assert!(tx.send(grey_frame(&released)));
  // 交付的是空帧，在颜色转换阶段被丢弃
  let bad_released = released.clone();
  assert!(
    tx.send(
      RawFrame::new(Vec::new(), 16, 16, 0, ChromaLayout::Planar).with_release(move || {
        bad_released.fetch_add(1, Ordering::SeqCst);
      })
    )
  );
  drop(tx);

  let decoder = Decoder::new(coco_labels(), 100, 100);
  let mut analyzer = Analyzer::new(Preprocessor::new(), ScriptedEngine::demo(), decoder);
  let renderer = OverlayRenderer::new();
  let surface = OverlaySurface::new(100, 100);

  ContinuousTask::default()
    .without_interrupt_handler()
    .run_task(frames, &mut analyzer, &renderer, &surface)
    .unwrap();

  assert_eq!(released.load(Ordering::SeqCst), 3);
}

/// 空检测列表也要清屏并提交：上一帧的框不得残留
#[test]
fn empty_detection_frame_clears_previous_overlay() {
  let released = Arc::new(AtomicUsize::new(0));
  let decoder = Decoder::new(coco_labels(), 200, 200);
  let renderer = OverlayRenderer::new();
  let surface = OverlaySurface::new(200, 200);

  let mut analyzer = Analyzer::new(Preprocessor::new(), ScriptedEngine::demo(), decoder);
  ContinuousTask::default()
    .without_interrupt_handler()
    .run_task(
      std::iter::once(grey_frame(&released)),
      &mut analyzer,
      &renderer,
      &surface,
    )
    .unwrap();
  assert!(surface.snapshot().pixels().any(|p| p.0[3] != 0));

  // 空脚本引擎：没有任何检测的帧
  let decoder = Decoder::new(coco_labels(), 200, 200);
  let mut analyzer = Analyzer::new(Preprocessor::new(), ScriptedEngine::new(Vec::new()), decoder);
  ContinuousTask::default()
    .without_interrupt_handler()
    .run_task(
      std::iter::once(grey_frame(&released)),
      &mut analyzer,
      &renderer,
      &surface,
    )
    .unwrap();

  assert!(surface.snapshot().pixels().all(|p| p.0[3] == 0));
  assert_eq!(released.load(Ordering::SeqCst), 2);
}
