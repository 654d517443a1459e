// 该文件是 Zhushi （注视） 项目的一部分。
// src/decode.rs - 推理输出解码
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

use std::sync::Arc;

use tracing::warn;

use crate::labels::LabelTable;
use crate::model::RawDetections;

/// 检测结果得分阈值
pub const SCORE_THRESHOLD: f32 = 0.5;
/// 结果列表长度硬上限（独立于引擎的 ≤10 原始容量）
pub const MAX_RESULTS: usize = 4;

/// 结果视图像素空间中的矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

/// 一条解码后的检测：构造后不可变，按帧创建、渲染一次后丢弃
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub score: f32,
  pub label: String,
  pub bounding_box: RectF,
}

/// 解码器：原始输出缓冲 + 标签表 → 结果视图坐标下的检测列表。
///
/// 坐标换算使用结果视图的宽高（既不是输入张量分辨率，也不是原始帧分辨率）。
pub struct Decoder {
  labels: Arc<LabelTable>,
  view_width: u32,
  view_height: u32,
}

impl Decoder {
  pub fn new(labels: Arc<LabelTable>, view_width: u32, view_height: u32) -> Self {
    Self {
      labels,
      view_width,
      view_height,
    }
  }

  pub fn view_size(&self) -> (u32, u32) {
    (self.view_width, self.view_height)
  }

  /// 按名次走读引擎输出，产出降序检测列表（至多 [`MAX_RESULTS`] 条）。
  pub fn decode(&self, raw: &RawDetections) -> Vec<Detection> {
    let mut detections = Vec::with_capacity(MAX_RESULTS);
    let view_w = self.view_width as f32;
    let view_h = self.view_height as f32;

    for i in 0..raw.detection_count() {
      let score = raw.scores[i];

      // 引擎输出按得分降序预排序：首个低于阈值的条目之后不再有合格结果，
      // 直接短路退出（刻意依赖排序约定的优化，不是过滤）。
      if score < SCORE_THRESHOLD {
        break;
      }

      let index = raw.labels[i] as usize;
      let Some(label) = self.labels.get(index) else {
        warn!(
          "标签索引越界: {} (标签表共 {} 项)，丢弃该条检测",
          index,
          self.labels.len()
        );
        continue;
      };

      // box = [top, left, bottom, right]，映射到结果视图像素空间
      let bounding_box = RectF {
        left: raw.boxes[i][1] * view_w,
        top: raw.boxes[i][0] * view_h,
        right: raw.boxes[i][3] * view_w,
        bottom: raw.boxes[i][2] * view_h,
      };

      detections.push(Detection {
        score,
        label: label.to_owned(),
        bounding_box,
      });

      if detections.len() >= MAX_RESULTS {
        break;
      }
    }

    detections
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::MAX_DETECTIONS;

  fn table() -> Arc<LabelTable> {
    Arc::new(LabelTable::from_lines([
      "person", "bicycle", "car", "dog", "cat",
    ]))
  }

  fn raw_with_scores(scores: &[f32]) -> RawDetections {
    let mut raw = RawDetections::default();
    for (i, &score) in scores.iter().take(MAX_DETECTIONS).enumerate() {
      raw.scores[i] = score;
      raw.boxes[i] = [0.1, 0.2, 0.6, 0.8];
      raw.labels[i] = (i % 5) as f32;
    }
    raw.count = scores.len() as f32;
    raw
  }

  #[test]
  fn first_sub_threshold_score_short_circuits() {
    // 0.4 之后的 0.95 不得被捞回：这是短路语义，不是过滤
    let raw = raw_with_scores(&[0.9, 0.7, 0.4, 0.95]);
    let detections = Decoder::new(table(), 100, 100).decode(&raw);
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].score, 0.9);
    assert_eq!(detections[1].score, 0.7);
  }

  #[test]
  fn exact_threshold_passes() {
    let raw = raw_with_scores(&[0.5, 0.499]);
    let detections = Decoder::new(table(), 100, 100).decode(&raw);
    assert_eq!(detections.len(), 1);
  }

  #[test]
  fn result_list_is_capped_at_four() {
    for count in 0..=MAX_DETECTIONS {
      let scores = vec![0.9; count];
      let raw = raw_with_scores(&scores);
      let detections = Decoder::new(table(), 100, 100).decode(&raw);
      assert_eq!(detections.len(), count.min(MAX_RESULTS));
    }
  }

  #[test]
  fn lying_count_is_clamped_to_capacity() {
    let mut raw = raw_with_scores(&[0.9; MAX_DETECTIONS]);
    raw.count = 99.0;
    let detections = Decoder::new(table(), 100, 100).decode(&raw);
    assert_eq!(detections.len(), MAX_RESULTS);
  }

  #[test]
  fn boxes_scale_to_result_view_pixels() {
    let mut raw = RawDetections::default();
    raw.boxes[0] = [0.1, 0.2, 0.6, 0.8];
    raw.scores[0] = 0.9;
    raw.labels[0] = 0.0;
    raw.count = 1.0;

    let detections = Decoder::new(table(), 1000, 2000).decode(&raw);
    // 轴映射：left/top/right/bottom ↔ box[1]/box[0]/box[3]/box[2]
    let rect = detections[0].bounding_box;
    assert_eq!(rect.left, 200.0);
    assert_eq!(rect.top, 200.0);
    assert_eq!(rect.right, 800.0);
    assert_eq!(rect.bottom, 1200.0);
  }

  #[test]
  fn labels_map_through_table_in_rank_order() {
    let raw = raw_with_scores(&[0.9, 0.8, 0.7]);
    let detections = Decoder::new(table(), 10, 10).decode(&raw);
    assert_eq!(detections[0].label, "person");
    assert_eq!(detections[1].label, "bicycle");
    assert_eq!(detections[2].label, "car");
  }

  #[test]
  fn out_of_range_label_drops_single_detection() {
    let mut raw = raw_with_scores(&[0.9, 0.8, 0.7]);
    raw.labels[1] = 17.0;
    let detections = Decoder::new(table(), 10, 10).decode(&raw);
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].label, "person");
    assert_eq!(detections[1].label, "car");
  }
}
