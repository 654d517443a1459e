// 该文件是 Zhushi （注视） 项目的一部分。
// src/model/stub.rs - 脚本化推理后端（演示与测试用）
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

use std::convert::Infallible;

use tracing::debug;

use crate::frame::InputTensor;
use crate::model::{InferenceEngine, MAX_DETECTIONS, RawDetections};

/// 脚本中的一条检测：bbox 为 [top, left, bottom, right] 归一化坐标
#[derive(Debug, Clone)]
pub struct ScriptedDetection {
  pub bbox: [f32; 4],
  pub label: u32,
  pub score: f32,
}

impl ScriptedDetection {
  pub fn new(bbox: [f32; 4], label: u32, score: f32) -> Self {
    Self { bbox, label, score }
  }
}

/// 脚本化推理后端：每次调用按既定脚本回填四个输出槽位，不解析模型图。
/// 构造时按得分降序排列并截断到缓冲容量，以满足引擎的排序约定。
/// 真实部署把 NPU/加速器运行时接到 [`InferenceEngine`] 上即可替换。
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
  script: Vec<ScriptedDetection>,
  invocations: u64,
}

impl ScriptedEngine {
  pub fn new(mut script: Vec<ScriptedDetection>) -> Self {
    script.sort_by(|a, b| b.score.total_cmp(&a.score));
    script.truncate(MAX_DETECTIONS);
    Self {
      script,
      invocations: 0,
    }
  }

  /// 演示脚本：两条过阈值检测加一条阈值之下的尾巴
  pub fn demo() -> Self {
    Self::new(vec![
      // person
      ScriptedDetection::new([0.12, 0.18, 0.86, 0.55], 0, 0.92),
      // dog
      ScriptedDetection::new([0.55, 0.58, 0.90, 0.88], 16, 0.81),
      // car，低于阈值，解码阶段应当短路掉
      ScriptedDetection::new([0.05, 0.60, 0.25, 0.95], 2, 0.47),
    ])
  }

  /// 已执行的推理次数
  pub fn invocations(&self) -> u64 {
    self.invocations
  }
}

impl InferenceEngine for ScriptedEngine {
  type Error = Infallible;

  fn infer(
    &mut self,
    _input: &InputTensor,
    output: &mut RawDetections,
  ) -> Result<(), Self::Error> {
    self.invocations += 1;

    // 输出缓冲每次整体覆写，不残留上一帧内容
    *output = RawDetections::default();
    for (i, det) in self.script.iter().enumerate() {
      output.boxes[i] = det.bbox;
      output.labels[i] = det.label as f32;
      output.scores[i] = det.score;
    }
    output.count = self.script.len() as f32;

    debug!("脚本化推理完成: {} 条检测", self.script.len());
    Ok(())
  }
}
