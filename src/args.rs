// 该文件是 Zhushi （注视） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Zhushi 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: PathBuf,

  /// 标签表文件路径（每行一个标签，行号即类别索引）
  #[arg(long, value_name = "LABELS")]
  pub labels: PathBuf,

  /// 输入来源
  /// 支持格式:
  /// - 合成帧: stub://?width=640&height=480&frames=30&rotation=0
  /// - 图片: image:///path/to/photo.png
  /// - V4L2: v4l2:///dev/video0 （需启用 v4l2_camera 特性）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 合成预览输出目录；指定后把覆盖层叠加到预览图并逐帧存为 PNG，
  /// 省略则只绘制到内存覆盖表面
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<PathBuf>,

  /// 结果视图宽度（检测框坐标换算用）
  #[arg(long, default_value = "640", value_name = "WIDTH")]
  pub view_width: u32,

  /// 结果视图高度（检测框坐标换算用）
  #[arg(long, default_value = "480", value_name = "HEIGHT")]
  pub view_height: u32,

  /// 最大处理帧数（省略表示直到帧源耗尽或收到中断信号）
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}
