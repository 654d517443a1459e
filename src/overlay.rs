// 该文件是 Zhushi （注视） 项目的一部分。
// src/overlay.rs - 透明覆盖表面与检测结果绘制
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

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::debug;

use crate::decode::{Detection, RectF};

/// 边框颜色循环表；结果列表上限为 4，四色即可区分
pub const PATH_COLORS: [Rgba<u8>; 4] = [
  Rgba([255, 0, 0, 255]),
  Rgba([0, 255, 0, 255]),
  Rgba([0, 255, 255, 255]),
  Rgba([0, 0, 255, 255]),
];

/// 边框线宽（像素）
pub const STROKE_WIDTH: u32 = 7;

const LABEL_FONT_SIZE: f32 = 28.0;
const LABEL_TEXT_MARGIN: i32 = 5;

struct SurfaceState {
  active: bool,
  front: RgbaImage,
  back: RgbaImage,
}

/// 叠放在相机预览上方的透明绘制表面。
///
/// 分析端与显示端各持一个克隆；显示端可随应用生命周期将表面置为不活跃
/// 或调整尺寸。分析端通过 [`lock_canvas`](Self::lock_canvas) 获取独占画布，
/// 不可用时静默跳过本次绘制。锁的持有时间不超过一次绘制调用。
#[derive(Clone)]
pub struct OverlaySurface {
  state: Arc<Mutex<SurfaceState>>,
}

impl OverlaySurface {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      state: Arc::new(Mutex::new(SurfaceState {
        active: true,
        front: RgbaImage::new(width, height),
        back: RgbaImage::new(width, height),
      })),
    }
  }

  fn state(&self) -> MutexGuard<'_, SurfaceState> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// 显示端生命周期：不活跃的表面拒绝绘制
  pub fn set_active(&self, active: bool) {
    self.state().active = active;
  }

  /// 显示端调整表面尺寸；双缓冲一并重建（内容清空）
  pub fn resize(&self, width: u32, height: u32) {
    let mut state = self.state();
    state.front = RgbaImage::new(width, height);
    state.back = RgbaImage::new(width, height);
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.state().front.dimensions()
  }

  /// 获取独占画布；表面不活跃或正被显示端占用时返回 None
  pub fn lock_canvas(&self) -> Option<Canvas<'_>> {
    let guard = match self.state.try_lock() {
      Ok(guard) => guard,
      Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
      Err(TryLockError::WouldBlock) => return None,
    };
    if !guard.active {
      return None;
    }
    Some(Canvas { guard })
  }

  /// 当前已提交的绘制内容（显示端取用）
  pub fn snapshot(&self) -> RgbaImage {
    self.state().front.clone()
  }

  /// 把已提交内容按透明度叠加到预览图上（演示输出用）
  pub fn composite_over(&self, preview: &RgbImage) -> RgbImage {
    let state = self.state();
    let mut out = preview.clone();
    let (w, h) = out.dimensions();
    let (ow, oh) = state.front.dimensions();
    for y in 0..h.min(oh) {
      for x in 0..w.min(ow) {
        let Rgba([r, g, b, a]) = *state.front.get_pixel(x, y);
        if a == 0 {
          continue;
        }
        let alpha = a as f32 / 255.0;
        let Rgb(dst) = *out.get_pixel(x, y);
        let blended = [
          (r as f32 * alpha + dst[0] as f32 * (1.0 - alpha)) as u8,
          (g as f32 * alpha + dst[1] as f32 * (1.0 - alpha)) as u8,
          (b as f32 * alpha + dst[2] as f32 * (1.0 - alpha)) as u8,
        ];
        out.put_pixel(x, y, Rgb(blended));
      }
    }
    out
  }
}

/// 一次绘制调用期间的独占画布；`commit` 恰好提交一次，
/// 中途丢弃则本次绘制不可见（上一帧内容保持）。
pub struct Canvas<'a> {
  guard: MutexGuard<'a, SurfaceState>,
}

impl Canvas<'_> {
  /// 整面清为全透明，避免上一帧的框残留
  pub fn clear(&mut self) {
    for pixel in self.guard.back.pixels_mut() {
      *pixel = Rgba([0, 0, 0, 0]);
    }
  }

  pub fn image_mut(&mut self) -> &mut RgbaImage {
    &mut self.guard.back
  }

  /// 提交并呈现：原子地以本次绘制替换可见内容
  pub fn commit(mut self) {
    let state = &mut *self.guard;
    std::mem::swap(&mut state.front, &mut state.back);
  }
}

/// 检测结果渲染器：清屏 → 逐条画框与标签 → 提交。
pub struct OverlayRenderer {
  font: FontRef<'static>,
  font_scale: PxScale,
}

impl Default for OverlayRenderer {
  fn default() -> Self {
    let font_data: &'static [u8] = include_bytes!("../assets/DejaVuSans.ttf");
    let font = FontRef::try_from_slice(font_data).expect("无法加载嵌入的字体文件");
    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }
}

impl OverlayRenderer {
  pub fn new() -> Self {
    Self::default()
  }

  /// 把一帧检测结果绘制到覆盖表面。
  ///
  /// 表面不可用时静默跳过（表面随应用生命周期自然启停，不是错误）；
  /// 否则即使检测列表为空也清屏并提交一次——空白帧是有效提交。
  pub fn draw(&self, surface: &OverlaySurface, detections: &[Detection]) {
    let Some(mut canvas) = surface.lock_canvas() else {
      debug!("覆盖表面不可用，跳过本帧绘制");
      return;
    };

    canvas.clear();
    for (i, detection) in detections.iter().enumerate() {
      let color = PATH_COLORS[i % PATH_COLORS.len()];
      draw_bbox(canvas.image_mut(), &detection.bounding_box, color);

      let text = format!("{} {:.2}%", detection.label, detection.score * 100.0);
      let x = detection.bounding_box.left.max(0.0) as i32;
      let y =
        (detection.bounding_box.top as i32 - LABEL_FONT_SIZE as i32 - LABEL_TEXT_MARGIN).max(0);
      draw_text_mut(canvas.image_mut(), color, x, y, self.font_scale, &self.font, &text);
    }
    canvas.commit();
  }
}

/// 以固定线宽向内逐圈描边的空心矩形
fn draw_bbox(image: &mut RgbaImage, rect: &RectF, color: Rgba<u8>) {
  let (iw, ih) = image.dimensions();
  if iw == 0 || ih == 0 {
    return;
  }
  let left = rect.left.clamp(0.0, iw as f32 - 1.0) as i32;
  let top = rect.top.clamp(0.0, ih as f32 - 1.0) as i32;
  let right = rect.right.clamp(0.0, iw as f32 - 1.0) as i32;
  let bottom = rect.bottom.clamp(0.0, ih as f32 - 1.0) as i32;
  if left >= right || top >= bottom {
    return;
  }

  for t in 0..STROKE_WIDTH as i32 {
    let l = left + t;
    let r = right - t;
    let tp = top + t;
    let b = bottom - t;
    if l >= r || tp >= b {
      break;
    }
    let outline = Rect::at(l, tp).of_size((r - l + 1) as u32, (b - tp + 1) as u32);
    draw_hollow_rect_mut(image, outline, color);
  }
}
