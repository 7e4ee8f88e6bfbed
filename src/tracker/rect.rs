/// Axis-aligned box in pixel space, stored as top-left corner plus size.
///
/// Conversions cover the three layouts the pipeline passes around:
/// - XYWH: left, top, width, height (tracker input)
/// - LTRB: left, top, right, bottom (detector output, drawing)
/// - XYAH: center x, center y, aspect ratio (w/h), height (Kalman state)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from an integer XYWH box as produced by the format adapter.
    #[inline]
    pub fn from_xywh(xywh: [i32; 4]) -> Self {
        Self::new(
            xywh[0] as f32,
            xywh[1] as f32,
            xywh[2] as f32,
            xywh[3] as f32,
        )
    }

    #[inline]
    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn to_ltrb(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Kalman measurement vector for this box.
    #[inline]
    pub fn to_xyah(&self) -> [f64; 4] {
        let cx = self.x + self.width / 2.0;
        let cy = self.y + self.height / 2.0;
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx as f64, cy as f64, aspect_ratio as f64, self.height as f64]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over Union with another box; 0.0 for degenerate unions.
    pub fn iou(&self, other: &Rect) -> f32 {
        let [l1, t1, r1, b1] = self.to_ltrb();
        let [l2, t2, r2, b2] = other.to_ltrb();

        let inter_width = (r1.min(r2) - l1.max(l2)).max(0.0);
        let inter_height = (b1.min(b2) - t1.max(t2)).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;
        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ltrb_round_trip_through_xywh() {
        let rect = Rect::from_ltrb(10.0, 20.0, 40.0, 60.0);
        assert_eq!(rect, Rect::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(rect.to_ltrb(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_xyah() {
        let rect = Rect::from_xywh([10, 20, 30, 40]);
        let xyah = rect.to_xyah();
        assert_eq!(xyah[0], 25.0);
        assert_eq!(xyah[1], 40.0);
        assert!((xyah[2] - 0.75).abs() < 1e-6);
        assert_eq!(xyah[3], 40.0);

        let back = Rect::from_xyah(25.0, 40.0, 0.75, 40.0);
        assert!((back.x - 10.0).abs() < 1e-4);
        assert!((back.width - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&Rect::new(20.0, 20.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_iou_degenerate() {
        let empty = Rect::new(5.0, 5.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }
}
