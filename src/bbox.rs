use serde::{Deserialize, Serialize};

/// Axis-aligned box in inclusive pixel coordinates.
///
/// Both corners belong to the box, so a box with `xmin == xmax` is one pixel
/// wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        BoundingBox {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin + 1.0
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin + 1.0
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Area shared with `other`, zero when the boxes do not overlap.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let x_a = self.xmin.max(other.xmin);
        let y_a = self.ymin.max(other.ymin);
        let x_b = self.xmax.min(other.xmax);
        let y_b = self.ymax.min(other.ymax);

        (x_b - x_a + 1.0).max(0.0) * (y_b - y_a + 1.0).max(0.0)
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(c: [f32; 4]) -> Self {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

/// Intersection-over-union of two boxes, in `[0, 1]`.
///
/// Returns 0.0 when the union is empty, which only happens for degenerate
/// boxes.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter = a.intersection_area(b);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_overlap_is_one() {
        let a = BoundingBox::new(3.0, 4.0, 20.0, 40.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(4.0, 2.0, 30.0, 8.0);
        assert_eq!(iou(&a, &b), iou(&b, &a));
    }

    #[test]
    fn test_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.intersection_area(&b), 0.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let a = BoundingBox::from([0.0, 0.0, 10.0, 10.0]);
        let b = BoundingBox::from([5.0, 5.0, 15.0, 15.0]);
        assert_eq!(a.area(), 121.0);
        assert_eq!(a.intersection_area(&b), 36.0);
        assert!((iou(&a, &b) - 36.0 / 206.0).abs() < 1e-6);
        assert!((iou(&a, &b) - 0.1748).abs() < 1e-4);
    }

    #[test]
    fn test_adjacent_pixels_touch() {
        // Inclusive coordinates: sharing the column x=10 is a one-pixel-wide overlap.
        let a = BoundingBox::new(0.0, 0.0, 10.0, 0.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 0.0);
        assert_eq!(a.intersection_area(&b), 1.0);
        assert!((iou(&a, &b) - 1.0 / 21.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_union_guard() {
        // xmax = xmin - 1 gives zero width, so both areas and the union are 0.
        let a = BoundingBox::new(5.0, 5.0, 4.0, 9.0);
        let b = BoundingBox::new(5.0, 5.0, 4.0, 9.0);
        assert_eq!(a.area(), 0.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_contained_box() {
        let outer = BoundingBox::new(0.0, 0.0, 9.0, 9.0);
        let inner = BoundingBox::new(0.0, 0.0, 4.0, 4.0);
        assert!((iou(&outer, &inner) - 25.0 / 100.0).abs() < 1e-6);
    }
}
