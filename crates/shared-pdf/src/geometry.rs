//! Geometry in page space
//!
//! Page space is the unrotated page with its origin at the top-left corner of
//! the MediaBox and y growing downward, in PDF points. Search hits, native
//! field rects and overlay targets all live here. The rotation matrix maps
//! page space into the orientation a page is displayed and rasterized in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box given by its corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// True when the box has no area (or is inverted).
    pub fn is_empty(&self) -> bool {
        !(self.x1 > self.x0 && self.y1 > self.y0)
    }

    /// Same box with corners re-sorted so that x0 <= x1 and y0 <= y1.
    pub fn normalized(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn intersection(&self, other: &Rect) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersection(other).is_empty()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    /// Bounding box of the four transformed corners.
    pub fn transform(&self, m: &Matrix) -> Self {
        let corners = [
            m.apply(Point::new(self.x0, self.y0)),
            m.apply(Point::new(self.x1, self.y0)),
            m.apply(Point::new(self.x0, self.y1)),
            m.apply(Point::new(self.x1, self.y1)),
        ];
        let mut out = Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y);
        for c in &corners[1..] {
            out.x0 = out.x0.min(c.x);
            out.y0 = out.y0.min(c.y);
            out.x1 = out.x1.max(c.x);
            out.y1 = out.y1.max(c.y);
        }
        out
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention:
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// `self` followed by `other` (PDF's `self × other`).
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

/// Cardinal page rotation (clockwise, as stored in `/Rotate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes any multiple of 90 (negative values included). Other
    /// angles have no cardinal meaning and yield `None`.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// Boxes and rotation of one page, all in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub media_box: Rect,
    pub crop_box: Rect,
    pub rotation: Rotation,
}

impl PageGeometry {
    pub fn new(media_box: Rect, crop_box: Rect, rotation: Rotation) -> Self {
        Self {
            media_box,
            crop_box,
            rotation,
        }
    }

    /// Unrotated letter-size page with crop box equal to the media box.
    pub fn letter() -> Self {
        let r = Rect::new(0.0, 0.0, 612.0, 792.0);
        Self::new(r, r, Rotation::Deg0)
    }

    /// Maps page space into the displayed (rotated) orientation.
    pub fn rotation_matrix(&self) -> Matrix {
        let w = self.media_box.width();
        let h = self.media_box.height();
        match self.rotation {
            Rotation::Deg0 => Matrix::IDENTITY,
            Rotation::Deg90 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
            Rotation::Deg180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
            Rotation::Deg270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
        }
    }

    /// The crop box in rotated space; this is the frame of a rendered raster.
    pub fn rotated_crop_box(&self) -> Rect {
        self.crop_box.transform(&self.rotation_matrix())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_rotation() -> impl Strategy<Value = Rotation> {
        prop_oneof![
            Just(Rotation::Deg0),
            Just(Rotation::Deg90),
            Just(Rotation::Deg180),
            Just(Rotation::Deg270),
        ]
    }

    proptest! {
        #[test]
        fn rotated_rect_keeps_area(
            rotation in any_rotation(),
            w in 50.0f64..2000.0,
            h in 50.0f64..2000.0,
            x in 0.0f64..0.5,
            y in 0.0f64..0.5,
        ) {
            let page = Rect::new(0.0, 0.0, w, h);
            let geom = PageGeometry::new(page, page, rotation);
            let r = Rect::new(x * w, y * h, (x + 0.25) * w, (y + 0.25) * h);
            let t = r.transform(&geom.rotation_matrix());
            let area = r.width() * r.height();
            prop_assert!((t.width() * t.height() - area).abs() < 1e-6 * area.max(1.0));
        }

        #[test]
        fn rotated_rect_stays_inside_rotated_page(
            rotation in any_rotation(),
            w in 50.0f64..2000.0,
            h in 50.0f64..2000.0,
            x in 0.0f64..0.75,
            y in 0.0f64..0.75,
        ) {
            let page = Rect::new(0.0, 0.0, w, h);
            let geom = PageGeometry::new(page, page, rotation);
            let frame = geom.rotated_crop_box();
            let t = Rect::new(x * w, y * h, (x + 0.2) * w, (y + 0.2) * h)
                .transform(&geom.rotation_matrix());
            prop_assert!(t.x0 >= frame.x0 - 1e-9 && t.x1 <= frame.x1 + 1e-9);
            prop_assert!(t.y0 >= frame.y0 - 1e-9 && t.y1 <= frame.y1 + 1e-9);
        }
    }
}
