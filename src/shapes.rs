pub mod point;
pub mod polygon;
pub mod rect;

pub use point::{PointF32, Pointi32};
pub use polygon::Polygon;
pub use rect::{Rect, RectF32};
