mod classifier;
mod polygon;
mod zones;

pub use classifier::{classify, Classification, TableStatus};
pub use polygon::{Point, Polygon};
pub use zones::{normalize_name, AllowList, FrameSize, ZoneSet};
