use super::polygon::Point;
use super::zones::ZoneSet;

/// Hard-boundary containment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Inside,
    Outside,
    /// No table polygon configured; the hard-boundary check is disabled
    NotApplicable,
}

impl TableStatus {
    pub fn is_outside(&self) -> bool {
        matches!(self, TableStatus::Outside)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub table: TableStatus,
    pub inside_allowed: bool,
}

/// Classify a point against the session geometry.
///
/// `allowed` holds normalised region names; names with no polygon in `zones`
/// are ignored. Runs in time linear in the vertices of the table and the
/// allowed polygons.
pub fn classify(point: Point, zones: &ZoneSet, allowed: &[String]) -> Classification {
    let table = match zones.table() {
        Some(polygon) if polygon.contains(point) => TableStatus::Inside,
        Some(_) => TableStatus::Outside,
        None => TableStatus::NotApplicable,
    };

    let inside_allowed = allowed
        .iter()
        .filter_map(|name| zones.region(name))
        .any(|polygon| polygon.contains(point));

    Classification {
        table,
        inside_allowed,
    }
}
