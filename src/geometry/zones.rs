use super::polygon::{Point, Polygon};
use crate::error::{Result, StationError};
use crate::events::MarkerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Frame dimensions the zone coordinates were recorded against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct RawZone {
    name: String,
    pts: Vec<[f64; 2]>,
}

/// Both layouts found in the field: the wrapped document and the bare list
/// the calibration tool writes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZoneFile {
    Wrapped {
        zones: Vec<RawZone>,
        #[serde(default)]
        frame_size: Option<FrameSize>,
    },
    Bare(Vec<RawZone>),
}

/// Normalise a region name for lookups
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Immutable session geometry: an optional table boundary plus named regions
#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    table: Option<Polygon>,
    regions: HashMap<String, Polygon>,
    frame_size: Option<FrameSize>,
}

impl ZoneSet {
    pub fn new(
        table: Option<Polygon>,
        regions: impl IntoIterator<Item = Polygon>,
        frame_size: Option<FrameSize>,
    ) -> Self {
        Self {
            table,
            regions: regions
                .into_iter()
                .map(|p| (normalize_name(p.name()), p))
                .collect(),
            frame_size,
        }
    }

    /// Load zones from a JSON file
    pub fn load<P: AsRef<Path>>(path: P, table_zone: &str) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        debug!("Loading zone geometry from: {}", origin);

        let text = std::fs::read_to_string(path)
            .map_err(|e| StationError::geometry(origin.clone(), e.to_string()))?;
        let zones = Self::from_json_str(&text, table_zone, &origin)?;

        info!(
            "Loaded {} regions from {} (table boundary: {})",
            zones.regions.len(),
            origin,
            if zones.table.is_some() { "yes" } else { "none" }
        );
        Ok(zones)
    }

    /// Parse zone JSON; `origin` names the source in error messages
    pub fn from_json_str(text: &str, table_zone: &str, origin: &str) -> Result<Self> {
        let file: ZoneFile = serde_json::from_str(text)
            .map_err(|e| StationError::geometry(origin, e.to_string()))?;

        let (raw_zones, frame_size) = match file {
            ZoneFile::Wrapped { zones, frame_size } => (zones, frame_size),
            ZoneFile::Bare(zones) => (zones, None),
        };

        let table_name = normalize_name(table_zone);
        let mut table = None;
        let mut regions = HashMap::new();

        for raw in raw_zones {
            let name = normalize_name(&raw.name);
            if name.is_empty() {
                return Err(StationError::geometry(origin, "zone with an empty name"));
            }

            let points = raw
                .pts
                .iter()
                .map(|[x, y]| Point::new(*x as i32, *y as i32))
                .collect();
            let Some(polygon) = Polygon::new(name.clone(), points) else {
                warn!(
                    "Skipping zone '{}' in {}: fewer than 3 points",
                    name, origin
                );
                continue;
            };

            if name == table_name {
                if table.replace(polygon).is_some() {
                    return Err(StationError::geometry(
                        origin,
                        format!("duplicate zone '{}'", name),
                    ));
                }
            } else if regions.insert(name.clone(), polygon).is_some() {
                return Err(StationError::geometry(
                    origin,
                    format!("duplicate zone '{}'", name),
                ));
            }
        }

        Ok(Self {
            table,
            regions,
            frame_size,
        })
    }

    pub fn table(&self) -> Option<&Polygon> {
        self.table.as_ref()
    }

    /// Look up a region by (already normalised) name
    pub fn region(&self, name: &str) -> Option<&Polygon> {
        self.regions.get(name)
    }

    pub fn region_names(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size
    }

    /// Copy of this set mapped onto a frame of the given size. Sets without a
    /// recorded frame size are returned unchanged.
    pub fn rescaled(&self, width: u32, height: u32) -> ZoneSet {
        let Some(from) = self.frame_size else {
            return self.clone();
        };
        if from.width == 0 || from.height == 0 || (from.width == width && from.height == height) {
            return self.clone();
        }

        let sx = width as f64 / from.width as f64;
        let sy = height as f64 / from.height as f64;

        ZoneSet {
            table: self.table.as_ref().map(|t| t.scaled(sx, sy)),
            regions: self
                .regions
                .iter()
                .map(|(name, p)| (name.clone(), p.scaled(sx, sy)))
                .collect(),
            frame_size: Some(FrameSize { width, height }),
        }
    }
}

/// Per-marker allowed region names with a fallback set
#[derive(Debug, Clone)]
pub struct AllowList {
    entries: HashMap<MarkerId, Vec<String>>,
    default: Vec<String>,
}

impl AllowList {
    pub fn new(entries: HashMap<MarkerId, Vec<String>>, default: Vec<String>) -> Self {
        let normalize = |names: Vec<String>| -> Vec<String> {
            names.iter().map(|n| normalize_name(n)).collect()
        };
        Self {
            entries: entries
                .into_iter()
                .map(|(id, names)| (id, normalize(names)))
                .collect(),
            default: normalize(default),
        }
    }

    /// Only the fallback set
    pub fn with_default(default: Vec<String>) -> Self {
        Self::new(HashMap::new(), default)
    }

    /// Load the allow list; a missing file yields the fallback set only
    pub fn load<P: AsRef<Path>>(path: P, default: Vec<String>) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();

        if !path.exists() {
            warn!(
                "Allow list {} not found, every marker uses the default regions {:?}",
                origin, default
            );
            return Ok(Self::with_default(default));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| StationError::allow_list(origin.clone(), e.to_string()))?;
        let list = Self::from_json_str(&text, default, &origin)?;
        info!("Loaded allow list for {} markers from {}", list.len(), origin);
        Ok(list)
    }

    /// Parse `{"<marker id>": ["REGION", ...], ...}`
    pub fn from_json_str(text: &str, default: Vec<String>, origin: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(text)
            .map_err(|e| StationError::allow_list(origin, e.to_string()))?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, names) in raw {
            let id: MarkerId = key.trim().parse().map_err(|_| {
                StationError::allow_list(origin, format!("'{}' is not a marker id", key))
            })?;
            entries.insert(id, names);
        }

        Ok(Self::new(entries, default))
    }

    /// Allowed regions for a marker, falling back to the default set
    pub fn allowed_for(&self, marker: MarkerId) -> &[String] {
        self.entries
            .get(&marker)
            .map(Vec::as_slice)
            .unwrap_or(&self.default)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
