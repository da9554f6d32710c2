//! Asset catalog - the static table of tour media and POI metadata.
//!
//! Every asset is addressed by an [`AssetId`] (the `demo` singleton or a
//! point-of-interest id) plus a [`Direction`]. Both the preloader and the
//! player read the catalog; nothing mutates it after construction, so it is
//! shared as `Arc<Catalog>`.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "demo":   { "forward": "https://.../demo.mp4", "reverse": "https://.../demo-rev.mp4" },
//!   "assets": { "1": { "forward": "...", "reverse": "..." } },
//!   "pois":   [ { "id": 1, "x_percent": 30.0, "y_percent": 42.5,
//!                 "label": "1", "title": "...", "description": ["...", "..."] } ]
//! }
//! ```
//!
//! `assets` and `pois` are separate tables; [`Catalog::validate`] checks that
//! their id sets match exactly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Identity of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetId {
    /// End-to-end demo sequence
    Demo,
    /// Point of interest (ids start at 1)
    Poi(u32),
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Demo => write!(f, "demo"),
            AssetId::Poi(id) => write!(f, "poi-{}", id),
        }
    }
}

/// Which clip of a forward/reverse pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Forward, Direction::Reverse];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Forward/reverse URL pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub forward: String,
    pub reverse: String,
}

impl AssetEntry {
    pub fn new(forward: impl Into<String>, reverse: impl Into<String>) -> Self {
        Self {
            forward: forward.into(),
            reverse: reverse.into(),
        }
    }

    pub fn url(&self, direction: Direction) -> &str {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }
}

/// Display metadata for one hotspot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiMeta {
    pub id: u32,
    /// Horizontal position, percent of the visualization width
    pub x_percent: f32,
    /// Vertical position, percent of the visualization height
    pub y_percent: f32,
    pub label: String,
    pub title: String,
    /// Paragraphs
    pub description: Vec<String>,
}

/// Lookup miss: the id has no catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownAssetError {
    pub id: AssetId,
}

impl fmt::Display for UnknownAssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown asset: {}", self.id)
    }
}

impl std::error::Error for UnknownAssetError {}

/// Catalog construction/validation errors
#[derive(Debug)]
pub enum CatalogError {
    Io { path: String, message: String },
    Parse(String),
    InvalidPoiId(u32),
    EmptyUrl { id: AssetId, direction: Direction },
    SameUrl { id: AssetId },
    MissingMetadata(u32),
    OrphanMetadata(u32),
    DuplicateMetadata(u32),
    CoordinateOutOfRange { id: u32, x: f32, y: f32 },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io { path, message } => {
                write!(f, "Failed to read catalog {}: {}", path, message)
            }
            CatalogError::Parse(msg) => write!(f, "Invalid catalog JSON: {}", msg),
            CatalogError::InvalidPoiId(id) => {
                write!(f, "POI id {} is invalid (ids start at 1)", id)
            }
            CatalogError::EmptyUrl { id, direction } => {
                write!(f, "{} has an empty {} URL", id, direction)
            }
            CatalogError::SameUrl { id } => {
                write!(f, "{} uses the same URL for forward and reverse", id)
            }
            CatalogError::MissingMetadata(id) => {
                write!(f, "POI {} has assets but no metadata entry", id)
            }
            CatalogError::OrphanMetadata(id) => {
                write!(f, "POI {} has metadata but no assets", id)
            }
            CatalogError::DuplicateMetadata(id) => {
                write!(f, "POI {} has more than one metadata entry", id)
            }
            CatalogError::CoordinateOutOfRange { id, x, y } => {
                write!(f, "POI {} position ({}, {}) is outside 0-100%", id, x, y)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// On-disk shape (metadata as a list so duplicates can be detected)
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    demo: AssetEntry,
    #[serde(default)]
    assets: BTreeMap<u32, AssetEntry>,
    #[serde(default)]
    pois: Vec<PoiMeta>,
}

/// Immutable asset catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    demo: AssetEntry,
    assets: BTreeMap<u32, AssetEntry>,
    pois: BTreeMap<u32, PoiMeta>,
}

impl Catalog {
    /// Build and validate a catalog from its tables.
    pub fn new(
        demo: AssetEntry,
        assets: BTreeMap<u32, AssetEntry>,
        pois: Vec<PoiMeta>,
    ) -> Result<Self, CatalogError> {
        let mut by_id = BTreeMap::new();
        for meta in pois {
            let id = meta.id;
            if by_id.insert(id, meta).is_some() {
                return Err(CatalogError::DuplicateMetadata(id));
            }
        }
        let catalog = Self {
            demo,
            assets,
            pois: by_id,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse catalog JSON (see module docs).
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(file.demo, file.assets, file.pois)
    }

    /// Read and parse a catalog file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let catalog = Self::from_json(&json)?;
        log::info!(
            "Catalog loaded from {}: {} POIs, {} assets",
            path.display(),
            catalog.pois.len(),
            catalog.pair_count()
        );
        Ok(catalog)
    }

    /// Serialize back to the JSON file format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let file = CatalogFile {
            demo: self.demo.clone(),
            assets: self.assets.clone(),
            pois: self.pois.values().cloned().collect(),
        };
        serde_json::to_string_pretty(&file)
    }

    /// Check all catalog invariants.
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_entry(AssetId::Demo, &self.demo)?;

        for (&id, entry) in &self.assets {
            if id == 0 {
                return Err(CatalogError::InvalidPoiId(id));
            }
            check_entry(AssetId::Poi(id), entry)?;
            if !self.pois.contains_key(&id) {
                return Err(CatalogError::MissingMetadata(id));
            }
        }

        for (&id, meta) in &self.pois {
            if !self.assets.contains_key(&id) {
                return Err(CatalogError::OrphanMetadata(id));
            }
            let in_range = |v: f32| (0.0..=100.0).contains(&v);
            if !in_range(meta.x_percent) || !in_range(meta.y_percent) {
                return Err(CatalogError::CoordinateOutOfRange {
                    id,
                    x: meta.x_percent,
                    y: meta.y_percent,
                });
            }
        }
        Ok(())
    }

    /// URL of one clip.
    pub fn resolve(&self, id: AssetId, direction: Direction) -> Result<&str, UnknownAssetError> {
        let entry = match id {
            AssetId::Demo => Some(&self.demo),
            AssetId::Poi(poi) => self.assets.get(&poi),
        };
        entry
            .map(|e| e.url(direction))
            .ok_or(UnknownAssetError { id })
    }

    /// Every identity in the catalog, demo included.
    pub fn all_ids(&self) -> BTreeSet<AssetId> {
        std::iter::once(AssetId::Demo)
            .chain(self.assets.keys().map(|&id| AssetId::Poi(id)))
            .collect()
    }

    /// Every (identity, direction) pair: 2 x (POIs + 1).
    pub fn pairs(&self) -> Vec<(AssetId, Direction)> {
        self.all_ids()
            .into_iter()
            .flat_map(|id| Direction::ALL.into_iter().map(move |dir| (id, dir)))
            .collect()
    }

    pub fn pair_count(&self) -> usize {
        2 * (self.assets.len() + 1)
    }

    pub fn contains_poi(&self, id: u32) -> bool {
        self.assets.contains_key(&id)
    }

    pub fn poi(&self, id: u32) -> Option<&PoiMeta> {
        self.pois.get(&id)
    }

    /// POI metadata in id order
    pub fn pois(&self) -> impl Iterator<Item = &PoiMeta> {
        self.pois.values()
    }

    pub fn poi_count(&self) -> usize {
        self.pois.len()
    }

    /// Built-in three-hotspot tour used when no catalog file is configured.
    pub fn builtin() -> Self {
        const BASE: &str = "https://media.tourplay.dev/tour";
        let url = |name: &str| format!("{}/{}.mp4", BASE, name);

        let demo = AssetEntry::new(url("demo-forward"), url("demo-reverse"));
        let assets = (1..=3)
            .map(|id| {
                (
                    id,
                    AssetEntry::new(url(&format!("poi-{}-forward", id)), url(&format!("poi-{}-reverse", id))),
                )
            })
            .collect();
        let pois = vec![
            PoiMeta {
                id: 1,
                x_percent: 28.0,
                y_percent: 36.5,
                label: "1".into(),
                title: "Sensor array".into(),
                description: vec![
                    "Four wide-angle sensors cover the full field of view.".into(),
                    "Calibration runs automatically on every start-up.".into(),
                ],
            },
            PoiMeta {
                id: 2,
                x_percent: 54.0,
                y_percent: 61.0,
                label: "2".into(),
                title: "Battery module".into(),
                description: vec![
                    "A hot-swappable pack rated for a full working day.".into(),
                    "Charge state is reported to the companion app.".into(),
                ],
            },
            PoiMeta {
                id: 3,
                x_percent: 77.5,
                y_percent: 30.0,
                label: "3".into(),
                title: "Control panel".into(),
                description: vec![
                    "Physical controls for the functions used most.".into(),
                    "Everything else lives in the app.".into(),
                ],
            },
        ];

        // Static table above satisfies every invariant
        Self {
            demo,
            assets,
            pois: pois.into_iter().map(|m| (m.id, m)).collect(),
        }
    }
}

fn check_entry(id: AssetId, entry: &AssetEntry) -> Result<(), CatalogError> {
    for direction in Direction::ALL {
        if entry.url(direction).trim().is_empty() {
            return Err(CatalogError::EmptyUrl { id, direction });
        }
    }
    if entry.forward == entry.reverse {
        return Err(CatalogError::SameUrl { id });
    }
    Ok(())
}
