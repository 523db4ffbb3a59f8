//! Static catalog of secret items.

use crate::types::Item;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog contains no items")]
    Empty,
}

/// Shape of one entry in a catalog file. `image` falls back to `/images/{name}.png`.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: u32,
    name: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl From<CatalogEntry> for Item {
    fn from(entry: CatalogEntry) -> Self {
        let image = entry
            .image
            .unwrap_or_else(|| default_image(&entry.name));
        let query = entry.query.unwrap_or_else(|| entry.name.to_lowercase());
        Item {
            id: entry.id,
            name: entry.name,
            query,
            image,
        }
    }
}

fn default_image(name: &str) -> String {
    format!("/images/{}.png", name)
}

const BUILTIN_ITEMS: &[(&str, &str)] = &[
    ("Umbrella", "umbrella"),
    ("Toaster", "toaster"),
    ("Violin", "violin"),
    ("Lighthouse", "lighthouse"),
    ("Snowboard", "snowboard"),
    ("Microscope", "microscope"),
    ("Hammock", "hammock"),
    ("Typewriter", "typewriter"),
    ("Cactus", "cactus plant"),
    ("Compass", "magnetic compass"),
    ("Accordion", "accordion instrument"),
    ("Telescope", "telescope"),
    ("Submarine", "submarine"),
    ("Chess Board", "chess board"),
    ("Hot Air Balloon", "hot air balloon"),
];

/// Non-empty, enumerable set of items
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Result<Self, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { items })
    }

    /// Items compiled into the binary
    pub fn builtin() -> Self {
        let items = BUILTIN_ITEMS
            .iter()
            .zip(1u32..)
            .map(|((name, query), id)| Item {
                id,
                name: name.to_string(),
                query: query.to_string(),
                image: default_image(name),
            })
            .collect();
        Self { items }
    }

    /// Load a JSON array of `{id, name, query?, image?}` records
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)?;
        Self::new(entries.into_iter().map(Item::from).collect())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uniformly pick one item
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> &Item {
        // Non-empty by construction
        self.items.choose(rng).unwrap_or(&self.items[0])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
