//! Authored explosion types and the catalog they are resolved from.
//!
//! Loaded from `explosions.json` with support for an environment variable
//! override. The catalog keeps registration order: the first entry is the
//! fallback type when a caller names none.

use std::{
    collections::{BTreeMap, HashMap},
    env, fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

use crate::break_chance::{BreakChanceCurve, DEFAULT_BREAK_CHANCE, DEFAULT_BREAK_INTENSITY};

pub const BUILTIN_EXPLOSION_CATALOG: &str = include_str!("data/explosions.json");

pub const DEFAULT_REROLL_REDUCTION: f32 = 10.0;
pub const DEFAULT_SOUND_COLLECTION: &str = "explosion";
pub const DEFAULT_TEXTURE_PATH: &str = "/Textures/Effects/fire.rsi";
pub const DEFAULT_FIRE_STATES: u32 = 3;

/// Linear RGBA color, authored as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const ORANGE: Color = Color::rgba(1.0, 165.0 / 255.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.is_ascii() || !(digits.len() == 6 || digits.len() == 8) {
            return None;
        }
        let channel = |index: usize| -> Option<f32> {
            let byte = u8::from_str_radix(&digits[index..index + 2], 16).ok()?;
            Some(byte as f32 / 255.0)
        };
        let a = if digits.len() == 8 { channel(6)? } else { 1.0 };
        Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color '{value}'"))
    }
}

/// Damage per category, e.g. `{"Heat": 5.0}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DamageSpecifier {
    amounts: BTreeMap<String, f32>,
}

impl DamageSpecifier {
    pub fn new(amounts: BTreeMap<String, f32>) -> Self {
        Self { amounts }
    }

    pub fn get(&self, category: &str) -> f32 {
        self.amounts.get(category).copied().unwrap_or(0.0)
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            amounts: self
                .amounts
                .iter()
                .map(|(category, amount)| (category.clone(), amount * factor))
                .collect(),
        }
    }

    pub fn add(&mut self, other: &DamageSpecifier) {
        for (category, amount) in &other.amounts {
            *self.amounts.entry(category.clone()).or_insert(0.0) += amount;
        }
    }

    pub fn total(&self) -> f32 {
        self.amounts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.amounts
            .iter()
            .map(|(category, amount)| (category.as_str(), *amount))
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for DamageSpecifier {
    fn from_iter<T: IntoIterator<Item = (S, f32)>>(iter: T) -> Self {
        Self {
            amounts: iter
                .into_iter()
                .map(|(category, amount)| (category.into(), amount))
                .collect(),
        }
    }
}

/// Fields consumed only by effect playback.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionPresentation {
    pub light_color: Color,
    pub fire_color: Option<Color>,
    pub sound: String,
    pub texture_path: String,
    pub fire_states: u32,
}

impl Default for ExplosionPresentation {
    fn default() -> Self {
        Self {
            light_color: Color::ORANGE,
            fire_color: None,
            sound: DEFAULT_SOUND_COLLECTION.to_string(),
            texture_path: DEFAULT_TEXTURE_PATH.to_string(),
            fire_states: DEFAULT_FIRE_STATES,
        }
    }
}

/// Immutable parameters shared by every explosion of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionDefinition {
    id: String,
    damage_per_intensity: DamageSpecifier,
    break_curve: BreakChanceCurve,
    reroll_reduction: f32,
    presentation: ExplosionPresentation,
}

impl ExplosionDefinition {
    pub fn new(id: impl Into<String>, damage_per_intensity: DamageSpecifier) -> Self {
        Self {
            id: id.into(),
            damage_per_intensity,
            break_curve: BreakChanceCurve::default(),
            reroll_reduction: DEFAULT_REROLL_REDUCTION,
            presentation: ExplosionPresentation::default(),
        }
    }

    pub fn with_break_curve(mut self, curve: BreakChanceCurve) -> Self {
        self.break_curve = curve;
        self
    }

    pub fn with_reroll_reduction(mut self, reduction: f32) -> Self {
        self.reroll_reduction = reduction;
        self
    }

    pub fn with_presentation(mut self, presentation: ExplosionPresentation) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn damage_per_intensity(&self) -> &DamageSpecifier {
        &self.damage_per_intensity
    }

    pub fn break_curve(&self) -> &BreakChanceCurve {
        &self.break_curve
    }

    pub fn tile_break_reroll_reduction(&self) -> f32 {
        self.reroll_reduction
    }

    pub fn presentation(&self) -> &ExplosionPresentation {
        &self.presentation
    }

    /// Break chance at `intensity`; a malformed curve is logged and reads as 0.
    pub fn tile_break_chance(&self, intensity: f32) -> f32 {
        match self.break_curve.try_evaluate(intensity) {
            Ok(chance) => chance,
            Err(err) => {
                tracing::error!(
                    target: "blast::explosion",
                    id = %self.id,
                    error = %err,
                    "tile_break_chance.malformed"
                );
                0.0
            }
        }
    }

    /// Damage dealt to something hit at `intensity`.
    pub fn damage_at(&self, intensity: f32) -> DamageSpecifier {
        self.damage_per_intensity.scaled(intensity)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplosionDefinitionEntry {
    id: String,
    damage_per_intensity: DamageSpecifier,
    #[serde(default = "default_break_chance")]
    tile_break_chance: Vec<f32>,
    #[serde(default = "default_break_intensity")]
    tile_break_intensity: Vec<f32>,
    #[serde(default = "default_reroll_reduction")]
    tile_break_reroll_reduction: f32,
    #[serde(default = "default_light_color")]
    light_color: Color,
    #[serde(default)]
    fire_color: Option<Color>,
    #[serde(default = "default_sound")]
    sound: String,
    #[serde(default = "default_texture_path")]
    texture_path: String,
    #[serde(default = "default_fire_states")]
    fire_states: u32,
}

fn default_break_chance() -> Vec<f32> {
    DEFAULT_BREAK_CHANCE.to_vec()
}

fn default_break_intensity() -> Vec<f32> {
    DEFAULT_BREAK_INTENSITY.to_vec()
}

fn default_reroll_reduction() -> f32 {
    DEFAULT_REROLL_REDUCTION
}

fn default_light_color() -> Color {
    Color::ORANGE
}

fn default_sound() -> String {
    DEFAULT_SOUND_COLLECTION.to_string()
}

fn default_texture_path() -> String {
    DEFAULT_TEXTURE_PATH.to_string()
}

fn default_fire_states() -> u32 {
    DEFAULT_FIRE_STATES
}

impl From<ExplosionDefinitionEntry> for ExplosionDefinition {
    fn from(entry: ExplosionDefinitionEntry) -> Self {
        ExplosionDefinition::new(entry.id, entry.damage_per_intensity)
            .with_break_curve(BreakChanceCurve::new(
                entry.tile_break_intensity,
                entry.tile_break_chance,
            ))
            .with_reroll_reduction(entry.tile_break_reroll_reduction)
            .with_presentation(ExplosionPresentation {
                light_color: entry.light_color,
                fire_color: entry.fire_color,
                sound: entry.sound,
                texture_path: entry.texture_path,
                fire_states: entry.fire_states,
            })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExplosionCatalogFile {
    version: u32,
    explosions: Vec<ExplosionDefinitionEntry>,
}

#[derive(Debug, Error)]
pub enum ExplosionCatalogError {
    #[error("failed to parse explosion catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read explosion catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate explosion id {id}")]
    Duplicate { id: String },
    #[error("explosion entry {index} has an empty id")]
    EmptyId { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown explosion type: {0}")]
    UnknownExplosionType(String),
}

/// Every explosion type known to the server, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ExplosionCatalog {
    version: u32,
    definitions: Vec<Arc<ExplosionDefinition>>,
    index: HashMap<String, usize>,
}

impl ExplosionCatalog {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_EXPLOSION_CATALOG)
                .expect("builtin explosion catalog should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ExplosionCatalogError> {
        let file: ExplosionCatalogFile = serde_json::from_str(json)?;
        let mut catalog =
            Self::from_definitions(file.explosions.into_iter().map(ExplosionDefinition::from))?;
        catalog.version = file.version;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self, ExplosionCatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| ExplosionCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ExplosionDefinition>,
    ) -> Result<Self, ExplosionCatalogError> {
        let mut catalog = Self::default();
        for (index, definition) in definitions.into_iter().enumerate() {
            if definition.id().trim().is_empty() {
                return Err(ExplosionCatalogError::EmptyId { index });
            }
            if catalog.index.contains_key(definition.id()) {
                return Err(ExplosionCatalogError::Duplicate {
                    id: definition.id().to_string(),
                });
            }
            warn_on_suspect_definition(&definition);
            catalog
                .index
                .insert(definition.id().to_string(), catalog.definitions.len());
            catalog.definitions.push(Arc::new(definition));
        }
        Ok(catalog)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ExplosionDefinition>> {
        self.index.get(id).map(|&slot| &self.definitions[slot])
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<ExplosionDefinition>, ResolveError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownExplosionType(id.to_string()))
    }

    /// The first-registered definition. Arbitrary, but stable for a given load.
    pub fn default_definition(&self) -> Option<Arc<ExplosionDefinition>> {
        self.definitions.first().cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.definitions.iter().map(|definition| definition.id())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn warn_on_suspect_definition(definition: &ExplosionDefinition) {
    if let Err(err) = definition.break_curve().validate() {
        tracing::warn!(
            target: "blast::config",
            id = definition.id(),
            error = %err,
            "explosion_catalog.malformed_break_curve"
        );
    }
    let reduction = definition.tile_break_reroll_reduction();
    if !(reduction.is_finite() && reduction > 0.0) {
        tracing::warn!(
            target: "blast::config",
            id = definition.id(),
            reduction,
            "explosion_catalog.non_positive_reroll_reduction"
        );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ExplosionCatalogHandle(pub Arc<ExplosionCatalog>);

impl ExplosionCatalogHandle {
    pub fn new(catalog: Arc<ExplosionCatalog>) -> Self {
        Self(catalog)
    }

    pub fn get(&self) -> Arc<ExplosionCatalog> {
        Arc::clone(&self.0)
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ExplosionCatalogMetadata {
    path: Option<PathBuf>,
}

impl ExplosionCatalogMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl fmt::Display for ExplosionCatalogMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "builtin"),
        }
    }
}

pub fn load_explosion_catalog_from_env() -> (Arc<ExplosionCatalog>, ExplosionCatalogMetadata) {
    load_explosion_catalog(env::var("EXPLOSION_CATALOG_PATH").ok().map(PathBuf::from))
}

/// Loads `override_path` if given, else the catalog shipped beside the crate,
/// falling back to the builtin copy when the file cannot be used.
pub fn load_explosion_catalog(
    override_path: Option<PathBuf>,
) -> (Arc<ExplosionCatalog>, ExplosionCatalogMetadata) {
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/explosions.json");

    let candidates: Vec<PathBuf> = match override_path {
        Some(ref path) => vec![path.clone()],
        None => vec![default_path],
    };

    for path in candidates {
        match ExplosionCatalog::from_file(&path) {
            Ok(catalog) => {
                tracing::info!(
                    target: "blast::config",
                    path = %path.display(),
                    types = catalog.len(),
                    "explosion_catalog.loaded=file"
                );
                return (Arc::new(catalog), ExplosionCatalogMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "blast::config",
                    path = %path.display(),
                    error = %err,
                    "explosion_catalog.load_failed"
                );
            }
        }
    }

    let catalog = ExplosionCatalog::builtin();
    tracing::info!(
        target: "blast::config",
        types = catalog.len(),
        "explosion_catalog.loaded=builtin"
    );
    (catalog, ExplosionCatalogMetadata::new(None))
}
