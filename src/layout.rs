//! Scenery layout files.
//!
//! Layers, their blocks and the pieces each block is built from are described
//! in RON (see `assets/scenery.ron`). A copy of the default layout is compiled
//! in so the game still has a track when the file is missing or broken.

use crate::scenery::LayerChain;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const BUILTIN_LAYOUT: &str = include_str!("../assets/scenery.ron");

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("could not read scenery layout: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse scenery layout: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("duplicate layer name `{0}`")]
    DuplicateLayer(String),
    #[error("layer `{0}` has no blocks")]
    EmptyLayer(String),
    #[error("layer `{layer}` chains to unknown layer `{next}`")]
    UnknownLayer { layer: String, next: String },
    #[error("layer `{layer}`, block {block}: width must be positive, got {width}")]
    InvalidWidth {
        layer: String,
        block: usize,
        width: f32,
    },
    #[error("layer `{layer}`, block {block}: element {element} has an invalid size")]
    InvalidElement {
        layer: String,
        block: usize,
        element: usize,
    },
}

#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneryLayout {
    pub layers: Vec<LayerDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    #[serde(default = "default_parallax")]
    pub parallax_speed: f32,
    /// Z position of the layer. The playfield sits at 0.
    #[serde(default)]
    pub depth: f32,
    #[serde(default)]
    pub chain: ChainDef,
    pub blocks: Vec<BlockDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ChainDef {
    #[default]
    Infinite,
    Finite {
        max_blocks: u32,
        #[serde(default)]
        next: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDef {
    pub width: f32,
    /// How many pooled instances of this block to spawn.
    #[serde(default = "default_copies")]
    pub copies: u32,
    #[serde(default)]
    pub elements: Vec<ElementDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Solid, the player can stand on it and dies running into its side.
    Ground,
    /// Kills on touch.
    Spikes,
    /// Visual only.
    Decor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    pub kind: ElementKind,
    pub size: [f32; 2],
    #[serde(default)]
    pub offset: [f32; 2],
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    /// Revolutions per second around the z axis.
    #[serde(default)]
    pub spin: Option<f32>,
}

fn default_parallax() -> f32 {
    1.0
}

fn default_copies() -> u32 {
    1
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl ElementDef {
    /// Whether the element reaches outside its block's width.
    pub fn overhangs(&self, block_width: f32) -> bool {
        self.offset[0].abs() + self.size[0] * 0.5 > block_width * 0.5 + f32::EPSILON
    }
}

impl SceneryLayout {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn from_ron_str(s: &str) -> Result<Self, LayoutError> {
        let layout: Self = ron::from_str(s)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn builtin() -> Result<Self, LayoutError> {
        Self::from_ron_str(BUILTIN_LAYOUT)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut names = HashMap::new();
        for (i, layer) in self.layers.iter().enumerate() {
            if names.insert(layer.name.as_str(), i).is_some() {
                return Err(LayoutError::DuplicateLayer(layer.name.clone()));
            }
        }

        for layer in &self.layers {
            if layer.blocks.iter().all(|block| block.copies == 0) {
                return Err(LayoutError::EmptyLayer(layer.name.clone()));
            }
            if let ChainDef::Finite { next: Some(next), .. } = &layer.chain {
                if !names.contains_key(next.as_str()) {
                    return Err(LayoutError::UnknownLayer {
                        layer: layer.name.clone(),
                        next: next.clone(),
                    });
                }
            }

            for (b, block) in layer.blocks.iter().enumerate() {
                if !(block.width.is_finite() && block.width > 0.0) {
                    return Err(LayoutError::InvalidWidth {
                        layer: layer.name.clone(),
                        block: b,
                        width: block.width,
                    });
                }
                for (e, element) in block.elements.iter().enumerate() {
                    let valid = element.size.iter().all(|v| v.is_finite() && *v > 0.0)
                        && element.offset.iter().all(|v| v.is_finite());
                    if !valid {
                        return Err(LayoutError::InvalidElement {
                            layer: layer.name.clone(),
                            block: b,
                            element: e,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolves a layer's chain settings to arena indices. Assumes a validated layout.
    pub fn chain_of(&self, index: usize) -> LayerChain {
        match &self.layers[index].chain {
            ChainDef::Infinite => LayerChain::Infinite,
            ChainDef::Finite { max_blocks, next } => LayerChain::Finite {
                max_blocks: *max_blocks,
                next: next
                    .as_ref()
                    .and_then(|name| self.layers.iter().position(|layer| &layer.name == name)),
            },
        }
    }
}
