use bevy::prelude::*;
use noisy_bevy::simplex_noise_2d_seeded;

/// One fixed-width tile. Everything drawn by the block must fit in
/// `[-width / 2, width / 2]` around its origin, or it pops in at the right edge.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct SceneryBlock {
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerChain {
    Infinite,
    // place at most max_blocks, then start the layer at index next
    Finite { max_blocks: u32, next: Option<usize> },
}

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ScreenBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl ScreenBounds {
    pub fn from_view(view_height: f32, aspect: f32) -> Self {
        let half_height = view_height * 0.5;
        let half_width = half_height * aspect;
        Self {
            left: -half_width,
            right: half_width,
            bottom: -half_height,
            top: half_height,
        }
    }
}

impl Default for ScreenBounds {
    fn default() -> Self {
        Self::from_view(10.0, 16.0 / 9.0)
    }
}

pub trait BlockPicker {
    /// Returns an index in `0..pool_len`. Never called with an empty pool.
    fn pick(&mut self, pool_len: usize) -> usize;
}

#[derive(Resource, Debug, Clone)]
pub struct NoisePicker {
    seed: f32,
    step: u32,
}

impl NoisePicker {
    pub fn new(seed: f32) -> Self {
        Self { seed, step: 0 }
    }
}

impl BlockPicker for NoisePicker {
    fn pick(&mut self, pool_len: usize) -> usize {
        self.step = self.step.wrapping_add(1);
        let noise = simplex_noise_2d_seeded(Vec2::new(self.step as f32 * 0.618, 0.5), self.seed);

        // raw simplex output clusters around zero, spread it out before bucketing
        let spread = (noise * 9973.0).fract().abs();
        ((spread * pool_len as f32) as usize).min(pool_len - 1)
    }
}

// x is the block's centre
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedBlock {
    pub entity: Entity,
    pub x: f32,
    pub width: f32,
}

impl PlacedBlock {
    pub fn right_edge(&self) -> f32 {
        self.x + self.width * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PooledBlock {
    entity: Entity,
    width: f32,
}

impl From<PlacedBlock> for PooledBlock {
    fn from(block: PlacedBlock) -> Self {
        Self {
            entity: block.entity,
            width: block.width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handoff {
    pub next: usize,
    pub start_x: f32,
}

#[derive(Debug, Clone)]
pub struct SceneryLayer {
    pub name: String,
    pub parallax_speed: f32,
    pub chain: LayerChain,
    pool: Vec<PooledBlock>,
    visible: Vec<PlacedBlock>,
    creation_enabled: bool,
    blocks_created: u32,
    starved: bool,
}

impl SceneryLayer {
    pub fn new(
        name: impl Into<String>,
        parallax_speed: f32,
        chain: LayerChain,
        blocks: impl IntoIterator<Item = (Entity, SceneryBlock)>,
    ) -> Self {
        Self {
            name: name.into(),
            parallax_speed,
            chain,
            pool: blocks
                .into_iter()
                .map(|(entity, block)| PooledBlock {
                    entity,
                    width: block.width,
                })
                .collect(),
            visible: Vec::new(),
            creation_enabled: true,
            blocks_created: 0,
            starved: false,
        }
    }

    pub fn creation_enabled(&self) -> bool {
        self.creation_enabled
    }

    pub fn blocks_created(&self) -> u32 {
        self.blocks_created
    }

    pub fn visible_blocks(&self) -> &[PlacedBlock] {
        &self.visible
    }

    pub fn pooled_blocks(&self) -> impl Iterator<Item = Entity> + '_ {
        self.pool.iter().map(|block| block.entity)
    }

    pub fn restart(&mut self) {
        self.blocks_created = 0;
        self.creation_enabled = true;
        self.starved = false;
        self.pool.extend(self.visible.drain(..).map(PooledBlock::from));
    }

    /// The layer that must stay idle until this one runs out. The level does the disabling.
    pub fn disable_next_layer(&self) -> Option<usize> {
        match self.chain {
            LayerChain::Infinite => None,
            LayerChain::Finite { next: None, .. } => {
                warn!(
                    "Layer {} is finite but has no next layer set. Player could reach the edge of the world!",
                    self.name
                );
                None
            }
            LayerChain::Finite { next, .. } => next,
        }
    }

    pub fn enable_block_creation(
        &mut self,
        start_x: f32,
        bounds: &ScreenBounds,
        picker: &mut dyn BlockPicker,
    ) -> Option<Handoff> {
        self.creation_enabled = true;
        self.blocks_created = 0;
        self.generate_new_blocks(start_x, bounds, picker)
    }

    pub fn disable_block_creation(&mut self) {
        self.creation_enabled = false;
    }

    pub fn update_blocks(
        &mut self,
        scroll_speed: f32,
        dt: f32,
        bounds: &ScreenBounds,
        picker: &mut dyn BlockPicker,
    ) -> Option<Handoff> {
        let shift = scroll_speed * self.parallax_speed * dt;
        let mut block_x = bounds.left;

        for block in &mut self.visible {
            block.x -= shift;
            block_x = block_x.max(block.right_edge());
        }

        let (offscreen, onscreen): (Vec<PlacedBlock>, Vec<PlacedBlock>) = self
            .visible
            .drain(..)
            .partition(|block| block.right_edge() < bounds.left);
        self.visible = onscreen;
        self.pool.extend(offscreen.into_iter().map(PooledBlock::from));

        if block_x < bounds.right {
            self.generate_new_blocks(block_x, bounds, picker)
        } else {
            None
        }
    }

    fn generate_new_blocks(
        &mut self,
        mut block_x: f32,
        bounds: &ScreenBounds,
        picker: &mut dyn BlockPicker,
    ) -> Option<Handoff> {
        while self.creation_enabled && block_x < bounds.right {
            if self.has_blocks_remaining() {
                match self.add_new_block(block_x, picker) {
                    Some(block) => block_x += block.width,
                    None => return None,
                }
            } else {
                self.disable_block_creation();
                if let LayerChain::Finite {
                    next: Some(next), ..
                } = self.chain
                {
                    return Some(Handoff {
                        next,
                        start_x: block_x,
                    });
                }
            }
        }
        None
    }

    fn has_blocks_remaining(&self) -> bool {
        match self.chain {
            LayerChain::Infinite => true,
            LayerChain::Finite { max_blocks, .. } => self.blocks_created < max_blocks,
        }
    }

    fn add_new_block(&mut self, left_x: f32, picker: &mut dyn BlockPicker) -> Option<PlacedBlock> {
        if self.pool.is_empty() {
            if !self.starved {
                warn!("Not enough blocks in layer {}", self.name);
                self.starved = true;
            }
            return None;
        }

        let index = picker.pick(self.pool.len()).min(self.pool.len() - 1);
        let pooled = self.pool.remove(index);
        let block = PlacedBlock {
            entity: pooled.entity,
            x: left_x + pooled.width * 0.5,
            width: pooled.width,
        };
        self.visible.push(block);
        self.blocks_created += 1;
        self.starved = false;

        Some(block)
    }

    /// Returns false if the block was not visible.
    pub fn remove_visible_block(&mut self, entity: Entity) -> bool {
        match self.visible.iter().position(|block| block.entity == entity) {
            Some(index) => {
                let block = self.visible.remove(index);
                self.pool.push(block.into());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub struct FirstPicker;

    impl BlockPicker for FirstPicker {
        fn pick(&mut self, _pool_len: usize) -> usize {
            0
        }
    }

    pub fn blocks(first_id: u32, widths: &[f32]) -> Vec<(Entity, SceneryBlock)> {
        widths
            .iter()
            .enumerate()
            .map(|(i, &width)| (Entity::from_raw(first_id + i as u32), SceneryBlock { width }))
            .collect()
    }

    fn bounds() -> ScreenBounds {
        ScreenBounds {
            left: -8.0,
            right: 8.0,
            bottom: -5.0,
            top: 5.0,
        }
    }

    fn assert_gap_free(layer: &SceneryLayer, start: f32) {
        let mut edge = start;
        for block in layer.visible_blocks() {
            assert!(
                (block.x - block.width * 0.5 - edge).abs() < 1e-4,
                "block {:?} does not start at {}",
                block,
                edge
            );
            edge = block.right_edge();
        }
    }

    #[test]
    fn fills_screen_from_left_edge() {
        let mut layer = SceneryLayer::new("ground", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 6]));

        let handoff = layer.update_blocks(0.0, 0.016, &bounds(), &mut FirstPicker);

        assert_eq!(handoff, None);
        assert_eq!(layer.visible_blocks().len(), 4);
        assert_eq!(layer.pooled_blocks().count(), 2);
        assert_gap_free(&layer, -8.0);
        assert_eq!(layer.blocks_created(), 4);
    }

    #[test]
    fn scrolls_by_parallax_speed() {
        let mut layer = SceneryLayer::new("hills", 0.5, LayerChain::Infinite, blocks(0, &[16.0; 3]));
        layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker);
        let before = layer.visible_blocks()[0].x;

        layer.update_blocks(8.0, 0.5, &bounds(), &mut FirstPicker);

        assert!((layer.visible_blocks()[0].x - (before - 2.0)).abs() < 1e-5);
    }

    #[test]
    fn recycles_blocks_past_left_edge() {
        let mut layer = SceneryLayer::new("ground", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 6]));
        layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker);
        let first = layer.visible_blocks()[0].entity;

        // first block spans [-8, -4]; shift it fully past the edge
        layer.update_blocks(4.5, 1.0, &bounds(), &mut FirstPicker);

        assert!(layer.visible_blocks().iter().all(|b| b.entity != first));
        assert!(layer.pooled_blocks().any(|e| e == first));
        assert_gap_free(&layer, layer.visible_blocks()[0].x - 2.0);
        let last = layer.visible_blocks().last().copied().unwrap();
        assert!(last.right_edge() >= bounds().right);
    }

    #[test]
    fn block_in_exactly_one_list() {
        let mut layer = SceneryLayer::new("ground", 1.0, LayerChain::Infinite, blocks(0, &[3.0; 8]));
        for _ in 0..50 {
            layer.update_blocks(8.0, 0.1, &bounds(), &mut FirstPicker);
            let visible: Vec<Entity> = layer.visible_blocks().iter().map(|b| b.entity).collect();
            let pooled: Vec<Entity> = layer.pooled_blocks().collect();
            assert_eq!(visible.len() + pooled.len(), 8);
            assert!(visible.iter().all(|e| !pooled.contains(e)));
        }
    }

    #[test]
    fn starved_pool_stops_placing() {
        let mut layer = SceneryLayer::new("sparse", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 2]));

        layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker);

        assert_eq!(layer.visible_blocks().len(), 2);
        assert_eq!(layer.pooled_blocks().count(), 0);
        assert!(layer.creation_enabled());
    }

    #[test]
    fn starvation_is_flagged_once_per_episode() {
        let mut layer = SceneryLayer::new("sparse", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 2]));

        layer.update_blocks(0.0, 0.016, &bounds(), &mut FirstPicker);
        assert!(layer.starved);

        // still short next frame, same episode
        layer.update_blocks(0.0, 0.016, &bounds(), &mut FirstPicker);
        assert!(layer.starved);
        assert_eq!(layer.visible_blocks().len(), 2);

        // a placement ends the episode even though the strip is still short
        let first = layer.visible_blocks()[0].entity;
        assert!(layer.remove_visible_block(first));
        assert!(layer.add_new_block(0.0, &mut FirstPicker).is_some());
        assert!(!layer.starved);

        layer.update_blocks(0.0, 0.016, &bounds(), &mut FirstPicker);
        assert!(layer.starved);
    }

    #[test]
    fn finite_layer_hands_off_at_reached_x() {
        let chain = LayerChain::Finite {
            max_blocks: 2,
            next: Some(1),
        };
        let mut layer = SceneryLayer::new("intro", 1.0, chain, blocks(0, &[4.0; 6]));

        let handoff = layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker);

        assert_eq!(
            handoff,
            Some(Handoff {
                next: 1,
                start_x: 0.0
            })
        );
        assert_eq!(layer.visible_blocks().len(), 2);
        assert!(!layer.creation_enabled());
    }

    #[test]
    fn finite_layer_without_next_just_stops() {
        let chain = LayerChain::Finite {
            max_blocks: 1,
            next: None,
        };
        let mut layer = SceneryLayer::new("dead end", 1.0, chain, blocks(0, &[4.0; 3]));

        assert_eq!(layer.disable_next_layer(), None);
        assert_eq!(layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker), None);
        assert_eq!(layer.visible_blocks().len(), 1);
        assert!(!layer.creation_enabled());
    }

    #[test]
    fn zero_max_blocks_hands_off_immediately() {
        let chain = LayerChain::Finite {
            max_blocks: 0,
            next: Some(3),
        };
        let mut layer = SceneryLayer::new("skip", 1.0, chain, blocks(0, &[4.0]));

        let handoff = layer.enable_block_creation(2.5, &bounds(), &mut FirstPicker);

        assert_eq!(
            handoff,
            Some(Handoff {
                next: 3,
                start_x: 2.5
            })
        );
        assert!(layer.visible_blocks().is_empty());
    }

    #[test]
    fn enable_starts_at_given_x() {
        let mut layer = SceneryLayer::new("track", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 4]));
        layer.disable_block_creation();
        assert_eq!(layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker), None);
        assert!(layer.visible_blocks().is_empty());

        layer.enable_block_creation(1.0, &bounds(), &mut FirstPicker);

        assert_gap_free(&layer, 1.0);
        assert_eq!(layer.visible_blocks().len(), 2);
    }

    #[test]
    fn restart_returns_everything_to_pool() {
        let chain = LayerChain::Finite {
            max_blocks: 2,
            next: Some(1),
        };
        let mut layer = SceneryLayer::new("intro", 1.0, chain, blocks(0, &[4.0; 4]));
        layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker);

        layer.restart();

        assert!(layer.visible_blocks().is_empty());
        assert_eq!(layer.pooled_blocks().count(), 4);
        assert_eq!(layer.blocks_created(), 0);
        assert!(layer.creation_enabled());
        assert_eq!(layer.disable_next_layer(), Some(1));
    }

    #[test]
    fn remove_visible_block_only_touches_visible() {
        let mut layer = SceneryLayer::new("ground", 1.0, LayerChain::Infinite, blocks(0, &[8.0; 3]));
        layer.update_blocks(0.0, 0.0, &bounds(), &mut FirstPicker);
        let placed = layer.visible_blocks()[0].entity;
        let pooled = layer.pooled_blocks().next().unwrap();

        assert!(layer.remove_visible_block(placed));
        assert!(!layer.remove_visible_block(pooled));
        assert_eq!(layer.pooled_blocks().count(), 2);
    }

    #[test]
    fn noise_picker_stays_in_range() {
        let mut picker = NoisePicker::new(23.0);
        for len in 1..12 {
            for _ in 0..20 {
                assert!(picker.pick(len) < len);
            }
        }
    }

    #[test]
    fn screen_bounds_follow_aspect() {
        let bounds = ScreenBounds::from_view(10.0, 2.0);
        assert_eq!(bounds.right, 10.0);
        assert_eq!(bounds.left, -10.0);
        assert_eq!(bounds.bottom, -5.0);
    }
}
