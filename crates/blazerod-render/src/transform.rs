use glam::Mat4;

/// Layers of a node's local transform, in composition order.
///
/// The local transform of a node is the product of its layers from
/// [`TransformId::Base`] to [`TransformId::Render`]; a missing layer counts as
/// identity, except the base layer, which falls back to the node's authored
/// transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformId {
    Base,
    Ik,
    Influence,
    Physics,
    Render,
}

impl TransformId {
    pub const COUNT: usize = 5;
    pub const ALL: [TransformId; Self::COUNT] = [
        TransformId::Base,
        TransformId::Ik,
        TransformId::Influence,
        TransformId::Physics,
        TransformId::Render,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Sparse per-layer transforms of one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformLayers {
    layers: [Option<Mat4>; TransformId::COUNT],
}

impl TransformLayers {
    pub fn get(&self, id: TransformId) -> Option<Mat4> {
        self.layers[id.index()]
    }

    /// Returns whether the stored value changed.
    pub fn set(&mut self, id: TransformId, transform: Mat4) -> bool {
        let slot = &mut self.layers[id.index()];
        if *slot == Some(transform) {
            return false;
        }
        *slot = Some(transform);
        true
    }

    /// Reset `id` and every later layer. Returns whether anything changed.
    pub fn clear_from(&mut self, id: TransformId) -> bool {
        let mut changed = false;
        for slot in &mut self.layers[id.index()..] {
            changed |= slot.take().is_some();
        }
        changed
    }

    /// Product of the layers before `id`. The base layer is always included.
    pub fn compose_before(&self, id: TransformId, authored: Mat4) -> Mat4 {
        let base = self.layers[0].unwrap_or(authored);
        self.layers[1..id.index().max(1)]
            .iter()
            .flatten()
            .fold(base, |acc, layer| acc * *layer)
    }

    /// Product of every layer.
    pub fn compose(&self, authored: Mat4) -> Mat4 {
        let base = self.layers[0].unwrap_or(authored);
        self.layers[1..]
            .iter()
            .flatten()
            .fold(base, |acc, layer| acc * *layer)
    }

    /// Product of the layers after `id`.
    pub fn compose_after(&self, id: TransformId) -> Mat4 {
        self.layers[id.index() + 1..]
            .iter()
            .flatten()
            .fold(Mat4::IDENTITY, |acc, layer| acc * *layer)
    }
}
