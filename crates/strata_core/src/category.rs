//! State categories.
//!
//! A category is one dimension of inheritable render state. Every stacked
//! category owns one core stack during traversal; [`Category::Geometry`] is the
//! leaf category and is carried on display list entries instead.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A dimension of render state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Material,
    Texture,
    Flags,
    Lights,
    Fog,
    Clips,
    RegionMap,
    Shader,
    Layer,
    Xform,
    Geometry,
}

/// Number of categories that own a core stack.
pub const STACKED_CATEGORY_COUNT: usize = 10;

impl Category {
    /// Stacked categories in their fixed composite-key order.
    pub const STACKED: [Category; STACKED_CATEGORY_COUNT] = [
        Category::Material,
        Category::Texture,
        Category::Flags,
        Category::Lights,
        Category::Fog,
        Category::Clips,
        Category::RegionMap,
        Category::Shader,
        Category::Layer,
        Category::Xform,
    ];

    /// Every category, stacked ones first.
    pub const ALL: [Category; STACKED_CATEGORY_COUNT + 1] = [
        Category::Material,
        Category::Texture,
        Category::Flags,
        Category::Lights,
        Category::Fog,
        Category::Clips,
        Category::RegionMap,
        Category::Shader,
        Category::Layer,
        Category::Xform,
        Category::Geometry,
    ];

    /// Position of this category in [`Category::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Index into per-category stack arrays, `None` for the leaf category.
    #[inline]
    #[must_use]
    pub const fn stack_index(self) -> Option<usize> {
        match self {
            Category::Geometry => None,
            other => Some(other as usize),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_stacked(self) -> bool {
        !matches!(self, Category::Geometry)
    }

    /// Whether the category participates in the composite state key.
    ///
    /// Model transforms only feed per-draw uniforms, so they never split a
    /// batch.
    #[inline]
    #[must_use]
    pub const fn affects_state_key(self) -> bool {
        !matches!(self, Category::Xform)
    }

    /// Whether the backend binds cores of this category. Transforms feed
    /// per-draw uniforms and layers only order and filter entries.
    #[inline]
    #[must_use]
    pub const fn is_bound(self) -> bool {
        !matches!(self, Category::Xform | Category::Layer)
    }

    /// Name used in node descriptions and log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Category::Material => "material",
            Category::Texture => "texture",
            Category::Flags => "flags",
            Category::Lights => "lights",
            Category::Fog => "fog",
            Category::Clips => "clips",
            Category::RegionMap => "regionMap",
            Category::Shader => "shader",
            Category::Layer => "layer",
            Category::Xform => "xform",
            Category::Geometry => "geometry",
        }
    }

    #[must_use]
    pub const fn mask(self) -> CategoryMask {
        CategoryMask::from_bits_truncate(1 << (self as u32))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of categories, e.g. the categories a backend had to rebind for an entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CategoryMask: u32 {
        const MATERIAL   = 1 << 0;
        const TEXTURE    = 1 << 1;
        const FLAGS      = 1 << 2;
        const LIGHTS     = 1 << 3;
        const FOG        = 1 << 4;
        const CLIPS      = 1 << 5;
        const REGION_MAP = 1 << 6;
        const SHADER     = 1 << 7;
        const LAYER      = 1 << 8;
        const XFORM      = 1 << 9;
        const GEOMETRY   = 1 << 10;
    }
}

impl CategoryMask {
    /// Iterates the categories contained in this mask in [`Category::ALL`] order.
    pub fn categories(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |c| self.contains(c.mask()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacked_indices_are_dense() {
        for (i, category) in Category::STACKED.iter().enumerate() {
            assert_eq!(category.stack_index(), Some(i));
        }
        assert_eq!(Category::Geometry.stack_index(), None);
    }

    #[test]
    fn mask_round_trips_categories() {
        let mask = Category::Texture.mask() | Category::Geometry.mask();
        let collected: Vec<_> = mask.categories().collect();
        assert_eq!(collected, vec![Category::Texture, Category::Geometry]);
    }

    #[test]
    fn layers_order_entries_without_binding() {
        assert!(Category::Layer.affects_state_key());
        assert!(!Category::Layer.is_bound());
        assert!(!Category::Xform.is_bound());
        assert!(Category::Texture.is_bound());
    }
}
