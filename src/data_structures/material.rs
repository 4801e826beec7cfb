//! Material binding decisions.
//!
//! [`resolve_material`] decides, per texture channel, whether a primitive
//! samples the material's authored texture or one of the neutral fallback
//! textures, and which factors go into the material uniform. It is pure so the
//! GPU side only has to turn the result into a bind group.

use crate::data_structures::document::Document;

/// Global feature toggles read by the material binder and the forward shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureFlags {
    pub texture: bool,
    pub metallic_roughness: bool,
    pub occlusion: bool,
    pub emission: bool,
    pub normal: bool,
    pub environment: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            texture: true,
            metallic_roughness: true,
            occlusion: true,
            emission: true,
            normal: true,
            environment: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Texture,
    MetallicRoughness,
    Occlusion,
    Emission,
    Normal,
    Environment,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Texture,
        Feature::MetallicRoughness,
        Feature::Occlusion,
        Feature::Emission,
        Feature::Normal,
        Feature::Environment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Texture => "texture",
            Feature::MetallicRoughness => "metallic-roughness map",
            Feature::Occlusion => "occlusion map",
            Feature::Emission => "emission map",
            Feature::Normal => "normal map",
            Feature::Environment => "environment map",
        }
    }
}

impl FeatureFlags {
    fn flag_mut(&mut self, feature: Feature) -> &mut bool {
        match feature {
            Feature::Texture => &mut self.texture,
            Feature::MetallicRoughness => &mut self.metallic_roughness,
            Feature::Occlusion => &mut self.occlusion,
            Feature::Emission => &mut self.emission,
            Feature::Normal => &mut self.normal,
            Feature::Environment => &mut self.environment,
        }
    }

    /// Flips `feature` and returns its new state.
    pub fn toggle(&mut self, feature: Feature) -> bool {
        let flag = self.flag_mut(feature);
        *flag = !*flag;
        *flag
    }
}

/// Neutral 1x1 textures bound when a channel has nothing authored to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fallback {
    White,
    Black,
    /// (0.5, 0.5, 1.0): the unperturbed tangent-space normal.
    FlatNormal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// Index into [`Document::textures`].
    Scene(usize),
    Fallback(Fallback),
}

/// Identifies a material bind group. The environment toggle lives in the
/// per-node uniforms, so it is masked out here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub material: Option<usize>,
    pub features: FeatureFlags,
}

impl MaterialKey {
    pub fn new(material: Option<usize>, features: &FeatureFlags) -> Self {
        Self {
            material,
            features: FeatureFlags {
                environment: false,
                ..*features
            },
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 3],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub occlusion_strength: f32,
    pub normal_scale: f32,
    // Uniforms are 16 byte aligned
    pub _padding: f32,
}

impl MaterialUniform {
    /// White, dielectric, unoccluded, not emissive, flat.
    pub const NEUTRAL: MaterialUniform = MaterialUniform {
        base_color_factor: [1.0; 4],
        emissive_factor: [0.0; 3],
        metallic_factor: 0.0,
        roughness_factor: 0.0,
        occlusion_strength: 1.0,
        normal_scale: 1.0,
        _padding: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMaterial {
    pub key: MaterialKey,
    pub base_color: TextureSource,
    pub metallic_roughness: TextureSource,
    pub emissive: TextureSource,
    pub occlusion: TextureSource,
    pub normal: TextureSource,
    pub uniform: MaterialUniform,
}

impl ResolvedMaterial {
    fn neutral(key: MaterialKey) -> Self {
        Self {
            key,
            base_color: TextureSource::Fallback(Fallback::White),
            metallic_roughness: TextureSource::Fallback(Fallback::White),
            emissive: TextureSource::Fallback(Fallback::Black),
            occlusion: TextureSource::Fallback(Fallback::White),
            normal: TextureSource::Fallback(Fallback::FlatNormal),
            uniform: MaterialUniform::NEUTRAL,
        }
    }

    /// Every channel in the order of the material bind group.
    pub fn sources(&self) -> [TextureSource; 5] {
        [
            self.base_color,
            self.metallic_roughness,
            self.emissive,
            self.occlusion,
            self.normal,
        ]
    }
}

/// Authored texture when it exists in the texture table, else `fallback`.
fn channel(doc: &Document, index: Option<usize>, fallback: Fallback) -> TextureSource {
    match index {
        Some(i) if i < doc.textures.len() => TextureSource::Scene(i),
        Some(i) => {
            log::warn!(
                "Material references texture {} but only {} exist",
                i,
                doc.textures.len()
            );
            TextureSource::Fallback(fallback)
        }
        None => TextureSource::Fallback(fallback),
    }
}

/// Decides texture sources and factors for one primitive.
///
/// A primitive without material, a material index out of range, or a scene
/// without any textures gets the neutral material. Otherwise each channel is
/// resolved on its own: a disabled feature yields the neutral texture and
/// factors of that channel, an absent texture yields the neutral texture with
/// the authored factors.
pub fn resolve_material(
    doc: &Document,
    material: Option<usize>,
    features: &FeatureFlags,
) -> ResolvedMaterial {
    let key = MaterialKey::new(material, features);
    let mut resolved = ResolvedMaterial::neutral(key);
    let material = match material.and_then(|m| doc.materials.get(m)) {
        Some(material) => material,
        None => return resolved,
    };
    if doc.textures.is_empty() {
        return resolved;
    }

    if features.texture {
        resolved.base_color = channel(doc, material.base_color_texture, Fallback::White);
        resolved.uniform.base_color_factor = material.base_color_factor;
    }
    if features.metallic_roughness {
        resolved.metallic_roughness =
            channel(doc, material.metallic_roughness_texture, Fallback::White);
        resolved.uniform.metallic_factor = material.metallic_factor;
        resolved.uniform.roughness_factor = material.roughness_factor;
    }
    if features.emission {
        resolved.emissive = channel(doc, material.emissive_texture, Fallback::Black);
        resolved.uniform.emissive_factor = material.emissive_factor;
    }
    if features.occlusion {
        resolved.occlusion = channel(doc, material.occlusion_texture, Fallback::White);
        resolved.uniform.occlusion_strength = material.occlusion_strength;
    }
    if features.normal {
        resolved.normal = channel(doc, material.normal_texture, Fallback::FlatNormal);
        resolved.uniform.normal_scale = material.normal_scale;
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::document::{Material, Texture};

    fn textured_material() -> Material {
        Material {
            base_color_factor: [0.5, 0.25, 1.0, 1.0],
            base_color_texture: Some(0),
            metallic_factor: 0.7,
            roughness_factor: 0.3,
            metallic_roughness_texture: Some(1),
            emissive_factor: [1.0, 0.5, 0.0],
            emissive_texture: Some(2),
            occlusion_texture: Some(3),
            occlusion_strength: 0.8,
            normal_texture: Some(4),
            normal_scale: 2.0,
        }
    }

    fn document(texture_count: usize, material: Material) -> Document {
        Document {
            materials: vec![material],
            textures: vec![Texture::default(); texture_count],
            ..Default::default()
        }
    }

    fn all_fallback(resolved: &ResolvedMaterial) -> bool {
        resolved
            .sources()
            .iter()
            .all(|s| matches!(s, TextureSource::Fallback(_)))
    }

    #[test]
    fn empty_texture_table_is_fully_neutral() {
        let doc = document(0, textured_material());
        let resolved = resolve_material(&doc, Some(0), &FeatureFlags::default());
        assert!(all_fallback(&resolved));
        assert_eq!(resolved.uniform, MaterialUniform::NEUTRAL);
    }

    #[test]
    fn missing_material_is_neutral() {
        let doc = document(5, textured_material());
        let resolved = resolve_material(&doc, None, &FeatureFlags::default());
        assert!(all_fallback(&resolved));
        let resolved = resolve_material(&doc, Some(7), &FeatureFlags::default());
        assert!(all_fallback(&resolved));
    }

    #[test]
    fn authored_channels_when_everything_is_enabled() {
        let doc = document(5, textured_material());
        let resolved = resolve_material(&doc, Some(0), &FeatureFlags::default());
        assert_eq!(
            resolved.sources(),
            [
                TextureSource::Scene(0),
                TextureSource::Scene(1),
                TextureSource::Scene(2),
                TextureSource::Scene(3),
                TextureSource::Scene(4),
            ]
        );
        assert_eq!(resolved.uniform.base_color_factor, [0.5, 0.25, 1.0, 1.0]);
        assert_eq!(resolved.uniform.metallic_factor, 0.7);
        assert_eq!(resolved.uniform.normal_scale, 2.0);
    }

    #[test]
    fn absent_texture_index_uses_fallback_not_index_zero() {
        let mut material = textured_material();
        material.base_color_texture = None;
        material.normal_texture = None;
        let doc = document(5, material);
        let resolved = resolve_material(&doc, Some(0), &FeatureFlags::default());
        assert_eq!(resolved.base_color, TextureSource::Fallback(Fallback::White));
        assert_eq!(
            resolved.normal,
            TextureSource::Fallback(Fallback::FlatNormal)
        );
        // factors still apply
        assert_eq!(resolved.uniform.base_color_factor, [0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn out_of_range_texture_index_is_guarded() {
        let doc = document(2, textured_material());
        let resolved = resolve_material(&doc, Some(0), &FeatureFlags::default());
        assert_eq!(resolved.base_color, TextureSource::Scene(0));
        assert_eq!(resolved.emissive, TextureSource::Fallback(Fallback::Black));
        assert_eq!(resolved.occlusion, TextureSource::Fallback(Fallback::White));
    }

    #[test]
    fn toggles_only_affect_their_channel() {
        let doc = document(5, textured_material());
        let mut features = FeatureFlags::default();
        assert!(!features.toggle(Feature::MetallicRoughness));
        assert!(!features.toggle(Feature::Emission));
        let resolved = resolve_material(&doc, Some(0), &features);
        assert_eq!(resolved.base_color, TextureSource::Scene(0));
        assert_eq!(
            resolved.metallic_roughness,
            TextureSource::Fallback(Fallback::White)
        );
        assert_eq!(resolved.uniform.metallic_factor, 0.0);
        assert_eq!(resolved.uniform.roughness_factor, 0.0);
        assert_eq!(resolved.emissive, TextureSource::Fallback(Fallback::Black));
        assert_eq!(resolved.uniform.emissive_factor, [0.0; 3]);
        assert_eq!(resolved.occlusion, TextureSource::Scene(3));
    }

    #[test]
    fn environment_toggle_does_not_split_material_keys() {
        let mut features = FeatureFlags::default();
        let before = MaterialKey::new(Some(0), &features);
        features.toggle(Feature::Environment);
        assert_eq!(before, MaterialKey::new(Some(0), &features));
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 48);
    }
}
