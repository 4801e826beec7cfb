//! Runtime state that the keyboard controls change: feature toggles and the
//! directional light.

use cgmath::{InnerSpace, Vector3};
use winit::keyboard::KeyCode;

use crate::{
    camera::Camera,
    data_structures::material::{Feature, FeatureFlags},
};

/// Radians an arrow key press moves the light.
const LIGHT_ANGLE_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    /// Light shines from the eye toward the center.
    pub from_camera: bool,
    pub angle_h: f32,
    pub angle_v: f32,
    pub radiance: [f32; 3],
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            from_camera: true,
            angle_h: 1.55,
            angle_v: 2.0,
            radiance: [1.0, 1.0, 1.0],
        }
    }
}

impl LightSettings {
    /// Unit vector pointing toward the light, world space.
    pub fn direction(&self, camera: &Camera) -> Vector3<f32> {
        if self.from_camera {
            let toward_eye = camera.eye - camera.center;
            if toward_eye.magnitude2() > 0.0 {
                return toward_eye.normalize();
            }
            return Vector3::unit_z();
        }
        let (sin_v, cos_v) = self.angle_v.sin_cos();
        let (sin_h, cos_h) = self.angle_h.sin_cos();
        Vector3::new(sin_v * cos_h, cos_v, sin_v * sin_h)
    }
}

/// What a key press asks the frame driver to do beyond changing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Settings changed, the next frame picks them up.
    Updated,
    SwapController,
    PrintCamera,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewerSettings {
    pub features: FeatureFlags,
    pub light: LightSettings,
}

impl ViewerSettings {
    /// Maps a key press to a settings change or an action.
    ///
    /// `1`-`6` flip the feature toggles, `L` flips light-from-camera, the
    /// arrows move the light, `C` swaps controllers, `P` prints the camera
    /// and Escape quits. Other keys return `None`.
    pub fn handle_key(&mut self, code: KeyCode) -> Option<KeyAction> {
        let feature = match code {
            KeyCode::Digit1 => Some(Feature::Texture),
            KeyCode::Digit2 => Some(Feature::MetallicRoughness),
            KeyCode::Digit3 => Some(Feature::Occlusion),
            KeyCode::Digit4 => Some(Feature::Emission),
            KeyCode::Digit5 => Some(Feature::Normal),
            KeyCode::Digit6 => Some(Feature::Environment),
            _ => None,
        };
        if let Some(feature) = feature {
            let enabled = self.features.toggle(feature);
            log::info!(
                "{} {}",
                feature.name(),
                if enabled { "enabled" } else { "disabled" }
            );
            return Some(KeyAction::Updated);
        }

        let light = &mut self.light;
        match code {
            KeyCode::KeyL => {
                light.from_camera = !light.from_camera;
                log::info!("light from camera: {}", light.from_camera);
            }
            KeyCode::ArrowLeft => light.angle_h -= LIGHT_ANGLE_STEP,
            KeyCode::ArrowRight => light.angle_h += LIGHT_ANGLE_STEP,
            KeyCode::ArrowUp => light.angle_v -= LIGHT_ANGLE_STEP,
            KeyCode::ArrowDown => light.angle_v += LIGHT_ANGLE_STEP,
            KeyCode::KeyC => return Some(KeyAction::SwapController),
            KeyCode::KeyP => return Some(KeyAction::PrintCamera),
            KeyCode::Escape => return Some(KeyAction::Exit),
            _ => return None,
        }
        Some(KeyAction::Updated)
    }
}
