// params.rs: 相机 / Logo 参数与 uniform 布局

use serde::{Deserialize, Serialize};

/// Camera orientation and plane zoom. Angles are degrees and compose as
/// yaw (Z), then pitch (X), then roll (Y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    pub zoom: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

/// Logo placement in plane space (radius 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoTransform {
    pub position: [f32; 2],
    pub scale: f32,
    /// degrees
    pub rotation: f32,
    pub opacity: f32,
}

impl Default for LogoTransform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            scale: 0.5,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetParams {
    pub camera: CameraParams,
    pub logo: LogoTransform,
    /// Editor toggle; the logo is only drawn when an image is loaded too.
    pub show_logo: bool,
}

impl Default for PlanetParams {
    fn default() -> Self {
        Self {
            camera: CameraParams::default(),
            logo: LogoTransform::default(),
            show_logo: true,
        }
    }
}

/// Uniform block consumed by the fragment stage. Field order and padding
/// match `PlanetUniforms` in little_planet.wgsl (64 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlanetUniforms {
    pub equi_size: [f32; 2],
    pub logo_size: [f32; 2],
    pub yaw_pitch_roll: [f32; 3],
    pub zoom: f32,
    pub logo_pos: [f32; 2],
    pub logo_scale: f32,
    pub logo_rot_deg: f32,
    pub logo_opacity: f32,
    pub has_logo: u32,
    pub _pad: [f32; 2],
}

impl PlanetUniforms {
    /// `logo_size` is `None` when no logo image is loaded; the has-logo flag
    /// is then false whatever `show_logo` says.
    pub fn new(params: &PlanetParams, equi_size: [u32; 2], logo_size: Option<[u32; 2]>) -> Self {
        let camera = params.camera;
        let logo = params.logo;
        let has_logo = params.show_logo && logo_size.is_some();
        let logo_size = logo_size.unwrap_or([0, 0]);

        Self {
            equi_size: [equi_size[0] as f32, equi_size[1] as f32],
            logo_size: [logo_size[0] as f32, logo_size[1] as f32],
            yaw_pitch_roll: [camera.yaw, camera.pitch, camera.roll],
            zoom: camera.zoom,
            logo_pos: logo.position,
            logo_scale: logo.scale,
            logo_rot_deg: logo.rotation,
            logo_opacity: logo.opacity.clamp(0.0, 1.0),
            has_logo: has_logo as u32,
            _pad: [0.0; 2],
        }
    }

    pub fn has_logo(&self) -> bool {
        self.has_logo != 0
    }

    pub fn camera(&self) -> CameraParams {
        CameraParams {
            zoom: self.zoom,
            yaw: self.yaw_pitch_roll[0],
            pitch: self.yaw_pitch_roll[1],
            roll: self.yaw_pitch_roll[2],
        }
    }

    pub fn logo(&self) -> LogoTransform {
        LogoTransform {
            position: self.logo_pos,
            scale: self.logo_scale,
            rotation: self.logo_rot_deg,
            opacity: self.logo_opacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_64_bytes() {
        assert_eq!(std::mem::size_of::<PlanetUniforms>(), 64);
        assert_eq!(std::mem::offset_of!(PlanetUniforms, yaw_pitch_roll), 16);
        assert_eq!(std::mem::offset_of!(PlanetUniforms, zoom), 28);
        assert_eq!(std::mem::offset_of!(PlanetUniforms, logo_pos), 32);
        assert_eq!(std::mem::offset_of!(PlanetUniforms, has_logo), 52);
    }

    #[test]
    fn logo_flag_needs_image_and_toggle() {
        let mut params = PlanetParams::default();
        assert!(!PlanetUniforms::new(&params, [4, 2], None).has_logo());
        assert!(PlanetUniforms::new(&params, [4, 2], Some([8, 8])).has_logo());

        params.show_logo = false;
        assert!(!PlanetUniforms::new(&params, [4, 2], Some([8, 8])).has_logo());
    }

    #[test]
    fn round_trips_camera_and_logo() {
        let params = PlanetParams {
            camera: CameraParams {
                zoom: 2.5,
                yaw: 10.0,
                pitch: -20.0,
                roll: 30.0,
            },
            logo: LogoTransform {
                position: [0.25, -0.5],
                scale: 0.3,
                rotation: 45.0,
                opacity: 1.7,
            },
            show_logo: true,
        };
        let uniforms = PlanetUniforms::new(&params, [2048, 1024], Some([512, 512]));
        assert_eq!(uniforms.camera(), params.camera);
        assert_eq!(uniforms.logo().position, [0.25, -0.5]);
        assert_eq!(uniforms.logo().opacity, 1.0);
        assert_eq!(uniforms.equi_size, [2048.0, 1024.0]);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let params: PlanetParams =
            serde_json::from_str(r#"{ "camera": { "zoom": 3.0 } }"#).unwrap();
        assert_eq!(params.camera.zoom, 3.0);
        assert_eq!(params.camera.yaw, 0.0);
        assert_eq!(params.logo, LogoTransform::default());
        assert!(params.show_logo);
    }
}
