// cpu.rs: CPU 端合成 (与片元着色器逐像素一致)
//
// Each output pixel is an independent call of `shade(uv, uniforms, sources)`;
// `render_image` just walks the grid. Sampling follows the GPU sampler:
// bilinear, texel centers at half-integers, clamp or horizontal repeat.

use glam::{Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use crate::params::PlanetUniforms;
use crate::projection::{composite, equi_uv, logo_query, plane_to_dir};
use crate::texture::WrapMode;

/// Images the fragment algorithm reads from.
#[derive(Clone, Copy)]
pub struct PlanetSources<'a> {
    pub panorama: &'a RgbaImage,
    pub logo: Option<&'a RgbaImage>,
}

/// Linear-filtered sample, channels in [0,1].
pub fn sample_bilinear(image: &RgbaImage, uv: Vec2, wrap: WrapMode) -> Vec4 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Vec4::ZERO;
    }

    let x = uv.x * w as f32 - 0.5;
    let y = uv.y * h as f32 - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let column = |i: i64| match wrap {
        WrapMode::ClampToEdge => i.clamp(0, w as i64 - 1) as u32,
        WrapMode::RepeatHorizontal => i.rem_euclid(w as i64) as u32,
    };
    let row = |j: i64| j.clamp(0, h as i64 - 1) as u32;

    let (xi, yi) = (x0 as i64, y0 as i64);
    let (c0, c1) = (column(xi), column(xi + 1));
    let (r0, r1) = (row(yi), row(yi + 1));

    let texel = |cx: u32, ry: u32| {
        let [r, g, b, a] = image.get_pixel(cx, ry).0;
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    };

    let top = texel(c0, r0).lerp(texel(c1, r0), fx);
    let bottom = texel(c0, r1).lerp(texel(c1, r1), fx);
    top.lerp(bottom, fy)
}

/// Panorama color seen along a unit direction.
pub fn sample_equi(panorama: &RgbaImage, dir: Vec3) -> Vec3 {
    sample_bilinear(panorama, equi_uv(dir), WrapMode::RepeatHorizontal).truncate()
}

/// Logo color with feathered, opacity-scaled alpha; transparent when the
/// has-logo flag is off or no logo image is present.
pub fn sample_logo(logo: Option<&RgbaImage>, uv: Vec2, uniforms: &PlanetUniforms) -> Vec4 {
    let Some(logo) = logo.filter(|_| uniforms.has_logo()) else {
        return Vec4::ZERO;
    };
    let transform = uniforms.logo();
    let query = logo_query(uv, &transform);
    let mut color = sample_bilinear(logo, query.uv, WrapMode::ClampToEdge);
    color.w *= query.feather * transform.opacity;
    color
}

/// The fragment algorithm for one viewport coordinate in [0,1]^2.
pub fn shade(uv: Vec2, uniforms: &PlanetUniforms, sources: PlanetSources<'_>) -> Vec4 {
    let p = uv * 2.0 - Vec2::ONE;
    let dir = plane_to_dir(p, &uniforms.camera());
    let panorama = sample_equi(sources.panorama, dir);
    let logo = sample_logo(sources.logo, uv, uniforms);
    composite(panorama, logo)
}

/// Render a full frame. Row 0 is the top of the viewport (uv.y = 1), the
/// same orientation a render target read back from the GPU has.
pub fn render_image(
    uniforms: &PlanetUniforms,
    sources: PlanetSources<'_>,
    width: u32,
    height: u32,
) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let uv = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            1.0 - (y as f32 + 0.5) / height as f32,
        );
        to_rgba8(shade(uv, uniforms, sources))
    })
}

fn to_rgba8(color: Vec4) -> Rgba<u8> {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::params::{CameraParams, LogoTransform, PlanetParams};

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    /// Columns ramp from black to white; the seam sits between the
    /// brightest and the darkest column.
    fn ramp(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| {
            let v = (x * 255 / (w - 1)) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn uniforms_with_logo(logo: LogoTransform) -> PlanetUniforms {
        let params = PlanetParams {
            camera: CameraParams::default(),
            logo,
            show_logo: true,
        };
        PlanetUniforms::new(&params, [8, 4], Some([4, 4]))
    }

    fn plane_uv(point: Vec2) -> Vec2 {
        (point + Vec2::ONE) * 0.5
    }

    #[test]
    fn bilinear_hits_texel_centers() {
        let image = ramp(4, 1);
        let first = sample_bilinear(&image, Vec2::new(0.125, 0.5), WrapMode::ClampToEdge);
        let last = sample_bilinear(&image, Vec2::new(0.875, 0.5), WrapMode::ClampToEdge);
        assert!(first.x.abs() < 1e-6);
        assert!((last.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn seam_samples_match_on_both_sides() {
        let image = ramp(16, 8);
        let delta = 1e-4;
        let before = Vec3::new((PI - delta).cos(), 0.0, (PI - delta).sin());
        let after = Vec3::new((-PI + delta).cos(), 0.0, (-PI + delta).sin());
        let a = sample_equi(&image, before);
        let b = sample_equi(&image, after);
        // both blend the last and the first column: no jump across the seam
        assert!((a - b).length() < 0.01, "{a} vs {b}");
        assert!((a.x - 0.5).abs() < 0.01, "{a}");
    }

    #[test]
    fn clamped_seam_would_jump() {
        let image = ramp(16, 8);
        let left = sample_bilinear(&image, Vec2::new(0.0, 0.5), WrapMode::ClampToEdge);
        let right = sample_bilinear(&image, Vec2::new(1.0, 0.5), WrapMode::ClampToEdge);
        assert!((left.x - right.x).abs() > 0.9);
    }

    #[test]
    fn feather_masks_logo_at_boundary() {
        let logo_image = solid(4, 4, [255, 255, 255, 255]);
        let uniforms = uniforms_with_logo(LogoTransform {
            position: [0.0, 0.0],
            scale: 1.0,
            rotation: 0.0,
            opacity: 0.8,
        });

        let inside = sample_logo(Some(&logo_image), plane_uv(Vec2::new(0.45, 0.0)), &uniforms);
        assert!((inside.w - 0.8).abs() < 1e-6);

        for point in [Vec2::new(0.5, 0.0), Vec2::new(0.0, -0.5), Vec2::new(0.7, 0.2)] {
            let outside = sample_logo(Some(&logo_image), plane_uv(point), &uniforms);
            assert_eq!(outside.w, 0.0, "alpha at {point}");
        }
    }

    #[test]
    fn feather_follows_transformed_center() {
        let logo_image = solid(4, 4, [255, 255, 255, 255]);
        let uniforms = uniforms_with_logo(LogoTransform {
            position: [0.3, 0.3],
            scale: 1.0,
            rotation: 45.0,
            opacity: 1.0,
        });
        // 0.45 from the logo center, then just past its 0.5 edge
        let offset = Vec2::from_angle(45f32.to_radians()).rotate(Vec2::new(0.45, 0.0));
        let at = plane_uv(Vec2::new(0.3, 0.3) + offset);
        assert!((sample_logo(Some(&logo_image), at, &uniforms).w - 1.0).abs() < 1e-4);

        let offset = Vec2::from_angle(45f32.to_radians()).rotate(Vec2::new(0.0, 0.5));
        let at = plane_uv(Vec2::new(0.3, 0.3) + offset * 1.001);
        assert_eq!(sample_logo(Some(&logo_image), at, &uniforms).w, 0.0);
    }

    #[test]
    fn alpha_is_linear_in_opacity() {
        let logo_image = solid(4, 4, [10, 20, 30, 200]);
        let uv = plane_uv(Vec2::new(0.1, -0.05));
        let alpha = |opacity: f32| {
            let uniforms = uniforms_with_logo(LogoTransform {
                scale: 1.0,
                opacity,
                ..LogoTransform::default()
            });
            sample_logo(Some(&logo_image), uv, &uniforms).w
        };
        let full = alpha(1.0);
        assert!(full > 0.0);
        for opacity in [0.0, 0.25, 0.5, 0.75] {
            assert!((alpha(opacity) - full * opacity).abs() < 1e-6);
        }
    }

    #[test]
    fn no_logo_flag_returns_panorama_only() {
        let panorama = ramp(32, 16);
        let logo_image = solid(4, 4, [255, 0, 0, 255]);
        let params = PlanetParams {
            camera: CameraParams {
                zoom: 0.8,
                yaw: 20.0,
                pitch: 10.0,
                roll: -5.0,
            },
            logo: LogoTransform {
                scale: 3.0,
                ..LogoTransform::default()
            },
            show_logo: false,
        };
        let uniforms = PlanetUniforms::new(&params, [32, 16], Some([4, 4]));
        assert!(!uniforms.has_logo());

        let with = PlanetSources {
            panorama: &panorama,
            logo: Some(&logo_image),
        };
        for &(x, y) in &[(0.1, 0.2), (0.5, 0.5), (0.9, 0.7)] {
            let uv = Vec2::new(x, y);
            let dir = plane_to_dir(uv * 2.0 - Vec2::ONE, &uniforms.camera());
            let expected = sample_equi(&panorama, dir).extend(1.0);
            assert_eq!(shade(uv, &uniforms, with), expected);
        }
    }

    #[test]
    fn output_is_always_opaque() {
        let panorama = solid(8, 4, [40, 80, 120, 0]);
        let logo_image = solid(2, 2, [255, 255, 255, 128]);
        let uniforms = uniforms_with_logo(LogoTransform {
            scale: 1.5,
            ..LogoTransform::default()
        });
        let sources = PlanetSources {
            panorama: &panorama,
            logo: Some(&logo_image),
        };
        let frame = render_image(&uniforms, sources, 16, 16);
        assert!(frame.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn center_pixel_reads_the_bottom_row() {
        // top half red, bottom half blue: the nadir is blue
        let panorama = RgbaImage::from_fn(8, 4, |_, y| {
            if y < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let params = PlanetParams::default();
        let uniforms = PlanetUniforms::new(&params, [8, 4], None);
        let frame = render_image(
            &uniforms,
            PlanetSources {
                panorama: &panorama,
                logo: None,
            },
            9,
            9,
        );
        assert_eq!(frame.get_pixel(4, 4).0, [0, 0, 255, 255]);
    }
}
