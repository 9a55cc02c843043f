// context.rs: GPU 上下文获取 (窗口 / 无头)

use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::GpuError;
use crate::ledger::ResourceLedger;

/// Device, queue and the adapter they came from. Every GPU handle created
/// through this crate is counted in the context's ledger.
pub struct RenderContext {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    ledger: ResourceLedger,
}

/// A configured window surface. The window is kept alive for as long as the
/// surface that points into it.
pub struct WindowSurface {
    surface: wgpu::Surface,
    config: wgpu::SurfaceConfiguration,
    _window: Arc<Window>,
}

/// How a window surface gets configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub vsync: bool,
    /// Fail instead of falling back when straight alpha is not offered.
    pub require_straight_alpha: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            vsync: true,
            require_straight_alpha: true,
        }
    }
}

/// Acquire a context that presents to `window` with straight
/// (non-premultiplied) alpha. Fails with [`GpuError::Capability`] when the
/// surface cannot composite that way.
pub fn acquire_context(
    window: Arc<Window>,
    vsync: bool,
) -> Result<(RenderContext, WindowSurface), GpuError> {
    acquire_context_with(
        window,
        SurfaceOptions {
            vsync,
            require_straight_alpha: true,
        },
    )
}

/// Like [`acquire_context`], optionally accepting the surface's default
/// alpha mode when straight alpha is unavailable.
pub fn acquire_context_with(
    window: Arc<Window>,
    options: SurfaceOptions,
) -> Result<(RenderContext, WindowSurface), GpuError> {
    let instance = create_instance();

    // Safety: the surface is stored next to the Arc<Window> it was created
    // from and is dropped first (field order).
    let surface = unsafe { instance.create_surface(window.as_ref()) }
        .map_err(|err| GpuError::Capability(format!("failed to create surface: {err}")))?;

    let (adapter, device, queue) = pollster::block_on(request_device(&instance, Some(&surface)))?;

    let caps = surface.get_capabilities(&adapter);
    if caps.formats.is_empty() {
        return Err(GpuError::Capability(
            "surface is not compatible with the selected adapter".into(),
        ));
    }

    // 输出字节与纹理字节一致：优先非 sRGB 格式
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .unwrap_or_else(|| {
            let fallback = caps.formats[0];
            log::warn!("no non-sRGB surface format available; using {fallback:?}");
            fallback
        });

    // 直通 (非预乘) alpha
    let alpha_mode = pick_alpha_mode(&caps.alpha_modes, options.require_straight_alpha)?;
    let present_mode = pick_present_mode(&caps.present_modes, options.vsync);

    let size = window.inner_size();
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode,
        view_formats: vec![],
    };
    surface.configure(&device, &config);
    log::debug!(
        "configured surface {}x{} {:?} {:?} {:?}",
        config.width,
        config.height,
        format,
        alpha_mode,
        present_mode
    );

    let context = RenderContext::from_parts(instance, adapter, device, queue);
    let surface = WindowSurface {
        surface,
        config,
        _window: window,
    };
    Ok((context, surface))
}

impl RenderContext {
    /// A context without any surface, for off-screen rendering.
    pub fn headless() -> Result<Self, GpuError> {
        let instance = create_instance();
        let (adapter, device, queue) = pollster::block_on(request_device(&instance, None))?;
        Ok(Self::from_parts(instance, adapter, device, queue))
    }

    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
    ) -> Self {
        // 未被 error scope 捕获的错误只记录，不 panic
        device.on_uncaptured_error(Box::new(|err| {
            log::error!("uncaptured GPU error: {err}");
        }));

        Self {
            _instance: instance,
            adapter,
            device,
            queue,
            ledger: ResourceLedger::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Run `f` inside a validation error scope and return the captured error
    /// text, if any, next to its result.
    pub(crate) fn validated<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<String>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error.map(|err| err.to_string()))
    }
}

impl WindowSurface {
    pub fn resize(&mut self, device: &wgpu::Device, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(device, &self.config);
        }
    }

    /// Reconfigure after the surface was lost or outdated.
    pub fn reconfigure(&self, device: &wgpu::Device) {
        self.surface.configure(device, &self.config);
    }

    pub fn set_vsync(&mut self, context: &RenderContext, vsync: bool) {
        let caps = self.surface.get_capabilities(context.adapter());
        let mode = pick_present_mode(&caps.present_modes, vsync);
        if mode != self.config.present_mode {
            self.config.present_mode = mode;
            self.surface.configure(context.device(), &self.config);
            log::debug!("present mode {mode:?} (vsync {vsync})");
        }
    }

    pub fn current_frame(&self) -> Result<wgpu::SurfaceTexture, GpuError> {
        Ok(self.surface.get_current_texture()?)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| GpuError::Capability("no suitable GPU adapter found".into()))?;

    let info = adapter.get_info();
    log::debug!(
        "selected adapter {} ({:?}, {:?})",
        info.name,
        info.backend,
        info.device_type
    );

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                features: wgpu::Features::empty(),
                limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::downlevel_defaults()
                }
                .using_resolution(adapter.limits()),
                label: Some("little planet device"),
            },
            None,
        )
        .await
        .map_err(|err| GpuError::Capability(format!("failed to create device: {err}")))?;

    Ok((adapter, device, queue))
}

fn pick_alpha_mode(
    modes: &[wgpu::CompositeAlphaMode],
    require_straight: bool,
) -> Result<wgpu::CompositeAlphaMode, GpuError> {
    if modes.contains(&wgpu::CompositeAlphaMode::PostMultiplied) {
        return Ok(wgpu::CompositeAlphaMode::PostMultiplied);
    }
    match modes.first() {
        Some(&fallback) if !require_straight => {
            log::warn!("surface does not offer straight alpha; using {fallback:?}");
            Ok(fallback)
        }
        _ => Err(GpuError::Capability(
            "surface cannot present straight (non-premultiplied) alpha".into(),
        )),
    }
}

fn pick_present_mode(modes: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }
    [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_alpha_is_required_unless_relaxed() {
        let opaque = [wgpu::CompositeAlphaMode::Opaque];
        assert!(matches!(
            pick_alpha_mode(&opaque, true),
            Err(GpuError::Capability(_))
        ));
        assert_eq!(
            pick_alpha_mode(&opaque, false).unwrap(),
            wgpu::CompositeAlphaMode::Opaque
        );

        let both = [
            wgpu::CompositeAlphaMode::Opaque,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ];
        assert_eq!(
            pick_alpha_mode(&both, true).unwrap(),
            wgpu::CompositeAlphaMode::PostMultiplied
        );
        assert!(pick_alpha_mode(&[], false).is_err());
    }

    #[test]
    fn vsync_always_uses_fifo() {
        let modes = [wgpu::PresentMode::Immediate, wgpu::PresentMode::Fifo];
        assert_eq!(pick_present_mode(&modes, true), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn vsync_off_prefers_immediate_then_mailbox() {
        let all = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];
        assert_eq!(pick_present_mode(&all, false), wgpu::PresentMode::Immediate);

        let mailbox = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Mailbox];
        assert_eq!(pick_present_mode(&mailbox, false), wgpu::PresentMode::Mailbox);

        assert_eq!(
            pick_present_mode(&[wgpu::PresentMode::Fifo], false),
            wgpu::PresentMode::Fifo
        );
    }
}
