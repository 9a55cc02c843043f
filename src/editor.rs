// editor.rs: 窗口渲染 (小行星 + egui 界面)

use std::sync::Arc;

use image::RgbaImage;
use little_planet::context::{acquire_context_with, SurfaceOptions};
use little_planet::{GpuError, PlanetParams, PlanetRenderer, RenderContext, WindowSurface};
use winit::dpi::PhysicalSize;
use winit::window::Window;

pub struct Editor {
    context: RenderContext,
    surface: WindowSurface,
    pub planet: PlanetRenderer,

    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Editor {
    pub fn new(window: Arc<Window>, options: SurfaceOptions) -> Result<Self, GpuError> {
        let (context, surface) = acquire_context_with(window.clone(), options)?;
        let planet = PlanetRenderer::new(&context, surface.format())?;

        let egui_ctx = egui::Context::default();
        // 高 DPI: egui-winit 0.23 需要显式设置 pixels_per_point
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(context.device(), surface.format(), None, 1);

        Ok(Self {
            context,
            surface,
            planet,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.surface.size()
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.surface.resize(self.context.device(), new_size);
    }

    pub fn reconfigure(&self) {
        self.surface.reconfigure(self.context.device());
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.surface.set_vsync(&self.context, vsync);
    }

    pub fn set_panorama(&mut self, image: RgbaImage) -> Result<(), GpuError> {
        self.planet.set_panorama(&self.context, image)
    }

    pub fn set_logo(&mut self, image: Option<&RgbaImage>) -> Result<(), GpuError> {
        self.planet.set_logo(&self.context, image)
    }

    pub fn update_params(&mut self, params: &PlanetParams) {
        if self.planet.params() != params {
            self.planet.update_params(self.context.queue(), params);
        }
    }

    pub fn export(&mut self, size: u32) -> Result<RgbaImage, GpuError> {
        self.planet.export(&self.context, size)
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), GpuError> {
        let output = self.surface.current_frame()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let device = self.context.device();
        let queue = self.context.queue();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. 小行星
        self.planet.draw(&mut encoder, &view);

        // 2. UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let size = self.surface.size();
        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            device,
            queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
