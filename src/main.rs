// main.rs: 小行星编辑器 (窗口 + 控制面板) 与无头渲染入口

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // Release 模式下隐藏控制台窗口

mod cli;
mod editor;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context as _;
use clap::Parser;
use image::RgbaImage;
use little_planet::config::{resolve_config_path, EditorConfig};
use little_planet::logging::init_logging;
use little_planet::panorama::load_rgba;
use little_planet::texture::IMAGE_FORMAT;
use little_planet::{
    AssetError, GpuError, PlanetParams, PlanetRenderer, RenderContext, SurfaceOptions,
};
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

use cli::Cli;
use editor::Editor;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "tif", "tiff"];
const ZOOM_RANGE: std::ops::RangeInclusive<f32> = 0.05..=20.0;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = EditorConfig::load(&config_path);
    init_logging(config.as_ref().ok().and_then(|c| c.log_filter.as_deref()));
    let config = config
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;

    if let Some((panorama, output)) = cli.render_paths() {
        return render_headless(&config, panorama, output, cli.logo.as_deref(), cli.size);
    }
    run_editor(cli, config, config_path)
}

/// `--render`: one frame to a PNG, no window.
fn render_headless(
    config: &EditorConfig,
    panorama: &Path,
    output: &Path,
    logo: Option<&Path>,
    size: Option<u32>,
) -> anyhow::Result<()> {
    let size = size.unwrap_or(config.export_size);
    let context = RenderContext::headless().context("no GPU adapter for headless rendering")?;
    let mut planet = PlanetRenderer::new(&context, IMAGE_FORMAT)?;

    planet.set_panorama(&context, load_rgba(panorama)?)?;
    if let Some(logo) = logo {
        planet.set_logo(&context, Some(&load_rgba(logo)?))?;
    }
    planet.update_params(context.queue(), &config.params);

    let image = planet.export(&context, size)?;
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("wrote {}", output.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageSlot {
    Panorama,
    Logo,
}

struct LoadedImage {
    slot: ImageSlot,
    path: PathBuf,
    result: Result<RgbaImage, AssetError>,
}

/// Requests raised by the control panel, handled after the frame.
enum UiAction {
    Open(ImageSlot, PathBuf),
    RemoveLogo,
    Export(PathBuf),
    SaveSettings,
    ToggleFullscreen,
    Exit,
}

struct UiState {
    params: PlanetParams,
    vsync: bool,
    export_size: u32,
    loading: usize,
    has_logo: bool,
    is_fullscreen: bool,
    show_fps: bool,
    fps: f32,
    status: Option<String>,
}

fn run_editor(cli: Cli, mut config: EditorConfig, config_path: PathBuf) -> anyhow::Result<()> {
    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Little Planet")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let mut editor = Editor::new(
        window.clone(),
        SurfaceOptions {
            vsync: config.vsync,
            require_straight_alpha: config.require_straight_alpha,
        },
    )
    .context("failed to initialise GPU")?;
    editor.update_params(&config.params);

    let mut ui = UiState {
        params: config.params,
        vsync: config.vsync,
        export_size: config.export_size,
        loading: 0,
        has_logo: false,
        is_fullscreen: false,
        show_fps: false,
        fps: 0.0,
        status: None,
    };

    // 后台解码通道
    let (tx, rx): (Sender<LoadedImage>, Receiver<LoadedImage>) = channel();
    if let Some(path) = cli.panorama {
        ui.loading += 1;
        start_load_image(ImageSlot::Panorama, path, tx.clone());
    }
    if let Some(path) = cli.logo {
        ui.loading += 1;
        start_load_image(ImageSlot::Logo, path, tx.clone());
    }

    let mut modifiers = ModifiersState::default();
    let mut mouse_pressed = false;
    let mut last_mouse_pos: Option<PhysicalPosition<f64>> = None;
    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        while let Ok(loaded) = rx.try_recv() {
            ui.loading = ui.loading.saturating_sub(1);
            apply_loaded_image(&mut editor, &mut ui, loaded);
        }

        match event {
            Event::WindowEvent { event, .. } => {
                // egui 优先
                let response = editor.egui_state.on_event(&editor.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        editor.resize(new_size);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        editor.resize(*new_inner_size);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::O) => {
                                    if let Some(path) = pick_image("Open panorama") {
                                        ui.loading += 1;
                                        start_load_image(ImageSlot::Panorama, path, tx.clone());
                                    }
                                }
                                Some(VirtualKeyCode::L) => {
                                    if let Some(path) = pick_image("Open logo") {
                                        ui.loading += 1;
                                        start_load_image(ImageSlot::Logo, path, tx.clone());
                                    }
                                }
                                Some(VirtualKeyCode::F11) => {
                                    toggle_fullscreen(&window, &mut ui);
                                }
                                _ => {}
                            }
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            mouse_pressed = state == ElementState::Pressed;
                            if !mouse_pressed {
                                last_mouse_pos = None;
                            }
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_pressed {
                            if let Some(last_pos) = last_mouse_pos {
                                let dx = (position.x - last_pos.x) as f32;
                                let dy = (position.y - last_pos.y) as f32;
                                let size = editor.size();
                                drag_camera(&mut ui.params, dx, dy, size.width, size.height);
                            }
                            last_mouse_pos = Some(position);
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                        };
                        ui.params.camera.zoom = zoom_by(ui.params.camera.zoom, scroll);
                    }

                    WindowEvent::ModifiersChanged(state) => {
                        modifiers = state;
                    }

                    WindowEvent::DroppedFile(path) => {
                        // 按住 Shift 拖入的是 logo
                        let slot = if modifiers.shift() {
                            ImageSlot::Logo
                        } else {
                            ImageSlot::Panorama
                        };
                        ui.loading += 1;
                        start_load_image(slot, path, tx.clone());
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                frame_count += 1;
                let now = Instant::now();
                let elapsed = now.duration_since(last_frame_time).as_secs_f32();
                if elapsed >= 1.0 {
                    ui.fps = frame_count as f32 / elapsed;
                    frame_count = 0;
                    last_frame_time = now;
                }

                let vsync_before = ui.vsync;
                editor.update_params(&ui.params);

                let mut actions = Vec::new();
                let render_result =
                    editor.render_with_ui(&window, |ctx| draw_ui(ctx, &mut ui, &mut actions));

                match render_result {
                    Ok(()) => {}
                    Err(GpuError::Surface(wgpu::SurfaceError::Lost))
                    | Err(GpuError::Surface(wgpu::SurfaceError::Outdated)) => editor.reconfigure(),
                    Err(GpuError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                        log::error!("out of GPU memory; exiting");
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(err) => log::error!("render error: {err}"),
                }

                if ui.vsync != vsync_before {
                    editor.set_vsync(ui.vsync);
                }

                for action in actions {
                    match action {
                        UiAction::Open(slot, path) => {
                            ui.loading += 1;
                            start_load_image(slot, path, tx.clone());
                        }
                        UiAction::RemoveLogo => match editor.set_logo(None) {
                            Ok(()) => ui.has_logo = false,
                            Err(err) => log::error!("failed to remove logo: {err}"),
                        },
                        UiAction::Export(path) => {
                            editor.update_params(&ui.params);
                            ui.status = Some(export_png(&mut editor, ui.export_size, &path));
                        }
                        UiAction::SaveSettings => {
                            config.params = ui.params;
                            config.vsync = ui.vsync;
                            config.export_size = ui.export_size;
                            ui.status = Some(match config.save(&config_path) {
                                Ok(()) => format!("Saved settings to {}", config_path.display()),
                                Err(err) => {
                                    log::error!("{err}");
                                    err.to_string()
                                }
                            });
                        }
                        UiAction::ToggleFullscreen => toggle_fullscreen(&window, &mut ui),
                        UiAction::Exit => *control_flow = ControlFlow::Exit,
                    }
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

fn start_load_image(slot: ImageSlot, path: PathBuf, tx: Sender<LoadedImage>) {
    thread::spawn(move || {
        log::info!("loading {:?} in background: {}", slot, path.display());
        let result = load_rgba(&path);
        if tx.send(LoadedImage { slot, path, result }).is_err() {
            log::warn!("editor closed before the image finished loading");
        }
    });
}

fn apply_loaded_image(editor: &mut Editor, ui: &mut UiState, loaded: LoadedImage) {
    let LoadedImage { slot, path, result } = loaded;
    let image = match result {
        Ok(image) => image,
        Err(err) => {
            log::error!("{err}");
            ui.status = Some(err.to_string());
            return;
        }
    };

    let applied = match slot {
        ImageSlot::Panorama => editor.set_panorama(image),
        ImageSlot::Logo => editor.set_logo(Some(&image)),
    };
    match applied {
        Ok(()) => {
            if slot == ImageSlot::Logo {
                ui.has_logo = true;
            }
            ui.status = Some(format!("Opened {}", path.display()));
        }
        Err(err) => {
            log::error!("failed to upload {}: {err}", path.display());
            ui.status = Some(err.to_string());
        }
    }
}

fn export_png(editor: &mut Editor, size: u32, path: &Path) -> String {
    let result = editor
        .export(size)
        .map_err(anyhow::Error::from)
        .and_then(|image| {
            image
                .save(path)
                .with_context(|| format!("failed to write {}", path.display()))
        });
    match result {
        Ok(()) => {
            log::info!("exported {}", path.display());
            format!("Exported {}", path.display())
        }
        Err(err) => {
            log::error!("export failed: {err:#}");
            format!("Export failed: {err:#}")
        }
    }
}

fn pick_image(title: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

fn toggle_fullscreen(window: &winit::window::Window, ui: &mut UiState) {
    ui.is_fullscreen = !ui.is_fullscreen;
    if ui.is_fullscreen {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    } else {
        window.set_fullscreen(None);
    }
}

/// A drag across the full window width turns the planet half a revolution.
fn drag_camera(params: &mut PlanetParams, dx: f32, dy: f32, width: u32, height: u32) {
    if width == 0 || height == 0 {
        return;
    }
    let camera = &mut params.camera;
    camera.yaw = wrap_degrees(camera.yaw - dx * 180.0 / width as f32);
    camera.pitch = (camera.pitch + dy * 180.0 / height as f32).clamp(-180.0, 180.0);
}

fn zoom_by(zoom: f32, scroll: f32) -> f32 {
    (zoom * 1.1f32.powf(scroll)).clamp(*ZOOM_RANGE.start(), *ZOOM_RANGE.end())
}

fn wrap_degrees(angle: f32) -> f32 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

fn draw_ui(ctx: &egui::Context, ui_state: &mut UiState, actions: &mut Vec<UiAction>) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open panorama…").clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_image("Open panorama") {
                        actions.push(UiAction::Open(ImageSlot::Panorama, path));
                    }
                }
                if ui.button("Open logo…").clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_image("Open logo") {
                        actions.push(UiAction::Open(ImageSlot::Logo, path));
                    }
                }
                if ui
                    .add_enabled(ui_state.has_logo, egui::Button::new("Remove logo"))
                    .clicked()
                {
                    ui.close_menu();
                    actions.push(UiAction::RemoveLogo);
                }
                ui.separator();
                if ui.button("Export PNG…").clicked() {
                    ui.close_menu();
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("PNG", &["png"])
                        .set_file_name("little_planet.png")
                        .save_file()
                    {
                        actions.push(UiAction::Export(path));
                    }
                }
                if ui.button("Save settings").clicked() {
                    ui.close_menu();
                    actions.push(UiAction::SaveSettings);
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    actions.push(UiAction::Exit);
                }
            });

            ui.menu_button("View", |ui| {
                let label = if ui_state.is_fullscreen {
                    "Exit fullscreen"
                } else {
                    "Fullscreen"
                };
                if ui.button(label).clicked() {
                    actions.push(UiAction::ToggleFullscreen);
                    ui.close_menu();
                }
                ui.separator();
                ui.checkbox(&mut ui_state.show_fps, "Show FPS");
                ui.checkbox(&mut ui_state.vsync, "VSync");
            });
        });
    });

    egui::SidePanel::right("controls")
        .resizable(false)
        .default_width(240.0)
        .show(ctx, |ui| {
            let params = &mut ui_state.params;

            ui.heading("Camera");
            ui.add(
                egui::Slider::new(&mut params.camera.zoom, ZOOM_RANGE)
                    .logarithmic(true)
                    .text("Zoom"),
            );
            ui.add(egui::Slider::new(&mut params.camera.yaw, -180.0..=180.0).text("Yaw"));
            ui.add(egui::Slider::new(&mut params.camera.pitch, -180.0..=180.0).text("Pitch"));
            ui.add(egui::Slider::new(&mut params.camera.roll, -180.0..=180.0).text("Roll"));
            if ui.button("Reset camera").clicked() {
                params.camera = Default::default();
            }

            ui.separator();
            ui.heading("Logo");
            ui.checkbox(&mut params.show_logo, "Show logo");
            ui.add_enabled_ui(ui_state.has_logo && params.show_logo, |ui| {
                let logo = &mut params.logo;
                ui.add(egui::Slider::new(&mut logo.position[0], -1.0..=1.0).text("X"));
                ui.add(egui::Slider::new(&mut logo.position[1], -1.0..=1.0).text("Y"));
                ui.add(
                    egui::Slider::new(&mut logo.scale, 0.01..=2.0)
                        .logarithmic(true)
                        .text("Scale"),
                );
                ui.add(egui::Slider::new(&mut logo.rotation, -180.0..=180.0).text("Rotation"));
                ui.add(egui::Slider::new(&mut logo.opacity, 0.0..=1.0).text("Opacity"));
                if ui.button("Reset logo").clicked() {
                    *logo = Default::default();
                }
            });

            ui.separator();
            ui.heading("Export");
            ui.add(
                egui::DragValue::new(&mut ui_state.export_size)
                    .clamp_range(64..=8192)
                    .suffix(" px"),
            );
        });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui_state.loading > 0 {
                ui.label(egui::RichText::new("Loading…").color(egui::Color32::YELLOW));
                ui.label("|");
            }

            let camera = &ui_state.params.camera;
            ui.label(format!("Zoom: {:.2}", camera.zoom));
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", camera.yaw));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", camera.pitch));
            ui.label("|");
            ui.label(format!("Roll: {:.1}°", camera.roll));

            if ui_state.show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {:.1}", ui_state.fps))
                        .color(egui::Color32::GREEN),
                );
            }

            if let Some(status) = &ui_state.status {
                ui.label("|");
                ui.label(status.as_str());
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dragging_across_the_window_turns_half_way() {
        let mut params = PlanetParams::default();
        drag_camera(&mut params, -800.0, 0.0, 800, 600);
        assert!((params.camera.yaw.abs() - 180.0).abs() < 1e-3);

        drag_camera(&mut params, 0.0, 300.0, 800, 600);
        assert!((params.camera.pitch - 90.0).abs() < 1e-3);
    }

    #[test]
    fn zero_sized_window_ignores_drag() {
        let mut params = PlanetParams::default();
        drag_camera(&mut params, 10.0, 10.0, 0, 0);
        assert_eq!(params, PlanetParams::default());
    }

    #[test]
    fn yaw_wraps_into_half_open_range() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        assert!((zoom_by(1.0, 1.0) - 1.1).abs() < 1e-6);
        assert_eq!(zoom_by(1.0, 1000.0), *ZOOM_RANGE.end());
        assert_eq!(zoom_by(1.0, -1000.0), *ZOOM_RANGE.start());
    }
}
