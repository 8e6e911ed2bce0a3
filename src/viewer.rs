//! Live webcam viewer: capture a frame, analyze it, overlay the summary,
//! display, repeat until quit.

use crate::analysis;
use crate::analyzer::{AnalyzeOptions, FaceAnalyzer};
use crate::config::ViewerSettings;
use anyhow::{Context, Result};
use eframe::egui;
use image::DynamicImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Overlay text shown when a frame yields no usable analysis.
pub const NO_FACE_PLACEHOLDER: &str = "No face detected";

/// A webcam device owned for the lifetime of the viewer. The stream is
/// stopped in `Drop`, so the device is released on every exit path.
pub struct WebcamCapture {
    camera: Camera,
}

impl WebcamCapture {
    pub fn open(settings: &ViewerSettings) -> Result<Self> {
        let index = CameraIndex::Index(settings.device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested)
            .with_context(|| format!("failed to open camera device {}", settings.device_index))?;
        camera
            .open_stream()
            .context("failed to start camera stream")?;

        // Drivers may refuse these; the stream still works at its own format.
        if let Err(e) = camera.set_resolution(Resolution::new(settings.width, settings.height)) {
            warn!("camera kept its own resolution: {e}");
        }
        if let Err(e) = camera.set_frame_rate(settings.fps) {
            warn!("camera kept its own frame rate: {e}");
        }

        let resolution = camera.resolution();
        info!(
            "camera device {} open at {}x{} @ {} fps",
            settings.device_index,
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );

        Ok(WebcamCapture { camera })
    }

    pub fn capture_frame(&mut self) -> Result<DynamicImage> {
        let frame = self.camera.frame().context("failed to read camera frame")?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("failed to decode camera frame")?;
        Ok(DynamicImage::ImageRgb8(decoded))
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("failed to stop camera stream: {e}");
        }
    }
}

/// Where viewer frames come from. The camera implements this; tests
/// substitute scripted sources.
pub trait FrameSource {
    fn grab(&mut self) -> Result<DynamicImage>;
}

impl FrameSource for WebcamCapture {
    fn grab(&mut self) -> Result<DynamicImage> {
        self.capture_frame()
    }
}

/// The viewer window. One frame is captured and analyzed per update; the
/// summary is painted over the frame at a fixed position.
pub struct ViewerApp<S> {
    source: S,
    analyzer: Arc<dyn FaceAnalyzer>,
    options: AnalyzeOptions,
    overlay: String,
    pending: Option<egui::ColorImage>,
    texture: Option<egui::TextureHandle>,
}

impl<S: FrameSource> ViewerApp<S> {
    pub fn new(source: S, analyzer: Arc<dyn FaceAnalyzer>, options: AnalyzeOptions) -> Self {
        ViewerApp {
            source,
            analyzer,
            options,
            overlay: String::new(),
            pending: None,
            texture: None,
        }
    }

    /// Capture and analyze one frame. Returns `false` when the source is
    /// exhausted and the loop must stop; analysis failures keep the loop
    /// running with the placeholder overlay.
    fn tick(&mut self) -> bool {
        let frame = match self.source.grab() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("camera read failed, stopping viewer: {e}");
                return false;
            }
        };

        let analyzed = analysis::analyze_frame(self.analyzer.as_ref(), &self.options, &frame);
        self.overlay = match analyzed {
            Ok(result) => analysis::summary_line(&result),
            Err(_) => NO_FACE_PLACEHOLDER.to_string(),
        };
        self.pending = Some(color_image(&frame));
        true
    }
}

impl<S: FrameSource> eframe::App for ViewerApp<S> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let quit = ctx.input(|i| i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape));
        if quit || !self.tick() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        if let Some(image) = self.pending.take() {
            match &mut self.texture {
                Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("frame", image, egui::TextureOptions::LINEAR))
                }
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                if let Some(texture) = &self.texture {
                    ui.image(egui::load::SizedTexture::new(
                        texture.id(),
                        ui.available_size(),
                    ));
                }
                ui.painter().text(
                    egui::pos2(10.0, 30.0),
                    egui::Align2::LEFT_BOTTOM,
                    &self.overlay,
                    egui::FontId::proportional(18.0),
                    egui::Color32::RED,
                );
            });

        ctx.request_repaint();
    }
}

/// Open the viewer window and block until it closes. The camera is dropped
/// (and its stream stopped) when the app is torn down, quit key or not.
pub fn run(
    source: WebcamCapture,
    analyzer: Arc<dyn FaceAnalyzer>,
    options: AnalyzeOptions,
) -> eframe::Result<()> {
    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([960.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Face Characteristics",
        native,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(source, analyzer, options)))),
    )
}

fn color_image(frame: &DynamicImage) -> egui::ColorImage {
    let rgba = frame.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw())
}
