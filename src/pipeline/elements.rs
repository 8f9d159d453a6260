//! Built-in chain elements.
//!
//! Capture and controller output are stubs; the image steps work on a
//! single-channel frame so the chain produces real, if crude, results.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::pipeline::callbacks::Callback;
use crate::pipeline::chain::{ChainElement, ElementContext};
use crate::pipeline::{Frame, PipelineError};
use crate::settings::{OptionWidget, SelectWidget, SettingsNode, TextWidget};

/// Neutral steering angle.
pub const CENTER_ANGLE: f64 = 0.0;

/// Grabs the current screen. Stub: yields an empty frame unless a test frame is set.
#[derive(Debug, Default)]
pub struct ScreenCapture {
    frame: Option<Frame>,
}

impl ScreenCapture {
    /// Always yield `frame` instead of grabbing the screen.
    pub fn with_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl ChainElement for ScreenCapture {
    fn key(&self) -> &'static str {
        "capture"
    }

    fn process(&mut self, _frame: Frame, _ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
        Ok(self.frame.clone().unwrap_or_default())
    }
}

/// Converts the captured frame to grayscale. Capture already yields one channel.
#[derive(Debug, Default)]
pub struct ColorConversion;

impl ChainElement for ColorConversion {
    fn key(&self) -> &'static str {
        "color_conversion"
    }

    fn process(&mut self, frame: Frame, _ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
        Ok(frame)
    }
}

/// Crops the frame to the configured region of interest.
#[derive(Debug, Default)]
pub struct Viewport;

impl ChainElement for Viewport {
    fn key(&self) -> &'static str {
        "viewport"
    }

    fn verbose_name(&self) -> Option<&'static str> {
        Some("Viewport")
    }

    fn settings(&self) -> Vec<SettingsNode> {
        [("x1", "0"), ("x2", "1280"), ("y1", "0"), ("y2", "720")]
            .into_iter()
            .map(|(key, value)| text_setting(key, value))
            .collect()
    }

    fn process(&mut self, frame: Frame, ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
        let x1: u32 = ctx.parsed_setting("x1")?;
        let x2: u32 = ctx.parsed_setting("x2")?;
        let y1: u32 = ctx.parsed_setting("y1")?;
        let y2: u32 = ctx.parsed_setting("y2")?;

        if x1 >= x2 || y1 >= y2 {
            return Err(PipelineError::Element {
                element: self.key().to_string(),
                reason: format!("empty region ({x1},{y1})-({x2},{y2})"),
            });
        }

        Ok(crop(frame, x1, x2, y1, y2))
    }
}

/// Crop to `[x1, x2) x [y1, y2)`, clamped to the frame.
fn crop(frame: Frame, x1: u32, x2: u32, y1: u32, y2: u32) -> Frame {
    if frame.is_empty() || frame.pixels.len() as u64 != u64::from(frame.width) * u64::from(frame.height) {
        return frame;
    }

    let x2 = x2.min(frame.width);
    let y2 = y2.min(frame.height);
    if x1 >= x2 || y1 >= y2 {
        return Frame::default();
    }

    let width = x2 - x1;
    let height = y2 - y1;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in y1..y2 {
        let start = row as usize * frame.width as usize + x1 as usize;
        pixels.extend_from_slice(&frame.pixels[start..start + width as usize]);
    }

    Frame {
        width,
        height,
        pixels,
        steering_angle: frame.steering_angle,
    }
}

/// Estimates a steering angle from the brightness balance of the frame halves.
///
/// Brighter right half steers right (positive). The angle is in `[-1, 1]`.
#[derive(Debug, Default)]
pub struct LaneDetection;

impl ChainElement for LaneDetection {
    fn key(&self) -> &'static str {
        "lane_detection"
    }

    fn process(&mut self, mut frame: Frame, ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
        let angle = steering_angle(&frame);
        frame.steering_angle = Some(angle);
        ctx.publish("steering", json!({ "angle": angle }));
        Ok(frame)
    }
}

fn steering_angle(frame: &Frame) -> f64 {
    if frame.is_empty() || frame.width < 2 {
        return CENTER_ANGLE;
    }

    let half = frame.width / 2;
    let (mut left, mut right) = (0u64, 0u64);
    for (i, &px) in frame.pixels.iter().enumerate() {
        if (i % frame.width as usize) < half as usize {
            left += u64::from(px);
        } else {
            right += u64::from(px);
        }
    }

    let total = left + right;
    if total == 0 {
        return CENTER_ANGLE;
    }
    (right as f64 - left as f64) / total as f64
}

/// Forwards the steering angle to a virtual joystick. Stub: remembers the last angle.
#[derive(Debug, Default)]
pub struct VirtualController {
    last_angle: Option<f64>,
}

impl VirtualController {
    pub fn last_angle(&self) -> Option<f64> {
        self.last_angle
    }
}

impl ChainElement for VirtualController {
    fn key(&self) -> &'static str {
        "controller"
    }

    fn verbose_name(&self) -> Option<&'static str> {
        Some("Controller")
    }

    fn settings(&self) -> Vec<SettingsNode> {
        let mut input_device = SettingsNode::new("input_device")
            .with_label("Input device")
            .with_value("keyboard")
            .with_widget(Arc::new(SelectWidget));
        for device in [
            device_choice("keyboard", "Keyboard", &[("autopilot_button", "a")]),
            device_choice("gamepad", "Gamepad", JOYSTICK_FIELDS),
            device_choice("wheel", "Wheel", JOYSTICK_FIELDS),
        ] {
            if let Err(e) = input_device.add_child(device) {
                tracing::error!(error = %e, "Invalid input device choice");
            }
        }

        vec![
            text_setting("vjoy_device", "0").with_label("vJoy Device ID"),
            input_device,
        ]
    }

    fn callbacks(&self) -> Vec<(&'static str, Callback)> {
        let center: Callback =
            Arc::new(|_: &[Value]| -> Result<Value, String> { Ok(json!({ "angle": CENTER_ANGLE })) });
        vec![("center", center)]
    }

    fn process(&mut self, frame: Frame, ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
        let device: u32 = ctx.parsed_setting("vjoy_device")?;
        let angle = frame.steering_angle.unwrap_or(CENTER_ANGLE);
        if self.last_angle != Some(angle) {
            tracing::trace!(device, angle, "Steering output changed");
        }
        self.last_angle = Some(angle);
        Ok(frame)
    }
}

const JOYSTICK_FIELDS: &[(&str, &str)] = &[
    ("device_id", "0"),
    ("autopilot_button", "0"),
    ("steering_axis", "0"),
];

fn text_setting(key: &str, value: &str) -> SettingsNode {
    SettingsNode::new(key)
        .with_value(value)
        .with_widget(Arc::new(TextWidget))
}

fn device_choice(key: &str, label: &str, fields: &[(&str, &str)]) -> SettingsNode {
    let mut node = SettingsNode::new(key)
        .with_label(label)
        .as_choice()
        .with_widget(Arc::new(OptionWidget));
    for &(field, value) in fields {
        if let Err(e) = node.add_child(text_setting(field, value)) {
            tracing::error!(choice = key, error = %e, "Invalid input device setting");
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CallbackRegistry, Pipeline, ProcessingChain};
    use crate::settings::SettingsStore;

    fn chain_with_frame(frame: Frame) -> (ProcessingChain, Arc<SettingsStore>) {
        let settings = Arc::new(SettingsStore::new("unused.json", SettingsNode::root()));
        let mut chain = ProcessingChain::new("linux", settings.clone(), Arc::new(CallbackRegistry::new()));
        chain.register(Box::new(ScreenCapture::with_frame(frame))).unwrap();
        chain.register(Box::new(Viewport)).unwrap();
        chain.register(Box::new(LaneDetection)).unwrap();
        (chain, settings)
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = Frame::new(4, 2, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let cropped = crop(frame, 1, 10, 1, 10);
        assert_eq!((cropped.width, cropped.height), (3, 1));
        assert_eq!(cropped.pixels, vec![6, 7, 8]);
    }

    #[test]
    fn test_crop_ignores_inconsistent_huge_frame() {
        // 70000 x 70000 overflows u32; the frame must come back untouched.
        let frame = Frame {
            width: 70_000,
            height: 70_000,
            pixels: vec![1, 2, 3],
            steering_angle: None,
        };
        let cropped = crop(frame, 0, 10, 0, 10);
        assert_eq!(cropped.pixels, vec![1, 2, 3]);
        assert_eq!(cropped.width, 70_000);
    }

    #[test]
    fn test_steering_follows_brightness() {
        let right_bright = Frame::new(4, 1, vec![0, 0, 200, 200]);
        assert!((steering_angle(&right_bright) - 1.0).abs() < f64::EPSILON);

        let balanced = Frame::new(2, 1, vec![50, 50]);
        assert_eq!(steering_angle(&balanced), CENTER_ANGLE);

        assert_eq!(steering_angle(&Frame::default()), CENTER_ANGLE);
    }

    #[test]
    fn test_viewport_limits_what_lanes_see() {
        // Bright pixel only on the far right; the viewport cuts it off.
        let frame = Frame::new(4, 1, vec![10, 0, 10, 250]);
        let (mut chain, settings) = chain_with_frame(frame);
        settings.write(|root| root.set_value("root.viewport.x2", "3")).unwrap();

        let output = chain.process().unwrap();
        assert_eq!(output.payloads()[0].name, "steering");
        assert_eq!(output.payloads()[0].data["angle"], json!(0.0));
    }

    #[test]
    fn test_viewport_rejects_empty_region() {
        let (mut chain, settings) = chain_with_frame(Frame::default());
        settings.write(|root| root.set_value("root.viewport.x1", "2000")).unwrap();
        assert!(matches!(chain.process(), Err(PipelineError::Element { .. })));
    }

    #[test]
    fn test_controller_settings_shape() {
        let nodes = VirtualController::default().settings();
        assert_eq!(nodes[0].label(), "vJoy Device ID");
        assert_eq!(nodes[1].value(), "keyboard");
        assert!(nodes[1].is_selector());
        assert_eq!(nodes[1].choices().count(), 3);
    }

    #[test]
    fn test_controller_records_angle() {
        let settings = Arc::new(SettingsStore::new("unused.json", SettingsNode::root()));
        let mut chain = ProcessingChain::new("linux", settings.clone(), Arc::new(CallbackRegistry::new()));
        chain.register(Box::new(VirtualController::default())).unwrap();

        let mut controller = VirtualController::default();
        let mut output = crate::pipeline::PipelineOutput::default();
        let mut ctx = ElementContext::new("controller", &settings, &mut output);
        let mut frame = Frame::default();
        frame.steering_angle = Some(0.25);
        controller.process(frame, &mut ctx).unwrap();
        assert_eq!(controller.last_angle(), Some(0.25));
    }
}
