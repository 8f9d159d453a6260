//! Processing chain: ordered elements run once per iteration.

use std::sync::Arc;

use serde_json::Value;

use crate::pipeline::callbacks::{Callback, CallbackRegistry};
use crate::pipeline::elements;
use crate::pipeline::{Frame, Pipeline, PipelineError, PipelineOutput};
use crate::settings::{SettingsNode, SettingsStore, SubtreeWidget, ROOT_NODE_NAME};

/// One step of the processing chain.
pub trait ChainElement: Send {
    /// Settings key of the element. Its settings live under `root.<key>`.
    fn key(&self) -> &'static str;

    /// Heading shown on the settings page.
    fn verbose_name(&self) -> Option<&'static str> {
        None
    }

    /// Settings owned by this element, attached when it is registered.
    fn settings(&self) -> Vec<SettingsNode> {
        Vec::new()
    }

    /// Callbacks reachable as `<key>.<name>`.
    fn callbacks(&self) -> Vec<(&'static str, Callback)> {
        Vec::new()
    }

    /// Transform `frame` and hand the result to the next element.
    fn process(&mut self, frame: Frame, ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError>;
}

/// What an element can reach during one iteration.
pub struct ElementContext<'a> {
    element: &'static str,
    settings: &'a SettingsStore,
    output: &'a mut PipelineOutput,
}

impl<'a> ElementContext<'a> {
    pub(crate) fn new(
        element: &'static str,
        settings: &'a SettingsStore,
        output: &'a mut PipelineOutput,
    ) -> Self {
        Self {
            element,
            settings,
            output,
        }
    }

    /// Full path of the element's own setting `name`.
    pub fn setting_path(&self, name: &str) -> String {
        format!("{ROOT_NODE_NAME}.{}.{name}", self.element)
    }

    /// Current value of the element's own setting `name`.
    pub fn setting(&self, name: &str) -> Option<String> {
        self.settings.get_value(&self.setting_path(name)).ok()
    }

    /// Parse the element's setting `name`.
    pub fn parsed_setting<T: std::str::FromStr>(&self, name: &str) -> Result<T, PipelineError> {
        let path = self.setting_path(name);
        let value = self.settings.get_value(&path).unwrap_or_default();
        value
            .trim()
            .parse()
            .map_err(|_| PipelineError::InvalidSetting { path, value })
    }

    /// Queue a payload for broadcast.
    pub fn publish(&mut self, name: impl Into<String>, data: Value) {
        self.output.publish(name, data);
    }
}

/// Runs registered elements in order, feeding each the previous one's frame.
pub struct ProcessingChain {
    platform: String,
    elements: Vec<Box<dyn ChainElement>>,
    settings: Arc<SettingsStore>,
    callbacks: Arc<CallbackRegistry>,
}

impl ProcessingChain {
    /// Create an empty chain.
    pub fn new(
        platform: impl Into<String>,
        settings: Arc<SettingsStore>,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        Self {
            platform: platform.into(),
            elements: Vec::new(),
            settings,
            callbacks,
        }
    }

    /// Build the chain for `platform` (`linux` or `windows`).
    pub fn for_platform(
        platform: &str,
        settings: Arc<SettingsStore>,
        callbacks: Arc<CallbackRegistry>,
    ) -> Result<Self, PipelineError> {
        let platform = platform.to_ascii_lowercase();
        match platform.as_str() {
            "linux" | "windows" => {}
            _ => return Err(PipelineError::UnsupportedPlatform(platform)),
        }

        let mut chain = Self::new(platform, settings, callbacks);
        chain.register(Box::new(elements::ScreenCapture::default()))?;
        chain.register(Box::new(elements::ColorConversion))?;
        chain.register(Box::new(elements::Viewport))?;
        chain.register(Box::new(elements::LaneDetection))?;
        chain.register(Box::new(elements::VirtualController::default()))?;

        tracing::info!(
            platform = %chain.platform,
            elements = chain.elements.len(),
            "Processing chain assembled"
        );
        Ok(chain)
    }

    /// Append `element`, attach its settings and register its callbacks.
    ///
    /// Elements without settings leave the tree untouched.
    pub fn register(&mut self, element: Box<dyn ChainElement>) -> Result<(), PipelineError> {
        let key = element.key();
        let owned = element.settings();

        if !owned.is_empty() {
            let mut subtree = SettingsNode::new(key).with_widget(Arc::new(SubtreeWidget));
            if let Some(label) = element.verbose_name() {
                subtree = subtree.with_label(label);
            }
            let registration = |source| PipelineError::Registration {
                element: key.to_string(),
                source,
            };
            for node in owned {
                subtree.add_child(node).map_err(registration)?;
            }
            self.settings.attach(subtree).map_err(registration)?;
        }

        for (name, callback) in element.callbacks() {
            self.callbacks.register(format!("{key}.{name}"), callback);
        }

        tracing::debug!(element = key, "Chain element registered");
        self.elements.push(element);
        Ok(())
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Pipeline for ProcessingChain {
    fn process(&mut self) -> Result<PipelineOutput, PipelineError> {
        let mut output = PipelineOutput::default();
        let mut frame = Frame::default();

        for element in &mut self.elements {
            let mut ctx = ElementContext::new(element.key(), &self.settings, &mut output);
            frame = element.process(frame, &mut ctx)?;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsError;
    use serde_json::json;

    fn store() -> Arc<SettingsStore> {
        Arc::new(SettingsStore::new("unused.json", SettingsNode::root()))
    }

    struct Doubler;

    impl ChainElement for Doubler {
        fn key(&self) -> &'static str {
            "doubler"
        }

        fn verbose_name(&self) -> Option<&'static str> {
            Some("Doubler")
        }

        fn settings(&self) -> Vec<SettingsNode> {
            vec![SettingsNode::new("factor").with_value("2")]
        }

        fn callbacks(&self) -> Vec<(&'static str, Callback)> {
            let ping: Callback = Arc::new(|_: &[Value]| -> Result<Value, String> { Ok(json!("pong")) });
            vec![("ping", ping)]
        }

        fn process(&mut self, mut frame: Frame, ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
            let factor: u8 = ctx.parsed_setting("factor")?;
            frame.pixels = vec![factor; 4];
            ctx.publish("doubled", json!({ "factor": factor }));
            Ok(frame)
        }
    }

    struct Passthrough;

    impl ChainElement for Passthrough {
        fn key(&self) -> &'static str {
            "passthrough"
        }

        fn process(&mut self, frame: Frame, ctx: &mut ElementContext<'_>) -> Result<Frame, PipelineError> {
            ctx.publish("seen", json!(frame.pixels.len()));
            Ok(frame)
        }
    }

    #[test]
    fn test_register_attaches_settings() {
        let settings = store();
        let callbacks = Arc::new(CallbackRegistry::new());
        let mut chain = ProcessingChain::new("linux", settings.clone(), callbacks.clone());
        chain.register(Box::new(Doubler)).unwrap();
        chain.register(Box::new(Passthrough)).unwrap();

        assert_eq!(settings.get_value("root.doubler.factor").unwrap(), "2");
        settings.read(|root| {
            assert_eq!(root.resolve("doubler").unwrap().label(), "Doubler");
            // No settings, no subtree.
            assert!(root.resolve("passthrough").is_none());
        });
        assert!(callbacks.contains("doubler.ping"));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_duplicate_element_rejected() {
        let mut chain = ProcessingChain::new("linux", store(), Arc::new(CallbackRegistry::new()));
        chain.register(Box::new(Doubler)).unwrap();
        let err = chain.register(Box::new(Doubler)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Registration { source: SettingsError::DuplicateKey { .. }, .. }
        ));
    }

    #[test]
    fn test_process_feeds_frames_forward() {
        let mut chain = ProcessingChain::new("linux", store(), Arc::new(CallbackRegistry::new()));
        chain.register(Box::new(Doubler)).unwrap();
        chain.register(Box::new(Passthrough)).unwrap();

        let output = chain.process().unwrap();
        let names: Vec<_> = output.payloads().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["doubled", "seen"]);
        assert_eq!(output.payloads()[1].data, json!(4));
    }

    #[test]
    fn test_bad_setting_fails_iteration() {
        let settings = store();
        let mut chain = ProcessingChain::new("linux", settings.clone(), Arc::new(CallbackRegistry::new()));
        chain.register(Box::new(Doubler)).unwrap();
        settings.write(|root| root.set_value("root.doubler.factor", "lots")).unwrap();

        assert!(matches!(
            chain.process(),
            Err(PipelineError::InvalidSetting { ref path, .. }) if path == "root.doubler.factor"
        ));
    }

    #[test]
    fn test_unsupported_platform() {
        let result = ProcessingChain::for_platform("amiga", store(), Arc::new(CallbackRegistry::new()));
        assert!(matches!(result, Err(PipelineError::UnsupportedPlatform(p)) if p == "amiga"));
    }

    #[test]
    fn test_platform_chain_assembles() {
        let settings = store();
        let callbacks = Arc::new(CallbackRegistry::new());
        let chain = ProcessingChain::for_platform("Linux", settings.clone(), callbacks.clone()).unwrap();
        assert_eq!(chain.platform(), "linux");
        assert_eq!(chain.len(), 5);
        assert!(settings.get_value("root.viewport.x1").is_ok());
        assert!(settings.get_value("root.controller.vjoy_device").is_ok());
        assert!(callbacks.contains("controller.center"));
    }
}
