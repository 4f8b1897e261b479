use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declaration of a watcher as it appears in the configuration file.
///
/// Specs are parsed once at startup and immutable thereafter; the runtime
/// pairs each enabled spec with a constructed plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherSpec {
    /// Unique key within the watcher list, e.g. `"screen"`.
    pub name: String,
    pub enabled: bool,
    /// Seconds between the end of one cycle and the start of the next.
    /// Must be >= 1; validated at config load.
    pub interval: u64,
    /// Prompt forwarded to the analyzer together with each observation.
    pub prompt: String,
}

/// Declaration of an action as it appears in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Unique key within the action list, e.g. `"console"`.
    pub name: String,
    pub enabled: bool,
}

/// One unit of observation produced by a watcher for one cycle.
///
/// The payload shape decides how the analyzer builds its backend request:
/// text is appended to the prompt, an image travels in the request's
/// `images` field.  "Nothing collected this cycle" is represented by the
/// watcher returning `None`, not by a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollectedData {
    /// Plain text, e.g. a JSON metrics snapshot.
    Text(String),
    /// Base64-encoded PNG.
    Image(String),
}

impl CollectedData {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectedData::Text(_) => "text",
            CollectedData::Image(_) => "image",
        }
    }

    /// Payload size in bytes (of the encoded form for images).
    pub fn len(&self) -> usize {
        match self {
            CollectedData::Text(s) | CollectedData::Image(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Recoverable runtime faults.  Every variant is caught at a tick or
/// per-action boundary and logged; none of them is fatal to the process.
#[derive(Error, Debug)]
pub enum VigilError {
    /// A watcher failed to produce data this cycle.
    #[error("collection failed for watcher '{watcher}': {details}")]
    Collection { watcher: String, details: String },

    /// The analyzer backend request failed.  Normally encoded as result
    /// text by the analyzer itself; this variant exists for callers that
    /// need a typed form.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// An action failed to consume a result.
    #[error("action '{action}' failed: {details}")]
    Action { action: String, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_spec_roundtrip() {
        let spec = WatcherSpec {
            name: "screen".to_string(),
            enabled: true,
            interval: 60,
            prompt: "Describe what is on the screen.".to_string(),
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: WatcherSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn collected_data_kind_labels() {
        assert_eq!(CollectedData::Text("{}".into()).kind(), "text");
        assert_eq!(CollectedData::Image("aGk=".into()).kind(), "image");
    }

    #[test]
    fn collected_data_len_counts_encoded_bytes() {
        let data = CollectedData::Image("aGVsbG8=".into());
        assert_eq!(data.len(), 8);
        assert!(!data.is_empty());
        assert!(CollectedData::Text(String::new()).is_empty());
    }

    #[test]
    fn vigil_error_display_names_the_component() {
        let err = VigilError::Collection {
            watcher: "screen".to_string(),
            details: "capture command exited with status 1".to_string(),
        };
        assert!(err.to_string().contains("screen"));

        let err2 = VigilError::Action {
            action: "console".to_string(),
            details: "broken pipe".to_string(),
        };
        assert!(err2.to_string().contains("console"));
    }
}
