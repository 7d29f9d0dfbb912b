use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Source of stimuli by symbolic name. How a stimulus is drawn or played is
/// left to whoever presents it.
pub trait StimulusProvider {
    fn get(&self, name: &str) -> Option<StimulusType>;

    /// Like `get`, with `{placeholder}` fields of text stimuli filled in.
    fn get_and_format(&self, name: &str, fields: &BTreeMap<String, String>) -> Option<StimulusType> {
        self.get(name).map(|stim| stim.formatted(fields))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StimulusType {
    Circle {
        radius: f32,
        color: [u8; 4],
    },
    Rectangle {
        width: f32,
        height: f32,
        color: [u8; 4],
    },
    Arrow {
        direction: ArrowDirection,
        size: f32,
        color: [u8; 4],
    },
    Text {
        content: String,
        #[serde(default = "default_text_size")]
        size: f32,
        #[serde(default = "default_text_color")]
        color: [u8; 4],
    },
}

fn default_text_size() -> f32 {
    32.0
}

fn default_text_color() -> [u8; 4] {
    [255, 255, 255, 255]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowDirection {
    Up,
    Down,
    Left,
    Right,
}

impl StimulusType {
    pub fn text(content: impl Into<String>) -> Self {
        StimulusType::Text {
            content: content.into(),
            size: default_text_size(),
            color: default_text_color(),
        }
    }

    /// Replaces every `{name}` in a text stimulus. Unknown placeholders are
    /// left as they are; shapes are returned unchanged.
    pub fn formatted(self, fields: &BTreeMap<String, String>) -> Self {
        match self {
            StimulusType::Text {
                content,
                size,
                color,
            } => {
                let content = fields.iter().fold(content, |acc, (name, value)| {
                    acc.replace(&format!("{{{name}}}"), value)
                });
                StimulusType::Text {
                    content,
                    size,
                    color,
                }
            }
            other => other,
        }
    }

    /// Short human-readable form for logs.
    pub fn describe(&self) -> String {
        match self {
            StimulusType::Circle { radius, .. } => format!("circle(r={radius})"),
            StimulusType::Rectangle { width, height, .. } => format!("rect({width}x{height})"),
            StimulusType::Arrow { direction, .. } => format!("arrow({direction:?})"),
            StimulusType::Text { content, .. } => format!("text({content:?})"),
        }
    }
}

/// Named stimuli loaded from the task config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusBank {
    stimuli: HashMap<String, StimulusType>,
}

impl StimulusBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, stimulus: StimulusType) {
        self.stimuli.insert(name.into(), stimulus);
    }

    pub fn with(mut self, name: impl Into<String>, stimulus: StimulusType) -> Self {
        self.insert(name, stimulus);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stimuli.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    /// The stimuli every Go/No-Go session needs.
    pub fn standard() -> Self {
        Self::new()
            .with("fixation", StimulusType::text("+"))
            .with(
                "go",
                StimulusType::Circle {
                    radius: 60.0,
                    color: [0, 200, 0, 255],
                },
            )
            .with(
                "nogo",
                StimulusType::Rectangle {
                    width: 120.0,
                    height: 120.0,
                    color: [220, 0, 0, 255],
                },
            )
            .with("no_response_feedback", StimulusType::text("Too slow!"))
            .with("nogo_error_feedback", StimulusType::text("Do not press on red!"))
            .with(
                "instruction_text",
                StimulusType::text("Press SPACE for green circles, withhold for red squares."),
            )
            .with(
                "block_break",
                StimulusType::text(
                    "Block {block_num}/{total_blocks} done.\nGo accuracy: {go_accuracy}\nNo-go accuracy: {nogo_accuracy}",
                ),
            )
            .with("good_bye", StimulusType::text("Thank you!"))
    }
}

impl StimulusProvider for StimulusBank {
    fn get(&self, name: &str) -> Option<StimulusType> {
        self.stimuli.get(name).cloned()
    }
}
