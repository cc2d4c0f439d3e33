use std::collections::HashMap;

/// COCO class names, indexed by the 0-based ids YOLOv8 emits.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Class id to display name, as supplied by the model.
///
/// The table is open: ids without an entry render as their decimal string,
/// so a model with a different label set never breaks normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    names: HashMap<u32, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coco() -> Self {
        COCO_CLASSES
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u32, name.to_string()))
            .collect()
    }

    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn name(&self, id: u32) -> String {
        self.get(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Parse the `names` metadata entry written by YOLOv8 ONNX exports,
    /// a Python dict literal such as `{0: 'person', 1: 'bicycle'}`.
    ///
    /// The literal is read as a YAML flow mapping. Python escapes a quote
    /// inside a single-quoted string as `\'` where YAML doubles it, so text
    /// that fails as-is gets one retry with that rewrite.
    pub fn from_model_metadata(text: &str) -> Option<Self> {
        let parse = |text: &str| serde_yaml::from_str::<HashMap<u32, String>>(text).ok();

        parse(text)
            .or_else(|| parse(&text.replace("\\'", "''")))
            .map(|names| Self { names })
    }

    /// Class names for a model given its raw `names` metadata.
    ///
    /// A model without the entry is assumed to be a COCO export. An entry
    /// that cannot be read gives an empty table, so every class is reported
    /// by its id rather than a guessed COCO name.
    pub fn for_model(names: Option<&str>) -> Self {
        let Some(text) = names else {
            tracing::info!("Model carries no class names, using COCO class names");
            return Self::coco();
        };

        match Self::from_model_metadata(text) {
            Some(labels) => {
                tracing::info!(classes = labels.len(), "Using class names from model metadata");
                labels
            }
            None => {
                tracing::warn!("Model `names` metadata is malformed, class names will be ids");
                Self::new()
            }
        }
    }
}

impl FromIterator<(u32, String)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
