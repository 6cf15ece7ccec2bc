/// A single 2D or 3D point with optional confidence score and semantic name.
///
/// `z` carries relative depth for landmark models that predict it; `score` is a per-point
/// presence/visibility confidence used by detectors and trackers (e.g. OKS). Both are `None`
/// when the producing model doesn't estimate them.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
    pub score: Option<f32>,
    /// A compile-time semantic label (e.g. `"left_eye"`); not carried across (de)serialization,
    /// since it names a constant from the producing model rather than per-frame data.
    #[serde(skip)]
    pub name: Option<&'static str>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None, score: None, name: None }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Euclidean distance in the x/y plane, ignoring `z`.
    pub fn distance(&self, other: &Keypoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}
