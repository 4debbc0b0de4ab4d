use ndarray::ArrayD;

/// Value of a field of a [`SceneObject`](super::SceneObject).
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// A single number, e.g. a mass or a stiffness.
    Scalar(f64),

    /// A flat list of numbers.
    Vector(Vec<f64>),

    /// An n-dimensional array, typically positions of shape `(n, 3)`.
    Array(ArrayD<f64>),

    /// Text, e.g. a file name or a color.
    Text(String),

    /// A boolean switch.
    Flag(bool),
}

impl Data {
    /// Returns the array if the value is [`Data::Array`].
    pub fn as_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the number if the value is [`Data::Scalar`].
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text if the value is [`Data::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for Data {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<f64>> for Data {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl From<ArrayD<f64>> for Data {
    fn from(a: ArrayD<f64>) -> Self {
        Self::Array(a)
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}
