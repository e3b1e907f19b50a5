//! Element attributes and their numeric interpretation
//!
//! Absent, malformed, and non-finite values fall back to the attribute's
//! default. Parsing never fails.

use portbridge_core::{MapViewState, DEFAULT_ZOOM};
use std::collections::HashMap;

/// Parse a numeric attribute value, falling back to `default`.
pub fn numeric_attribute(value: Option<&str>, default: f64) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Raw attributes of one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(HashMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Set, or remove when `value` is `None`.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                self.0.insert(name.to_string(), v.to_string());
            }
            None => {
                self.0.remove(name);
            }
        }
    }

    pub fn numeric(&self, name: &str, default: f64) -> f64 {
        numeric_attribute(self.get(name), default)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Observed attributes of the map element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAttribute {
    Lng,
    Lat,
    Zoom,
    Rotate,
    Pitch,
}

impl ViewAttribute {
    pub const ALL: [ViewAttribute; 5] = [
        ViewAttribute::Lng,
        ViewAttribute::Lat,
        ViewAttribute::Zoom,
        ViewAttribute::Rotate,
        ViewAttribute::Pitch,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lng" => Some(Self::Lng),
            "lat" => Some(Self::Lat),
            "zoom" => Some(Self::Zoom),
            "rotate" => Some(Self::Rotate),
            "pitch" => Some(Self::Pitch),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lng => "lng",
            Self::Lat => "lat",
            Self::Zoom => "zoom",
            Self::Rotate => "rotate",
            Self::Pitch => "pitch",
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            Self::Zoom => DEFAULT_ZOOM,
            _ => 0.0,
        }
    }

    /// Copy this attribute's current value into `view`.
    pub fn apply(self, view: &mut MapViewState, attributes: &Attributes) {
        let value = attributes.numeric(self.name(), self.default_value());
        match self {
            Self::Lng => view.longitude = value,
            Self::Lat => view.latitude = value,
            Self::Zoom => view.zoom = value,
            Self::Rotate => view.rotation = value,
            Self::Pitch => view.pitch = value,
        }
    }
}

pub fn view_from_attributes(attributes: &Attributes) -> MapViewState {
    let mut view = MapViewState::default();
    for attr in ViewAttribute::ALL {
        attr.apply(&mut view, attributes);
    }
    view
}

/// Observed attributes of a marker element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAttribute {
    Lng,
    Lat,
}

impl MarkerAttribute {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lng" => Some(Self::Lng),
            "lat" => Some(Self::Lat),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lng => "lng",
            Self::Lat => "lat",
        }
    }
}
