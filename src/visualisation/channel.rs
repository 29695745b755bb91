//! Visual channels: the polymorphic output side of a visualisation line.
//!
//! Grounded on `spec.md` §4.7's capability set
//! (`appliesTo`/`supports`/`requiresRange`/`allowsMapping`/`apply`); no
//! `visualisationchannel.cpp` body survived the filtered `original_source`
//! pack, so channel behaviour (palette gradient, discrete size scale) is
//! authored directly from that description rather than transcribed.

use crate::attribute::ValueType;
use crate::graph::ElementKind;

/// An RGB colour in `[0, 1]` per channel — simple enough that this crate
/// doesn't reach for a colour crate (none appear in the retrieved corpus).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colour {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Colour {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Blue (low) to red (high) gradient for a normalised `[0, 1]` value.
    fn gradient(t: f64) -> Self {
        let t = t.clamp(0.0, 1.0) as f32;
        Self::new(t, 0.15, 1.0 - t)
    }

    /// An evenly-spaced hue wheel slot, used for categorical assignment.
    fn palette_slot(slot: usize, total_slots: usize) -> Self {
        let total = total_slots.max(1) as f32;
        let hue = (slot as f32 / total) * 360.0;
        hsl_to_rgb(hue, 0.65, 0.5)
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Colour {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match h_prime as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Colour::new(r1 + m, g1 + m, b1 + m)
}

/// The accumulated visual state for one node or edge, written to by every
/// visualisation line that touches it. Fields start unset; a disabled or
/// erroring visualisation simply never writes one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementVisual {
    pub colour: Option<Colour>,
    pub size: Option<f64>,
    pub text: Option<String>,
    pub text_colour: Option<Colour>,
    pub text_size: Option<f64>,
}

/// How a `[0, 1]`-normalised numeric value is reshaped before being handed
/// to a channel, when the visualisation line sets a `"mapping"` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    Linear,
    Exponent,
    Logistic,
}

impl Mapping {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Mapping::Linear),
            "exponent" => Some(Mapping::Exponent),
            "logistic" => Some(Mapping::Logistic),
            _ => None,
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Mapping::Linear => x,
            Mapping::Exponent => x * x,
            Mapping::Logistic => 1.0 / (1.0 + (-12.0 * (x - 0.5)).exp()),
        }
    }
}

/// A visual output channel. Stateless: every method is a pure capability
/// query or a pure write into an [`ElementVisual`].
pub trait Channel {
    fn name(&self) -> &'static str;

    fn applies_to(&self, kind: ElementKind) -> bool {
        matches!(kind, ElementKind::Node | ElementKind::Edge)
    }

    fn supports(&self, value_type: ValueType) -> bool;

    /// Whether this channel needs the attribute's numeric range to map a
    /// value onto its output space (colour gradient position, size scale).
    fn requires_range(&self) -> bool;

    /// Whether a `"mapping"` parameter is honoured for numeric values.
    fn allows_mapping(&self) -> bool;

    /// `Text` is a pure stringify-and-display passthrough with no
    /// range/palette step; every other channel maps a normalised value or
    /// categorical slot onto a colour or size.
    fn is_text_channel(&self) -> bool {
        false
    }

    fn apply_numeric(&self, _normalised: f64, _visual: &mut ElementVisual) {}
    fn apply_categorical(&self, _slot: usize, _total_slots: usize, _visual: &mut ElementVisual) {}
    fn apply_text(&self, _text: String, _visual: &mut ElementVisual) {}
}

pub struct ColourChannel;
impl Channel for ColourChannel {
    fn name(&self) -> &'static str {
        "Colour"
    }
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
    fn requires_range(&self) -> bool {
        true
    }
    fn allows_mapping(&self) -> bool {
        true
    }
    fn apply_numeric(&self, normalised: f64, visual: &mut ElementVisual) {
        visual.colour = Some(Colour::gradient(normalised));
    }
    fn apply_categorical(&self, slot: usize, total_slots: usize, visual: &mut ElementVisual) {
        visual.colour = Some(Colour::palette_slot(slot, total_slots));
    }
}

pub struct SizeChannel;
impl Channel for SizeChannel {
    fn name(&self) -> &'static str {
        "Size"
    }
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
    fn requires_range(&self) -> bool {
        true
    }
    fn allows_mapping(&self) -> bool {
        true
    }
    fn apply_numeric(&self, normalised: f64, visual: &mut ElementVisual) {
        visual.size = Some(1.0 + normalised.clamp(0.0, 1.0) * 9.0);
    }
    fn apply_categorical(&self, slot: usize, total_slots: usize, visual: &mut ElementVisual) {
        let fraction = slot as f64 / total_slots.max(1) as f64;
        visual.size = Some(1.0 + fraction * 9.0);
    }
}

pub struct TextChannel;
impl Channel for TextChannel {
    fn name(&self) -> &'static str {
        "Text"
    }
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
    fn requires_range(&self) -> bool {
        false
    }
    fn allows_mapping(&self) -> bool {
        false
    }
    fn is_text_channel(&self) -> bool {
        true
    }
    fn apply_text(&self, text: String, visual: &mut ElementVisual) {
        visual.text = Some(text);
    }
}

pub struct TextColourChannel;
impl Channel for TextColourChannel {
    fn name(&self) -> &'static str {
        "Text Colour"
    }
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
    fn requires_range(&self) -> bool {
        true
    }
    fn allows_mapping(&self) -> bool {
        true
    }
    fn apply_numeric(&self, normalised: f64, visual: &mut ElementVisual) {
        visual.text_colour = Some(Colour::gradient(normalised));
    }
    fn apply_categorical(&self, slot: usize, total_slots: usize, visual: &mut ElementVisual) {
        visual.text_colour = Some(Colour::palette_slot(slot, total_slots));
    }
}

pub struct TextSizeChannel;
impl Channel for TextSizeChannel {
    fn name(&self) -> &'static str {
        "Text Size"
    }
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
    fn requires_range(&self) -> bool {
        true
    }
    fn allows_mapping(&self) -> bool {
        true
    }
    fn apply_numeric(&self, normalised: f64, visual: &mut ElementVisual) {
        visual.text_size = Some(8.0 + normalised.clamp(0.0, 1.0) * 16.0);
    }
    fn apply_categorical(&self, slot: usize, total_slots: usize, visual: &mut ElementVisual) {
        let fraction = slot as f64 / total_slots.max(1) as f64;
        visual.text_size = Some(8.0 + fraction * 16.0);
    }
}

/// Produces one merged label per group of nodes sharing an attribute value
/// within a component; handled specially by the pipeline (it needs the
/// live graph to find the groups), not through `apply_*`. Position/layout
/// of the resulting label is out of scope here (depends on node layout,
/// itself a Non-goal) — this channel only emits the member grouping and
/// label text, see [`crate::visualisation::pipeline::SharedTextGroup`].
pub struct SharedTextChannel;
impl Channel for SharedTextChannel {
    fn name(&self) -> &'static str {
        "Shared Text"
    }
    fn applies_to(&self, kind: ElementKind) -> bool {
        matches!(kind, ElementKind::Node)
    }
    fn supports(&self, _value_type: ValueType) -> bool {
        true
    }
    fn requires_range(&self) -> bool {
        false
    }
    fn allows_mapping(&self) -> bool {
        false
    }
    fn is_text_channel(&self) -> bool {
        true
    }
}

/// `channelByName`: resolve a channel by its config-file name.
pub fn resolve(name: &str) -> Option<Box<dyn Channel>> {
    match name {
        "Colour" => Some(Box::new(ColourChannel)),
        "Size" => Some(Box::new(SizeChannel)),
        "Text" => Some(Box::new(TextChannel)),
        "Text Colour" => Some(Box::new(TextColourChannel)),
        "Text Size" => Some(Box::new(TextSizeChannel)),
        "Shared Text" => Some(Box::new(SharedTextChannel)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_functions_stay_within_unit_range() {
        for x in [0.0, 0.25, 0.5, 0.75, 1.0] {
            for mapping in [Mapping::Linear, Mapping::Exponent, Mapping::Logistic] {
                let y = mapping.apply(x);
                assert!((0.0..=1.0).contains(&y), "{mapping:?}({x}) = {y} out of range");
            }
        }
    }

    #[test]
    fn colour_channel_writes_only_colour() {
        let channel = ColourChannel;
        let mut visual = ElementVisual::default();
        channel.apply_numeric(0.5, &mut visual);
        assert!(visual.colour.is_some());
        assert!(visual.size.is_none());
    }

    #[test]
    fn resolve_is_case_and_space_exact() {
        assert!(resolve("Colour").is_some());
        assert!(resolve("colour").is_none());
        assert!(resolve("Nonexistent").is_none());
    }
}
