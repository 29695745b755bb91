//! `GraphTransform`: the interface every concrete transform implements, plus
//! the factory that turns a parsed [`TransformConfig`] into one.
//!
//! Grounded on the teacher's `src/transformations/{mod.rs,engine.rs}`
//! (enum-of-ops dispatch, `tracing` call sites, `Result`-returning pipeline
//! stages) generalised to the graph-transform catalogue this crate actually
//! implements.

pub mod attribute_synthesis;
pub mod betweenness;
pub mod cache;
pub mod community;
pub mod config;
pub mod filter;
pub mod knn;
pub mod remove_leaves;
pub mod spanning_forest;
pub mod transformed_graph;

pub use config::{parse_transform_config, Parameter, ParameterValue, TransformConfig};

use tracing::warn;

use crate::attribute::AttributeRegistry;
use crate::graph::MutableGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertType {
    None,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub severity: AlertType,
    pub message: String,
}

impl Alert {
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: AlertType::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: AlertType::Error, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.severity == AlertType::Error
    }
}

/// What a transform operates against: the mutable graph being built plus
/// the attribute registry it may add to, read progress/cancellation
/// callbacks, and a phase label for UI feedback.
pub struct TransformContext<'a> {
    pub graph: &'a mut MutableGraph,
    pub attributes: &'a mut AttributeRegistry,
    progress: Option<&'a mut dyn FnMut(i32)>,
    phase: Option<&'a mut dyn FnMut(&str)>,
    cancelled: Option<&'a dyn Fn() -> bool>,
}

impl<'a> TransformContext<'a> {
    pub fn new(graph: &'a mut MutableGraph, attributes: &'a mut AttributeRegistry) -> Self {
        Self { graph, attributes, progress: None, phase: None, cancelled: None }
    }

    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(i32)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_phase(mut self, phase: &'a mut dyn FnMut(&str)) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_cancellation(mut self, cancelled: &'a dyn Fn() -> bool) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    pub fn set_progress(&mut self, percent: i32) {
        if let Some(progress) = self.progress.as_mut() {
            progress(percent);
        }
    }

    pub fn set_phase(&mut self, phase: &str) {
        if let Some(set_phase) = self.phase.as_mut() {
            set_phase(phase);
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled.map(|f| f()).unwrap_or(false)
    }
}

pub trait GraphTransform {
    /// Run the transform against `ctx.graph`, possibly creating attributes
    /// in `ctx.attributes`. Returns any alerts raised while doing so.
    fn apply(&self, ctx: &mut TransformContext) -> Vec<Alert>;

    /// Filter/Remove/Keep/Contract require a `where` clause; running them
    /// without one is a configuration error.
    fn requires_condition(&self) -> bool {
        false
    }

    /// Re-applied until a pass makes no further change, or cancellation.
    fn repeating(&self) -> bool {
        false
    }

    /// `(attribute name, channel name)` pairs the UI should bind when this
    /// transform first appears in a document.
    fn default_visualisations(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

fn config_requires_condition(action: &str) -> bool {
    matches!(action, "Remove" | "Filter" | "Keep" | "Contract")
}

/// `configIsValid`: whether `config` is well-formed enough to construct a
/// transform for its action. Does not check attribute existence — that's a
/// per-element runtime concern the transform itself reports as an [`Alert`].
pub fn config_is_valid(config: &TransformConfig) -> bool {
    if config_requires_condition(&config.action) && !config.has_condition() {
        return false;
    }

    match config.action.as_str() {
        "k-NN" | "%-NN" => config.has_parameter("k") || config.has_parameter("Ranking Attribute"),
        "Betweenness" => true,
        "Louvain" | "Weighted Louvain" | "Leiden" | "Weighted Leiden" => true,
        "Spanning Forest" => true,
        "Remove Leaves" | "Remove Branches" => true,
        "Combine" | "Average" | "Type Cast" | "Contract By Attribute" => !config.attributes.is_empty(),
        _ => true,
    }
}

/// Every action name `create` knows how to dispatch, alongside whether it
/// requires a `where` clause. Used by the CLI's `describe-ops` subcommand;
/// not consulted by `create`/`config_is_valid` themselves so the two lists
/// can't silently drift without a reviewer noticing a missing match arm.
pub fn known_actions() -> Vec<(&'static str, bool)> {
    const ACTIONS: &[&str] = &[
        "Remove",
        "Keep",
        "Contract",
        "Contract By Attribute",
        "k-NN",
        "%-NN",
        "Betweenness",
        "Louvain",
        "Weighted Louvain",
        "Leiden",
        "Weighted Leiden",
        "Spanning Forest",
        "Remove Leaves",
        "Remove Branches",
        "Combine",
        "Average",
        "Type Cast",
    ];
    ACTIONS.iter().map(|&action| (action, config_requires_condition(action))).collect()
}

/// `create`: build the concrete transform for `config`'s action. Unknown
/// actions are a programmer/document error, reported via the returned
/// `Err` rather than panicking.
pub fn create(config: &TransformConfig) -> Result<Box<dyn GraphTransform>, String> {
    if !config_is_valid(config) {
        warn!(action = %config.action, "transform config failed validation");
        return Err(format!("invalid configuration for transform {:?}", config.action));
    }

    match config.action.as_str() {
        "Remove" => Ok(Box::new(filter::FilterTransform::remove(config.condition.clone()))),
        "Keep" => Ok(Box::new(filter::FilterTransform::keep(config.condition.clone()))),
        "Contract" => Ok(Box::new(filter::ContractTransform::new(config.condition.clone()))),
        "Contract By Attribute" => {
            let raw = config.attributes.first().ok_or_else(|| "Contract By Attribute requires a using clause".to_string())?;
            let name_ref = crate::attribute::parse_attribute_name_ref(raw)
                .map_err(|e| format!("invalid attribute reference {raw:?}: {e}"))?;
            Ok(Box::new(filter::ContractTransform::by_attribute(&name_ref.base_name)))
        }
        "k-NN" => Ok(Box::new(knn::KnnTransform::from_config(config, false)?)),
        "%-NN" => Ok(Box::new(knn::KnnTransform::from_config(config, true)?)),
        "Betweenness" => Ok(Box::new(betweenness::BetweennessTransform::new())),
        "Louvain" => Ok(Box::new(community::LouvainTransform::from_config(config, false))),
        "Weighted Louvain" => Ok(Box::new(community::LouvainTransform::from_config(config, true))),
        "Leiden" => Ok(Box::new(community::LouvainTransform::from_config_with_family(config, false, "Leiden"))),
        "Weighted Leiden" => Ok(Box::new(community::LouvainTransform::from_config_with_family(config, true, "Leiden"))),
        "Spanning Forest" => Ok(Box::new(spanning_forest::SpanningForestTransform::from_config(config))),
        "Remove Leaves" => Ok(Box::new(remove_leaves::RemoveLeavesTransform::from_config(config, false))),
        "Remove Branches" => Ok(Box::new(remove_leaves::RemoveLeavesTransform::from_config(config, true))),
        "Combine" => Ok(Box::new(attribute_synthesis::CombineTransform::from_config(config))),
        "Average" => Ok(Box::new(attribute_synthesis::AverageTransform::from_config(config))),
        "Type Cast" => Ok(Box::new(attribute_synthesis::TypeCastTransform::from_config(config))),
        other => Err(format!("unknown transform action {other:?}")),
    }
}
