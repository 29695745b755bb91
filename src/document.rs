//! `Document`: the façade tying the graph, transform pipeline, visualisation
//! pipeline and command manager together, exposing the host-facing surface
//! of `spec.md` §6 (`apply`/`undo`/`redo`/`cancelCommand`).
//!
//! Grounded on `examples/original_source/source/app/commands/applytransformscommand.{h,cpp}`
//! and `applyvisualisationscommand.cpp`: both hold a previous/new
//! string-list pair and replay `doTransform`/`apply` in one direction on
//! `execute`, the other on `undo` — this module's [`ApplyTransformsCommand`]
//! and [`ApplyVisualisationsCommand`] do the same against a
//! [`TransformedGraph`]/[`visualisation`] pair instead of a `GraphModel`.
//!
//! `openUrl`/`saveFile` from §6 are not implemented here: loading and
//! saving a document is an external-collaborator concern (§1 Non-goals:
//! "file loaders/savers... are out of scope, implemented by an external
//! collaborator"). A host constructs a [`Document`] from an already-loaded
//! [`MutableGraph`]/[`AttributeRegistry`] pair.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::attribute::AttributeRegistry;
use crate::command::{Command, CommandContext, CommandManager, ExecutePolicy};
use crate::graph::MutableGraph;
use crate::transform::transformed_graph::{RebuildReport, TransformedGraph};
use crate::transform::{Alert, TransformConfig};
use crate::visualisation::{apply_visualisations, VisualisationConfig, VisualisationResult};

struct DocumentState {
    source_graph: MutableGraph,
    source_attributes: AttributeRegistry,
    target_graph: MutableGraph,
    target_attributes: AttributeRegistry,
    transformed: TransformedGraph,
    visualisation_configs: Vec<VisualisationConfig>,
    visualisation_result: VisualisationResult,
    edge_text_disabled: bool,
    last_rebuild: Option<RebuildReport>,
    last_visualisation_alerts: Vec<(usize, Alert)>,
}

impl DocumentState {
    fn rebuild(&mut self, cancelled: &dyn Fn() -> bool) {
        let report = self.transformed.rebuild(
            &self.source_graph,
            &self.source_attributes,
            &mut self.target_graph,
            &mut self.target_attributes,
            cancelled,
        );
        self.revisualise();
        self.last_rebuild = Some(report);
    }

    fn revisualise(&mut self) {
        self.target_attributes.recompute_all();
        let (result, alerts) = apply_visualisations(
            &self.target_graph,
            &self.target_attributes,
            &self.visualisation_configs,
            self.edge_text_disabled,
        );
        self.visualisation_result = result;
        self.last_visualisation_alerts = alerts;
    }
}

/// Owns the whole document state behind a single `Rc<RefCell<_>>` so that
/// undo/redo commands (which must be able to mutate it from inside
/// `Command::execute`/`undo`) can hold a handle to it without `Document`
/// itself needing to be generic over a borrow.
pub struct Document {
    state: Rc<RefCell<DocumentState>>,
    command_manager: CommandManager,
}

impl Document {
    pub fn new(source_graph: MutableGraph, source_attributes: AttributeRegistry) -> Self {
        let target_graph = source_graph.snapshot();
        let target_attributes = source_attributes.clone();
        let state = DocumentState {
            source_graph,
            source_attributes,
            target_graph,
            target_attributes,
            transformed: TransformedGraph::new(),
            visualisation_configs: Vec::new(),
            visualisation_result: VisualisationResult::default(),
            edge_text_disabled: false,
            last_rebuild: None,
            last_visualisation_alerts: Vec::new(),
        };
        Self { state: Rc::new(RefCell::new(state)), command_manager: CommandManager::new() }
    }

    pub fn set_edge_text_disabled(&mut self, disabled: bool) {
        self.state.borrow_mut().edge_text_disabled = disabled;
    }

    pub fn graph(&self) -> std::cell::Ref<'_, MutableGraph> {
        std::cell::Ref::map(self.state.borrow(), |s| &s.target_graph)
    }

    pub fn attributes(&self) -> std::cell::Ref<'_, AttributeRegistry> {
        std::cell::Ref::map(self.state.borrow(), |s| &s.target_attributes)
    }

    pub fn visualisation_result(&self) -> std::cell::Ref<'_, VisualisationResult> {
        std::cell::Ref::map(self.state.borrow(), |s| &s.visualisation_result)
    }

    pub fn transforms(&self) -> Vec<TransformConfig> {
        self.state.borrow().transformed.transforms().to_vec()
    }

    pub fn visualisations(&self) -> Vec<VisualisationConfig> {
        self.state.borrow().visualisation_configs.clone()
    }

    pub fn last_rebuild_report(&self) -> std::cell::Ref<'_, Option<RebuildReport>> {
        std::cell::Ref::map(self.state.borrow(), |s| &s.last_rebuild)
    }

    pub fn last_visualisation_alerts(&self) -> std::cell::Ref<'_, Vec<(usize, Alert)>> {
        std::cell::Ref::map(self.state.borrow(), |s| &s.last_visualisation_alerts)
    }

    /// `apply(transforms, visualisations, replaceLatest?)`: build a combined
    /// undo step and execute it. `replace_latest` maps to the `Replace`
    /// policy (e.g. a live-editing UI re-applying on every keystroke);
    /// otherwise each call is its own undo entry.
    pub fn apply(&mut self, transforms: Vec<TransformConfig>, visualisations: Vec<VisualisationConfig>, replace_latest: bool) -> bool {
        let previous_transforms = self.state.borrow().transformed.transforms().to_vec();
        let previous_visualisations = self.state.borrow().visualisation_configs.clone();

        let command = ApplyCommand {
            state: self.state.clone(),
            previous_transforms,
            new_transforms: transforms,
            previous_visualisations,
            new_visualisations: visualisations,
        };

        let policy = if replace_latest { ExecutePolicy::Replace } else { ExecutePolicy::Add };
        self.command_manager.execute(Box::new(command), policy)
    }

    pub fn undo(&mut self) -> bool {
        self.command_manager.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.command_manager.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.command_manager.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.command_manager.can_redo()
    }

    pub fn cancel_command(&self) {
        self.command_manager.request_cancel();
    }

    pub fn on_command_event(&mut self, listener: impl FnMut(&crate::command::CommandEvent) + 'static) {
        self.command_manager.on_event(listener);
    }
}

/// `[Apply{Transforms,Visualisations}Command]` folded into one command,
/// since `Document::apply` always rebuilds and revisualises together (the
/// default visualisations a transform creates for a new attribute need the
/// just-rebuilt attribute set to resolve against).
struct ApplyCommand {
    state: Rc<RefCell<DocumentState>>,
    previous_transforms: Vec<TransformConfig>,
    new_transforms: Vec<TransformConfig>,
    previous_visualisations: Vec<VisualisationConfig>,
    new_visualisations: Vec<VisualisationConfig>,
}

impl ApplyCommand {
    fn apply_direction(&self, transforms: &[TransformConfig], visualisations: &[VisualisationConfig], ctx: &CommandContext) {
        let mut state = self.state.borrow_mut();
        state.transformed.set_transforms(transforms.to_vec());
        state.visualisation_configs = visualisations.to_vec();
        let cancelled = || ctx.cancelled();
        state.rebuild(&cancelled);
    }
}

impl Command for ApplyCommand {
    fn description(&self) -> String {
        "Apply Transforms".to_string()
    }

    fn verb(&self) -> String {
        "Applying Transforms".to_string()
    }

    fn past_participle(&self) -> String {
        "Applied Transforms".to_string()
    }

    fn execute(&mut self, ctx: &CommandContext) -> bool {
        // Mirrors the original's `ApplyTransformsCommand::execute`: errors
        // during a rebuild are Alerts attached to individual transforms,
        // not a failed command — the caller inspects `last_rebuild_report`
        // for those. Only a hard failure would return `false` here, and a
        // rebuild (cancelled or not) always completes.
        self.apply_direction(&self.new_transforms, &self.new_visualisations, ctx);
        true
    }

    fn undo(&mut self, ctx: &CommandContext) {
        self.apply_direction(&self.previous_transforms, &self.previous_visualisations, ctx);
    }

    fn cancellable(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ElementId;

    fn chain(len: usize) -> MutableGraph {
        let mut graph = MutableGraph::new();
        let nodes: Vec<_> = (0..len).map(|_| graph.add_node()).collect();
        for pair in nodes.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        graph
    }

    #[test]
    fn apply_then_undo_restores_the_previous_graph() {
        let source = chain(5);
        let mut document = Document::new(source, AttributeRegistry::new());

        document.apply(vec![crate::transform::parse_transform_config("\"Remove Leaves\" with \"Limit\" = 1").unwrap()], vec![], false);
        assert_eq!(document.graph().num_nodes(), 3);

        assert!(document.undo());
        assert_eq!(document.graph().num_nodes(), 5);

        assert!(document.redo());
        assert_eq!(document.graph().num_nodes(), 3);
    }

    #[test]
    fn apply_runs_the_visualisation_pipeline_against_the_rebuilt_graph() {
        let source = chain(3);
        let mut attributes = AttributeRegistry::new();
        let ids = source.node_ids();
        attributes.insert(
            crate::attribute::Attribute::from_int("Index", move || ids.clone(), |id: crate::graph::NodeId| Some(id.index() as i64))
                .with_flags(crate::attribute::AttributeFlags { auto_range: true, ..Default::default() }),
        );

        let mut document = Document::new(source, attributes);
        document.apply(vec![], vec![crate::visualisation::parse_visualisation_config("$\"Index\" \"Colour\"").unwrap()], false);

        assert_eq!(document.visualisation_result().node_visuals.len(), 3);
    }
}
