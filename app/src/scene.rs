//! JSON scene files: a graph, its functions and subgraphs, the destinies to
//! evaluate and a script of edits applied one at a time.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use nodeflow::{
    EvalConfig, EvalContext, EvalError, EvaluationReport, Graph, NodeId, NodeRegistry, NodeState,
    ParameterMap, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_name() -> String {
    "scene".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
    #[serde(default)]
    pub subgraphs: Vec<SubgraphSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub destinies: Vec<String>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub parameters: ParameterMap,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkSpec {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub slot: usize,
}

/// Ports are named `{name}/input{i}` and `{name}/output`; inner nodes are
/// ordinary scene nodes wired to them.
#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphSpec {
    pub name: String,
    pub inputs: usize,
}

/// Body nodes see the placeholders as `input{i}` and the result node as `output`.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub arity: usize,
    #[serde(default)]
    pub defaults: Vec<Value>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    SetParameter { node: String, key: String, value: Value },
    Connect { from: String, to: String, slot: usize },
    Disconnect { node: String, slot: usize },
    Remove { node: String },
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::SetParameter { node, key, value } => write!(f, "set {}.{} = {}", node, key, value),
            Edit::Connect { from, to, slot } => write!(f, "connect {} -> {}[{}]", from, to, slot),
            Edit::Disconnect { node, slot } => write!(f, "disconnect {}[{}]", node, slot),
            Edit::Remove { node } => write!(f, "remove {}", node),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    pub state: Option<NodeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What one evaluation pass did, in printable form.
#[derive(Debug, Serialize)]
pub struct PassReport {
    pub pass: String,
    pub recomputed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub nodes: Vec<NodeReport>,
}

fn lookup(graph: &Graph, name: &str) -> Result<NodeId, EvalError> {
    graph
        .find_by_name(name)
        .ok_or_else(|| EvalError::invalid(format!("no node named '{}' in {}", name, graph.name())))
}

fn populate(
    registry: &NodeRegistry,
    graph: &mut Graph,
    nodes: &[NodeSpec],
    links: &[LinkSpec],
) -> Result<(), EvalError> {
    for spec in nodes {
        if graph.find_by_name(&spec.name).is_some() {
            return Err(EvalError::invalid(format!("duplicate node name '{}'", spec.name)));
        }
        let node = registry.create_node(&spec.type_id, &spec.name, spec.parameters.clone())?;
        graph.add_node(node)?;
    }
    for link in links {
        let from = lookup(graph, &link.from)?;
        let to = lookup(graph, &link.to)?;
        graph.connect(from, to, link.slot)?;
    }
    Ok(())
}

pub struct SceneRunner {
    registry: NodeRegistry,
    graph: Graph,
    context: EvalContext,
    passes: usize,
}

impl SceneRunner {
    pub fn build(scene: &Scene, config: EvalConfig) -> Result<Self> {
        let registry = NodeRegistry::with_builtin_nodes(config.clone());

        for spec in &scene.functions {
            let function = registry
                .functions()
                .define(&spec.name, spec.arity)
                .with_context(|| format!("defining function {}", spec.name))?;
            if function.name() != spec.name {
                bail!("function {} is defined twice", spec.name);
            }
            for (index, value) in spec.defaults.iter().enumerate() {
                function.set_default(index, value.clone())?;
            }
            function
                .edit(|body| populate(&registry, body, &spec.nodes, &spec.links))
                .with_context(|| format!("building function {}", spec.name))?;
            debug!("Function {} has {} parameters", spec.name, spec.arity);
        }

        let mut graph = Graph::new(&scene.name);
        for spec in &scene.subgraphs {
            graph
                .add_subgraph(&spec.name, spec.inputs)
                .with_context(|| format!("adding subgraph {}", spec.name))?;
        }
        populate(&registry, &mut graph, &scene.nodes, &scene.links)
            .with_context(|| format!("building scene {}", scene.name))?;

        let mut context = EvalContext::new(config);
        for name in &scene.destinies {
            context.add_destiny(lookup(&graph, name)?);
        }
        info!(
            "Scene {} ready: {} nodes, {} functions, {} destinies",
            scene.name,
            graph.len(),
            scene.functions.len(),
            scene.destinies.len()
        );

        Ok(Self {
            registry,
            graph,
            context,
            passes: 0,
        })
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn evaluate(&mut self) -> Result<EvaluationReport> {
        self.passes += 1;
        self.context
            .evaluate(&mut self.graph)
            .with_context(|| format!("evaluation pass {}", self.passes))
    }

    pub fn apply(&mut self, edit: &Edit) -> Result<()> {
        let graph = &mut self.graph;
        match edit {
            Edit::SetParameter { node, key, value } => {
                let id = lookup(graph, node)?;
                graph.set_parameter(id, key, value.clone())?;
            }
            Edit::Connect { from, to, slot } => {
                let from = lookup(graph, from)?;
                let to = lookup(graph, to)?;
                graph.connect(from, to, *slot)?;
            }
            Edit::Disconnect { node, slot } => {
                let id = lookup(graph, node)?;
                if !graph.disconnect(id, *slot)? {
                    return Err(anyhow!("{}[{}] is not connected", node, slot));
                }
            }
            Edit::Remove { node } => {
                let id = lookup(graph, node)?;
                graph.remove_node(id)?;
            }
        }
        Ok(())
    }

    pub fn value_of(&self, name: &str) -> Option<&Value> {
        let id = self.graph.find_by_name(name)?;
        self.context.cached_value(id)
    }

    pub fn node_reports(&self) -> Vec<NodeReport> {
        self.graph
            .node_order()
            .iter()
            .filter_map(|id| self.graph.node(*id))
            .map(|node| NodeReport {
                name: node.name.clone(),
                type_id: node.type_id.clone(),
                state: self.context.state_of(node.id),
                value: self.context.cached_value(node.id).cloned(),
                message: self.context.message_of(node.id).map(str::to_string),
            })
            .collect()
    }

    pub fn pass_report(&self, pass: &str, report: &EvaluationReport) -> PassReport {
        PassReport {
            pass: pass.to_string(),
            recomputed: report
                .pulled
                .iter()
                .map(|id| self.graph.node_name(*id).to_string())
                .collect(),
            failure: report.failure.as_ref().map(|failure| {
                format!("{}: {}", self.graph.node_name(failure.destiny), failure.error)
            }),
            nodes: self.node_reports(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORIAL: &str = r#"{
        "name": "factorial",
        "functions": [{
            "name": "fact",
            "arity": 1,
            "defaults": [4],
            "nodes": [
                {"name": "one", "type": "data.constant", "parameters": {"value": 1}},
                {"name": "done", "type": "logic.compare", "parameters": {"op": "<="}},
                {"name": "less", "type": "math.subtract"},
                {"name": "recurse", "type": "function.invoke", "parameters": {"function": "fact"}},
                {"name": "product", "type": "math.multiply"},
                {"name": "pick", "type": "logic.switch"}
            ],
            "links": [
                {"from": "input0", "to": "done", "slot": 0},
                {"from": "one", "to": "done", "slot": 1},
                {"from": "input0", "to": "less", "slot": 0},
                {"from": "one", "to": "less", "slot": 1},
                {"from": "less", "to": "recurse", "slot": 0},
                {"from": "input0", "to": "product", "slot": 0},
                {"from": "recurse", "to": "product", "slot": 1},
                {"from": "done", "to": "pick", "slot": 0},
                {"from": "one", "to": "pick", "slot": 1},
                {"from": "product", "to": "pick", "slot": 2},
                {"from": "pick", "to": "output", "slot": 0}
            ]
        }],
        "nodes": [
            {"name": "n", "type": "data.constant", "parameters": {"value": 5}},
            {"name": "call", "type": "function.invoke", "parameters": {"function": "fact"}}
        ],
        "links": [{"from": "n", "to": "call"}],
        "destinies": ["call"],
        "edits": [{"op": "set_parameter", "node": "n", "key": "value", "value": 3}]
    }"#;

    #[test]
    fn test_scene_runs_edits_incrementally() {
        let scene: Scene = serde_json::from_str(FACTORIAL).unwrap();
        let mut runner = SceneRunner::build(&scene, EvalConfig::default()).unwrap();

        let report = runner.evaluate().unwrap();
        assert!(report.is_success());
        assert_eq!(runner.value_of("call"), Some(&Value::Integer(120)));

        runner.apply(&scene.edits[0]).unwrap();
        let report = runner.evaluate().unwrap();
        let pass = runner.pass_report(&scene.edits[0].to_string(), &report);
        assert_eq!(pass.pass, "set n.value = 3");
        assert_eq!(pass.recomputed, vec!["call".to_string()]);
        assert_eq!(runner.value_of("call"), Some(&Value::Integer(6)));

        let fact = runner.registry().functions().get("fact").unwrap();
        assert_eq!(fact.evaluate_standalone().unwrap(), Value::Integer(24));
    }

    #[test]
    fn test_subgraph_ports_are_addressable_by_name() {
        let scene: Scene = serde_json::from_str(
            r#"{
                "subgraphs": [{"name": "twice", "inputs": 1}],
                "nodes": [
                    {"name": "x", "type": "data.constant", "parameters": {"value": 2.5}},
                    {"name": "twice/scale", "type": "math.scale"}
                ],
                "links": [
                    {"from": "twice/input0", "to": "twice/scale"},
                    {"from": "twice/scale", "to": "twice/output"},
                    {"from": "x", "to": "twice"}
                ],
                "destinies": ["twice"]
            }"#,
        )
        .unwrap();
        let mut runner = SceneRunner::build(&scene, EvalConfig::default()).unwrap();
        runner.evaluate().unwrap();
        assert_eq!(runner.value_of("twice"), Some(&Value::from(5.0)));
    }

    #[test]
    fn test_failures_show_up_in_the_pass_report() {
        let scene: Scene = serde_json::from_str(
            r#"{
                "nodes": [
                    {"name": "a", "type": "data.constant", "parameters": {"value": 1}},
                    {"name": "zero", "type": "data.constant", "parameters": {"value": 0}},
                    {"name": "ratio", "type": "math.divide"}
                ],
                "links": [
                    {"from": "a", "to": "ratio", "slot": 0},
                    {"from": "zero", "to": "ratio", "slot": 1}
                ],
                "destinies": ["ratio"],
                "edits": [{"op": "remove", "node": "zero"}]
            }"#,
        )
        .unwrap();
        let mut runner = SceneRunner::build(&scene, EvalConfig::default()).unwrap();
        let report = runner.evaluate().unwrap();
        let pass = runner.pass_report("initial", &report);

        assert!(pass.failure.is_some());
        let ratio = pass.nodes.iter().find(|n| n.name == "ratio").unwrap();
        assert_eq!(ratio.state, Some(NodeState::SourceError));
        assert!(ratio.value.is_none());
        assert!(ratio.message.is_some());
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let scene: Scene = serde_json::from_str(
            r#"{"nodes": [{"name": "a", "type": "data.constant"}], "destinies": ["b"]}"#,
        )
        .unwrap();
        assert!(SceneRunner::build(&scene, EvalConfig::default()).is_err());

        let scene: Scene =
            serde_json::from_str(r#"{"nodes": [{"name": "a", "type": "no.such_type"}]}"#).unwrap();
        assert!(SceneRunner::build(&scene, EvalConfig::default()).is_err());
    }
}
