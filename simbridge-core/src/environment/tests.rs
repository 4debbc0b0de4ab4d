use super::*;
use crate::{
    base::{InstanceIds, ParamValue, Parameters},
    scene::{Engine, Node, SceneObject, StepEngine},
    testing::{Tracker, TrackerConfig},
    VisualFactory,
};
use ndarray::arr1;
use test_log::test;

fn builder() -> Rooted {
    EnvironmentBuilder::new(InstanceIds::new(1, 1), Ownership::Manager).root(Node::new("root"))
}

fn tracker() -> SimEnvironment<Tracker> {
    builder()
        .build::<Tracker>(&TrackerConfig::default())
        .unwrap()
        .create()
        .unwrap()
        .init()
        .unwrap()
}

/// Engine whose initialization leaves the graph untouched.
#[derive(Default)]
struct SkipInit(StepEngine);

impl Engine for SkipInit {
    fn init(&mut self, _root: &mut Node) -> anyhow::Result<()> {
        Ok(())
    }

    fn animate(&mut self, root: &mut Node, dt: f64) -> anyhow::Result<()> {
        self.0.animate(root, dt)
    }
}

#[test]
fn lifecycle_flags_follow_calls() {
    let env = builder().build::<Tracker>(&TrackerConfig::default()).unwrap();
    assert!(!env.env().created);

    let env = env.create().unwrap();
    assert!(env.env().created);
    assert!(!env.env().init_done);
    assert!(env.root().object("input/MO").is_some());

    let env = env.init().unwrap();
    assert!(env.env().init_done);
    assert!(!env.env().animate_begin);
    assert!(env.root().is_initialized());
    assert_eq!(env.env().log, vec!["create", "SimulationInitDone"]);
}

#[test]
fn root_holds_environment_once() {
    let env = tracker();
    assert_eq!(env.root().count_controller(ControllerRole::Environment), 1);
    assert_eq!(env.ownership(), Ownership::Manager);

    let mut root = Node::new("root");
    root.add_object(SceneObject::controller("other", ControllerRole::Environment))
        .unwrap();
    let err = EnvironmentBuilder::new(InstanceIds::default(), Ownership::Manager)
        .root(root)
        .build::<Tracker>(&TrackerConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, BridgeError::Configuration(_)));
}

#[test]
fn parameters_round_trip() {
    let mut params = Parameters::new();
    params.insert("param1".to_string(), ParamValue::Int(10));
    params.insert("param2".to_string(), ParamValue::Int(10));
    params.insert("param4".to_string(), ParamValue::Bool(true));
    params.insert("name".to_string(), ParamValue::from("beam"));

    let env = builder()
        .build::<Tracker>(&TrackerConfig::default())
        .unwrap()
        .recv_parameters(&params)
        .unwrap();
    assert_eq!(env.env().params, params);

    let env = env.create().unwrap().init().unwrap();
    let sent = env.send_parameters();
    assert_eq!(sent.get("param1"), Some(&ParamValue::Int(10)));
    assert_eq!(sent.get("param2"), Some(&ParamValue::Int(20)));
    assert_eq!(sent.get("param4"), Some(&ParamValue::Bool(true)));
    assert_eq!(sent.get("name"), Some(&ParamValue::from("beam")));
}

#[test]
fn build_and_create_failures_are_classified() {
    let config = TrackerConfig {
        fail_build: true,
        ..TrackerConfig::default()
    };
    let err = builder().build::<Tracker>(&config).err().unwrap();
    assert!(matches!(err, BridgeError::Configuration(_)));

    let config = TrackerConfig {
        fail_create: true,
        ..TrackerConfig::default()
    };
    let err = builder()
        .build::<Tracker>(&config)
        .unwrap()
        .create()
        .err()
        .unwrap();
    assert!(err.is_runtime());
}

#[test(tokio::test)]
async fn step_runs_once_after_animation() {
    let mut env = tracker();
    env.step().await.unwrap();

    assert!(env.env().animate_begin);
    assert_eq!(env.env().count("on_step"), 1);
    assert_eq!(
        env.env().log,
        vec![
            "create",
            "SimulationInitDone",
            "AnimateBegin",
            "AnimateEnd",
            "on_step"
        ]
    );
    assert_eq!(env.engine().steps(), 1);
    assert_eq!(env.buffer().input, arr1(&[1f32]).into_dyn());
    assert!(env.check_sample());
}

#[test(tokio::test)]
async fn simulations_per_step_animations_per_step() {
    let mut env = EnvironmentBuilder::new(InstanceIds::default(), Ownership::Manager)
        .simulations_per_step(3)
        .root(Node::new("root").with_dt(0.5))
        .build::<Tracker>(&TrackerConfig::default())
        .unwrap()
        .create()
        .unwrap()
        .init()
        .unwrap();
    env.step().await.unwrap();

    assert_eq!(env.engine().steps(), 3);
    assert!((env.root().time() - 1.5).abs() < 1e-12);
    let log = &env.env().log;
    assert_eq!(log.last().map(String::as_str), Some("on_step"));
    assert_eq!(env.env().count("AnimateEnd"), 3);
}

#[test(tokio::test)]
async fn uninitialized_graph_does_not_animate() {
    let mut env = builder()
        .build_with_engine::<Tracker, _>(&TrackerConfig::default(), SkipInit::default())
        .unwrap()
        .create()
        .unwrap()
        .init()
        .unwrap();
    let err = env.step().await.unwrap_err();
    assert!(err.is_runtime());
    assert_eq!(env.env().count("on_step"), 0);
}

#[test(tokio::test)]
async fn hook_failure_is_a_runtime_error() {
    let config = TrackerConfig {
        fail_on_step: true,
        ..TrackerConfig::default()
    };
    let mut env = builder()
        .build::<Tracker>(&config)
        .unwrap()
        .create()
        .unwrap()
        .init()
        .unwrap();
    assert!(env.step().await.unwrap_err().is_runtime());
}

#[test(tokio::test)]
async fn closed_environment_does_not_step() {
    let mut env = tracker();
    env.close().unwrap();
    assert!(env.is_closed());
    assert_eq!(env.env().count("close"), 1);

    assert!(matches!(env.step().await, Err(BridgeError::Lifecycle(_))));
    assert!(matches!(env.close(), Err(BridgeError::Lifecycle(_))));
}

#[test]
fn pipelines_are_placed_around_the_environment() {
    let mut env = tracker();
    env.attach("prediction", Position::Before).unwrap();
    let roles: Vec<_> = env.root().controllers().into_iter().map(|(_, r)| r).collect();
    assert_eq!(
        roles,
        vec![ControllerRole::Pipeline, ControllerRole::Environment]
    );
    assert!(env.attach("runner", Position::After).is_err());

    assert!(env.detach("prediction"));
    assert!(!env.detach("prediction"));
    assert!(!env.detach(ENVIRONMENT_CONTROLLER));

    env.attach("runner", Position::After).unwrap();
    let names: Vec<_> = env.root().controllers().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec![ENVIRONMENT_CONTROLLER, "runner"]);
}

#[test]
fn declared_fields_guard_additional_data() {
    let mut env = tracker();
    env.set_additional_data("step", arr1(&[1f32]).into_dyn())
        .unwrap();
    env.init_database().unwrap();
    env.set_additional_data("step", arr1(&[2f32]).into_dyn())
        .unwrap();
    assert!(env
        .set_additional_data("input", arr1(&[0f32]).into_dyn())
        .is_err());
    assert!(env
        .set_additional_data("unknown", arr1(&[0f32]).into_dyn())
        .is_err());

    env.set_training_data(arr1(&[1f32]).into_dyn(), arr1(&[2f32]).into_dyn());
    let sample = env.sample();
    assert_eq!(sample.ground_truth, arr1(&[2f32]).into_dyn());
    assert_eq!(sample.additional_fields["step"], arr1(&[2f32]).into_dyn());
}

#[test]
fn visualization_and_stored_parameters() {
    let mut env = tracker();
    assert!(env.update_visualization().is_err());
    env.init_visualization(VisualFactory::new(1, false)).unwrap();
    let updates = env.update_visualization().unwrap();
    assert_eq!(updates[0].positions.len(), 3);

    let mut params = Parameters::new();
    params.insert("stiffness".to_string(), ParamValue::Float(100.));
    env.save_parameters(params.clone());
    assert_eq!(env.load_parameters(), &params);
}

#[test]
fn predictions_reach_the_scene() {
    let mut env = tracker();
    let mut prediction = crate::Prediction::new();
    prediction.insert("prediction".to_string(), arr1(&[1f32, 2., 3.]).into_dyn());
    env.apply_prediction(&prediction).unwrap();
    let position = env.root().object("input/MO").unwrap().get("position").unwrap();
    assert_eq!(position, &crate::Data::from(vec![1.0, 2.0, 3.0]));

    assert!(env.apply_prediction(&crate::Prediction::new()).is_err());
}
