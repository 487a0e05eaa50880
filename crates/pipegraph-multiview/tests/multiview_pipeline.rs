//! End-to-end checks on the photogrammetry pipeline template: viewpoint
//! contents, default tracking, projection, and fingerprint equivalence
//! between independently built graphs.

use indexmap::IndexMap;
use proptest::prelude::*;

use pipegraph_core::{Graph, UidGroup, Value};
use pipegraph_multiview::catalog::{self, CAMERA_INIT};
use pipegraph_multiview::{from_images, from_viewpoints, photogrammetry_pipeline, PipelineInputs};

fn record(image: &str, intrinsic: i64) -> IndexMap<String, Value> {
    let mut r = IndexMap::new();
    r.insert("image".to_string(), Value::from(image));
    r.insert("intrinsicId".to_string(), Value::Int(intrinsic));
    r
}

fn viewpoint_field(graph: &Graph, index: usize, field: &str) -> Value {
    graph
        .find_node(CAMERA_INIT)
        .unwrap()
        .attribute("viewpoints")
        .unwrap()
        .attribute()
        .element(index)
        .unwrap()
        .field(field)
        .unwrap()
        .scalar()
        .unwrap()
        .clone()
}

fn viewpoint_count(graph: &Graph) -> usize {
    graph
        .find_node(CAMERA_INIT)
        .unwrap()
        .attribute("viewpoints")
        .unwrap()
        .attribute()
        .len()
}

/// Every output of every node in `a` differs from its counterpart in `b`.
fn assert_all_outputs_differ(a: &Graph, b: &Graph) {
    for node in a.nodes() {
        let other = b.node(node.name()).unwrap();
        for output in node.outputs() {
            let theirs = other.attribute(output.key()).unwrap();
            assert_ne!(
                output.uid(None).unwrap(),
                theirs.uid(None).unwrap(),
                "{}.{} should differ",
                node.name(),
                output.key()
            );
        }
    }
}

/// Walks `a` in traversal order, comparing inputs per group and outputs
/// merged, against the same-named node of `b`.
fn assert_fully_equivalent(a: &Graph, b: &Graph) {
    let traversal = a.traverse().unwrap();
    assert_eq!(traversal.nodes.len(), a.node_count());
    for name in &traversal.nodes {
        let node = a.node(name).unwrap();
        let other = b.node(name).unwrap();
        for attr in node.attributes() {
            let theirs = other.attribute(attr.key()).unwrap();
            if attr.is_output() {
                assert_eq!(attr.uid(None).unwrap(), theirs.uid(None).unwrap());
            } else {
                for group in attr.attribute().desc().uid_groups() {
                    assert_eq!(
                        attr.uid(Some(*group)).unwrap(),
                        theirs.uid(Some(*group)).unwrap()
                    );
                }
            }
        }
    }
    assert!(a.is_equivalent(b).unwrap());
}

#[test]
fn multiview_pipeline() {
    let graph1 = from_images(&["/non/existing/fileA"]).unwrap();
    let graph2 = from_images::<&str>(&[]).unwrap();
    let graph2b = from_images::<&str>(&[]).unwrap();
    let graph3 = from_images(&["/non/existing/file1", "/non/existing/file2"]).unwrap();
    let graph4 = from_viewpoints(&[
        record("/non/existing/file1", 50),
        record("/non/existing/file2", 55),
    ])
    .unwrap();
    let graph4b = from_viewpoints(&[
        record("/non/existing/file1", 50),
        record("/non/existing/file2", 55),
    ])
    .unwrap();

    assert_eq!(viewpoint_field(&graph1, 0, "image"), Value::from("/non/existing/fileA"));
    assert_eq!(viewpoint_field(&graph3, 0, "image"), Value::from("/non/existing/file1"));
    assert_eq!(viewpoint_field(&graph4, 0, "image"), Value::from("/non/existing/file1"));

    assert_eq!(viewpoint_count(&graph1), 1);
    assert_eq!(viewpoint_count(&graph2), 0);
    assert_eq!(viewpoint_count(&graph3), 2);
    assert_eq!(viewpoint_count(&graph4), 2);

    assert_eq!(viewpoint_field(&graph3, 0, "intrinsicId"), Value::Int(-1));
    assert_eq!(viewpoint_field(&graph3, 1, "image"), Value::from("/non/existing/file2"));
    assert_eq!(viewpoint_field(&graph3, 1, "intrinsicId"), Value::Int(-1));

    let viewpoints = graph3
        .find_node(CAMERA_INIT)
        .unwrap()
        .attribute("viewpoints")
        .unwrap();
    let first = viewpoints.attribute().element(0).unwrap();
    assert!(!first.field("image").unwrap().is_default());
    assert!(first.field("intrinsicId").unwrap().is_default());
    assert_eq!(
        viewpoints.to_primitive(false).unwrap(),
        serde_json::json!([
            { "image": "/non/existing/file1" },
            { "image": "/non/existing/file2" },
        ])
    );

    for graph in [&graph4, &graph4b] {
        assert_eq!(viewpoint_field(graph, 0, "image"), Value::from("/non/existing/file1"));
        assert_eq!(viewpoint_field(graph, 0, "intrinsicId"), Value::Int(50));
        assert_eq!(viewpoint_field(graph, 1, "image"), Value::from("/non/existing/file2"));
        assert_eq!(viewpoint_field(graph, 1, "intrinsicId"), Value::Int(55));
    }

    for other in [&graph2, &graph3, &graph4] {
        assert_all_outputs_differ(&graph1, other);
    }

    assert_fully_equivalent(&graph2, &graph2b);
    assert_fully_equivalent(&graph4, &graph4b);
}

#[test]
fn explicit_intrinsics_break_camera_init_equivalence() {
    let from_paths = from_images(&["/a", "/b"]).unwrap();
    let from_records = from_viewpoints(&[record("/a", 50), record("/b", 55)]).unwrap();

    assert_eq!(viewpoint_field(&from_paths, 0, "image"), viewpoint_field(&from_records, 0, "image"));
    assert_eq!(viewpoint_field(&from_paths, 1, "image"), viewpoint_field(&from_records, 1, "image"));

    let left = from_paths.find_node(CAMERA_INIT).unwrap();
    let right = from_records.find_node(CAMERA_INIT).unwrap();
    assert_ne!(
        left.attribute("viewpoints").unwrap().uid(Some(UidGroup::PRIMARY)).unwrap(),
        right.attribute("viewpoints").unwrap().uid(Some(UidGroup::PRIMARY)).unwrap()
    );
    assert!(!from_paths.is_equivalent(&from_records).unwrap());
}

#[test]
fn empty_input_projects_to_an_empty_list() {
    let graph = photogrammetry_pipeline(&PipelineInputs::default()).unwrap();
    let viewpoints = graph
        .find_node(CAMERA_INIT)
        .unwrap()
        .attribute("viewpoints")
        .unwrap();
    assert!(viewpoints.attribute().is_empty());
    assert_eq!(viewpoints.to_primitive(false).unwrap(), serde_json::json!([]));
    assert_eq!(viewpoints.to_primitive(true).unwrap(), serde_json::json!([]));
}

#[test]
fn camera_init_precedes_every_consumer() {
    let graph = from_images(&["/a"]).unwrap();
    let order = graph.traverse().unwrap().nodes;
    let position = |name: &str| order.iter().position(|n| n == name).unwrap();

    let camera = graph.find_node(CAMERA_INIT).unwrap();
    for consumer in graph.downstream(camera.name()).unwrap() {
        assert!(position(camera.name()) < position(consumer.name()));
    }
    assert_eq!(order.first().map(String::as_str), Some("CameraInit_1"));
    assert_eq!(order.last().map(String::as_str), Some("Texturing_1"));

    for edge in graph.traverse().unwrap().edges {
        assert!(position(&edge.source) < position(&edge.dest), "{}", edge);
    }
}

#[test]
fn camera_init_projection_snapshot() {
    let graph = from_viewpoints(&[record("/a.jpg", 1)]).unwrap();
    let camera = graph.find_node(CAMERA_INIT).unwrap().to_primitive(false).unwrap();
    let inputs = &camera["inputs"];

    insta::assert_json_snapshot!(inputs, @r###"
    {
      "viewpoints": [
        {
          "image": "/a.jpg",
          "intrinsicId": 1
        }
      ]
    }
    "###);
}

#[test]
fn every_stage_is_reachable_from_camera_init() {
    let graph = from_images(&["/a"]).unwrap();
    let downstream = graph.downstream("CameraInit_1").unwrap();
    assert_eq!(downstream.len(), catalog::STAGES.len() - 1);
}

fn images_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("/[a-z]{1,8}/[a-z]{1,8}\\.(jpg|png)", 0..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn equal_inputs_build_equivalent_graphs(images in images_strategy()) {
        let a = from_images(&images).unwrap();
        let b = from_images(&images).unwrap();
        prop_assert!(a.is_equivalent(&b).unwrap());
    }

    #[test]
    fn different_inputs_change_every_output(
        a in images_strategy(),
        b in images_strategy(),
    ) {
        prop_assume!(a != b);
        let ga = from_images(&a).unwrap();
        let gb = from_images(&b).unwrap();
        for node in ga.nodes() {
            let other = gb.node(node.name()).unwrap();
            for output in node.outputs() {
                prop_assert_ne!(
                    output.uid(None).unwrap(),
                    other.attribute(output.key()).unwrap().uid(None).unwrap()
                );
            }
        }
    }

    #[test]
    fn changed_intrinsic_reaches_texturing(intrinsic in 0i64..1000) {
        let base = from_images(&["/a"]).unwrap();
        let changed = from_viewpoints(&[record("/a", intrinsic)]).unwrap();
        let texturing = |g: &Graph| {
            g.node("Texturing_1").unwrap().attribute("outputMesh").unwrap().uid(None).unwrap()
        };
        prop_assert_ne!(texturing(&base), texturing(&changed));
    }
}
