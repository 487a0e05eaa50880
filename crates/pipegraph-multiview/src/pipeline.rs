//! The photogrammetry pipeline template.
//!
//! Builds the fixed chain from [`catalog`](crate::catalog::catalog) and
//! fills the `CameraInit` viewpoints from a list of images, a list of
//! viewpoint records, or both. Images are appended first, each setting only
//! `image`; records follow, each setting exactly the fields it names.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use pipegraph_core::{Graph, GraphConfig, Value};

use crate::catalog::{self, catalog};
use crate::error::PipelineError;

/// Builder inputs. Both lists default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineInputs {
    /// Image paths, one viewpoint each.
    pub images: Vec<String>,
    /// Fully-specified viewpoint records (field name -> value).
    pub viewpoints: Vec<IndexMap<String, Value>>,
}

impl PipelineInputs {
    pub fn from_images<S: AsRef<str>>(images: &[S]) -> Self {
        PipelineInputs {
            images: images.iter().map(|s| s.as_ref().to_string()).collect(),
            viewpoints: Vec::new(),
        }
    }

    pub fn from_viewpoints(viewpoints: Vec<IndexMap<String, Value>>) -> Self {
        PipelineInputs {
            images: Vec::new(),
            viewpoints,
        }
    }

    /// Number of viewpoints the pipeline will carry.
    pub fn len(&self) -> usize {
        self.images.len() + self.viewpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Edges of the chain: (source type, source key, dest type, dest key).
const WIRING: &[(&str, &str, &str, &str)] = &[
    (catalog::CAMERA_INIT, "output", catalog::FEATURE_EXTRACTION, "input"),
    (catalog::CAMERA_INIT, "output", catalog::IMAGE_MATCHING, "input"),
    (catalog::FEATURE_EXTRACTION, "output", catalog::IMAGE_MATCHING, "featuresFolder"),
    (catalog::CAMERA_INIT, "output", catalog::FEATURE_MATCHING, "input"),
    (catalog::FEATURE_EXTRACTION, "output", catalog::FEATURE_MATCHING, "featuresFolder"),
    (catalog::IMAGE_MATCHING, "output", catalog::FEATURE_MATCHING, "imagePairsList"),
    (catalog::CAMERA_INIT, "output", catalog::STRUCTURE_FROM_MOTION, "input"),
    (catalog::FEATURE_EXTRACTION, "output", catalog::STRUCTURE_FROM_MOTION, "featuresFolder"),
    (catalog::FEATURE_MATCHING, "output", catalog::STRUCTURE_FROM_MOTION, "matchesFolder"),
    (catalog::STRUCTURE_FROM_MOTION, "output", catalog::PREPARE_DENSE_SCENE, "input"),
    (catalog::STRUCTURE_FROM_MOTION, "output", catalog::DEPTH_MAP, "input"),
    (catalog::PREPARE_DENSE_SCENE, "output", catalog::DEPTH_MAP, "imagesFolder"),
    (catalog::STRUCTURE_FROM_MOTION, "output", catalog::DEPTH_MAP_FILTER, "input"),
    (catalog::DEPTH_MAP, "output", catalog::DEPTH_MAP_FILTER, "depthMapFolder"),
    (catalog::STRUCTURE_FROM_MOTION, "output", catalog::MESHING, "input"),
    (catalog::DEPTH_MAP, "output", catalog::MESHING, "depthMapFolder"),
    (catalog::DEPTH_MAP_FILTER, "output", catalog::MESHING, "depthMapFilterFolder"),
    (catalog::MESHING, "output", catalog::MESH_FILTERING, "input"),
    (catalog::MESHING, "outputDenseReconstruction", catalog::TEXTURING, "input"),
    (catalog::MESH_FILTERING, "output", catalog::TEXTURING, "inputMesh"),
    (catalog::PREPARE_DENSE_SCENE, "output", catalog::TEXTURING, "imagesFolder"),
];

/// Builds the photogrammetry pipeline with the default configuration.
pub fn photogrammetry_pipeline(inputs: &PipelineInputs) -> Result<Graph, PipelineError> {
    photogrammetry_pipeline_with_config(inputs, GraphConfig::default())
}

/// Builds the photogrammetry pipeline.
///
/// Every record must carry an `image` field; other fields are optional and
/// unknown fields are rejected. `inputs` is never modified.
pub fn photogrammetry_pipeline_with_config(
    inputs: &PipelineInputs,
    config: GraphConfig,
) -> Result<Graph, PipelineError> {
    if let Some(index) = inputs
        .viewpoints
        .iter()
        .position(|record| !record.contains_key("image"))
    {
        return Err(PipelineError::MissingImage { index });
    }

    let mut graph = Graph::with_config(config);
    for type_id in catalog::STAGES {
        graph.add_node(catalog().get(type_id)?);
    }

    for (src, src_key, dst, dst_key) in WIRING {
        let source = graph.find_node(src)?.name().to_string();
        let dest = graph.find_node(dst)?.name().to_string();
        graph.connect(&source, src_key, &dest, dst_key)?;
    }

    let camera_init = graph.find_node(catalog::CAMERA_INIT)?.name().to_string();
    let viewpoints = graph.attribute_mut(&camera_init, "viewpoints")?;
    for image in &inputs.images {
        let mut record = IndexMap::new();
        record.insert("image".to_string(), Value::from(image.as_str()));
        viewpoints.append(record)?;
    }
    for record in &inputs.viewpoints {
        viewpoints.append(record.clone())?;
    }

    tracing::debug!(
        "built photogrammetry pipeline: {} nodes, {} viewpoints",
        graph.node_count(),
        inputs.len()
    );
    Ok(graph)
}

/// Pipeline with one viewpoint per image path.
pub fn from_images<S: AsRef<str>>(images: &[S]) -> Result<Graph, PipelineError> {
    photogrammetry_pipeline(&PipelineInputs::from_images(images))
}

/// Pipeline with one viewpoint per record.
pub fn from_viewpoints(records: &[IndexMap<String, Value>]) -> Result<Graph, PipelineError> {
    photogrammetry_pipeline(&PipelineInputs::from_viewpoints(records.to_vec()))
}

#[cfg(test)]
mod tests {
    use pipegraph_core::CoreError;

    use super::*;

    fn record(image: &str, intrinsic: i64) -> IndexMap<String, Value> {
        let mut r = IndexMap::new();
        r.insert("image".to_string(), Value::from(image));
        r.insert("intrinsicId".to_string(), Value::Int(intrinsic));
        r
    }

    #[test]
    fn chain_has_every_stage_and_edge() {
        let graph = from_images::<&str>(&[]).unwrap();
        assert_eq!(graph.node_count(), catalog::STAGES.len());
        assert_eq!(graph.edge_count(), WIRING.len());
        for type_id in catalog::STAGES {
            assert_eq!(
                graph.find_node(type_id).unwrap().name(),
                format!("{}_1", type_id)
            );
        }
    }

    #[test]
    fn images_come_before_records() {
        let inputs = PipelineInputs {
            images: vec!["/img".into()],
            viewpoints: vec![record("/rec", 7)],
        };
        let graph = photogrammetry_pipeline(&inputs).unwrap();
        let viewpoints = graph
            .find_node(catalog::CAMERA_INIT)
            .unwrap()
            .attribute("viewpoints")
            .unwrap()
            .attribute();
        assert_eq!(viewpoints.len(), 2);
        let first = viewpoints.element(0).unwrap();
        assert_eq!(first.field("image").unwrap().scalar(), Some(&Value::from("/img")));
        let second = viewpoints.element(1).unwrap();
        assert_eq!(second.field("intrinsicId").unwrap().scalar(), Some(&Value::Int(7)));
    }

    #[test]
    fn records_without_image_are_rejected() {
        let mut bad = IndexMap::new();
        bad.insert("intrinsicId".to_string(), Value::Int(1));
        let err = from_viewpoints(&[record("/a", 1), bad]).unwrap_err();
        assert_eq!(err, PipelineError::MissingImage { index: 1 });
    }

    #[test]
    fn unknown_fields_and_wrong_kinds_surface_core_errors() {
        let mut typo = record("/a", 1);
        typo.insert("intrinsicID".to_string(), Value::Int(2));
        assert!(matches!(
            from_viewpoints(&[typo]),
            Err(PipelineError::Core(CoreError::UnknownAttribute { .. }))
        ));

        let mut wrong = IndexMap::new();
        wrong.insert("image".to_string(), Value::Int(3));
        assert!(matches!(
            from_viewpoints(&[wrong]),
            Err(PipelineError::Core(CoreError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn inputs_deserialize_with_defaults() {
        let inputs: PipelineInputs =
            serde_json::from_str(r#"{ "viewpoints": [{ "image": "/a", "intrinsicId": 50 }] }"#)
                .unwrap();
        assert!(inputs.images.is_empty());
        assert_eq!(inputs.viewpoints, vec![record("/a", 50)]);
    }
}
