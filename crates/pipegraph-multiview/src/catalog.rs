//! Node types of the photogrammetry chain.
//!
//! Every stage declares its parameters in fingerprint group `uid0` except
//! purely cosmetic ones (log verbosity, free-form metadata, sensor database
//! location), so changing those never invalidates a cached result.
//! Outputs live under `{cache}/{nodeType}/{uid0}/`.

use std::sync::LazyLock;

use pipegraph_core::{AttributeDesc, CoreError, NodeCatalog, NodeDesc, UidGroup};

pub const CAMERA_INIT: &str = "CameraInit";
pub const FEATURE_EXTRACTION: &str = "FeatureExtraction";
pub const IMAGE_MATCHING: &str = "ImageMatching";
pub const FEATURE_MATCHING: &str = "FeatureMatching";
pub const STRUCTURE_FROM_MOTION: &str = "StructureFromMotion";
pub const PREPARE_DENSE_SCENE: &str = "PrepareDenseScene";
pub const DEPTH_MAP: &str = "DepthMap";
pub const DEPTH_MAP_FILTER: &str = "DepthMapFilter";
pub const MESHING: &str = "Meshing";
pub const MESH_FILTERING: &str = "MeshFiltering";
pub const TEXTURING: &str = "Texturing";

/// Stage type ids in pipeline order.
pub const STAGES: [&str; 11] = [
    CAMERA_INIT,
    FEATURE_EXTRACTION,
    IMAGE_MATCHING,
    FEATURE_MATCHING,
    STRUCTURE_FROM_MOTION,
    PREPARE_DENSE_SCENE,
    DEPTH_MAP,
    DEPTH_MAP_FILTER,
    MESHING,
    MESH_FILTERING,
    TEXTURING,
];

const G0: UidGroup = UidGroup::PRIMARY;

static CATALOG: LazyLock<NodeCatalog> = LazyLock::new(build_catalog);

/// The shared catalog of photogrammetry node types.
pub fn catalog() -> &'static NodeCatalog {
    &CATALOG
}

fn build_catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    for desc in [
        camera_init(),
        feature_extraction(),
        image_matching(),
        feature_matching(),
        structure_from_motion(),
        prepare_dense_scene(),
        depth_map(),
        depth_map_filter(),
        meshing(),
        mesh_filtering(),
        texturing(),
    ] {
        if let Err(err) = desc.and_then(|desc| catalog.register(desc)) {
            tracing::warn!("skipping node type: {}", err);
        }
    }
    catalog
}

// ---------------------------------------------------------------------------
// Shared parameters
// ---------------------------------------------------------------------------

fn file_in(name: &str) -> AttributeDesc {
    AttributeDesc::file(name, "").in_group(G0)
}

fn int_in(name: &str, default: i64) -> AttributeDesc {
    AttributeDesc::int(name, default).in_group(G0)
}

fn float_in(name: &str, default: f64) -> AttributeDesc {
    AttributeDesc::float(name, default).in_group(G0)
}

fn bool_in(name: &str, default: bool) -> AttributeDesc {
    AttributeDesc::bool(name, default).in_group(G0)
}

fn choice_in(name: &str, values: &[&str], default: &str) -> AttributeDesc {
    AttributeDesc::choice(name, values, default).in_group(G0)
}

fn describer_types() -> AttributeDesc {
    AttributeDesc::string("describerTypes", "sift").in_group(G0)
}

fn verbose_level() -> AttributeDesc {
    AttributeDesc::choice(
        "verboseLevel",
        &["fatal", "error", "warning", "info", "debug", "trace"],
        "info",
    )
}

fn folder_output() -> AttributeDesc {
    AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/")
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn camera_init() -> Result<NodeDesc, CoreError> {
    let viewpoint = AttributeDesc::group(
        "viewpoint",
        vec![
            int_in("viewId", -1),
            int_in("poseId", -1),
            file_in("image"),
            int_in("intrinsicId", -1),
            int_in("rigId", -1),
            int_in("subPoseId", -1),
            AttributeDesc::string("metadata", ""),
        ],
    );
    let intrinsic = AttributeDesc::group(
        "intrinsic",
        vec![
            int_in("intrinsicId", -1),
            float_in("pxInitialFocalLength", -1.0),
            float_in("pxFocalLength", -1.0),
            choice_in(
                "type",
                &["", "pinhole", "radial1", "radial3", "brown", "fisheye4"],
                "",
            ),
            int_in("width", -1),
            int_in("height", -1),
            AttributeDesc::string("serialNumber", "").in_group(G0),
            float_in("principalPointX", -1.0),
            float_in("principalPointY", -1.0),
        ],
    );
    NodeDesc::new(
        CAMERA_INIT,
        vec![
            AttributeDesc::list("viewpoints", viewpoint),
            AttributeDesc::list("intrinsics", intrinsic),
            AttributeDesc::file("sensorDatabase", ""),
            float_in("defaultFieldOfView", 45.0),
            verbose_level(),
        ],
        vec![AttributeDesc::output(
            "output",
            "{cache}/{nodeType}/{uid0}/cameraInit.sfm",
        )],
    )
}

fn feature_extraction() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        FEATURE_EXTRACTION,
        vec![
            file_in("input"),
            describer_types(),
            choice_in(
                "describerPreset",
                &["low", "medium", "normal", "high", "ultra"],
                "normal",
            ),
            AttributeDesc::bool("forceCpuExtraction", true),
            verbose_level(),
        ],
        vec![folder_output()],
    )
}

fn image_matching() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        IMAGE_MATCHING,
        vec![
            file_in("input"),
            file_in("featuresFolder"),
            file_in("tree"),
            file_in("weights"),
            int_in("minNbImages", 200),
            int_in("maxDescriptors", 500),
            int_in("nbMatches", 50),
            verbose_level(),
        ],
        vec![AttributeDesc::output(
            "output",
            "{cache}/{nodeType}/{uid0}/imageMatches.txt",
        )],
    )
}

fn feature_matching() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        FEATURE_MATCHING,
        vec![
            file_in("input"),
            file_in("featuresFolder"),
            file_in("imagePairsList"),
            describer_types(),
            choice_in(
                "photometricMatchingMethod",
                &[
                    "BRUTE_FORCE_L2",
                    "ANN_L2",
                    "CASCADE_HASHING_L2",
                    "FAST_CASCADE_HASHING_L2",
                ],
                "ANN_L2",
            ),
            choice_in("geometricEstimator", &["acransac", "loransac"], "acransac"),
            bool_in("guidedMatching", false),
            verbose_level(),
        ],
        vec![folder_output()],
    )
}

fn structure_from_motion() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        STRUCTURE_FROM_MOTION,
        vec![
            file_in("input"),
            file_in("featuresFolder"),
            file_in("matchesFolder"),
            describer_types(),
            AttributeDesc::choice("interFileExtension", &[".abc", ".ply"], ".abc"),
            choice_in(
                "localizerEstimator",
                &["acransac", "ransac", "lsmeds", "loransac", "maxconsensus"],
                "acransac",
            ),
            bool_in("lockScenePreviouslyReconstructed", false),
            bool_in("useLocalBA", true),
            int_in("localBAGraphDistance", 1),
            verbose_level(),
        ],
        vec![
            AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/sfm.abc"),
            AttributeDesc::output(
                "outputViewsAndPoses",
                "{cache}/{nodeType}/{uid0}/cameras.sfm",
            ),
            AttributeDesc::output("extraInfoFolder", "{cache}/{nodeType}/{uid0}/"),
        ],
    )
}

fn prepare_dense_scene() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        PREPARE_DENSE_SCENE,
        vec![file_in("input"), verbose_level()],
        vec![folder_output()],
    )
}

fn depth_map() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        DEPTH_MAP,
        vec![
            file_in("input"),
            file_in("imagesFolder"),
            int_in("downscale", 2),
            float_in("minViewAngle", 2.0),
            float_in("maxViewAngle", 70.0),
            int_in("sgmMaxTCams", 10),
            int_in("refineMaxTCams", 6),
            verbose_level(),
        ],
        vec![folder_output()],
    )
}

fn depth_map_filter() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        DEPTH_MAP_FILTER,
        vec![
            file_in("input"),
            file_in("depthMapFolder"),
            int_in("nNearestCams", 10),
            int_in("minNumOfConsistentCams", 3),
            verbose_level(),
        ],
        vec![folder_output()],
    )
}

fn meshing() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        MESHING,
        vec![
            file_in("input"),
            file_in("depthMapFolder"),
            file_in("depthMapFilterFolder"),
            int_in("maxInputPoints", 50_000_000),
            int_in("maxPoints", 5_000_000),
            verbose_level(),
        ],
        vec![
            AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/mesh.obj"),
            AttributeDesc::output(
                "outputDenseReconstruction",
                "{cache}/{nodeType}/{uid0}/denseReconstruction.bin",
            ),
        ],
    )
}

fn mesh_filtering() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        MESH_FILTERING,
        vec![
            file_in("input"),
            float_in("removeLargeTrianglesFactor", 60.0),
            bool_in("keepLargestMeshOnly", false),
            int_in("iterations", 5),
            float_in("lambda", 1.0),
            verbose_level(),
        ],
        vec![AttributeDesc::output(
            "output",
            "{cache}/{nodeType}/{uid0}/mesh.obj",
        )],
    )
}

fn texturing() -> Result<NodeDesc, CoreError> {
    NodeDesc::new(
        TEXTURING,
        vec![
            file_in("input"),
            file_in("imagesFolder"),
            file_in("inputMesh"),
            int_in("textureSide", 8192),
            int_in("downscale", 2),
            choice_in("outputTextureFileType", &["jpg", "png", "tiff", "exr"], "png"),
            choice_in("unwrapMethod", &["Basic", "LSCM", "ABF"], "Basic"),
            verbose_level(),
        ],
        vec![
            folder_output(),
            AttributeDesc::output(
                "outputMesh",
                "{cache}/{nodeType}/{uid0}/texturedMesh.obj",
            ),
            AttributeDesc::output(
                "outputMaterial",
                "{cache}/{nodeType}/{uid0}/texturedMesh.mtl",
            ),
            AttributeDesc::output(
                "outputTextures",
                "{cache}/{nodeType}/{uid0}/texture_*.png",
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_is_registered_in_order() {
        let ids: Vec<&str> = catalog().type_ids().collect();
        assert_eq!(ids, STAGES.to_vec());
    }

    #[test]
    fn every_output_depends_on_group_zero() {
        for type_id in STAGES {
            let desc = catalog().get(type_id).unwrap();
            for output in desc.outputs() {
                assert!(
                    output.in_uid_group(G0),
                    "{}.{} is not in uid0",
                    type_id,
                    output.name()
                );
                assert!(
                    !desc.contributing_inputs(output.name()).is_empty(),
                    "{}.{} depends on nothing",
                    type_id,
                    output.name()
                );
            }
        }
    }

    #[test]
    fn cosmetic_parameters_stay_out_of_fingerprints() {
        let camera = catalog().get(CAMERA_INIT).unwrap();
        assert!(camera.attribute("verboseLevel").unwrap().uid_groups().is_empty());
        assert!(camera.attribute("sensorDatabase").unwrap().uid_groups().is_empty());
        let viewpoint = camera.attribute("viewpoints").unwrap().element().unwrap();
        assert!(viewpoint.field("metadata").unwrap().uid_groups().is_empty());
        assert_eq!(viewpoint.field("image").unwrap().uid_groups(), &[G0]);
    }
}
