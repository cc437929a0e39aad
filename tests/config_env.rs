use mesh_renumber::prelude::*;
use serial_test::serial;

const VARS: [&str; 4] = [
    "MESH_RENUMBER",
    "MESH_RENUMBER_THREADS",
    "MESH_RENUMBER_I_FACES",
    "MESH_RENUMBER_MIN_SUBSET",
];

fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    // SAFETY: tests touching the environment are serialized.
    unsafe {
        for key in VARS {
            std::env::remove_var(key);
        }
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
    }
    let out = f();
    unsafe {
        for key in VARS {
            std::env::remove_var(key);
        }
    }
    out
}

#[test]
#[serial]
fn defaults_without_environment() {
    let cfg = with_env(&[], RenumberConfig::from_env).unwrap();
    assert_eq!(cfg, RenumberConfig::default());
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    let cfg = with_env(
        &[
            ("MESH_RENUMBER_THREADS", "3"),
            ("MESH_RENUMBER_I_FACES", "none"),
            ("MESH_RENUMBER_MIN_SUBSET", "10, 5"),
        ],
        RenumberConfig::from_env,
    )
    .unwrap();
    assert_eq!(cfg.n_threads(), 3);
    assert_eq!(cfg.i_face_algorithm(), InteriorFaceAlgorithm::None);
    assert_eq!(cfg.min_subset_size(), (10, 5));
}

#[test]
#[serial]
fn environment_algorithm_none_keeps_native_interior_order() {
    let cfg = with_env(
        &[("MESH_RENUMBER_THREADS", "4"), ("MESH_RENUMBER_I_FACES", "none")],
        RenumberConfig::from_env,
    )
    .unwrap();
    let faces = (0..199).map(|i| [i, i + 1]).collect::<Vec<_>>();
    let mut mesh = FaceMesh::new(200, 0, faces.clone(), (0..200).collect()).unwrap();
    let report = renumber_mesh(&mut mesh, &cfg, &NoComm, &mut NoListener).unwrap();
    assert_eq!(mesh.i_face_cells, faces);
    assert_eq!(report.interior.n_threads, 1);
    assert_eq!(report.boundary.n_threads, 4);
}

#[test]
#[serial]
fn invalid_environment_is_reported() {
    let err = with_env(&[("MESH_RENUMBER_MIN_SUBSET", "8,x")], RenumberConfig::from_env)
        .unwrap_err();
    assert!(matches!(err, MeshRenumberError::InvalidConfig(_)));
}
