//! Renumbering configuration.
//!
//! [`RenumberConfig`] gathers every tunable of the renumbering pipeline in a
//! single value passed explicitly to [`renumber_mesh`](crate::algs::pipeline::renumber_mesh).
//! Defaults reproduce the production settings; [`RenumberConfig::from_env`]
//! layers the `MESH_RENUMBER*` environment variables on top.

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshRenumberError;

/// Algorithm used to group interior faces for threading.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteriorFaceAlgorithm {
    /// Keep the native face order (single group, single thread).
    None,
    /// Independent-set groups split uniformly across threads.
    Block,
    /// Repeated cell-block assignment passes.
    #[default]
    Multipass,
}

impl std::str::FromStr for InteriorFaceAlgorithm {
    type Err = MeshRenumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "block" => Ok(Self::Block),
            "multipass" => Ok(Self::Multipass),
            other => Err(MeshRenumberError::InvalidConfig(format!(
                "unknown interior face algorithm `{other}`"
            ))),
        }
    }
}

/// Optional cell pre-ordering applied before face renumbering.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellOrdering {
    /// Leave local cells in their input order.
    #[default]
    Native,
    /// Reverse Cuthill–McKee over the local cell adjacency graph.
    ReverseCuthillMcKee,
}

/// Tunables of the renumbering pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenumberConfig {
    /// Threads targeted by face groups; `0` means the rayon pool size.
    pub n_threads: usize,
    /// Minimum interior faces per thread subset.
    pub min_i_subset_size: usize,
    /// Minimum boundary faces per thread subset.
    pub min_b_subset_size: usize,
    /// Interior face grouping algorithm.
    pub i_face_algorithm: InteriorFaceAlgorithm,
    /// Initial maximum group size of the block algorithm.
    pub block_max_group_size: usize,
    /// Decrement applied to the block group size while groups are too few.
    pub block_size_step: usize,
    /// Groups with at most this many faces per thread run on thread 0 only.
    pub block_serial_threshold: usize,
    /// Fraction of a thread's surplus/deficit moved per redistribution.
    pub redistribution_relaxation: f64,
    /// Vector register length; `1` disables vectorizing renumbering.
    pub vector_size: usize,
    /// Maximum reordering passes when vectorizing interior faces.
    pub vector_max_passes: usize,
    /// Passes between forced shuffles when vectorizing interior faces.
    pub vector_shuffle_period: usize,
    /// Local cell pre-ordering.
    pub cell_ordering: CellOrdering,
    /// Master switch; when off only serial numberings are installed.
    pub enabled: bool,
}

impl Default for RenumberConfig {
    fn default() -> Self {
        Self {
            n_threads: 0,
            min_i_subset_size: 64,
            min_b_subset_size: 64,
            i_face_algorithm: InteriorFaceAlgorithm::Multipass,
            block_max_group_size: 1014,
            block_size_step: 64,
            block_serial_threshold: 4,
            redistribution_relaxation: 0.5,
            vector_size: 1,
            vector_max_passes: 100,
            vector_shuffle_period: 10,
            cell_ordering: CellOrdering::Native,
            enabled: true,
        }
    }
}

impl RenumberConfig {
    /// Defaults overridden by environment variables:
    ///
    /// * `MESH_RENUMBER=off` disables renumbering,
    /// * `MESH_RENUMBER_THREADS=<n>`,
    /// * `MESH_RENUMBER_I_FACES=none|block|multipass`,
    /// * `MESH_RENUMBER_MIN_SUBSET=<i>` or `<i>,<b>`.
    pub fn from_env() -> Result<Self, MeshRenumberError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MeshRenumberError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("MESH_RENUMBER") {
            cfg.enabled = !v.trim().eq_ignore_ascii_case("off");
        }
        if let Some(v) = lookup("MESH_RENUMBER_THREADS") {
            cfg.n_threads = parse_usize("MESH_RENUMBER_THREADS", &v)?;
        }
        if let Some(v) = lookup("MESH_RENUMBER_I_FACES") {
            cfg.i_face_algorithm = v.parse()?;
        }
        if let Some(v) = lookup("MESH_RENUMBER_MIN_SUBSET") {
            let mut parts = v.split(',');
            let i = parse_usize("MESH_RENUMBER_MIN_SUBSET", parts.next().unwrap_or(""))?;
            let b = match parts.next() {
                Some(b) => parse_usize("MESH_RENUMBER_MIN_SUBSET", b)?,
                None => i,
            };
            cfg.set_min_subset_size(i, b);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), MeshRenumberError> {
        if self.min_i_subset_size == 0 || self.min_b_subset_size == 0 {
            return Err(MeshRenumberError::InvalidConfig(
                "minimum subset sizes must be positive".into(),
            ));
        }
        if self.vector_size == 0 {
            return Err(MeshRenumberError::InvalidConfig(
                "vector size must be at least 1".into(),
            ));
        }
        if self.block_max_group_size == 0 || self.block_size_step == 0 {
            return Err(MeshRenumberError::InvalidConfig(
                "block group size and step must be positive".into(),
            ));
        }
        if !(self.redistribution_relaxation > 0.0 && self.redistribution_relaxation <= 1.0) {
            return Err(MeshRenumberError::InvalidConfig(format!(
                "redistribution relaxation {} outside (0, 1]",
                self.redistribution_relaxation
            )));
        }
        Ok(())
    }

    /// Set the thread count (`0` restores the rayon pool size).
    pub fn set_n_threads(&mut self, n_threads: usize) -> &mut Self {
        self.n_threads = n_threads;
        self
    }

    /// Configured thread count, `0` meaning "rayon pool size".
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    /// Thread count actually used for face groups.
    pub fn effective_n_threads(&self) -> usize {
        if self.n_threads == 0 {
            rayon::current_num_threads()
        } else {
            self.n_threads
        }
    }

    /// Set minimum interior and boundary subset sizes.
    pub fn set_min_subset_size(&mut self, i_faces: usize, b_faces: usize) -> &mut Self {
        self.min_i_subset_size = i_faces;
        self.min_b_subset_size = b_faces;
        self
    }

    /// `(interior, boundary)` minimum subset sizes.
    pub fn min_subset_size(&self) -> (usize, usize) {
        (self.min_i_subset_size, self.min_b_subset_size)
    }

    pub fn set_i_face_algorithm(&mut self, algorithm: InteriorFaceAlgorithm) -> &mut Self {
        self.i_face_algorithm = algorithm;
        self
    }

    pub fn i_face_algorithm(&self) -> InteriorFaceAlgorithm {
        self.i_face_algorithm
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, MeshRenumberError> {
    value
        .trim()
        .parse()
        .map_err(|_| MeshRenumberError::InvalidConfig(format!("{key}: `{value}` is not a count")))
}
