use crate::mesh_error::MeshRenumberError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), MeshRenumberError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

/// Check that a CSR offset array starts at zero, never decreases and ends
/// at `list_len`.
pub(crate) fn check_offsets(
    entity: &'static str,
    offsets: &[usize],
    n_rows: usize,
    list_len: usize,
) -> Result<(), MeshRenumberError> {
    use itertools::Itertools;

    if offsets.len() != n_rows + 1 {
        return Err(MeshRenumberError::ConnectivityMismatch {
            entity,
            reason: format!("{} offsets for {} rows", offsets.len(), n_rows),
        });
    }
    if offsets[0] != 0 {
        return Err(MeshRenumberError::ConnectivityMismatch {
            entity,
            reason: format!("first offset is {}", offsets[0]),
        });
    }
    if let Some((i, (a, b))) = offsets
        .iter()
        .tuple_windows()
        .enumerate()
        .find(|(_, (a, b))| b < a)
    {
        return Err(MeshRenumberError::ConnectivityMismatch {
            entity,
            reason: format!("offset decreases at row {i} ({a} > {b})"),
        });
    }
    if offsets[n_rows] != list_len {
        return Err(MeshRenumberError::ConnectivityMismatch {
            entity,
            reason: format!("last offset {} != list length {}", offsets[n_rows], list_len),
        });
    }
    Ok(())
}
