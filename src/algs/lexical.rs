//! Deterministic orderings used by the renumbering algorithms.
//!
//! * [`sort_local`] sorts short in-place slices (CSR rows): shell sort below
//!   [`SHELL_SORT_MAX`] entries, heap sort above.
//! * [`order_lexical`] returns the permutation that sorts a key array; ties
//!   are broken by position so equal keys keep their input order.

use std::cmp::Ordering;

use rayon::prelude::*;

/// Slices shorter than this are shell sorted.
pub const SHELL_SORT_MAX: usize = 20;

/// Sort a slice in place (shell sort for short slices, heap sort otherwise).
pub fn sort_local<T: Ord>(v: &mut [T]) {
    sort_local_by(v, |a, b| a.cmp(b));
}

/// [`sort_local`] with a custom comparator.
pub fn sort_local_by<T, F>(v: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut less = |a: &T, b: &T| cmp(a, b) == Ordering::Less;
    if v.len() < SHELL_SORT_MAX {
        shell_sort(v, &mut less);
    } else {
        heap_sort(v, &mut less);
    }
}

fn shell_sort<T, F>(v: &mut [T], less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let n = v.len();
    let mut h = 1;
    while h <= n / 9 {
        h = 3 * h + 1;
    }
    while h > 0 {
        for i in h..n {
            let mut j = i;
            while j >= h && less(&v[j], &v[j - h]) {
                v.swap(j, j - h);
                j -= h;
            }
        }
        h /= 3;
    }
}

fn heap_sort<T, F>(v: &mut [T], less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let n = v.len();
    for root in (0..n / 2).rev() {
        sift_down(v, root, n, less);
    }
    for end in (1..n).rev() {
        v.swap(0, end);
        sift_down(v, 0, end, less);
    }
}

fn sift_down<T, F>(v: &mut [T], mut root: usize, end: usize, less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            break;
        }
        if child + 1 < end && less(&v[child], &v[child + 1]) {
            child += 1;
        }
        if !less(&v[root], &v[child]) {
            break;
        }
        v.swap(root, child);
        root = child;
    }
}

/// Permutation `order` such that `keys[order[0]] <= keys[order[1]] <= ...`,
/// equal keys ordered by index.
pub fn order_lexical<K>(keys: &[K]) -> Vec<usize>
where
    K: Ord + Sync,
{
    let mut order: Vec<usize> = (0..keys.len()).collect();
    reorder_lexical(&mut order, keys);
    order
}

/// Sort a subset of indices by `keys[i]`, ties broken by index.
pub fn reorder_lexical<K>(order: &mut [usize], keys: &[K])
where
    K: Ord + Sync,
{
    let cmp = |a: &usize, b: &usize| keys[*a].cmp(&keys[*b]).then(a.cmp(b));
    if order.len() < SHELL_SORT_MAX {
        sort_local_by(order, cmp);
    } else {
        order.par_sort_unstable_by(cmp);
    }
}
