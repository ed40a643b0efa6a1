//! Per-particle loops of a stage. Every closure only writes the slot of its own index, so
//! the sequential and the parallel variants give identical results.

pub use internal::*;

#[cfg(feature = "single-threaded")]
mod internal {
    pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
        arr1.iter_mut().enumerate().for_each(|(idx, v1)| {
            f(idx, v1);
        });
    }

    pub fn par_iter_mut3<
        T1: Send + Sync,
        T2: Send + Sync,
        T3: Send + Sync,
        F: Fn(usize, &mut T1, &mut T2, &mut T3) + Send + Sync,
    >(
        arr1: &mut [T1],
        arr2: &mut [T2],
        arr3: &mut [T3],
        f: F,
    ) {
        arr1.iter_mut()
            .zip(arr2.iter_mut())
            .zip(arr3.iter_mut())
            .enumerate()
            .for_each(|(idx, ((v1, v2), v3))| {
                f(idx, v1, v2, v3);
            });
    }
}

#[cfg(not(feature = "single-threaded"))]
mod internal {
    use rayon::prelude::*;

    pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
        arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
            f(idx, v1);
        });
    }

    pub fn par_iter_mut3<
        T1: Send + Sync,
        T2: Send + Sync,
        T3: Send + Sync,
        F: Fn(usize, &mut T1, &mut T2, &mut T3) + Send + Sync,
    >(
        arr1: &mut [T1],
        arr2: &mut [T2],
        arr3: &mut [T3],
        f: F,
    ) {
        arr1.into_par_iter()
            .zip(arr2.into_par_iter())
            .zip(arr3.into_par_iter())
            .enumerate()
            .for_each(|(idx, ((v1, v2), v3))| {
                f(idx, v1, v2, v3);
            });
    }
}

#[test]
fn par_iter_mut3_visits_every_index_once() {
    let mut a = vec![0usize; 100];
    let mut b = vec![0usize; 100];
    let mut c = vec![0usize; 100];
    par_iter_mut3(&mut a, &mut b, &mut c, |i, a, b, c| {
        *a += i;
        *b += 2 * i;
        *c += 1;
    });
    for i in 0..100 {
        assert_eq!(a[i], i);
        assert_eq!(b[i], 2 * i);
        assert_eq!(c[i], 1);
    }
}
