//! Information-theoretic measures over binary activation sequences

/// Map any non-zero cell to 1
fn bit(value: u8) -> usize {
    usize::from(value != 0)
}

/// Empirical mutual information of two binary sequences, in bits.
///
/// Only joint outcomes that actually occur contribute. Sequences of unequal
/// length are compared over their common prefix; empty input yields 0.
pub fn mutual_information<'a, X, Y>(x: X, y: Y) -> f64
where
    X: IntoIterator<Item = &'a u8>,
    Y: IntoIterator<Item = &'a u8>,
{
    let mut joint = [[0usize; 2]; 2];
    let mut n = 0usize;
    for (&a, &b) in x.into_iter().zip(y) {
        joint[bit(a)][bit(b)] += 1;
        n += 1;
    }

    if n == 0 {
        return 0.0;
    }

    let n = n as f64;
    let p_x = [
        (joint[0][0] + joint[0][1]) as f64 / n,
        (joint[1][0] + joint[1][1]) as f64 / n,
    ];
    let p_y = [
        (joint[0][0] + joint[1][0]) as f64 / n,
        (joint[0][1] + joint[1][1]) as f64 / n,
    ];

    let mut mi = 0.0;
    for (vx, row) in joint.iter().enumerate() {
        for (vy, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let p_xy = count as f64 / n;
            mi += p_xy * (p_xy / (p_x[vx] * p_y[vy])).log2();
        }
    }

    // rounding can leave a tiny negative value for independent sequences
    mi.max(0.0)
}

/// Empirical Shannon entropy of a binary sequence, in bits
pub fn entropy<'a, X>(x: X) -> f64
where
    X: IntoIterator<Item = &'a u8>,
{
    let mut counts = [0usize; 2];
    for &value in x {
        counts[bit(value)] += 1;
    }

    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }

    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}
