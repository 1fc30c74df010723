//! 缺失值线性插值
//!
//! 只用已知样本作锚点；首个锚点之前和最后一个锚点之后取最近的已知值。
//! 已知样本少于 2 个时原样返回。

#[inline]
fn known(v: &Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan())
}

/// 以样本位置为横坐标
pub fn interpolate(series: &[Option<f64>]) -> Vec<Option<f64>> {
    let xs: Vec<f64> = (0..series.len()).map(|i| i as f64).collect();
    interpolate_over(&xs, series)
}

/// 以 `xs`（递增的帧号）为横坐标
///
/// # Panics
///
/// `xs` 与 `series` 长度不同时 panic。
pub fn interpolate_over(xs: &[f64], series: &[Option<f64>]) -> Vec<Option<f64>> {
    assert_eq!(
        xs.len(),
        series.len(),
        "abscissa and series lengths differ"
    );
    let anchors: Vec<usize> = (0..series.len())
        .filter(|&i| known(&series[i]).is_some())
        .collect();
    if anchors.len() < 2 {
        return series.to_vec();
    }

    let value = |i: usize| known(&series[i]).unwrap_or_default();
    let first = anchors[0];
    let last = anchors[anchors.len() - 1];
    let mut out = Vec::with_capacity(series.len());
    // 当前区间 [anchors[j], anchors[j + 1]]
    let mut j = 0;
    for i in 0..series.len() {
        if let Some(v) = known(&series[i]) {
            out.push(Some(v));
            continue;
        }
        if i < first {
            out.push(Some(value(first)));
            continue;
        }
        if i > last {
            out.push(Some(value(last)));
            continue;
        }
        while anchors[j + 1] < i {
            j += 1;
        }
        let (a, b) = (anchors[j], anchors[j + 1]);
        let slope = (value(b) - value(a)) / (xs[b] - xs[a]);
        out.push(Some(slope * (xs[i] - xs[a]) + value(a)));
    }
    out
}
