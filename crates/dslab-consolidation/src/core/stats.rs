//! Robust statistics over utilization samples.

fn sorted(data: &[f64]) -> Vec<f64> {
    let mut values = data.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Median of samples, zero for empty input.
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.;
    }
    let values = sorted(data);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.
    } else {
        values[mid]
    }
}

/// Median absolute deviation.
pub fn mad(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.;
    }
    let center = median(data);
    let deviations: Vec<f64> = data.iter().map(|x| (x - center).abs()).collect();
    median(&deviations)
}

/// Interquartile range with quartiles taken at sample positions round(0.25 * (n + 1)) and round(0.75 * (n + 1)).
pub fn iqr(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.;
    }
    let values = sorted(data);
    let n = values.len();
    let position = |q: f64| ((q * (n as f64 + 1.)).round() as usize).clamp(1, n) - 1;
    values[position(0.75)] - values[position(0.25)]
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        0.
    } else {
        data.iter().sum::<f64>() / data.len() as f64
    }
}
