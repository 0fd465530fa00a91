/// Discounted cumulative sum, right to left
///
/// `y[i] = Σ_{k≥i} discount^(k−i) · x[k]`, computed in one backward pass as
/// `y[i] = x[i] + discount · y[i+1]`.
pub fn discounted_cumsum(x: &[f32], discount: f32) -> Vec<f32> {
    let mut out = vec![0.0; x.len()];
    let mut running = 0.0f32;
    for i in (0..x.len()).rev() {
        running = x[i] + discount * running;
        out[i] = running;
    }
    out
}
