use serde_json::Value;

/// Number of feature channels the server encodes per cell
pub const CHANNELS: usize = 5;

/// Length of a flashlight observation of the given radius
pub fn observation_dim(radius: usize) -> usize {
    let side = 2 * radius + 1;
    CHANNELS * side * side
}

/// Flatten a nested numeric array into a feature vector
///
/// Leaves are visited depth-first in document order, so the same server layout
/// always yields the same vector layout. Booleans map to 0/1; any other leaf is
/// rejected.
pub fn flatten_observation(grid: &Value) -> Result<Vec<f32>, String> {
    let mut out = Vec::new();
    flatten_into(grid, &mut out)?;
    Ok(out)
}

fn flatten_into(value: &Value, out: &mut Vec<f32>) -> Result<(), String> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
            Ok(())
        }
        Value::Number(n) => {
            let x = n
                .as_f64()
                .ok_or_else(|| format!("number {} is not representable as f64", n))?;
            out.push(x as f32);
            Ok(())
        }
        Value::Bool(b) => {
            out.push(if *b { 1.0 } else { 0.0 });
            Ok(())
        }
        other => Err(format!("expected a numeric array, found {}", other)),
    }
}
