use hm_session::{ParameterOptimizerSession, ParameterValue, SessionConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn objective(x: f64, y: i64, function: &str) -> f64 {
    let shape = match function {
        "square" => x * x,
        "abs" => x.abs(),
        _ => (x - 1.0).powi(2),
    };
    shape + (y - 2).pow(2) as f64
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("HyperMint quadratic example");

    let space = json!({
        "x": {"type": "float", "min": -5.0, "max": 5.0},
        "y": {"type": "int", "min": -3, "max": 6},
        "function": {"type": "enum", "options": ["square", "abs", "shifted"]}
    });
    let config = SessionConfig::from_env()?;
    let mut session = ParameterOptimizerSession::from_json(&space, config)?;

    for i in 0..25 {
        let params = session.suggest()?;
        let x = params["x"].as_f64().unwrap_or_default();
        let y = params["y"].as_i64().unwrap_or_default();
        let function = params["function"].as_str().unwrap_or_default();
        let value = objective(x, y, function);
        println!("{i:>3}: x={x:>8.4} y={y:>3} function={function:<8} -> {value:.5}");
        session.update(&params, value)?;
    }

    let (best, value) = session.get_best_parameters()?;
    println!("Best objective {value:.5}");
    for name in session.space().names() {
        if let Some(v) = best.get(name).map(ParameterValue::to_string) {
            println!("  {name} = {v}");
        }
    }
    Ok(())
}
