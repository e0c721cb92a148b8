//! Surrogate diagnostics are silenced during `suggest` and always restored.

use std::io::Write;
use std::sync::{Arc, Mutex};

use hm_session::{
    HmError, HmResult, ParameterOptimizerSession, ParameterSpace, SessionConfig, SurrogateOptimizer,
    TaskConfig,
};
use hm_types::SurrogateError;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn with_capture<T>(f: impl FnOnce() -> T) -> (T, String) {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, capture.text())
}

/// Logs on every call and optionally fails.
#[derive(Debug)]
struct ChattySurrogate {
    fail: bool,
}

impl SurrogateOptimizer for ChattySurrogate {
    type Hypers = u32;

    fn fit(
        &mut self,
        _inputs: &[Vec<f64>],
        _values: &[f64],
        hypers: Option<u32>,
        _task: &TaskConfig,
    ) -> HmResult<u32> {
        tracing::warn!("surrogate-fit-noise");
        if self.fail {
            return Err(SurrogateError::NotPositiveDefinite {
                message: "forced".into(),
            }
            .into());
        }
        Ok(hypers.unwrap_or(0) + 1)
    }

    fn suggest(&mut self) -> HmResult<Vec<f64>> {
        tracing::warn!("surrogate-suggest-noise");
        Ok(vec![0.5])
    }

    fn name(&self) -> &str {
        "chatty"
    }
}

fn session(debug: bool, fail: bool) -> ParameterOptimizerSession<ChattySurrogate> {
    let space = ParameterSpace::new().add_float("x", 0.0, 1.0);
    ParameterOptimizerSession::with_surrogate(
        &space,
        SessionConfig::new().with_debug(debug),
        ChattySurrogate { fail },
    )
    .unwrap()
}

#[test]
fn suggest_silences_surrogate_by_default() {
    let mut s = session(false, false);
    let (suggestion, text) = with_capture(|| {
        let suggestion = s.suggest().unwrap();
        tracing::warn!("caller-after-suggest");
        suggestion
    });

    assert_eq!(suggestion["x"].as_f64(), Some(0.5));
    assert!(!text.contains("surrogate-fit-noise"));
    assert!(!text.contains("surrogate-suggest-noise"));
    assert!(text.contains("caller-after-suggest"));
}

#[test]
fn debug_lets_surrogate_speak() {
    let mut s = session(true, false);
    let (_, text) = with_capture(|| s.suggest().unwrap());
    assert!(text.contains("surrogate-fit-noise"));
    assert!(text.contains("surrogate-suggest-noise"));
}

#[test]
fn diagnostics_restored_after_failed_fit() {
    let mut s = session(false, true);
    let (result, text) = with_capture(|| {
        let result = s.suggest();
        tracing::warn!("caller-after-failure");
        result
    });

    assert!(matches!(result, Err(HmError::Surrogate(_))));
    assert!(!text.contains("surrogate-fit-noise"));
    assert!(text.contains("caller-after-failure"));
    assert!(s.hypers().is_none());
}

#[test]
fn hypers_are_threaded_between_fits() {
    let mut s = session(false, false);
    s.suggest().unwrap();
    s.suggest().unwrap();
    s.suggest().unwrap();
    assert_eq!(s.hypers(), Some(&3));
}
