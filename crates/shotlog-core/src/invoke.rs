use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::{Value, json};

use crate::diagnostics::Diagnostics;
use crate::error::{Result, ShotlogError};
use crate::extract::extract_json_block;
use crate::models::result_ask_user;

/// Seam for the external text-generation process. The production backend
/// shells out to `ollama`; tests inject scripted outputs.
pub trait ModelBackend {
    fn generate(&self, prompt: &str) -> Result<ModelOutput>;
}

/// Full capture of one inference invocation.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

/// Runs `<program> run <model>` with the prompt on stdin, capturing both
/// output streams in full. No client-side timeout; the collaborator's own
/// runtime bounds the call.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    program: String,
    model: String,
}

impl OllamaBackend {
    #[must_use]
    pub fn new(program: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ModelBackend for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<ModelOutput> {
        let mut child = Command::new(&self.program)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                ShotlogError::Internal("failed to open stdin for model process".to_string())
            })?;
            // A child that exits without draining stdin closes the pipe;
            // its exit status still decides success.
            if let Err(err) = stdin.write_all(prompt.as_bytes())
                && err.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(ShotlogError::from(err));
            }
        }

        let output = child.wait_with_output()?;
        Ok(ModelOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// What shape the caller expects back from one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Batch prompt: one result object per record, in order.
    List,
    /// Retry prompt: a single result object.
    SingleObject,
}

/// Shaped result of one invocation, after extraction and structural
/// fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    List(Vec<Value>),
    Object(Value),
}

/// Drives one model invocation end to end: raw generation, diagnostics
/// capture, extraction, and the structural fallbacks that shield the
/// decision engine from wrong-shaped output.
pub struct ModelInvoker<'a> {
    backend: &'a dyn ModelBackend,
    diagnostics: &'a Diagnostics,
}

impl<'a> ModelInvoker<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn ModelBackend, diagnostics: &'a Diagnostics) -> Self {
        Self {
            backend,
            diagnostics,
        }
    }

    /// A non-zero exit from the external process is fatal for the current
    /// batch and surfaces as `ModelProcess`; everything short of that is
    /// resolved into a usable `ModelResponse`.
    pub fn invoke(
        &self,
        prompt: &str,
        log_id: &str,
        expectation: Expectation,
    ) -> Result<ModelResponse> {
        let output = self.backend.generate(prompt)?;

        self.diagnostics.write_capture(log_id, "prompt.txt", prompt);
        self.diagnostics
            .write_capture(log_id, "stdout.txt", &output.stdout);
        if !output.stderr.is_empty() {
            self.diagnostics
                .write_capture(log_id, "stderr.txt", &output.stderr);
        }

        if !output.success {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(ShotlogError::ModelProcess {
                code: output.exit_code,
                detail,
            });
        }

        let parsed = extract_json_block(&output.stdout);
        match expectation {
            Expectation::List => Ok(self.shape_list(parsed, log_id)),
            Expectation::SingleObject => Ok(self.shape_object(parsed, &output.stdout)),
        }
    }

    // Extraction yields an array, an object, or the sentinel object, so a
    // non-array here is always a single object to wrap.
    fn shape_list(&self, parsed: Value, log_id: &str) -> ModelResponse {
        if let Value::Array(items) = parsed {
            ModelResponse::List(items)
        } else {
            eprintln!(
                "warning: expected a list response for {log_id} but received an object; wrapping"
            );
            ModelResponse::List(vec![complete_sentinel_confidence(parsed)])
        }
    }

    fn shape_object(&self, parsed: Value, raw_stdout: &str) -> ModelResponse {
        match parsed {
            Value::Object(_) => ModelResponse::Object(complete_sentinel_confidence(parsed)),
            Value::Array(items) => {
                if let Some(first) = items.into_iter().find(|item| item.is_object()) {
                    return ModelResponse::Object(complete_sentinel_confidence(first));
                }
                self.diagnostics.write_retry_failure(raw_stdout);
                ModelResponse::Object(object_sentinel())
            }
            _ => {
                self.diagnostics.write_retry_failure(raw_stdout);
                ModelResponse::Object(object_sentinel())
            }
        }
    }
}

/// An `ask_user` payload that arrived without a confidence gets one, so
/// downstream threshold checks see an explicit zero.
fn complete_sentinel_confidence(mut value: Value) -> Value {
    if result_ask_user(&value)
        && let Some(object) = value.as_object_mut()
        && !object.contains_key("confidence")
    {
        object.insert("confidence".to_string(), json!(0));
    }
    value
}

#[must_use]
pub fn object_sentinel() -> Value {
    json!({"ask_user": true, "confidence": 0})
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    struct Scripted {
        stdout: String,
        stderr: String,
        success: bool,
    }

    impl Scripted {
        fn ok(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                stderr: String::new(),
                success: true,
            }
        }
    }

    impl ModelBackend for Scripted {
        fn generate(&self, _prompt: &str) -> Result<ModelOutput> {
            Ok(ModelOutput {
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
                success: self.success,
                exit_code: if self.success { 0 } else { 1 },
            })
        }
    }

    #[test]
    fn list_expectation_passes_arrays_through() {
        let backend = Scripted::ok(r#"[{"filename":"a.png","confidence":0.9}]"#);
        let diagnostics = Diagnostics::disabled();
        let response = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png", Expectation::List)
            .expect("invoke");
        let ModelResponse::List(items) = response else {
            panic!("expected list response");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["filename"], "a.png");
    }

    #[test]
    fn single_object_in_list_mode_is_wrapped() {
        let backend = Scripted::ok(r#"{"filename":"a.png","confidence":0.9}"#);
        let diagnostics = Diagnostics::disabled();
        let response = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png", Expectation::List)
            .expect("invoke");
        assert_eq!(
            response,
            ModelResponse::List(vec![json!({"filename": "a.png", "confidence": 0.9})])
        );
    }

    #[test]
    fn unparseable_output_in_list_mode_wraps_the_sentinel() {
        // No bracket in the output means extraction falls back to the
        // sentinel object, which list mode wraps as a one-element batch.
        let backend = Scripted::ok("42");
        let diagnostics = Diagnostics::disabled();
        let response = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png", Expectation::List)
            .expect("invoke");
        assert_eq!(
            response,
            ModelResponse::List(vec![json!({"ask_user": true, "confidence": 0})])
        );
    }

    #[test]
    fn prose_only_output_in_list_mode_wraps_the_ask_user_sentinel() {
        let backend = Scripted::ok("I am not sure about these screenshots.");
        let diagnostics = Diagnostics::disabled();
        let response = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png", Expectation::List)
            .expect("invoke");
        assert_eq!(
            response,
            ModelResponse::List(vec![json!({"ask_user": true, "confidence": 0})])
        );
    }

    #[test]
    fn object_expectation_takes_first_object_from_arrays() {
        let backend = Scripted::ok(r#"[{"filename":"a.png","confidence":0.7}]"#);
        let diagnostics = Diagnostics::disabled();
        let response = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png-retry-0", Expectation::SingleObject)
            .expect("invoke");
        assert_eq!(
            response,
            ModelResponse::Object(json!({"filename": "a.png", "confidence": 0.7}))
        );
    }

    #[test]
    fn object_expectation_degrades_to_sentinel_and_records_failure() {
        let dir = tempdir().expect("tempdir");
        let diagnostics = Diagnostics::enabled(dir.path());
        // An array with no object members cannot satisfy the single-object
        // expectation; the invoker falls back to the sentinel and keeps the
        // raw stdout for inspection.
        let backend = Scripted::ok("[1, 2]");
        let response = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png-retry-0", Expectation::SingleObject)
            .expect("invoke");
        assert_eq!(response, ModelResponse::Object(object_sentinel()));

        let retry_files: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(std::result::Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("retry_failed_")
            })
            .collect();
        assert_eq!(retry_files.len(), 1);
    }

    #[test]
    fn non_zero_exit_is_fatal_with_stderr_detail() {
        let backend = Scripted {
            stdout: String::new(),
            stderr: "model not found".to_string(),
            success: false,
        };
        let diagnostics = Diagnostics::disabled();
        let err = ModelInvoker::new(&backend, &diagnostics)
            .invoke("p", "a.png", Expectation::List)
            .expect_err("must fail");
        match err {
            ShotlogError::ModelProcess { code, detail } => {
                assert_eq!(code, 1);
                assert_eq!(detail, "model not found");
            }
            other => panic!("expected ModelProcess error, got: {other:?}"),
        }
    }

    #[test]
    fn ask_user_objects_gain_an_explicit_zero_confidence() {
        let completed = complete_sentinel_confidence(json!({"ask_user": true}));
        assert_eq!(completed, json!({"ask_user": true, "confidence": 0}));
        let untouched = complete_sentinel_confidence(json!({"ask_user": true, "confidence": 0.2}));
        assert_eq!(untouched["confidence"], 0.2);
    }

    #[cfg(unix)]
    #[test]
    fn ollama_backend_captures_child_process_output() {
        // `echo run <model>` stands in for the real binary; the backend
        // always appends the `run <model>` argument pair.
        let backend = OllamaBackend::new("echo", "stub-model");
        let output = backend.generate("ignored").expect("generate");
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "run stub-model");
    }

    #[cfg(unix)]
    #[test]
    fn ollama_backend_reports_nonzero_exit() {
        let backend = OllamaBackend::new("false", "stub-model");
        let output = backend.generate("ignored").expect("generate");
        assert!(!output.success);
        assert_ne!(output.exit_code, 0);
    }
}
