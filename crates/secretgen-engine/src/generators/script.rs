use super::Generator;
use crate::entropy::Entropy;
use crate::error::GenerateError;
use async_trait::async_trait;
use secretgen_core::ScriptParams;
use std::io::Write;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Captures the standard output of a program
///
/// The program runs with no arguments, no stdin and inherited stderr. Its
/// output cannot be replayed, so it only runs when the secret does not exist.
pub struct ScriptGenerator;

#[async_trait]
impl Generator for ScriptGenerator {
    type Params = ScriptParams;

    fn name(&self) -> &'static str {
        "script"
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        cancel: &CancellationToken,
        _entropy: &mut Entropy,
        params: &ScriptParams,
        output: &mut (dyn Write + Send),
    ) -> Result<(), GenerateError> {
        debug!("Running {}", params.program);

        let mut child = Command::new(&params.program)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GenerateError::ProgramLaunch {
                program: params.program.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take().ok_or_else(|| GenerateError::ProgramLaunch {
            program: params.program.clone(),
            source: std::io::Error::other("stdout was not captured"),
        })?;

        let mut buf = [0u8; 8192];
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(GenerateError::Cancelled);
                }
                read = stdout.read(&mut buf) => read.map_err(|source| GenerateError::Io {
                    path: params.program.clone(),
                    source,
                })?,
            };
            if read == 0 {
                break;
            }
            output
                .write_all(&buf[..read])
                .map_err(GenerateError::Output)?;
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(GenerateError::Cancelled);
            }
            status = child.wait() => status.map_err(|source| GenerateError::Io {
                path: params.program.clone(),
                source,
            })?,
        };

        if !status.success() {
            return Err(GenerateError::ProgramFailed {
                program: params.program.clone(),
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn run(program: &str, cancel: &CancellationToken) -> Result<Vec<u8>, GenerateError> {
        let mut output = Vec::new();
        ScriptGenerator
            .generate(
                cancel,
                &mut Entropy::unavailable(),
                &ScriptParams {
                    program: program.to_string(),
                },
                &mut output,
            )
            .await?;
        Ok(output)
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let output = run("date", &CancellationToken::new()).await.unwrap();
        assert!(!output.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run("/nonexistent/program", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::ProgramLaunch { .. }));
    }

    #[tokio::test]
    async fn test_failing_program() {
        let err = run("false", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GenerateError::ProgramFailed { ref program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run("yes", &cancel).await.unwrap_err();
        assert!(matches!(err, GenerateError::Cancelled));
    }
}
